//! Per-context recorder: the pending call, the report table and the dump guard.
//!
//! One `Recorder` belongs to one thread. An entry report stashes its decoded
//! inputs in a single pending slot; the next return report commits them
//! together with its outputs, whichever function it names.

use anyhow::Result;

use crate::config::{DumpTarget, ReporterConfig};
use crate::decode::decode_call;
use crate::dump::write_report;
use crate::slot::ReportSlot;
use crate::store::{ExecutionRecord, InsertOutcome, ReportTable};
use crate::tags::parse_meta;
use crate::value::TaggedSequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpOutcome {
    Written { functions: usize },
    AlreadyDumped,
}

#[derive(Debug)]
pub struct Recorder {
    table: ReportTable,
    /// Inputs of the call whose return has not been reported yet.
    pending: Option<TaggedSequence>,
    dump_count: u32,
    pointer_outputs: bool,
    target: DumpTarget,
}

impl Recorder {
    pub fn new(cfg: &ReporterConfig) -> Self {
        Recorder {
            table: ReportTable::from_config(cfg),
            pending: None,
            dump_count: 0,
            pointer_outputs: cfg.pointer_outputs,
            target: cfg.output.clone(),
        }
    }

    /// Decode one raw call-site report and feed it to `begin_call`.
    pub fn report(
        &mut self,
        is_return: bool,
        meta: &str,
        slots: &[ReportSlot],
    ) -> Option<InsertOutcome> {
        let meta = parse_meta(meta);
        let decoded = decode_call(&meta, is_return, slots, self.pointer_outputs);
        self.begin_call(is_return, decoded, &meta.name)
    }

    /// Stash entry inputs, or pair return outputs with the matching entry.
    ///
    /// Returns the insert outcome for return calls, `None` for entries.
    pub fn begin_call(
        &mut self,
        is_return: bool,
        decoded: TaggedSequence,
        func_name: &str,
    ) -> Option<InsertOutcome> {
        if !is_return {
            if self.pending.is_some() {
                tracing::debug!(target: "honest_report", func = func_name, "entry replaces a pending call");
            }
            self.pending = Some(decoded);
            return None;
        }

        let inputs = self.pending.take().unwrap_or_default();
        let record = ExecutionRecord {
            inputs,
            outputs: decoded,
        };
        Some(self.table.insert(func_name, record))
    }

    pub fn table(&self) -> &ReportTable {
        &self.table
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn has_dumped(&self) -> bool {
        self.dump_count > 0
    }

    /// Serialize the table to the configured target, at most once.
    ///
    /// The guard is taken before writing, so a dump re-entered from a
    /// termination signal while the first one runs is a no-op.
    pub fn dump(&mut self) -> Result<DumpOutcome> {
        let target = self.target.clone();
        self.dump_to(&target)
    }

    /// `dump`, but to `target` instead of the configured destination.
    pub fn dump_to(&mut self, target: &DumpTarget) -> Result<DumpOutcome> {
        if self.dump_count > 0 {
            return Ok(DumpOutcome::AlreadyDumped);
        }
        self.dump_count += 1;
        write_report(&self.table, target)?;
        Ok(DumpOutcome::Written {
            functions: self.table.len(),
        })
    }

    /// Drop everything recorded so far and re-arm the dump guard.
    pub fn reset(&mut self) {
        self.table.reset();
        self.pending = None;
        self.dump_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DedupPolicy;
    use crate::dump::parse_report;
    use crate::value::TaggedValue;

    fn i32v(v: &str) -> TaggedValue {
        TaggedValue::new(v, "i32")
    }

    fn recorder_in(dir: &std::path::Path) -> Recorder {
        let cfg = ReporterConfig {
            output: DumpTarget::File(dir.join("r.json")),
            ..ReporterConfig::default()
        };
        Recorder::new(&cfg)
    }

    #[test]
    fn entry_then_return_commits_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = recorder_in(dir.path());
        let add_in = "add>>=i32>>=i32>>=";
        let add_out = "add>>=i32>>=i32>>=i32>>=";
        assert_eq!(
            r.report(false, add_in, &[ReportSlot::int(3), ReportSlot::int(4)]),
            None
        );
        assert!(r.has_pending());
        assert_eq!(
            r.report(true, add_out, &[ReportSlot::int(7)]),
            Some(InsertOutcome::Inserted)
        );
        assert!(!r.has_pending());
        assert_eq!(
            r.table().outputs("add", &[i32v("3"), i32v("4")]).unwrap(),
            &[vec![i32v("7")]]
        );
    }

    #[test]
    fn nested_entry_takes_over_the_pending_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = recorder_in(dir.path());
        r.begin_call(false, vec![i32v("1")], "outer");
        r.begin_call(false, vec![i32v("2")], "inner");
        r.begin_call(true, vec![i32v("20")], "inner");
        r.begin_call(true, vec![i32v("10")], "outer");
        assert_eq!(
            r.table().outputs("inner", &[i32v("2")]).unwrap(),
            &[vec![i32v("20")]]
        );
        assert_eq!(
            r.table().outputs("outer", &[]).unwrap(),
            &[vec![i32v("10")]]
        );
        assert!(r.table().outputs("outer", &[i32v("1")]).is_none());
    }

    #[test]
    fn return_commits_pending_inputs_regardless_of_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = recorder_in(dir.path());
        r.begin_call(false, vec![i32v("1")], "f");
        r.begin_call(true, vec![i32v("9")], "g");
        assert!(!r.has_pending());
        assert_eq!(
            r.table().outputs("g", &[i32v("1")]).unwrap(),
            &[vec![i32v("9")]]
        );
    }

    #[test]
    fn orphan_return_records_empty_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = recorder_in(dir.path());
        r.begin_call(true, vec![TaggedValue::void()], "atexit_cb");
        assert_eq!(
            r.table().outputs("atexit_cb", &[]).unwrap(),
            &[vec![TaggedValue::void()]]
        );
    }

    #[test]
    fn dump_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = recorder_in(dir.path());
        r.begin_call(false, vec![i32v("1")], "f");
        r.begin_call(true, vec![i32v("2")], "f");
        assert_eq!(r.dump().unwrap(), DumpOutcome::Written { functions: 1 });

        let path = dir.path().join("r.json");
        let first = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        r.begin_call(false, vec![i32v("5")], "g");
        r.begin_call(true, vec![i32v("6")], "g");
        for _ in 0..3 {
            assert_eq!(r.dump().unwrap(), DumpOutcome::AlreadyDumped);
        }
        assert!(!path.exists(), "second dump must not write");
        assert!(parse_report(&first).unwrap().contains_key("f"));
    }

    #[test]
    fn reset_rearms_dump_and_clears_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = recorder_in(dir.path());
        r.begin_call(false, vec![i32v("1")], "f");
        r.dump().unwrap();
        r.reset();
        assert!(!r.has_dumped());
        assert!(!r.has_pending());
        assert!(r.table().is_empty());
        assert_eq!(r.dump().unwrap(), DumpOutcome::Written { functions: 0 });
    }

    #[test]
    fn list_policy_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ReporterConfig {
            dedup: DedupPolicy::List,
            value_capacity: 2,
            output: DumpTarget::File(dir.path().join("r.json")),
            ..ReporterConfig::default()
        };
        let mut r = Recorder::new(&cfg);
        for _ in 0..3 {
            r.begin_call(false, vec![i32v("1")], "f");
            r.begin_call(true, vec![i32v("2")], "f");
        }
        assert_eq!(r.table().outputs("f", &[i32v("1")]).unwrap().len(), 2);
    }
}

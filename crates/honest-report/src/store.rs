//! Bounded, input-keyed store of observed outputs.
//!
//! `ReportTable` maps a function name to its `FunctionTable`, which maps an
//! exact input sequence to a `Bucket` of outputs seen for it. Both levels are
//! capped at insert time; nothing is ever evicted.

use std::collections::BTreeMap;

use crate::config::{DedupPolicy, ReporterConfig};
use crate::value::{TaggedSequence, TaggedValue};

/// One observed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub inputs: TaggedSequence,
    pub outputs: TaggedSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Set policy only: the bucket already holds these outputs.
    Duplicate,
    /// The bucket for these inputs is at `value_capacity`.
    BucketFull,
    /// The inputs are new and the function is at `max_inputs`.
    TableFull,
}

/// Outputs seen for one input sequence, first-seen first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    outputs: Vec<TaggedSequence>,
}

impl Bucket {
    pub fn outputs(&self) -> &[TaggedSequence] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    fn add(&mut self, outputs: TaggedSequence, cap: usize, dedup: DedupPolicy) -> InsertOutcome {
        if dedup == DedupPolicy::Set && self.outputs.contains(&outputs) {
            return InsertOutcome::Duplicate;
        }
        if self.outputs.len() >= cap {
            return InsertOutcome::BucketFull;
        }
        self.outputs.push(outputs);
        InsertOutcome::Inserted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionTable {
    buckets: BTreeMap<TaggedSequence, Bucket>,
}

impl FunctionTable {
    pub fn bucket(&self, inputs: &[TaggedValue]) -> Option<&Bucket> {
        self.buckets.get(inputs)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaggedSequence, &Bucket)> {
        self.buckets.iter()
    }

    /// Number of distinct inputs.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// More than one distinct output for some input.
    pub fn is_dishonest(&self) -> bool {
        self.buckets
            .values()
            .any(|b| b.outputs.iter().any(|o| *o != b.outputs[0]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    functions: BTreeMap<String, FunctionTable>,
    value_capacity: usize,
    max_inputs: usize,
    dedup: DedupPolicy,
}

impl ReportTable {
    pub fn new(value_capacity: usize, max_inputs: usize, dedup: DedupPolicy) -> Self {
        ReportTable {
            functions: BTreeMap::new(),
            value_capacity,
            max_inputs,
            dedup,
        }
    }

    pub fn from_config(cfg: &ReporterConfig) -> Self {
        Self::new(cfg.value_capacity, cfg.max_inputs, cfg.dedup)
    }

    pub fn value_capacity(&self) -> usize {
        self.value_capacity
    }

    pub fn dedup(&self) -> DedupPolicy {
        self.dedup
    }

    pub fn insert(&mut self, func_name: &str, record: ExecutionRecord) -> InsertOutcome {
        let table = self.functions.entry(func_name.to_string()).or_default();
        let outcome = if let Some(bucket) = table.buckets.get_mut(&record.inputs) {
            bucket.add(record.outputs, self.value_capacity, self.dedup)
        } else if table.buckets.len() >= self.max_inputs {
            InsertOutcome::TableFull
        } else {
            table.buckets.entry(record.inputs).or_default().add(
                record.outputs,
                self.value_capacity,
                self.dedup,
            )
        };
        match outcome {
            InsertOutcome::BucketFull | InsertOutcome::TableFull => {
                tracing::debug!(target: "honest_report", func = func_name, ?outcome, "record dropped");
            }
            InsertOutcome::Inserted | InsertOutcome::Duplicate => {}
        }
        outcome
    }

    pub fn function(&self, func_name: &str) -> Option<&FunctionTable> {
        self.functions.get(func_name)
    }

    pub fn outputs(&self, func_name: &str, inputs: &[TaggedValue]) -> Option<&[TaggedSequence]> {
        self.function(func_name)?.bucket(inputs).map(Bucket::outputs)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &FunctionTable)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every `(function, inputs, outputs)` triple, sorted by function then inputs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &TaggedSequence, &[TaggedSequence])> {
        self.functions.iter().flat_map(|(name, table)| {
            table
                .buckets
                .iter()
                .map(move |(inputs, bucket)| (name.as_str(), inputs, bucket.outputs()))
        })
    }

    pub fn dishonest_functions(&self) -> Vec<&str> {
        self.functions()
            .filter(|(_, t)| t.is_dishonest())
            .map(|(name, _)| name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn reset(&mut self) {
        self.functions.clear();
    }
}

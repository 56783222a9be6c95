//! Report file format.
//!
//! ```text
//! { "<function>": { "<json of inputs>": [ <outputs>, <outputs>, ... ], ... }, ... }
//! ```
//!
//! where inputs and each outputs entry are arrays of `{"value", "type"}`
//! objects. Input keys are the compact JSON text of the input array, so a
//! consumer recovers them with a second `serde_json` parse.

use std::collections::BTreeMap;
use std::io::Write as _;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::config::DumpTarget;
use crate::store::ReportTable;
use crate::value::TaggedSequence;

pub type ParsedReport = BTreeMap<String, BTreeMap<TaggedSequence, Vec<TaggedSequence>>>;

pub fn report_to_json(table: &ReportTable) -> Result<Value> {
    let mut root = Map::new();
    for (name, func) in table.functions() {
        let mut by_input = Map::new();
        for (inputs, bucket) in func.iter() {
            let key = serde_json::to_string(inputs).context("encode input key")?;
            let outputs = serde_json::to_value(bucket.outputs()).context("encode outputs")?;
            by_input.insert(key, outputs);
        }
        root.insert(name.to_string(), Value::Object(by_input));
    }
    Ok(Value::Object(root))
}

pub fn render_report(table: &ReportTable) -> Result<String> {
    let v = report_to_json(table)?;
    let mut out = serde_json::to_string(&v).context("serialize report")?;
    out.push('\n');
    Ok(out)
}

pub fn write_report(table: &ReportTable, target: &DumpTarget) -> Result<()> {
    let text = render_report(table)?;
    match target {
        DumpTarget::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .context("write report to stdout")?;
        }
        DumpTarget::File(path) => {
            std::fs::write(path, text.as_bytes())
                .with_context(|| format!("write report {}", path.display()))?;
        }
    }
    tracing::info!(
        target: "honest_report",
        functions = table.len(),
        dishonest = table.dishonest_functions().len(),
        ?target,
        "report written"
    );
    Ok(())
}

pub fn parse_report(text: &str) -> Result<ParsedReport> {
    let raw: BTreeMap<String, BTreeMap<String, Vec<TaggedSequence>>> =
        serde_json::from_str(text).context("parse report")?;
    let mut out = ParsedReport::new();
    for (name, by_input) in raw {
        let mut parsed = BTreeMap::new();
        for (key, outputs) in by_input {
            let inputs: TaggedSequence = serde_json::from_str(&key)
                .with_context(|| format!("parse input key {key:?} of {name}"))?;
            parsed.insert(inputs, outputs);
        }
        out.insert(name, parsed);
    }
    Ok(out)
}

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_SILENT: &str = "SILENT_REPORTER";
pub const ENV_MAX_REPORT_SIZE: &str = "MAX_REPORT_SIZE";
pub const ENV_MAX_REPORT_INPUTS: &str = "MAX_REPORT_INPUTS";
pub const ENV_DEDUP: &str = "REPORT_DEDUP";
pub const ENV_POINTER_OUTPUTS: &str = "REPORT_POINTER_OUTPUTS";
pub const ENV_OUTPUT: &str = "REPORT_OUTPUT";

pub const DEFAULT_VALUE_CAPACITY: usize = 10;
pub const DEFAULT_MAX_INPUTS: usize = 1024;
pub const DEFAULT_OUTPUT: &str = "honest_report.json";

/// How a bucket treats an output it already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DedupPolicy {
    /// Distinct outputs only; a repeat is ignored.
    #[default]
    Set,
    /// Every observation is appended until the bucket is full.
    List,
}

impl DedupPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DedupPolicy::Set => "set",
            DedupPolicy::List => "list",
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DedupPolicyParseError {
    value: String,
}

impl fmt::Display for DedupPolicyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid dedup policy {:?} (expected one of: set, list)",
            self.value
        )
    }
}

impl std::error::Error for DedupPolicyParseError {}

impl FromStr for DedupPolicy {
    type Err = DedupPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "set" => Ok(DedupPolicy::Set),
            "list" => Ok(DedupPolicy::List),
            _ => Err(DedupPolicyParseError { value: s }),
        }
    }
}

/// Where a dump goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTarget {
    Stdout,
    File(PathBuf),
}

impl DumpTarget {
    pub fn parse(raw: &str) -> DumpTarget {
        match raw.trim() {
            "-" => DumpTarget::Stdout,
            "" => DumpTarget::File(PathBuf::from(DEFAULT_OUTPUT)),
            path => DumpTarget::File(PathBuf::from(path)),
        }
    }

    /// Destination for the `ordinal`-th recorder context of the process.
    ///
    /// Context 0 gets the configured path; later contexts (other threads) get
    /// `<stem>.<ordinal>.<ext>` next to it.
    pub fn for_context(&self, ordinal: u64) -> DumpTarget {
        match self {
            DumpTarget::Stdout => DumpTarget::Stdout,
            DumpTarget::File(path) if ordinal == 0 => DumpTarget::File(path.clone()),
            DumpTarget::File(path) => DumpTarget::File(numbered_path(path, ordinal)),
        }
    }
}

impl Default for DumpTarget {
    fn default() -> Self {
        DumpTarget::File(PathBuf::from(DEFAULT_OUTPUT))
    }
}

fn numbered_path(path: &Path, ordinal: u64) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{ordinal}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{ordinal}"),
    };
    path.with_file_name(name)
}

/// Reporter settings, read once at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    pub silent: bool,
    /// Maximum distinct outputs kept per input.
    pub value_capacity: usize,
    /// Maximum distinct inputs kept per function.
    pub max_inputs: usize,
    pub dedup: DedupPolicy,
    /// Record pointer parameters re-reported at return sites as outputs.
    pub pointer_outputs: bool,
    pub output: DumpTarget,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig {
            silent: false,
            value_capacity: DEFAULT_VALUE_CAPACITY,
            max_inputs: DEFAULT_MAX_INPUTS,
            dedup: DedupPolicy::Set,
            pointer_outputs: true,
            output: DumpTarget::default(),
        }
    }
}

impl ReporterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Malformed values fall back to their defaults: a recorder that cannot
    /// start would change the behavior of the host program.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ReporterConfig::default();
        let silent = lookup(ENV_SILENT).is_some_and(|v| !is_falsey(&v));
        let value_capacity =
            positive_or(lookup(ENV_MAX_REPORT_SIZE).as_deref(), defaults.value_capacity);
        let max_inputs = positive_or(lookup(ENV_MAX_REPORT_INPUTS).as_deref(), defaults.max_inputs);
        let dedup = match lookup(ENV_DEDUP) {
            None => defaults.dedup,
            Some(raw) => DedupPolicy::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(target: "honest_report", %err, "ignoring {ENV_DEDUP}");
                defaults.dedup
            }),
        };
        let pointer_outputs = lookup(ENV_POINTER_OUTPUTS)
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.pointer_outputs);
        let output = lookup(ENV_OUTPUT)
            .map(|raw| DumpTarget::parse(&raw))
            .unwrap_or(defaults.output);
        ReporterConfig {
            silent,
            value_capacity,
            max_inputs,
            dedup,
            pointer_outputs,
            output,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

fn is_falsey(raw: &str) -> bool {
    parse_bool(raw) == Some(false)
}

fn positive_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|&v| v > 0)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

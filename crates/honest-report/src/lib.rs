//! Runtime recorder for instrumented native functions.
//!
//! Instrumented call sites hand over a metadata string plus a buffer of
//! typed value slots at function entry and at every return. This crate:
//! - parses the metadata (`tags`),
//! - turns slots into textual tagged values without faulting on bad pointers
//!   (`decode`, `probe`),
//! - keeps a bounded, input-keyed table of distinct outputs (`store`,
//!   `recorder`),
//! - serializes that table once (`dump`).
//!
//! A function with more than one distinct output recorded for the same
//! inputs is "dishonest": it is not a pure function of its arguments.

pub mod config;
pub mod decode;
pub mod dump;
pub mod float;
pub mod probe;
pub mod recorder;
pub mod slot;
pub mod store;
pub mod tags;
pub mod value;

pub use config::{DedupPolicy, ReporterConfig};
pub use decode::decode_call;
pub use recorder::{DumpOutcome, Recorder};
pub use slot::{ReportSlot, ReportSlotPayload};
pub use store::{ExecutionRecord, InsertOutcome, ReportTable};
pub use tags::{parse_meta, CallSiteMetadata, FloatKind, TypeTag};
pub use value::{TaggedSequence, TaggedValue};

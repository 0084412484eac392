//! This crate initialises the tracing subscribers used by `kubectl-view-webhook`.
//!
//! Diagnostics are written to stderr, so that the report printed to stdout can
//! be piped into other tools. Optionally, logs can additionally be written to
//! rolling JSON files and spans can be exported via OTLP.
pub mod tracing;

pub use tracing::{TelemetryOptions, Tracing};

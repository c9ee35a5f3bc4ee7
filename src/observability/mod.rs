//! Logging and tracing spans.
//!
//! The compiler emits structured events through `tracing`:
//!
//! | Span | Level | Fields |
//! |------|-------|--------|
//! | `compile` | INFO | `lanes` |
//! | `lane` | INFO | `name`, `number` |
//! | `branch` | DEBUG | `lane`, `branch`, `camera` |
//!
//! Skipped workloads, unreadable documents and ignored profile values are
//! reported at WARN or ERROR inside those spans. The binary installs a
//! stderr subscriber through [`TracingConfig::init`].

mod tracing_support;

pub use tracing_support::{TracingConfig, span_branch, span_compile, span_lane};

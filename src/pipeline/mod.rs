//! Branch planning, assembly and formatting.
//!
//! This module turns bound step chains into launcher commands:
//!
//! - [`SignatureTable`]: deduplicates step chains within a lane
//! - [`BranchAssembler`]: builds one [`BranchGraph`] per distinct chain
//! - [`Compiler`]: drives both over every lane and joins the results
//! - [`parser`]: reads launch syntax back into typed elements
//!
//! # Example
//!
//! ```rust
//! use lanegen::config::{CameraDocument, CompilerSettings, WorkloadDocument};
//! use lanegen::device::DeviceProfiles;
//! use lanegen::locator::ModelStore;
//! use lanegen::pipeline::Compiler;
//!
//! let cameras: CameraDocument = serde_json::from_str(
//!     r#"{"lane1": {"cameras": [{"fileSrc": "store.mp4", "workloads": ["retail"]}]}}"#,
//! ).unwrap();
//! let workloads: WorkloadDocument = serde_json::from_str(
//!     r#"{"workload_pipeline_map": {"retail": [
//!         {"type": "gvadetect", "model": "yolov5s", "device": "CPU", "precision": "INT8"}
//!     ]}}"#,
//! ).unwrap();
//!
//! let settings = CompilerSettings::default().with_timestamp("20250101_000000");
//! let profiles = DeviceProfiles::empty();
//! let models = ModelStore::new(&settings.models_dir);
//! let commands = Compiler::new(&settings, &profiles, &models)
//!     .compile(&cameras, &workloads)
//!     .unwrap();
//! assert!(commands.get("lane1").unwrap().starts_with("gst-launch-1.0 -e"));
//! ```

pub mod assembler;
pub mod compiler;
mod graph;
pub mod lane;
pub mod parser;
pub mod signature;

pub use assembler::{Branch, BranchAssembler, BranchPosition, CompileContext};
pub use compiler::{Compiler, compile};
pub use graph::{BranchGraph, Link, Node, NodeId};
pub use lane::{LAUNCHER_BIN, LaneCommands, format_lane, format_multiline, split_lane};
pub use parser::{Chain, ParsedLaunch, parse_chain, parse_command, parse_launch};
pub use signature::{BranchPlan, CameraRef, Signature, SignatureTable, dedup_rois};

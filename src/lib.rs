//! # Lanegen
//!
//! Compiles camera and workload configuration documents into multi-branch
//! inference launch commands, one command per lane.
//!
//! A lane groups cameras that share one launcher process. Each camera asks
//! for named workloads; each workload is an ordered list of processing
//! steps. Cameras of a lane that ask for the same processing share one
//! branch, so the lane decodes each distinct configuration once.
//!
//! ## Features
//!
//! - **Deduplication**: identical step chains collapse into one branch
//! - **Device profiles**: per-device decode and option overrides
//! - **Typed elements**: commands are built as element graphs and only
//!   rendered to text at the end
//! - **Round-trip parser**: emitted commands parse back into elements
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lanegen::prelude::*;
//! use std::path::Path;
//!
//! let settings = CompilerSettings::from_env().with_timestamp("20250101_000000");
//! let cameras: CameraDocument = try_load_json(Path::new(DEFAULT_CAMERA_CONFIG))?;
//! let workloads: WorkloadDocument = try_load_json(Path::new(DEFAULT_WORKLOAD_CONFIG))?;
//! let profiles = DeviceProfiles::load(&settings.profiles_dir);
//! let models = ModelStore::new(&settings.models_dir);
//!
//! let commands = Compiler::new(&settings, &profiles, &models).compile(&cameras, &workloads)?;
//! println!("{}", commands.to_json_pretty()?);
//! # Ok::<(), lanegen::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod device;
pub mod element;
pub mod error;
pub mod locator;
pub mod observability;
pub mod pipeline;
pub mod step;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{
        CameraDocument, CompilerSettings, DEFAULT_CAMERA_CONFIG, DEFAULT_WORKLOAD_CONFIG,
        RenderMode, WorkloadDocument, load_json, try_load_json,
    };
    pub use crate::device::DeviceProfiles;
    pub use crate::element::{Element, ElementKind, PropertyValue};
    pub use crate::error::{Error, Result};
    pub use crate::locator::{ModelLocator, ModelStore};
    pub use crate::pipeline::{Compiler, LaneCommands, compile, format_multiline};
}

pub use error::{Error, Result};

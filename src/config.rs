//! Input documents and compiler settings.
//!
//! Two JSON documents drive a compilation:
//!
//! - the camera document, mapping lane name to `{ "cameras": [...] }`
//! - the workload document, `{ "workload_pipeline_map": { name: [step, ...] } }`
//!
//! Loading is forgiving: [`load_json`] logs and yields `None` for a missing
//! or malformed document, which callers treat as "nothing to compile".
//! [`try_load_json`] keeps the typed error for callers that want it.

use crate::error::{Error, Result};
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default location of the camera-to-workload document.
pub const DEFAULT_CAMERA_CONFIG: &str = "/home/pipeline-server/configs/camera_to_workload.json";
/// Default location of the workload-to-pipeline document.
pub const DEFAULT_WORKLOAD_CONFIG: &str = "/home/pipeline-server/configs/workload_to_pipeline.json";

/// A rectangular region of a frame, in pixels.
///
/// Coordinates are kept as the JSON numbers they were written as, so a
/// fractional value renders unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Roi {
    /// Left edge.
    #[serde(default = "zero")]
    pub x: Number,
    /// Top edge.
    #[serde(default = "zero")]
    pub y: Number,
    /// Width.
    #[serde(default = "one")]
    pub width: Number,
    /// Height.
    #[serde(default = "one")]
    pub height: Number,
}

fn zero() -> Number {
    Number::from(0)
}

fn one() -> Number {
    Number::from(1)
}

impl Roi {
    /// Create a region from whole-pixel coordinates.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            width: width.into(),
            height: height.into(),
        }
    }

    /// The `(x, y, width, height)` tuple regions are deduplicated by.
    pub fn key(&self) -> (&Number, &Number, &Number, &Number) {
        (&self.x, &self.y, &self.width, &self.height)
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// One camera entry of a lane.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Camera identifier; defaults to `cam{n}` when absent.
    #[serde(default)]
    pub camera_id: Option<String>,
    /// Source video reference; anything after a `|` is ignored.
    #[serde(rename = "fileSrc")]
    pub file_src: String,
    /// Frame width.
    #[serde(default)]
    pub width: Option<Number>,
    /// Frame height. Accepted but not used for path resolution.
    #[serde(default)]
    pub height: Option<Number>,
    /// Frame rate, e.g. `30` or `29.97`.
    #[serde(default)]
    pub fps: Option<Number>,
    /// Region inference is restricted to.
    #[serde(default)]
    pub region_of_interest: Option<Roi>,
    /// Requested workload names (matched case-insensitively).
    #[serde(default)]
    pub workloads: Vec<String>,
}

impl CameraConfig {
    /// Camera id, or the positional default `cam{index+1}`.
    pub fn id_or_default(&self, index: usize) -> String {
        match &self.camera_id {
            Some(id) => id.clone(),
            None => format!("cam{}", index + 1),
        }
    }
}

/// A lane: a named group of cameras.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaneConfig {
    /// Cameras in enumeration order.
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
}

/// The camera-to-workload document, lanes kept in document order.
#[derive(Debug, Clone, Default)]
pub struct CameraDocument {
    lanes: Vec<(String, LaneConfig)>,
}

impl CameraDocument {
    /// Build a document from lanes in order.
    pub fn new(lanes: Vec<(String, LaneConfig)>) -> Self {
        Self { lanes }
    }

    /// Lanes in document order.
    pub fn lanes(&self) -> &[(String, LaneConfig)] {
        &self.lanes
    }

    /// Whether the document has no lanes.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

impl<'de> Deserialize<'de> for CameraDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct LanesVisitor;

        impl<'de> Visitor<'de> for LanesVisitor {
            type Value = CameraDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of lane name to lane")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<CameraDocument, A::Error> {
                let mut lanes = Vec::new();
                while let Some((name, lane)) = map.next_entry::<String, LaneConfig>()? {
                    lanes.push((name, lane));
                }
                Ok(CameraDocument { lanes })
            }
        }

        deserializer.deserialize_map(LanesVisitor)
    }
}

/// One step template of a workload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepConfig {
    /// Element kind name, validated at build time.
    #[serde(rename = "type")]
    pub kind: String,
    /// Model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Target device (CPU, GPU, NPU, ...).
    #[serde(default)]
    pub device: Option<String>,
    /// Model precision (FP32, FP16, INT8, ...).
    #[serde(default)]
    pub precision: Option<String>,
    /// Any other keys; they take part in deduplication.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StepConfig {
    /// A template with only a kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            model: None,
            device: None,
            precision: None,
            extra: BTreeMap::new(),
        }
    }

    /// Set the model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the device.
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Set the precision.
    pub fn precision(mut self, precision: impl Into<String>) -> Self {
        self.precision = Some(precision.into());
        self
    }
}

/// The workload-to-pipeline document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkloadDocument {
    /// Workload name to ordered step templates.
    #[serde(default)]
    pub workload_pipeline_map: BTreeMap<String, Vec<StepConfig>>,
}

impl WorkloadDocument {
    /// Step templates for a workload, matched case-insensitively.
    pub fn steps_for(&self, workload: &str) -> Option<&[StepConfig]> {
        self.workload_pipeline_map
            .iter()
            .find(|(name, _)| name.to_lowercase() == workload.to_lowercase())
            .map(|(_, steps)| steps.as_slice())
    }
}

/// Whether rendered branches include a live display sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// File publishing only.
    #[default]
    Headless,
    /// File publishing plus overlay and on-screen display.
    Display,
}

impl RenderMode {
    /// Interpret a `RENDER_MODE` value; only `"1"` turns display on.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1") => RenderMode::Display,
            _ => RenderMode::Headless,
        }
    }
}

/// Settings shared by one compilation run.
#[derive(Debug, Clone)]
pub struct CompilerSettings {
    /// Root of the model tree.
    pub models_dir: PathBuf,
    /// Root of the benchmark video tree.
    pub videos_dir: PathBuf,
    /// Directory result files are written to by the launched pipelines.
    pub results_dir: PathBuf,
    /// Directory holding per-device profile files.
    pub profiles_dir: PathBuf,
    /// Display or headless fan-out.
    pub render_mode: RenderMode,
    /// Run timestamp shared by every result file name.
    pub timestamp: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("/home/pipeline-server/models"),
            videos_dir: PathBuf::from("/home/pipeline-server/sample-media"),
            results_dir: PathBuf::from("/home/pipeline-server/results"),
            profiles_dir: PathBuf::from("/res"),
            render_mode: RenderMode::Headless,
            timestamp: String::new(),
        }
    }
}

impl CompilerSettings {
    /// Defaults with the render mode taken from `RENDER_MODE`.
    pub fn from_env() -> Self {
        let flag = std::env::var("RENDER_MODE").ok();
        Self::default().with_render_mode(RenderMode::from_flag(flag.as_deref()))
    }

    /// Set the model root.
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    /// Set the video root.
    pub fn with_videos_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.videos_dir = dir.into();
        self
    }

    /// Set the results directory.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Set the profile directory.
    pub fn with_profiles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profiles_dir = dir.into();
        self
    }

    /// Set the render mode.
    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    /// Set the run timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}

/// Read and decode a JSON document, keeping the failure cause.
pub fn try_load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::ConfigNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and decode a JSON document, logging and returning `None` on failure.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match try_load_json(path) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to load config");
            None
        }
    }
}

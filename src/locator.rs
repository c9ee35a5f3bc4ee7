//! Where models and benchmark videos live.
//!
//! Fetching and converting models is someone else's job; the compiler only
//! needs to know the paths a given model or video will end up at.

use crate::element::ElementKind;
use serde_json::Number;
use std::path::PathBuf;

/// Width used when a camera does not state one.
pub const DEFAULT_WIDTH: u32 = 1920;
/// Frame rate used when a camera does not state one.
pub const DEFAULT_FPS: u32 = 15;

/// Files backing one inference element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Model descriptor.
    pub model: PathBuf,
    /// Label file, classifiers only.
    pub labels: Option<PathBuf>,
    /// Pre/post-processing descriptor, classifiers only.
    pub model_proc: Option<PathBuf>,
}

impl ModelPaths {
    /// Paths with only a model descriptor.
    pub fn model_only(model: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            labels: None,
            model_proc: None,
        }
    }
}

/// Resolves a model request to file paths.
pub trait ModelLocator {
    /// Paths for `model` used by an element of `kind` at `precision`.
    fn locate(&self, model: &str, kind: ElementKind, precision: &str) -> ModelPaths;
}

/// The standard on-disk model tree.
///
/// ```text
/// {root}/object_detection/{name}/{precision}/{name}.xml
/// {root}/object_classification/{name}/{precision}/{name}.{xml,txt,json}
/// ```
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// A store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModelLocator for ModelStore {
    fn locate(&self, model: &str, kind: ElementKind, precision: &str) -> ModelPaths {
        match kind {
            ElementKind::Detect => ModelPaths::model_only(
                self.root
                    .join("object_detection")
                    .join(model)
                    .join(precision)
                    .join(format!("{model}.xml")),
            ),
            ElementKind::Classify => {
                let dir = self
                    .root
                    .join("object_classification")
                    .join(model)
                    .join(precision);
                ModelPaths {
                    model: dir.join(format!("{model}.xml")),
                    labels: Some(dir.join(format!("{model}.txt"))),
                    model_proc: Some(dir.join(format!("{model}.json"))),
                }
            }
            _ => ModelPaths::model_only(self.root.join(model)),
        }
    }
}

/// The benchmark video tree.
#[derive(Debug, Clone)]
pub struct VideoStore {
    root: PathBuf,
}

impl VideoStore {
    /// A store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the benchmark rendition of a camera source.
    ///
    /// `file_src` may carry extra `|`-separated fields; only the first is
    /// used. A trailing `.mp4` is dropped before the size and rate suffix is
    /// added. Width and rate are written as given (`29.97` stays `29.97`).
    pub fn video_path(
        &self,
        file_src: &str,
        width: Option<&Number>,
        fps: Option<&Number>,
    ) -> PathBuf {
        let name = file_src.split('|').next().unwrap_or_default().trim();
        let base = name.strip_suffix(".mp4").unwrap_or(name);
        let width = width.map_or_else(|| DEFAULT_WIDTH.to_string(), Number::to_string);
        let fps = fps.map_or_else(|| DEFAULT_FPS.to_string(), Number::to_string);
        self.root.join(format!("{base}-{width}-{fps}-bench.mp4"))
    }
}

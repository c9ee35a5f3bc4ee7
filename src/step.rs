//! Workload steps bound to a camera.
//!
//! A [`StepConfig`] template becomes a [`Step`] once a camera requests its
//! workload: the camera's region of interest and identifying fields are
//! attached. [`Step::normalize`] is the single place that decides which fields
//! take part in deduplication.

use crate::config::{CameraConfig, Roi, StepConfig};
use crate::error::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields that never take part in deduplication.
const EXCLUDED: [&str; 4] = ["device", "region_of_interest", "workload_name", "camera_id"];

/// A step template with camera and workload context attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The template this step came from.
    pub config: StepConfig,
    /// Workload that requested the step.
    pub workload_name: Option<String>,
    /// Camera the step runs for.
    pub camera_id: Option<String>,
    /// Region inference is restricted to.
    pub region_of_interest: Option<Roi>,
}

impl Step {
    /// A step with no camera context.
    pub fn new(config: StepConfig) -> Self {
        Self {
            config,
            workload_name: None,
            camera_id: None,
            region_of_interest: None,
        }
    }

    /// Bind a template to a camera and workload.
    pub fn bind(config: &StepConfig, workload: &str, camera_id: &str, roi: Option<Roi>) -> Self {
        Self {
            config: config.clone(),
            workload_name: Some(workload.to_string()),
            camera_id: Some(camera_id.to_string()),
            region_of_interest: roi,
        }
    }

    /// Raw kind name as written in the workload document.
    pub fn kind(&self) -> &str {
        &self.config.kind
    }

    /// Model name, empty when unset.
    pub fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or("")
    }

    /// Device name, empty when unset.
    pub fn device(&self) -> &str {
        self.config.device.as_deref().unwrap_or("")
    }

    /// Precision, empty when unset.
    pub fn precision(&self) -> &str {
        self.config.precision.as_deref().unwrap_or("")
    }

    /// Attach a region if the step has none yet.
    pub fn attach_roi(&mut self, roi: Option<Roi>) {
        if self.region_of_interest.is_none() {
            self.region_of_interest = roi;
        }
    }

    /// The deduplication identity of this step.
    ///
    /// Keeps kind, model, precision and any extra template keys. Drops device,
    /// region of interest, workload name and camera id.
    pub fn normalize(&self) -> NormalizedStep {
        let mut fields = BTreeMap::new();
        fields.insert("type".to_string(), Value::from(self.config.kind.as_str()));
        if let Some(model) = &self.config.model {
            fields.insert("model".to_string(), Value::from(model.as_str()));
        }
        if let Some(precision) = &self.config.precision {
            fields.insert("precision".to_string(), Value::from(precision.as_str()));
        }
        for (key, value) in &self.config.extra {
            if EXCLUDED.contains(&key.as_str()) {
                continue;
            }
            fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        NormalizedStep { fields }
    }
}

/// The fields of a step that decide whether two chains are the same.
///
/// Keys are kept sorted so serialization is canonical.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedStep {
    fields: BTreeMap<String, Value>,
}

impl NormalizedStep {
    /// Sorted-key JSON form.
    pub fn canonical(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

/// Bind every template of a workload to one camera.
pub fn bind_workload(
    camera: &CameraConfig,
    camera_id: &str,
    workload: &str,
    templates: &[StepConfig],
) -> Vec<Step> {
    templates
        .iter()
        .map(|t| Step::bind(t, workload, camera_id, camera.region_of_interest.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect() -> StepConfig {
        StepConfig::new("gvadetect")
            .model("yolov5s")
            .device("CPU")
            .precision("INT8")
    }

    #[test]
    fn test_normalize_drops_context_fields() {
        let a = Step::bind(&detect(), "retail", "cam1", Some(Roi::new(0, 0, 10, 10)));
        let b = Step::bind(
            &detect().device("GPU"),
            "other",
            "cam2",
            Some(Roi::new(5, 5, 1, 1)),
        );
        let norm = a.normalize();
        assert_eq!(norm, b.normalize());
        assert_eq!(
            norm.canonical().unwrap(),
            r#"{"model":"yolov5s","precision":"INT8","type":"gvadetect"}"#
        );
    }

    #[test]
    fn test_normalize_keeps_model_and_precision() {
        let a = Step::new(detect());
        let b = Step::new(detect().precision("FP16"));
        let c = Step::new(detect().model("yolov8"));
        assert_ne!(a.normalize(), b.normalize());
        assert_ne!(a.normalize(), c.normalize());
    }

    #[test]
    fn test_canonical_is_sorted() {
        let mut config = detect();
        config.extra.insert("nireq".into(), Value::from(4));
        let canonical = Step::new(config).normalize().canonical().unwrap();
        assert_eq!(
            canonical,
            r#"{"model":"yolov5s","nireq":4,"precision":"INT8","type":"gvadetect"}"#
        );
    }

    #[test]
    fn test_template_context_keys_ignored() {
        let mut config = detect();
        config
            .extra
            .insert("region_of_interest".into(), Value::from("0,0,1,1"));
        assert_eq!(Step::new(config).normalize(), Step::new(detect()).normalize());
    }

    #[test]
    fn test_attach_roi_keeps_existing() {
        let mut step = Step::bind(&detect(), "w", "c", Some(Roi::new(1, 2, 3, 4)));
        step.attach_roi(Some(Roi::new(9, 9, 9, 9)));
        assert_eq!(step.region_of_interest, Some(Roi::new(1, 2, 3, 4)));

        let mut step = Step::new(detect());
        step.attach_roi(Some(Roi::new(9, 9, 9, 9)));
        assert_eq!(step.region_of_interest, Some(Roi::new(9, 9, 9, 9)));
    }

    #[test]
    fn test_accessors_default_empty() {
        let step = Step::new(StepConfig::new("queue"));
        assert_eq!(step.kind(), "queue");
        assert_eq!(step.model(), "");
        assert_eq!(step.device(), "");
        assert_eq!(step.precision(), "");
    }
}

//! Turns one workload step into one element.

use super::{Element, ElementKind};
use crate::device::DeviceProfiles;
use crate::error::Result;
use crate::locator::ModelLocator;
use crate::step::Step;

/// An element built from a step, plus the decode chain its device asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltElement {
    /// The element for the step.
    pub element: Element,
    /// Decode element(s) chosen by the step's device profile.
    pub decode: Vec<Element>,
}

/// Builds elements from steps using device profiles and a model locator.
pub struct ElementBuilder<'a> {
    profiles: &'a DeviceProfiles,
    models: &'a dyn ModelLocator,
}

impl<'a> ElementBuilder<'a> {
    /// Create a builder.
    pub fn new(profiles: &'a DeviceProfiles, models: &'a dyn ModelLocator) -> Self {
        Self { profiles, models }
    }

    /// Build the element for one step.
    ///
    /// Detectors and classifiers get model, device and profile options;
    /// every other recognized kind is a bare element. Unknown kinds fail with
    /// [`Error::UnsupportedElementKind`](crate::Error::UnsupportedElementKind).
    pub fn build(&self, step: &Step) -> Result<BuiltElement> {
        let kind: ElementKind = step.kind().parse()?;
        let env = self.profiles.resolve(step.device());

        let element = match kind {
            ElementKind::Detect => {
                let paths = self.models.locate(step.model(), kind, step.precision());
                let mut element = Element::of_kind(kind);
                if let (Some(workload), Some(camera)) = (&step.workload_name, &step.camera_id) {
                    if !workload.is_empty() && !camera.is_empty() {
                        element = element.with("name", format!("{workload}_{camera}"));
                    }
                }
                element = element.with("batch-size", 1_i64);
                if step.region_of_interest.is_some() {
                    element = element.with("inference-region", 1_i64);
                }
                let element = element
                    .with("model", paths.model.as_path())
                    .with("device", step.device());
                let element = env.pre_process().apply_to(element);
                env.detection_options().apply_to(element)
            }
            ElementKind::Classify => {
                let paths = self.models.locate(step.model(), kind, step.precision());
                let mut element = Element::of_kind(kind)
                    .with("batch-size", 1_i64)
                    .with("model", paths.model.as_path())
                    .with("device", step.device());
                if let Some(labels) = &paths.labels {
                    element = element.with("labels", labels.as_path());
                }
                if let Some(proc) = &paths.model_proc {
                    element = element.with("model-proc", proc.as_path());
                }
                env.classification_pre_process().apply_to(element)
            }
            _ => Element::of_kind(kind),
        };

        Ok(BuiltElement {
            element,
            decode: env.decode(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Roi, StepConfig};
    use crate::device::{CLASSIFICATION_PRE_PROCESS, DECODE, DETECTION_OPTIONS, DeviceEnv};
    use crate::element::PropertyValue;
    use crate::error::Error;
    use crate::locator::ModelStore;

    fn profiles() -> DeviceProfiles {
        let mut profiles = DeviceProfiles::empty();
        profiles.insert(
            "GPU",
            DeviceEnv::from_pairs([
                (DECODE, "vah264dec ! vapostproc"),
                (DETECTION_OPTIONS, "nireq=4"),
                (CLASSIFICATION_PRE_PROCESS, "pre-process-backend=va"),
            ]),
        );
        profiles
    }

    #[test]
    fn test_build_detector() {
        let profiles = profiles();
        let store = ModelStore::new("/models");
        let builder = ElementBuilder::new(&profiles, &store);
        let step = Step::bind(
            &StepConfig::new("gvadetect")
                .model("yolov5s")
                .device("GPU")
                .precision("INT8"),
            "retail",
            "cam1",
            Some(Roi::new(0, 0, 100, 100)),
        );

        let built = builder.build(&step).unwrap();
        assert_eq!(
            built.element.to_string(),
            "gvadetect name=retail_cam1 batch-size=1 inference-region=1 \
             model=/models/object_detection/yolov5s/INT8/yolov5s.xml device=GPU nireq=4"
        );
        let decode: Vec<_> = built.decode.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(decode, vec!["vah264dec", "vapostproc"]);
    }

    #[test]
    fn test_detector_without_context_has_no_name() {
        let profiles = DeviceProfiles::empty();
        let store = ModelStore::new("/models");
        let builder = ElementBuilder::new(&profiles, &store);
        let step = Step::new(StepConfig::new("gvadetect").model("m").device("CPU").precision("FP32"));

        let built = builder.build(&step).unwrap();
        assert!(built.element.get("name").is_none());
        assert!(built.element.get("inference-region").is_none());
        assert_eq!(built.decode, vec![Element::new("decodebin")]);
    }

    #[test]
    fn test_build_classifier() {
        let profiles = profiles();
        let store = ModelStore::new("/models");
        let builder = ElementBuilder::new(&profiles, &store);
        let step = Step::bind(
            &StepConfig::new("gvaclassify")
                .model("efficientnet")
                .device("gpu")
                .precision("FP16"),
            "retail",
            "cam1",
            None,
        );

        let built = builder.build(&step).unwrap();
        let elem = &built.element;
        assert!(elem.get("name").is_none());
        assert!(elem.raw.is_empty());
        assert_eq!(
            elem.get("labels"),
            Some(&PropertyValue::String(
                "/models/object_classification/efficientnet/FP16/efficientnet.txt".into()
            ))
        );
        assert_eq!(
            elem.get("model-proc").map(|v| v.as_string()),
            Some("/models/object_classification/efficientnet/FP16/efficientnet.json".into())
        );
        assert_eq!(
            elem.get("pre-process-backend"),
            Some(&PropertyValue::String("va".into()))
        );
    }

    #[test]
    fn test_untyped_profile_values_pass_through() {
        let mut profiles = DeviceProfiles::empty();
        profiles.insert(
            "GPU",
            DeviceEnv::from_pairs([
                (DECODE, "vah264dec ! vapostproc ! video/x-raw(memory:VAMemory)"),
                (DETECTION_OPTIONS, "nireq=4 ie-config=\"GPU_THROUGHPUT_STREAMS=2\" reshape"),
            ]),
        );
        let store = ModelStore::new("/models");
        let builder = ElementBuilder::new(&profiles, &store);
        let step = Step::new(StepConfig::new("gvadetect").model("m").device("GPU").precision("FP16"));

        let built = builder.build(&step).unwrap();
        assert!(built.element.to_string().ends_with(
            "device=GPU nireq=4 ie-config=\"GPU_THROUGHPUT_STREAMS=2\" reshape"
        ));
        let decode: Vec<String> = built.decode.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            decode,
            vec!["vah264dec", "vapostproc", "video/x-raw(memory:VAMemory)"]
        );
    }

    #[test]
    fn test_structural_kinds_are_bare() {
        let profiles = DeviceProfiles::empty();
        let store = ModelStore::new("/models");
        let builder = ElementBuilder::new(&profiles, &store);
        for kind in ["gvatrack", "queue", "videoconvert", "fakesink", "gvawatermark"] {
            let built = builder.build(&Step::new(StepConfig::new(kind))).unwrap();
            assert_eq!(built.element, Element::new(kind));
        }
    }

    #[test]
    fn test_unsupported_kind() {
        let profiles = DeviceProfiles::empty();
        let store = ModelStore::new("/models");
        let builder = ElementBuilder::new(&profiles, &store);
        let err = builder
            .build(&Step::new(StepConfig::new("gvadenoise").device("CPU")))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedElementKind(ref k) if k == "gvadenoise"));
    }
}

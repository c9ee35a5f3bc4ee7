//! Camera and workload documents to lane commands.
//!
//! For every lane, in document order:
//!
//! 1. Bind each requested workload of each camera to that camera and offer
//!    the resulting step chain to the lane's [`SignatureTable`].
//! 2. Assemble one branch per distinct signature, in first-seen order.
//! 3. Join the branches into one launcher command.
//!
//! Lanes that end up with no branch are left out of the result.

use crate::config::{CameraDocument, CompilerSettings, LaneConfig, WorkloadDocument};
use crate::device::DeviceProfiles;
use crate::element::ElementBuilder;
use crate::error::Result;
use crate::locator::{ModelLocator, VideoStore};
use crate::pipeline::assembler::{BranchAssembler, BranchPosition, CompileContext};
use crate::pipeline::lane::{LaneCommands, format_lane};
use crate::pipeline::signature::{CameraRef, SignatureTable};
use crate::step::bind_workload;

/// Compiles documents into lane commands.
///
/// A compiler holds only borrowed, read-only collaborators; every call to
/// [`Compiler::compile`] starts from fresh naming state.
pub struct Compiler<'a> {
    settings: &'a CompilerSettings,
    profiles: &'a DeviceProfiles,
    models: &'a dyn ModelLocator,
    videos: VideoStore,
}

impl<'a> Compiler<'a> {
    /// Create a compiler.
    pub fn new(
        settings: &'a CompilerSettings,
        profiles: &'a DeviceProfiles,
        models: &'a dyn ModelLocator,
    ) -> Self {
        Self {
            settings,
            profiles,
            models,
            videos: VideoStore::new(settings.videos_dir.clone()),
        }
    }

    /// Compile both documents.
    pub fn compile(
        &self,
        cameras: &CameraDocument,
        workloads: &WorkloadDocument,
    ) -> Result<LaneCommands> {
        let _span = crate::observability::span_compile(cameras.lanes().len()).entered();
        let assembler = BranchAssembler::new(
            ElementBuilder::new(self.profiles, self.models),
            self.settings,
        );
        let mut ctx = CompileContext::new();
        let mut commands = LaneCommands::new();

        for (index, (name, lane)) in cameras.lanes().iter().enumerate() {
            let number = index + 1;
            let _lane_span = crate::observability::span_lane(name, number).entered();

            let table = self.plan_lane(lane, workloads)?;
            if table.is_empty() {
                tracing::info!("lane has no branches, skipping");
                continue;
            }

            let mut branches = Vec::with_capacity(table.len());
            for (i, plan) in table.plans().iter().enumerate() {
                let position = BranchPosition {
                    lane: number,
                    branch: i + 1,
                };
                branches.push(assembler.assemble(&mut ctx, position, plan)?.render()?);
            }

            tracing::info!(branches = branches.len(), "lane compiled");
            commands.push(name.clone(), format_lane(&branches));
        }

        Ok(commands)
    }

    /// Deduplicate the step chains requested by a lane's cameras.
    fn plan_lane(&self, lane: &LaneConfig, workloads: &WorkloadDocument) -> Result<SignatureTable> {
        let mut table = SignatureTable::new();
        for (index, camera) in lane.cameras.iter().enumerate() {
            let camera_id = camera.id_or_default(index);
            for requested in &camera.workloads {
                let workload = requested.to_lowercase();
                let Some(templates) = workloads.steps_for(&workload) else {
                    tracing::warn!(camera = %camera_id, workload = %requested, "unknown workload, skipping");
                    continue;
                };
                if templates.is_empty() {
                    tracing::debug!(camera = %camera_id, workload = %requested, "workload has no steps");
                    continue;
                }

                let steps = bind_workload(camera, &camera_id, &workload, templates);
                table.offer(
                    steps,
                    CameraRef {
                        index,
                        id: &camera_id,
                    },
                    || {
                        self.videos.video_path(
                            &camera.file_src,
                            camera.width.as_ref(),
                            camera.fps.as_ref(),
                        )
                    },
                )?;
            }
        }
        Ok(table)
    }
}

/// Compile both documents with a one-off [`Compiler`].
pub fn compile(
    cameras: &CameraDocument,
    workloads: &WorkloadDocument,
    profiles: &DeviceProfiles,
    models: &dyn ModelLocator,
    settings: &CompilerSettings,
) -> Result<LaneCommands> {
    Compiler::new(settings, profiles, models).compile(cameras, workloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraConfig, StepConfig};
    use crate::locator::ModelStore;
    use std::collections::BTreeMap;

    fn camera(id: Option<&str>, workloads: &[&str]) -> CameraConfig {
        CameraConfig {
            camera_id: id.map(str::to_string),
            file_src: "store.mp4".into(),
            width: None,
            height: None,
            fps: None,
            region_of_interest: None,
            workloads: workloads.iter().map(|w| w.to_string()).collect(),
        }
    }

    fn workloads() -> WorkloadDocument {
        let mut map = BTreeMap::new();
        map.insert(
            "retail".to_string(),
            vec![
                StepConfig::new("gvadetect")
                    .model("yolov5s")
                    .device("CPU")
                    .precision("INT8"),
            ],
        );
        map.insert("empty".to_string(), Vec::new());
        WorkloadDocument {
            workload_pipeline_map: map,
        }
    }

    fn run(doc: &CameraDocument) -> LaneCommands {
        let settings = CompilerSettings::default().with_timestamp("ts");
        let profiles = DeviceProfiles::empty();
        let store = ModelStore::new("/models");
        compile(doc, &workloads(), &profiles, &store, &settings).unwrap()
    }

    #[test]
    fn test_lane_numbering_and_order() {
        let doc = CameraDocument::new(vec![
            (
                "b".into(),
                LaneConfig {
                    cameras: vec![camera(Some("x"), &["retail"])],
                },
            ),
            (
                "a".into(),
                LaneConfig {
                    cameras: vec![camera(None, &["RETAIL"])],
                },
            ),
        ]);
        let commands = run(&doc);
        let lanes: Vec<&str> = commands.iter().map(|(l, _)| l).collect();
        assert_eq!(lanes, vec!["b", "a"]);
        assert!(commands.get("b").unwrap().contains("tee name=t1_1_x"));
        assert!(commands.get("a").unwrap().contains("tee name=t2_1_cam1"));
        assert!(commands.get("a").unwrap().contains("name=retail_cam1"));
    }

    #[test]
    fn test_unknown_and_empty_workloads_are_skipped() {
        let doc = CameraDocument::new(vec![
            (
                "lane1".into(),
                LaneConfig {
                    cameras: vec![camera(None, &["nope", "empty"])],
                },
            ),
            ("lane2".into(), LaneConfig::default()),
        ]);
        assert!(run(&doc).is_empty());
    }

    #[test]
    fn test_shared_signature_one_branch() {
        let doc = CameraDocument::new(vec![(
            "lane1".into(),
            LaneConfig {
                cameras: vec![
                    camera(Some("c1"), &["retail"]),
                    camera(Some("c2"), &["retail"]),
                ],
            },
        )]);
        let commands = run(&doc);
        let command = commands.get("lane1").unwrap();
        assert_eq!(command.matches("filesrc").count(), 1);
        assert!(command.contains("t1_1_c1"));
        assert!(!command.contains("c2"));
    }
}

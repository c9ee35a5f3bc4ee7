//! Branch assembly.
//!
//! One [`BranchPlan`] becomes one [`Branch`]:
//!
//! ```text
//! filesrc ! decode ! videoconvert ! [gvaattachroi ! queue] ! steps...
//!     ! gvametaconvert format=json ! tee name=t{lane}_{branch}_{camera}
//!     t. ! queue ! gvametapublish ... ! gvafpscounter ! fakesink
//!     t. ! queue ! (fakesink | gvawatermark ! videoconvert ! fpsdisplaysink)
//! ```
//!
//! Every detector is followed by `gvatrack ! queue`; other steps get a
//! `queue` unless they are last. Naming state lives in a [`CompileContext`]
//! owned by the caller, so independent compilations share nothing.

use crate::config::{CompilerSettings, RenderMode};
use crate::device::DeviceEnv;
use crate::element::{BuiltElement, Element, ElementBuilder, ElementKind};
use crate::error::Result;
use crate::pipeline::graph::BranchGraph;
use crate::pipeline::signature::BranchPlan;
use std::collections::HashSet;
use std::path::PathBuf;

/// Confidence threshold injected into every detector.
pub const DETECT_THRESHOLD: f64 = 0.5;

/// Per-run naming state.
#[derive(Debug, Default)]
pub struct CompileContext {
    instance_ids: HashSet<String>,
}

impl CompileContext {
    /// Fresh state for one compilation run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a model-instance id unique within this run.
    ///
    /// The id is `{kind}_lane{L}_cam{C}_{B}`; a repeat within the run gets a
    /// `_{n}` suffix starting at 2.
    pub fn model_instance_id(
        &mut self,
        kind: &str,
        lane: usize,
        camera: usize,
        branch: usize,
    ) -> String {
        let base = format!("{kind}_lane{lane}_cam{camera}_{branch}");
        let mut id = base.clone();
        let mut n = 2;
        while !self.instance_ids.insert(id.clone()) {
            id = format!("{base}_{n}");
            n += 1;
        }
        id
    }
}

/// Position of a branch within the run; all numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchPosition {
    /// Lane number.
    pub lane: usize,
    /// Branch number within the lane.
    pub branch: usize,
}

/// An assembled branch.
#[derive(Debug)]
pub struct Branch {
    /// Where the branch sits in the run.
    pub position: BranchPosition,
    /// Id of the camera that owns the branch.
    pub camera_id: String,
    /// Name of the fan-out point.
    pub tee_name: String,
    /// Result file the publish sub-chain writes.
    pub result_file: PathBuf,
    /// The element graph.
    pub graph: BranchGraph,
}

impl Branch {
    /// Render as launch text.
    pub fn render(&self) -> Result<String> {
        self.graph.render()
    }
}

/// Assembles branches from plans.
pub struct BranchAssembler<'a> {
    builder: ElementBuilder<'a>,
    settings: &'a CompilerSettings,
}

impl<'a> BranchAssembler<'a> {
    /// Create an assembler.
    pub fn new(builder: ElementBuilder<'a>, settings: &'a CompilerSettings) -> Self {
        Self { builder, settings }
    }

    /// Assemble one branch.
    pub fn assemble(
        &self,
        ctx: &mut CompileContext,
        position: BranchPosition,
        plan: &BranchPlan,
    ) -> Result<Branch> {
        let _span =
            crate::observability::span_branch(position.lane, position.branch, &plan.camera_id)
                .entered();

        let built = plan
            .steps
            .iter()
            .map(|step| {
                let mut step = step.clone();
                step.attach_roi(plan.rois.first().cloned());
                self.builder.build(&step)
            })
            .collect::<Result<Vec<BuiltElement>>>()?;

        let mut elements =
            vec![Element::of_kind(ElementKind::FileSrc).with("location", plan.video.as_path())];
        match built.first() {
            Some(first) => elements.extend(first.decode.iter().cloned()),
            None => elements.extend(DeviceEnv::default().decode()),
        }
        elements.push(Element::of_kind(ElementKind::VideoConvert));

        if !plan.rois.is_empty() {
            let attach = plan.rois.iter().fold(
                Element::of_kind(ElementKind::AttachRoi),
                |elem, roi| elem.with("roi", roi.to_string()),
            );
            elements.push(attach);
            elements.push(Element::of_kind(ElementKind::Queue));
        }

        let camera = plan.camera_index + 1;
        let last = built.len().saturating_sub(1);
        for (i, built) in built.into_iter().enumerate() {
            let kind = built.element.kind();

            if plan.rois.is_empty() && i == 0 && kind.is_some_and(ElementKind::is_inference) {
                elements.push(Element::of_kind(ElementKind::AttachRoi));
            }

            match kind {
                Some(ElementKind::Detect) => {
                    let id =
                        ctx.model_instance_id("detect", position.lane, camera, position.branch);
                    elements.push(
                        built
                            .element
                            .with_leading("threshold", DETECT_THRESHOLD)
                            .with_leading("model-instance-id", id),
                    );
                    elements.push(Element::of_kind(ElementKind::Track));
                    elements.push(Element::of_kind(ElementKind::Queue));
                }
                Some(ElementKind::Classify) => {
                    let id =
                        ctx.model_instance_id("classify", position.lane, camera, position.branch);
                    elements.push(built.element.with_leading("model-instance-id", id));
                }
                _ => elements.push(built.element),
            }

            if i < last && kind != Some(ElementKind::Detect) {
                elements.push(Element::of_kind(ElementKind::Queue));
            }
        }

        elements.push(Element::of_kind(ElementKind::MetaConvert).with("format", "json"));

        let tee_name = fan_out_name(position, &plan.camera_id);
        let result_file = self.settings.results_dir.join(format!(
            "rs-{}_{}_{}.jsonl",
            position.lane, position.branch, self.settings.timestamp
        ));

        let mut graph = BranchGraph::new();
        let head = graph.chain(elements)?;
        let tee = graph.add_fan_out(tee_name.as_str());
        graph.link(head, tee)?;

        graph.append(tee, publish_tail(&result_file))?;
        graph.append(tee, second_tail(self.settings.render_mode))?;

        tracing::debug!(
            nodes = graph.node_count(),
            tee = %tee_name,
            "branch assembled"
        );

        Ok(Branch {
            position,
            camera_id: plan.camera_id.clone(),
            tee_name,
            result_file,
            graph,
        })
    }
}

/// `t{lane}_{branch}_{camera}`, with every character the launch grammar
/// would split on replaced by `_`.
fn fan_out_name(position: BranchPosition, camera_id: &str) -> String {
    let camera: String = camera_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("t{}_{}_{}", position.lane, position.branch, camera)
}

/// `queue ! gvametapublish ... ! gvafpscounter ! fakesink`.
fn publish_tail(result_file: &std::path::Path) -> Vec<Element> {
    vec![
        Element::of_kind(ElementKind::Queue),
        Element::of_kind(ElementKind::MetaPublish)
            .with("method", "file")
            .with("file-path", result_file),
        Element::of_kind(ElementKind::FpsCounter),
        null_sink(),
    ]
}

/// The second fan-out sub-chain: display or discard.
fn second_tail(mode: RenderMode) -> Vec<Element> {
    match mode {
        RenderMode::Display => vec![
            Element::of_kind(ElementKind::Queue),
            Element::of_kind(ElementKind::Watermark),
            Element::of_kind(ElementKind::VideoConvert),
            Element::of_kind(ElementKind::FpsDisplaySink)
                .with("video-sink", "autovideosink")
                .with("text-overlay", true)
                .with("signal-fps-measurements", true),
        ],
        RenderMode::Headless => vec![Element::of_kind(ElementKind::Queue), null_sink()],
    }
}

fn null_sink() -> Element {
    Element::of_kind(ElementKind::FakeSink)
        .with("sync", false)
        .with("async", false)
}

//! Signature-based deduplication of step chains.
//!
//! Cameras that request the same processing share one compiled branch. The
//! key is a [`Signature`]: the canonical serialization of a chain's
//! normalized steps. A [`SignatureTable`] remembers, per lane, the first
//! step list and source video seen for each signature and merges the regions
//! of interest later cameras bring along.

use crate::config::Roi;
use crate::error::Result;
use crate::step::Step;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// Canonical identity of a step chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Compute the signature of an ordered step list.
    pub fn of(steps: &[Step]) -> Result<Self> {
        let normalized = steps
            .iter()
            .map(|s| s.normalize().canonical())
            .collect::<Result<Vec<String>>>()?;
        Ok(Self(serde_json::to_string(&normalized)?))
    }

    /// The canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable digest, for logs.
    pub fn digest(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything needed to assemble one branch.
#[derive(Debug, Clone)]
pub struct BranchPlan {
    /// Deduplication key.
    pub signature: Signature,
    /// Steps of the first camera that produced the signature.
    pub steps: Vec<Step>,
    /// Decoded source video, fixed at first encounter.
    pub video: PathBuf,
    /// Index of the first camera within its lane.
    pub camera_index: usize,
    /// Id of the first camera.
    pub camera_id: String,
    /// Distinct regions of interest across every camera sharing the branch.
    pub rois: Vec<Roi>,
}

impl BranchPlan {
    fn merge_rois(&mut self, steps: &[Step]) {
        let incoming = steps.iter().filter_map(|s| s.region_of_interest.clone());
        let known = std::mem::take(&mut self.rois);
        self.rois = dedup_rois(known.into_iter().chain(incoming));
    }
}

/// Identity of the camera offering a step chain.
#[derive(Debug, Clone, Copy)]
pub struct CameraRef<'a> {
    /// Index within the lane.
    pub index: usize,
    /// Camera id.
    pub id: &'a str,
}

/// Signature to first-seen branch plan, in first-seen order.
#[derive(Debug, Default)]
pub struct SignatureTable {
    plans: Vec<BranchPlan>,
    index: HashMap<Signature, usize>,
}

impl SignatureTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer one camera's step chain.
    ///
    /// A new signature records the steps and resolves the source video with
    /// `video`. A known signature only contributes its regions of interest.
    /// Returns `true` when a new branch was added.
    pub fn offer(
        &mut self,
        steps: Vec<Step>,
        camera: CameraRef<'_>,
        video: impl FnOnce() -> PathBuf,
    ) -> Result<bool> {
        let signature = Signature::of(&steps)?;
        if let Some(&existing) = self.index.get(&signature) {
            let plan = &mut self.plans[existing];
            plan.merge_rois(&steps);
            tracing::debug!(
                camera = camera.id,
                signature = %signature.digest(),
                shared_with = %plan.camera_id,
                "reusing branch"
            );
            return Ok(false);
        }

        let rois = dedup_rois(steps.iter().filter_map(|s| s.region_of_interest.clone()));
        self.index.insert(signature.clone(), self.plans.len());
        self.plans.push(BranchPlan {
            signature,
            steps,
            video: video(),
            camera_index: camera.index,
            camera_id: camera.id.to_string(),
            rois,
        });
        Ok(true)
    }

    /// Plans in first-seen order.
    pub fn plans(&self) -> &[BranchPlan] {
        &self.plans
    }

    /// Number of distinct branches.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Whether no chain has been offered.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Remove duplicate regions by `(x, y, width, height)`, keeping first-seen order.
pub fn dedup_rois(rois: impl IntoIterator<Item = Roi>) -> Vec<Roi> {
    let mut out: Vec<Roi> = Vec::new();
    for roi in rois {
        if !out.iter().any(|r| r.key() == roi.key()) {
            out.push(roi);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepConfig;
    use std::collections::HashSet;

    fn chain(camera: &str, roi: Option<Roi>) -> Vec<Step> {
        [
            StepConfig::new("gvadetect")
                .model("yolov5s")
                .device("CPU")
                .precision("INT8"),
            StepConfig::new("gvaclassify")
                .model("efficientnet")
                .device("CPU")
                .precision("INT8"),
        ]
        .iter()
        .map(|c| Step::bind(c, "retail", camera, roi.clone()))
        .collect()
    }

    fn cam(index: usize, id: &str) -> CameraRef<'_> {
        CameraRef { index, id }
    }

    #[test]
    fn test_signature_ignores_camera_context() {
        let a = Signature::of(&chain("cam1", None)).unwrap();
        let b = Signature::of(&chain("cam2", Some(Roi::new(1, 1, 1, 1)))).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_signature_holds_every_step() {
        let single = Signature::of(&chain("cam1", None)[..1]).unwrap();
        let full = Signature::of(&chain("cam1", None)).unwrap();
        assert_ne!(single, full);
        assert!(full.as_str().contains("gvadetect"));
        assert!(full.as_str().contains("gvaclassify"));
        assert_eq!(Signature::of(&[]).unwrap().as_str(), "[]");
    }

    #[test]
    fn test_signature_is_order_sensitive() {
        let mut reversed = chain("cam1", None);
        reversed.reverse();
        assert_ne!(
            Signature::of(&chain("cam1", None)).unwrap(),
            Signature::of(&reversed).unwrap()
        );
    }

    #[test]
    fn test_identical_chains_share_one_plan() {
        let mut table = SignatureTable::new();
        let mut resolved = 0;
        assert!(table.offer(chain("cam1", None), cam(0, "cam1"), || {
            resolved += 1;
            PathBuf::from("/v/a-1920-15-bench.mp4")
        })
        .unwrap());
        assert!(!table.offer(chain("cam2", None), cam(1, "cam2"), || {
            resolved += 1;
            PathBuf::from("/v/b-1920-15-bench.mp4")
        })
        .unwrap());

        assert_eq!(table.len(), 1);
        assert_eq!(resolved, 1);
        let plan = &table.plans()[0];
        assert_eq!(plan.camera_id, "cam1");
        assert_eq!(plan.camera_index, 0);
        assert_eq!(plan.video, PathBuf::from("/v/a-1920-15-bench.mp4"));
    }

    #[test]
    fn test_distinct_chains_keep_first_seen_order() {
        let mut table = SignatureTable::new();
        let other = vec![Step::bind(
            &StepConfig::new("gvadetect").model("person").device("GPU").precision("FP16"),
            "people",
            "cam2",
            None,
        )];
        table.offer(chain("cam1", None), cam(0, "cam1"), PathBuf::new).unwrap();
        table.offer(other, cam(1, "cam2"), PathBuf::new).unwrap();
        table.offer(chain("cam3", None), cam(2, "cam3"), PathBuf::new).unwrap();

        let ids: Vec<&str> = table.plans().iter().map(|p| p.camera_id.as_str()).collect();
        assert_eq!(ids, vec!["cam1", "cam2"]);
    }

    #[test]
    fn test_rois_merge_across_cameras() {
        let mut table = SignatureTable::new();
        let a = Roi::new(0, 0, 100, 100);
        let b = Roi::new(50, 50, 10, 10);
        table.offer(chain("cam1", Some(a.clone())), cam(0, "cam1"), PathBuf::new).unwrap();
        table.offer(chain("cam2", Some(b.clone())), cam(1, "cam2"), PathBuf::new).unwrap();
        table.offer(chain("cam3", Some(a.clone())), cam(2, "cam3"), PathBuf::new).unwrap();
        assert_eq!(table.plans()[0].rois, vec![a, b]);
    }

    #[test]
    fn test_dedup_rois_stable_under_permutation() {
        let rois = [
            Roi::new(0, 0, 10, 10),
            Roi::new(5, 5, 10, 10),
            Roi::new(0, 0, 10, 10),
            Roi::new(1, 2, 3, 4),
            Roi::new(5, 5, 10, 10),
        ];
        let forward = dedup_rois(rois.clone());
        let backward = dedup_rois(rois.iter().rev().cloned());
        assert_eq!(forward.len(), 3);
        assert_eq!(forward[0], Roi::new(0, 0, 10, 10));
        assert_eq!(backward[0], Roi::new(5, 5, 10, 10));

        let f: HashSet<_> = forward.iter().map(Roi::key).collect();
        let b: HashSet<_> = backward.iter().map(Roi::key).collect();
        assert_eq!(f, b);
    }

    #[test]
    fn test_empty_table() {
        let table = SignatureTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }
}

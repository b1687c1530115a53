//! Observer side-channel for pipeline checkpoints.
//!
//! The driver reports intermediate meshes and fields to an observer at
//! fixed checkpoints when `visualize_steps` is set. Rendering, logging to
//! disk, or test inspection all live behind [`SegmentationObserver`]; the
//! algorithms never call into a viewer directly.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dental_mesh::ScanMesh;

use crate::colormap::{Rgb, jet};

/// A point in the pipeline where intermediate state is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// After the mesh has been moved to the canonical frame.
    PoseNormalized,
    /// After the plane cut.
    MeshCut,
    /// After curvature and height have been combined into weights.
    WeightsComputed,
    /// After mean-shift clustering of the feature points.
    FeaturesClustered,
    /// After the harmonic field solve.
    HarmonicSolved,
}

impl Checkpoint {
    /// All checkpoints in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::PoseNormalized,
        Self::MeshCut,
        Self::WeightsComputed,
        Self::FeaturesClustered,
        Self::HarmonicSolved,
    ];

    /// Stable snake-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PoseNormalized => "pose_normalized",
            Self::MeshCut => "mesh_cut",
            Self::WeightsComputed => "weights_computed",
            Self::FeaturesClustered => "features_clustered",
            Self::HarmonicSolved => "harmonic_solved",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives intermediate pipeline state.
///
/// Every method defaults to a no-op, so an observer only overrides what it
/// cares about.
pub trait SegmentationObserver {
    /// A whole mesh is available.
    #[inline]
    fn on_mesh(&mut self, _checkpoint: Checkpoint, _mesh: &ScanMesh) {}

    /// A per-vertex scalar field over `mesh` is available.
    #[inline]
    fn on_field(&mut self, _checkpoint: Checkpoint, _mesh: &ScanMesh, _values: &[f64]) {}

    /// A set of highlighted vertices of `mesh` is available.
    #[inline]
    fn on_points(&mut self, _checkpoint: Checkpoint, _mesh: &ScanMesh, _points: &[usize]) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SegmentationObserver for NoopObserver {}

/// What was reported at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    /// [`SegmentationObserver::on_mesh`].
    Mesh,
    /// [`SegmentationObserver::on_field`].
    Field,
    /// [`SegmentationObserver::on_points`].
    Points,
}

/// One recorded report.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Where in the pipeline.
    pub checkpoint: Checkpoint,
    /// Which callback.
    pub kind: ObservationKind,
    /// Vertex count for meshes, value count for fields, point count for
    /// point sets.
    pub size: usize,
    /// Jet colors of a field, when color capture is enabled.
    pub colors: Option<Vec<Rgb>>,
}

/// Observer that records every report.
///
/// Clones share the same log, so a caller can hand one clone to the
/// segmenter and read the log through another.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    log: Arc<Mutex<Vec<Observation>>>,
    capture_colors: bool,
}

impl RecordingObserver {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also store min–max normalized jet colors for every field.
    #[must_use]
    pub const fn with_colors(mut self) -> Self {
        self.capture_colors = true;
        self
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn observations(&self) -> Vec<Observation> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Distinct checkpoints seen, in first-seen order.
    #[must_use]
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        let mut seen = Vec::new();
        for o in self.observations() {
            if !seen.contains(&o.checkpoint) {
                seen.push(o.checkpoint);
            }
        }
        seen
    }

    fn push(&self, observation: Observation) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observation);
    }
}

impl SegmentationObserver for RecordingObserver {
    fn on_mesh(&mut self, checkpoint: Checkpoint, mesh: &ScanMesh) {
        self.push(Observation {
            checkpoint,
            kind: ObservationKind::Mesh,
            size: mesh.vertex_count(),
            colors: None,
        });
    }

    fn on_field(&mut self, checkpoint: Checkpoint, _mesh: &ScanMesh, values: &[f64]) {
        self.push(Observation {
            checkpoint,
            kind: ObservationKind::Field,
            size: values.len(),
            colors: self.capture_colors.then(|| jet(values, true)),
        });
    }

    fn on_points(&mut self, checkpoint: Checkpoint, _mesh: &ScanMesh, points: &[usize]) {
        self.push(Observation {
            checkpoint,
            kind: ObservationKind::Points,
            size: points.len(),
            colors: None,
        });
    }
}

//! End-to-end tooth segmentation driver.
//!
//! [`ToothSegmenter`] chains the pipeline stages on one scan:
//!
//! 1. move the scan into the canonical frame (Y up, X right)
//! 2. estimate mean curvature on the whole canonical mesh
//! 3. cut away everything below the gum plane
//! 4. carry curvature over to the cut mesh
//! 5. combine curvature and height into cusp weights
//! 6. cluster cusp features
//! 7. group features into teeth
//! 8. solve the harmonic field
//! 9. extract tooth regions
//!
//! Recoverable problems (no rim, no features, loose fragments, a failed
//! solve) are recorded as [`SegmentationWarning`]s on the result instead
//! of aborting the run.

use std::fmt;

use dental_mesh::{ScanMesh, VertexIndexMap};
use nalgebra::Vector3;
use tracing::{info, warn};

use crate::curvature::{active_mask, estimate_curvature, normalized_heights};
use crate::cut::cut_mesh;
use crate::error::{SegmentError, SegmentResult};
use crate::features::{FeatureSet, extract_features};
use crate::harmonic::{HarmonicField, SolveStatus, ToothFeature, solve_harmonic_field};
use crate::observer::{Checkpoint, SegmentationObserver};
use crate::params::SegmentationParams;
use crate::pose::{PoseTransform, normalize_pose};
use crate::regions::{ToothRegion, extract_tooth_regions};
use crate::weights::combine_weights;

/// A recoverable problem met during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentationWarning {
    /// The cut kept every face, so no rim vertex anchors the field.
    EmptyCutBoundary,
    /// No cusp feature was detected.
    NoFeatures,
    /// Some mesh components carried no constraint and were held at the
    /// mid value of the field.
    UnconstrainedComponents {
        /// Number of such components.
        count: usize,
    },
    /// The harmonic system could not be solved; the field is all zeros.
    HarmonicSolveFailed {
        /// Solver diagnostic.
        reason: String,
    },
}

impl fmt::Display for SegmentationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCutBoundary => f.write_str("cut produced no boundary vertices"),
            Self::NoFeatures => f.write_str("no cusp features detected"),
            Self::UnconstrainedComponents { count } => {
                write!(f, "{count} unconstrained mesh components held at the mid value")
            }
            Self::HarmonicSolveFailed { reason } => {
                write!(f, "harmonic solve failed: {reason}")
            }
        }
    }
}

/// Everything a run produces.
///
/// Per-vertex fields are indexed by the cut mesh's vertices.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Scanner frame to canonical frame.
    pub pose: PoseTransform,
    /// The retained part of the canonical mesh.
    pub cut_mesh: ScanMesh,
    /// Canonical mesh vertices to cut mesh vertices.
    pub index_map: VertexIndexMap,
    /// Rim vertices of the cut.
    pub cut_boundary: Vec<usize>,
    /// Mean curvature carried over from the uncut mesh.
    pub curvature: Vec<f64>,
    /// Normalized height along +Y.
    pub heights: Vec<f64>,
    /// Vertices above the minimum feature height.
    pub active: Vec<bool>,
    /// Cusp-likeness weights in `[0, 1]`.
    pub weights: Vec<f64>,
    /// Detected cusp features.
    pub features: FeatureSet,
    /// Feature groups the field was solved with.
    pub tooth_features: Vec<ToothFeature>,
    /// The harmonic field.
    pub harmonic: HarmonicField,
    /// Extracted tooth regions.
    pub teeth: Vec<ToothRegion>,
    /// Recoverable problems met on the way.
    pub warnings: Vec<SegmentationWarning>,
}

impl Segmentation {
    /// Whether the run finished without warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Runs the segmentation pipeline.
///
/// # Example
///
/// ```no_run
/// use dental_segment::{SegmentationParams, ToothSegmenter};
/// use dental_mesh::{ScanMesh, Vector3};
///
/// # fn load() -> ScanMesh { ScanMesh::empty() }
/// let scan = load();
/// let mut segmenter = ToothSegmenter::new(SegmentationParams::default());
/// let result = segmenter.segment(&scan, &Vector3::z(), &Vector3::x(), &[])?;
/// for tooth in &result.teeth {
///     println!("{}: {} faces", tooth.name, tooth.faces.len());
/// }
/// # Ok::<(), dental_segment::SegmentError>(())
/// ```
pub struct ToothSegmenter {
    params: SegmentationParams,
    observer: Option<Box<dyn SegmentationObserver>>,
}

impl fmt::Debug for ToothSegmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToothSegmenter")
            .field("params", &self.params)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ToothSegmenter {
    /// Create a segmenter without an observer.
    #[must_use]
    pub const fn new(params: SegmentationParams) -> Self {
        Self {
            params,
            observer: None,
        }
    }

    /// Attach an observer. It is only called when `visualize_steps` is set.
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn SegmentationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The parameters in use.
    #[must_use]
    pub const fn params(&self) -> &SegmentationParams {
        &self.params
    }

    /// Segment one scan.
    ///
    /// `up` and `right` are the occlusal and mesial axis hints in the
    /// scanner frame. `tooth_features` are optional feature groups in cut
    /// mesh indices; when empty, every detected cusp becomes its own group
    /// named `cusp_<n>`.
    ///
    /// # Errors
    ///
    /// - [`SegmentError::PreconditionViolation`] for invalid params or axis
    ///   hints, a flat scan, no vertex above the feature height, or
    ///   out-of-range caller feature indices.
    /// - [`SegmentError::TopologyDegeneracy`] if the cut keeps no face.
    pub fn segment(
        &mut self,
        mesh: &ScanMesh,
        up: &Vector3<f64>,
        right: &Vector3<f64>,
        tooth_features: &[ToothFeature],
    ) -> SegmentResult<Segmentation> {
        let params = self.params.clone();
        params.validate()?;
        let mut warnings = Vec::new();

        let mut canonical = mesh.clone();
        let pose = normalize_pose(&mut canonical, up, right)?;
        self.notify(|o| o.on_mesh(Checkpoint::PoseNormalized, &canonical));

        let estimate = estimate_curvature(&canonical, &Vector3::y(), &params.cusp)?;

        let cut = cut_mesh(&canonical, &params.cut_plane.to_plane()?)?;
        cut.ensure_non_empty()?;
        if cut.boundary.is_empty() {
            warn!("Cut plane left no rim; the field has no mid-level anchor");
            warnings.push(SegmentationWarning::EmptyCutBoundary);
        }
        self.notify(|o| {
            o.on_mesh(Checkpoint::MeshCut, &cut.mesh);
            o.on_points(Checkpoint::MeshCut, &cut.mesh, &cut.boundary);
        });

        let curvature = cut.index_map.remap_field(&estimate.curvature)?;
        let heights = normalized_heights(cut.mesh.positions(), &Vector3::y())?;
        let active = active_mask(&heights, params.cusp.min_feature_height);

        let weights = combine_weights(&curvature, &heights, &active, &params.cusp)?;
        self.notify(|o| o.on_field(Checkpoint::WeightsComputed, &cut.mesh, &weights));

        let features = extract_features(&cut.mesh, &weights, &active, &params.cusp)?;
        if features.is_empty() {
            warnings.push(SegmentationWarning::NoFeatures);
        }
        self.notify(|o| o.on_points(Checkpoint::FeaturesClustered, &cut.mesh, &features.vertices));

        let groups = tooth_groups(tooth_features, &features, cut.mesh.vertex_count())?;

        let harmonic = solve_harmonic_field(
            &cut.mesh,
            Some(&curvature),
            &groups,
            &cut.boundary,
            &params.harmonic,
        )?;
        if harmonic.has_pinned_components() {
            warnings.push(SegmentationWarning::UnconstrainedComponents {
                count: harmonic.pinned.len(),
            });
        }
        if let SolveStatus::Failed { reason } = &harmonic.status {
            warnings.push(SegmentationWarning::HarmonicSolveFailed {
                reason: reason.clone(),
            });
        }
        self.notify(|o| o.on_field(Checkpoint::HarmonicSolved, &cut.mesh, &harmonic.values));

        let teeth = if harmonic.is_solved() {
            extract_tooth_regions(
                &cut.mesh,
                &harmonic.values,
                &groups,
                &params.regions,
            )?
        } else {
            Vec::new()
        };

        info!(
            vertices = cut.mesh.vertex_count(),
            crown_height = cut.mesh.bounds().extent_along(&Vector3::y()),
            features = features.len(),
            groups = groups.len(),
            teeth = teeth.len(),
            warnings = warnings.len(),
            "Segmentation complete"
        );

        Ok(Segmentation {
            pose,
            cut_mesh: cut.mesh,
            index_map: cut.index_map,
            cut_boundary: cut.boundary,
            curvature,
            heights,
            active,
            weights,
            features,
            tooth_features: groups,
            harmonic,
            teeth,
            warnings,
        })
    }

    fn notify(&mut self, f: impl FnOnce(&mut dyn SegmentationObserver)) {
        if !self.params.visualize_steps {
            return;
        }
        if let Some(observer) = self.observer.as_deref_mut() {
            f(observer);
        }
    }
}

/// Caller groups if given, else one group per detected cusp.
fn tooth_groups(
    given: &[ToothFeature],
    features: &FeatureSet,
    vertex_count: usize,
) -> SegmentResult<Vec<ToothFeature>> {
    if given.is_empty() {
        return Ok(features
            .vertices
            .iter()
            .enumerate()
            .map(|(n, &v)| ToothFeature::new(format!("cusp_{n}"), vec![v]))
            .collect());
    }
    for group in given {
        if let Some(bad) = group.points.iter().find(|&&v| v >= vertex_count) {
            return Err(SegmentError::precondition(format!(
                "tooth {} references vertex {bad} of {vertex_count}",
                group.name
            )));
        }
    }
    Ok(given.to_vec())
}

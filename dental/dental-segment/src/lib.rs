//! Tooth segmentation of scanned dental arches.
//!
//! The pipeline finds cusps as points that are both high and sharply
//! curved, then solves a harmonic field whose level sets separate the
//! teeth:
//!
//! - **Pose** - move the scan into a canonical frame ([`normalize_pose`])
//! - **Curvature** - smoothed mean curvature with outlier clamping ([`estimate_curvature`])
//! - **Weights** - blend curvature and height into cusp-likeness ([`combine_weights`])
//! - **Features** - local maxima refined by mean-shift ([`extract_features`])
//! - **Cut** - drop everything below a plane, keeping an index map ([`cut_mesh`])
//! - **Harmonic field** - sparse least-squares solve ([`solve_harmonic_field`])
//! - **Regions** - tooth sub-meshes from the field ([`extract_tooth_regions`])
//!
//! [`ToothSegmenter`] runs all of it and reports intermediate state to an
//! optional [`SegmentationObserver`].
//!
//! # Example
//!
//! ```
//! use dental_segment::{CuspDetectionParams, combine_weights};
//!
//! let curvature = [0.0, 0.5, 1.0];
//! let heights = [0.6, 0.8, 1.0];
//! let params = CuspDetectionParams::default().with_exponents(1.0, 1.0);
//!
//! let weights = combine_weights(&curvature, &heights, &[true; 3], &params).unwrap();
//! assert_eq!(weights[2], 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod colormap;
mod curvature;
mod cut;
mod error;
mod features;
mod harmonic;
pub mod observer;
mod operators;
mod params;
mod pose;
pub mod regions;
mod segment;
mod sparse;
mod weights;

#[cfg(test)]
mod test_meshes;

pub use curvature::{
    CurvatureEstimate, active_mask, estimate_curvature, normalized_heights, reject_outliers,
    smooth_positions,
};
pub use cut::{MeshCut, cut_mesh};
pub use error::{SegmentError, SegmentResult};
pub use features::{
    FeatureSet, MeanShiftResult, collapse_particles, extract_features, find_local_maxima,
    mean_shift, particle_count,
};
pub use harmonic::{
    HarmonicField, SolveStatus, ToothFeature, build_harmonic_system, feature_target,
    solve_harmonic_field, solve_harmonic_field_strict,
};
pub use observer::{Checkpoint, NoopObserver, RecordingObserver, SegmentationObserver};
pub use operators::{
    cotangent, cotangent_laplacian, cotangent_weight, mean_curvature_normals, voronoi_mass,
};
pub use params::{
    CuspDetectionParams, CutPlaneParams, HarmonicParams, RegionParams, SegmentationParams,
};
pub use pose::{PoseTransform, normalize_pose};
pub use regions::{ToothRegion, extract_tooth_regions};
pub use segment::{Segmentation, SegmentationWarning, ToothSegmenter};
pub use sparse::{CsrMatrix, solve_least_squares};
pub use weights::combine_weights;

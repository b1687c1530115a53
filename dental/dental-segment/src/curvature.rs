//! Signed mean curvature estimation with smoothing and outlier rejection.
//!
//! The estimate runs in four steps:
//!
//! 1. Mean curvature normals `H = -M⁻¹ L V` on the input geometry.
//! 2. Optional explicit smoothing: `V ← V - step · H`, recomputing `H` on
//!    the displaced positions after each step.
//! 3. Per-vertex normals recomputed on the smoothed positions; the signed
//!    curvature is `H · n`, positive on convex (cusp-like) regions.
//! 4. Z-score outlier rejection over the active vertices, two fixed passes.
//!
//! Only vertices above a normalized height along the up axis are *active*
//! and contribute to statistics. The curvature itself is reported for all
//! vertices.

use dental_mesh::{ScanMesh, compute_vertex_normals};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{SegmentError, SegmentResult};
use crate::operators::mean_curvature_normals;
use crate::params::CuspDetectionParams;

/// Result of [`estimate_curvature`].
#[derive(Debug, Clone, PartialEq)]
pub struct CurvatureEstimate {
    /// Signed mean curvature per vertex, after outlier clamping.
    pub curvature: Vec<f64>,
    /// Height along the up axis per vertex, 0 at the lowest vertex and 1 at
    /// the highest.
    pub heights: Vec<f64>,
    /// Whether each vertex is above the minimum feature height.
    pub active: Vec<bool>,
    /// Number of vertices whose curvature was clamped as an outlier.
    pub outliers: usize,
}

impl CurvatureEstimate {
    /// Number of active vertices.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }
}

/// Height of every position along `up`, min–max normalized to `[0, 1]`.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] if `up` is zero, there
/// are no positions, or all positions share one height.
pub fn normalized_heights(positions: &[Point3<f64>], up: &Vector3<f64>) -> SegmentResult<Vec<f64>> {
    let up = up
        .try_normalize(f64::EPSILON)
        .ok_or_else(|| SegmentError::precondition("up axis is zero"))?;
    let raw: Vec<f64> = positions.iter().map(|p| p.coords.dot(&up)).collect();
    let (min, max) = min_max(raw.iter().copied())
        .ok_or_else(|| SegmentError::precondition("cannot normalize heights of an empty mesh"))?;
    let range = max - min;
    if range.is_nan() || range <= 0.0 {
        return Err(SegmentError::precondition(
            "height range along the up axis is zero",
        ));
    }
    Ok(raw.into_iter().map(|h| (h - min) / range).collect())
}

/// Vertices whose normalized height is strictly above `min_feature_height`.
#[must_use]
pub fn active_mask(heights: &[f64], min_feature_height: f64) -> Vec<bool> {
    heights.iter().map(|&h| h > min_feature_height).collect()
}

/// Smoothed positions and their mean curvature normals after `steps`
/// explicit Laplacian steps of size `step_size`.
///
/// With `steps == 0` this is the input geometry and its curvature normals.
///
/// # Errors
///
/// Propagates operator assembly errors.
pub fn smooth_positions(
    mesh: &ScanMesh,
    steps: usize,
    step_size: f64,
) -> SegmentResult<(Vec<Point3<f64>>, Vec<Vector3<f64>>)> {
    let positions = mesh.positions().to_vec();
    let normals = mean_curvature_normals(mesh, &positions)?;

    (0..steps).try_fold((positions, normals), |(positions, h), step| {
        let displaced: Vec<Point3<f64>> = positions
            .iter()
            .zip(&h)
            .map(|(p, hv)| p - hv * step_size)
            .collect();
        let h = mean_curvature_normals(mesh, &displaced)?;
        debug!(step = step + 1, steps, "Smoothing step");
        Ok((displaced, h))
    })
}

/// Clamp curvature outliers to the active mean.
///
/// Z-scores `|c - mean| / std` are computed once from the mean and
/// population standard deviation over active vertices. Every vertex
/// (active or not) above `max_zscore` is set to the active mean; the mean
/// is then recomputed and the same vertices are set to it again. Returns
/// the number of clamped vertices.
pub fn reject_outliers(curvature: &mut [f64], active: &[bool], max_zscore: f64) -> usize {
    let Some(mean) = active_mean(curvature, active) else {
        return 0;
    };
    #[allow(clippy::cast_precision_loss)]
    let count = active.iter().filter(|&&a| a).count() as f64;
    let variance = curvature
        .iter()
        .zip(active)
        .filter(|&(_, &a)| a)
        .map(|(c, _)| (c - mean).powi(2))
        .sum::<f64>()
        / count;
    let std = variance.sqrt();
    if std.is_nan() || std <= 0.0 {
        return 0;
    }

    let outliers: Vec<usize> = curvature
        .iter()
        .enumerate()
        .filter(|&(_, c)| ((c - mean) / std).abs() > max_zscore)
        .map(|(i, _)| i)
        .collect();

    let mut mean = mean;
    for pass in 0..2 {
        if pass > 0 {
            mean = active_mean(curvature, active).unwrap_or(mean);
        }
        for &i in &outliers {
            curvature[i] = mean;
        }
    }

    debug!(outliers = outliers.len(), std, "Clamped curvature outliers");
    outliers.len()
}

/// Estimate signed mean curvature on `mesh`.
///
/// `up` is the occlusal direction in the mesh's frame; it drives the
/// active-vertex mask. Vertices with zero Voronoi area get zero curvature.
///
/// # Errors
///
/// - [`SegmentError::PreconditionViolation`] for invalid params, a zero
///   height range, or an empty active set.
/// - Operator assembly errors.
pub fn estimate_curvature(
    mesh: &ScanMesh,
    up: &Vector3<f64>,
    params: &CuspDetectionParams,
) -> SegmentResult<CurvatureEstimate> {
    params.validate()?;

    let heights = normalized_heights(mesh.positions(), up)?;
    let active = active_mask(&heights, params.min_feature_height);
    if !active.contains(&true) {
        return Err(SegmentError::precondition(format!(
            "no vertex lies above min_feature_height {}",
            params.min_feature_height
        )));
    }

    let (smoothed, h) = smooth_positions(mesh, params.smoothing_steps, params.smoothing_step_size)?;
    let normals = compute_vertex_normals(&smoothed, mesh.faces());

    let mut curvature: Vec<f64> = h
        .par_iter()
        .zip(normals.par_iter())
        .map(|(hv, n)| hv.dot(n))
        .collect();

    let outliers = reject_outliers(&mut curvature, &active, params.max_zscore);

    let estimate = CurvatureEstimate {
        curvature,
        heights,
        active,
        outliers,
    };
    info!(
        vertices = mesh.vertex_count(),
        active = estimate.active_count(),
        outliers,
        smoothing_steps = params.smoothing_steps,
        "Estimated mean curvature"
    );
    Ok(estimate)
}

fn active_mean(values: &[f64], active: &[bool]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .zip(active)
        .filter(|&(_, &a)| a)
        .fold((0.0, 0_usize), |(s, n), (v, _)| (s + v, n + 1));
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / count as f64;
    (count > 0).then_some(mean)
}

/// Minimum and maximum of a sequence, `None` when empty.
pub(crate) fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_meshes::{bumped_grid, flat_grid};
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Unit};
    use proptest::prelude::*;

    #[test]
    fn heights_are_normalized() {
        let points = [
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(5.0, 4.0, 1.0),
            Point3::new(-3.0, 3.0, 2.0),
        ];
        let h = normalized_heights(&points, &Vector3::new(0.0, 2.0, 0.0)).unwrap();
        assert_eq!(h, vec![0.0, 1.0, 0.5]);
        assert_eq!(active_mask(&h, 0.5), vec![false, true, false]);
    }

    #[test]
    fn flat_heights_rejected() {
        let mesh = flat_grid(4);
        let result = normalized_heights(mesh.positions(), &Vector3::z());
        assert!(matches!(result, Err(SegmentError::PreconditionViolation { .. })));

        let result = estimate_curvature(&mesh, &Vector3::z(), &CuspDetectionParams::default());
        assert!(result.is_err());
    }

    #[test]
    fn outliers_clamped_twice() {
        let mut curvature = vec![0.0; 21];
        curvature[20] = 100.0;
        let active = vec![true; 21];
        let clamped = reject_outliers(&mut curvature, &active, 3.0);
        assert_eq!(clamped, 1);
        // First pass sets 100/21, second the new mean (100/21)/21.
        assert_relative_eq!(curvature[20], 100.0 / 441.0, epsilon = 1e-12);
        assert_relative_eq!(curvature[0], 0.0);
    }

    #[test]
    fn constant_curvature_has_no_outliers() {
        let mut curvature = vec![1.5; 8];
        assert_eq!(reject_outliers(&mut curvature, &[true; 8], 3.0), 0);
        assert_eq!(curvature, vec![1.5; 8]);
    }

    #[test]
    fn inactive_vertices_do_not_shift_statistics() {
        let mut curvature = vec![1.0, 1.0, 1.0, 1000.0];
        let active = [true, true, true, false];
        // Active std is zero, so nothing is an outlier.
        assert_eq!(reject_outliers(&mut curvature, &active, 3.0), 0);
        assert_relative_eq!(curvature[3], 1000.0);
    }

    #[test]
    fn bump_top_is_convex() {
        let mesh = bumped_grid(9, 2.0);
        let params = CuspDetectionParams::unsmoothed()
            .with_min_feature_height(0.1)
            .with_max_zscore(10.0);
        let estimate = estimate_curvature(&mesh, &Vector3::z(), &params).unwrap();
        let center = 4 * 9 + 4;
        assert!(estimate.active[center]);
        assert!(estimate.curvature[center] > 0.0);
        assert!(estimate.curvature[center] > estimate.curvature[4 * 9 + 2]);
    }

    #[test]
    fn smoothing_flattens_bump() {
        let mesh = bumped_grid(9, 2.0);
        let (smoothed, _) = smooth_positions(&mesh, 5, 0.05).unwrap();
        let center = 4 * 9 + 4;
        assert!(smoothed[center].z < mesh.positions()[center].z);
        let (same, _) = smooth_positions(&mesh, 0, 0.05).unwrap();
        assert_eq!(same, mesh.positions());
    }

    #[test]
    fn empty_active_set_rejected() {
        let mesh = bumped_grid(5, 1.0);
        let params = CuspDetectionParams::default().with_min_feature_height(1.0);
        let result = estimate_curvature(&mesh, &Vector3::z(), &params);
        assert!(matches!(result, Err(SegmentError::PreconditionViolation { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn curvature_is_pose_invariant(
            axis in prop::array::uniform3(-1.0_f64..1.0),
            angle in -3.0_f64..3.0,
            shift in prop::array::uniform3(-50.0_f64..50.0),
        ) {
            let axis = Vector3::from(axis);
            prop_assume!(axis.norm() > 0.1);
            let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle);
            let translation = Vector3::from(shift);

            let mesh = bumped_grid(7, 1.5);
            let mut moved = mesh.clone();
            moved.transform(rotation.matrix(), &translation);

            let params = CuspDetectionParams::default().with_min_feature_height(0.2);
            let a = estimate_curvature(&mesh, &Vector3::z(), &params).unwrap();
            let b = estimate_curvature(&moved, &(rotation * Vector3::z()), &params).unwrap();

            prop_assert_eq!(&a.active, &b.active);
            for (x, y) in a.curvature.iter().zip(&b.curvature) {
                prop_assert!((x - y).abs() <= 1e-6 * (1.0 + x.abs()));
            }
        }
    }
}

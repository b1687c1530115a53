//! Canonical pose normalization.
//!
//! Scans arrive in whatever frame the scanner used. Segmentation works in a
//! canonical frame where the occlusal direction is +Y, the arch's right
//! hint is +X and the vertex centroid sits at the origin.

use dental_mesh::ScanMesh;
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::info;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SegmentError, SegmentResult};

/// Rigid transform `p ↦ rotation · p + translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseTransform {
    /// Orthonormal rotation with determinant +1.
    pub rotation: Matrix3<f64>,
    /// Translation applied after the rotation.
    pub translation: Vector3<f64>,
}

impl PoseTransform {
    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Transform that takes `positions` into the canonical frame defined by
    /// the `up` and `right` hints.
    ///
    /// `up` is kept exactly; `right` is re-orthogonalized against it. The
    /// basis `(right, up, right × up)` becomes `(X, Y, Z)` and the centroid
    /// of the rotated positions lands on the origin.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::PreconditionViolation`] if either hint is
    /// zero or non-finite, or if the hints are parallel.
    pub fn from_axes(
        positions: &[Point3<f64>],
        up: &Vector3<f64>,
        right: &Vector3<f64>,
    ) -> SegmentResult<Self> {
        let rotation = canonical_rotation(up, right)?;

        #[allow(clippy::cast_precision_loss)]
        let centroid = if positions.is_empty() {
            Vector3::zeros()
        } else {
            positions.iter().map(|p| p.coords).sum::<Vector3<f64>>() / positions.len() as f64
        };

        Ok(Self {
            rotation,
            translation: -(rotation * centroid),
        })
    }

    /// Apply to a point.
    #[must_use]
    pub fn apply_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    /// Apply to a direction (rotation only).
    #[must_use]
    pub fn apply_normal(&self, n: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * n
    }

    /// The inverse transform, mapping canonical coordinates back to the
    /// scanner frame.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Apply to every position and normal of `mesh`, rebuilding its
    /// spatial index.
    pub fn apply_to(&self, mesh: &mut ScanMesh) {
        mesh.transform(&self.rotation, &self.translation);
    }
}

impl Default for PoseTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rotation taking the hint basis to the canonical axes.
fn canonical_rotation(up: &Vector3<f64>, right: &Vector3<f64>) -> SegmentResult<Matrix3<f64>> {
    let finite = |v: &Vector3<f64>| v.iter().all(|c| c.is_finite());
    if !finite(up) || !finite(right) {
        return Err(SegmentError::precondition("pose axis hints must be finite"));
    }

    let up = up
        .try_normalize(f64::EPSILON)
        .ok_or_else(|| SegmentError::precondition("up axis hint is zero"))?;
    let right = right
        .try_normalize(f64::EPSILON)
        .ok_or_else(|| SegmentError::precondition("right axis hint is zero"))?;

    // Gram-Schmidt: keep up, remove its component from right.
    let right = (right - up * up.dot(&right))
        .try_normalize(1e-9)
        .ok_or_else(|| SegmentError::precondition("up and right axis hints are parallel"))?;
    let forward = right.cross(&up);

    let basis = Matrix3::from_columns(&[right, up, forward]);
    Ok(basis.transpose())
}

/// Move `mesh` into the canonical frame in place.
///
/// Positions are rotated then translated; normals are rotated only. The
/// mesh's spatial index is rebuilt. Returns the applied transform.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] for zero or parallel
/// axis hints. The mesh is left untouched in that case.
pub fn normalize_pose(
    mesh: &mut ScanMesh,
    up: &Vector3<f64>,
    right: &Vector3<f64>,
) -> SegmentResult<PoseTransform> {
    let pose = PoseTransform::from_axes(mesh.positions(), up, right)?;
    pose.apply_to(mesh);

    info!(
        vertices = mesh.vertex_count(),
        up = ?up,
        right = ?right,
        "Normalized mesh pose"
    );

    Ok(pose)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_meshes::bumped_grid;
    use approx::assert_relative_eq;

    #[test]
    fn hints_map_to_canonical_axes() {
        let up = Vector3::new(0.0, 0.0, 2.0);
        let right = Vector3::new(1.0, 0.0, 0.3); // not orthogonal
        let pose = PoseTransform::from_axes(&[], &up, &right).unwrap();

        assert_relative_eq!(pose.apply_normal(&up.normalize()), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(pose.apply_normal(&Vector3::x()), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(pose.rotation.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rotation_is_orthonormal() {
        let pose = PoseTransform::from_axes(
            &[],
            &Vector3::new(0.3, 1.0, -0.2),
            &Vector3::new(1.0, 0.5, 0.1),
        )
        .unwrap();
        let rrt = pose.rotation * pose.rotation.transpose();
        assert_relative_eq!(rrt, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn centroid_moves_to_origin() {
        let mut mesh = bumped_grid(4, 0.5);
        normalize_pose(&mut mesh, &Vector3::z(), &Vector3::x()).unwrap();
        assert_relative_eq!(mesh.centroid().coords, Vector3::zeros(), epsilon = 1e-9);
        // The bump rose along +Z and now rises along +Y.
        for n in mesh.normals() {
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn inverse_round_trips() {
        let points = [Point3::new(1.0, 2.0, 3.0), Point3::new(-4.0, 0.5, 2.0)];
        let pose = PoseTransform::from_axes(
            &points,
            &Vector3::new(0.0, 1.0, 1.0),
            &Vector3::new(1.0, 0.0, 0.0),
        )
        .unwrap();
        let back = pose.inverse();
        for p in &points {
            assert_relative_eq!(back.apply_point(&pose.apply_point(p)), *p, epsilon = 1e-12);
        }
    }

    #[test]
    fn parallel_hints_rejected() {
        let result = PoseTransform::from_axes(&[], &Vector3::y(), &Vector3::new(0.0, -3.0, 0.0));
        assert!(matches!(result, Err(SegmentError::PreconditionViolation { .. })));
    }

    #[test]
    fn zero_hint_rejected_and_mesh_untouched() {
        let mut mesh = bumped_grid(3, 0.5);
        let before = mesh.positions().to_vec();
        let result = normalize_pose(&mut mesh, &Vector3::zeros(), &Vector3::x());
        assert!(result.is_err());
        assert_eq!(mesh.positions(), before.as_slice());
    }
}

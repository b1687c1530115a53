//! Oriented planes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// A plane defined by a point and a unit normal.
///
/// The side the normal points to is the positive side.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plane {
    /// A point on the plane.
    pub point: Point3<f64>,
    /// Unit normal.
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Create a plane, normalizing `normal`.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DegeneratePlane`] if `normal` has (near) zero length.
    pub fn new(point: Point3<f64>, normal: Vector3<f64>) -> MeshResult<Self> {
        let normal = normal
            .try_normalize(f64::EPSILON)
            .ok_or(MeshError::DegeneratePlane)?;
        Ok(Self { point, normal })
    }

    /// Signed distance of `p` from the plane; positive on the normal side.
    #[inline]
    #[must_use]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&(p - self.point))
    }
}

//! Per-vertex normals.

use nalgebra::{Point3, Vector3};

/// Compute area-weighted per-vertex normals.
///
/// Each face contributes its unnormalized normal (twice its area times the
/// unit normal) to its three vertices; the sums are then normalized.
/// Vertices with no incident faces, or whose contributions cancel, get a
/// zero vector.
///
/// Face indices must be valid for `positions`.
#[must_use]
pub fn compute_vertex_normals(positions: &[Point3<f64>], faces: &[[u32; 3]]) -> Vec<Vector3<f64>> {
    let mut normals = vec![Vector3::zeros(); positions.len()];

    for &[i0, i1, i2] in faces {
        let v0 = positions[i0 as usize];
        let v1 = positions[i1 as usize];
        let v2 = positions[i2 as usize];
        let face_normal = (v1 - v0).cross(&(v2 - v0));

        normals[i0 as usize] += face_normal;
        normals[i1 as usize] += face_normal;
        normals[i2 as usize] += face_normal;
    }

    for n in &mut normals {
        *n = n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros);
    }

    normals
}

//! Discrete differential operators on triangle meshes.
//!
//! - [`cotangent_laplacian`] - the cotangent-weighted Laplace-Beltrami matrix
//! - [`voronoi_mass`] - the mixed Voronoi lumped mass per vertex
//! - [`mean_curvature_normals`] - `H = -M⁻¹ L V`
//!
//! All operators take the positions explicitly so they can be evaluated on
//! displaced geometry (for example during smoothing) while reusing the
//! mesh's topology.

use dental_mesh::{MeshError, ScanMesh};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::error::SegmentResult;
use crate::sparse::CsrMatrix;

/// Cotangent of the angle at `apex` in the triangle `(apex, a, b)`.
///
/// Computed from the normalized edge vectors as `dot / |cross|`. Returns
/// zero for a degenerate triangle.
#[must_use]
pub fn cotangent(apex: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let (Some(e1), Some(e2)) = (
        (a - apex).try_normalize(f64::EPSILON),
        (b - apex).try_normalize(f64::EPSILON),
    ) else {
        return 0.0;
    };
    let sin = e1.cross(&e2).norm();
    if sin < f64::EPSILON {
        return 0.0;
    }
    e1.dot(&e2) / sin
}

/// Cotangent weight of the edge `(i, j)`: the sum of the cotangents of the
/// angles opposite the edge in the one or two triangles containing it.
///
/// Zero if `i` and `j` share no triangle.
///
/// # Panics
///
/// Panics if `i`, `j` or a face index is out of range for `positions`.
#[must_use]
pub fn cotangent_weight(mesh: &ScanMesh, positions: &[Point3<f64>], i: usize, j: usize) -> f64 {
    mesh.incident_faces(i)
        .iter()
        .filter_map(|&f| {
            let face = mesh.faces()[f as usize];
            if !face.iter().any(|&v| v as usize == j) {
                return None;
            }
            let k = face.iter().find(|&&v| v as usize != i && v as usize != j)?;
            Some(cotangent(&positions[*k as usize], &positions[i], &positions[j]))
        })
        .sum()
}

/// Assemble the cotangent Laplacian over `positions`.
///
/// Off-diagonal entries are `scale * w_ij` where `w_ij` is the
/// [`cotangent_weight`] of edge `(i, j)`; each diagonal entry is the negated
/// sum of its row's off-diagonals, so every row sums to zero. `scale = 0.5`
/// gives the usual Laplace-Beltrami convention (`L V` approximates twice
/// the area-weighted mean curvature normal); `scale = -1` gives the
/// positive semi-definite form used for harmonic fields.
///
/// # Errors
///
/// Returns [`MeshError::FieldLengthMismatch`] if `positions` does not have
/// one entry per mesh vertex.
pub fn cotangent_laplacian(
    mesh: &ScanMesh,
    positions: &[Point3<f64>],
    scale: f64,
) -> SegmentResult<CsrMatrix> {
    check_positions(mesh, positions)?;
    let n = positions.len();

    let corner_cots: Vec<[f64; 3]> = mesh
        .faces()
        .par_iter()
        .map(|&[a, b, c]| {
            let (pa, pb, pc) = (
                &positions[a as usize],
                &positions[b as usize],
                &positions[c as usize],
            );
            [
                cotangent(pa, pb, pc),
                cotangent(pb, pc, pa),
                cotangent(pc, pa, pb),
            ]
        })
        .collect();

    let mut triplets = Vec::with_capacity(mesh.face_count() * 12 + n);
    let mut diagonal = vec![0.0; n];
    for (face, cots) in mesh.faces().iter().zip(&corner_cots) {
        for corner in 0..3 {
            // The angle at `corner` is opposite the edge between the other two.
            let i = face[(corner + 1) % 3] as usize;
            let j = face[(corner + 2) % 3] as usize;
            let w = scale * cots[corner];
            triplets.push((i, j, w));
            triplets.push((j, i, w));
            diagonal[i] -= w;
            diagonal[j] -= w;
        }
    }
    triplets.extend(diagonal.into_iter().enumerate().map(|(i, d)| (i, i, d)));

    CsrMatrix::from_triplets(n, n, &triplets)
}

/// Mixed Voronoi area of every vertex.
///
/// Non-obtuse triangles contribute the Voronoi region of each corner. An
/// obtuse triangle contributes half its area to the obtuse corner and a
/// quarter to each of the others. Isolated vertices get zero.
///
/// # Errors
///
/// Returns [`MeshError::FieldLengthMismatch`] if `positions` does not have
/// one entry per mesh vertex.
pub fn voronoi_mass(mesh: &ScanMesh, positions: &[Point3<f64>]) -> SegmentResult<Vec<f64>> {
    check_positions(mesh, positions)?;
    let mut mass = vec![0.0; positions.len()];

    for face in mesh.faces() {
        let idx = face.map(|v| v as usize);
        let p = idx.map(|v| positions[v]);
        let area = 0.5 * (p[1] - p[0]).cross(&(p[2] - p[0])).norm();
        if area <= f64::EPSILON {
            continue;
        }

        match obtuse_corner(&p) {
            None => {
                for corner in 0..3 {
                    let prev = (corner + 2) % 3;
                    let next = (corner + 1) % 3;
                    let cot_prev = cotangent(&p[prev], &p[corner], &p[next]);
                    let cot_next = cotangent(&p[next], &p[prev], &p[corner]);
                    mass[idx[corner]] += 0.125
                        * ((p[next] - p[corner]).norm_squared() * cot_prev
                            + (p[prev] - p[corner]).norm_squared() * cot_next);
                }
            }
            Some(obtuse) => {
                for corner in 0..3 {
                    mass[idx[corner]] += if corner == obtuse { area / 2.0 } else { area / 4.0 };
                }
            }
        }
    }

    Ok(mass)
}

fn obtuse_corner(p: &[Point3<f64>; 3]) -> Option<usize> {
    (0..3).find(|&corner| {
        let a = p[(corner + 1) % 3] - p[corner];
        let b = p[(corner + 2) % 3] - p[corner];
        a.dot(&b) < 0.0
    })
}

/// Mean curvature normal of every vertex, `H = -M⁻¹ L V`.
///
/// `L` is the cotangent Laplacian with `scale = 0.5` and `M` the mixed
/// Voronoi mass. On a convex bump `H` points along the outward normal.
/// Vertices with zero mass get a zero vector.
///
/// # Errors
///
/// Returns [`MeshError::FieldLengthMismatch`] if `positions` does not have
/// one entry per mesh vertex.
pub fn mean_curvature_normals(
    mesh: &ScanMesh,
    positions: &[Point3<f64>],
) -> SegmentResult<Vec<Vector3<f64>>> {
    let laplacian = cotangent_laplacian(mesh, positions, 0.5)?;
    let mass = voronoi_mass(mesh, positions)?;
    let lv = laplacian.mul_points(positions);

    Ok(lv
        .into_iter()
        .zip(mass)
        .map(|(l, m)| if m > f64::EPSILON { -l / m } else { Vector3::zeros() })
        .collect())
}

fn check_positions(mesh: &ScanMesh, positions: &[Point3<f64>]) -> Result<(), MeshError> {
    if positions.len() == mesh.vertex_count() {
        Ok(())
    } else {
        Err(MeshError::FieldLengthMismatch {
            expected: mesh.vertex_count(),
            actual: positions.len(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_meshes::{bumped_grid, flat_grid, octahedron};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn cotangent_of_right_angle_is_zero() {
        let apex = Point3::origin();
        let cot = cotangent(&apex, &Point3::new(1.0, 0.0, 0.0), &Point3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(cot, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn cotangent_of_sixty_degrees() {
        let apex = Point3::origin();
        let b = Point3::new(0.5, 3.0_f64.sqrt() / 2.0, 0.0);
        let cot = cotangent(&apex, &Point3::new(1.0, 0.0, 0.0), &b);
        assert_relative_eq!(cot, 1.0 / 3.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_triangle_contributes_nothing() {
        let apex = Point3::origin();
        assert_relative_eq!(cotangent(&apex, &apex, &Point3::new(1.0, 0.0, 0.0)), 0.0);
        let cot = cotangent(&apex, &Point3::new(1.0, 0.0, 0.0), &Point3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(cot, 0.0);
    }

    #[test]
    fn weight_matches_laplacian_entry() {
        let mesh = bumped_grid(5, 0.3);
        let l = cotangent_laplacian(&mesh, mesh.positions(), -1.0).unwrap();
        for i in 0..mesh.vertex_count() {
            for &j in mesh.adjacency().neighbors(i) {
                let w = cotangent_weight(&mesh, mesh.positions(), i, j as usize);
                assert_relative_eq!(l.get(i, j as usize), -w, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(cotangent_weight(&mesh, mesh.positions(), 0, 24), 0.0);
    }

    #[test]
    fn flat_grid_interior_weights() {
        // Axis-aligned edges sit opposite two 45 degree angles, diagonals
        // opposite two right angles.
        let mesh = flat_grid(3);
        let w = cotangent_weight(&mesh, mesh.positions(), 4, 5);
        assert_relative_eq!(w, 2.0, epsilon = 1e-12);
        let w = cotangent_weight(&mesh, mesh.positions(), 4, 8);
        assert_relative_eq!(w, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn mass_sums_to_total_area() {
        let mesh = bumped_grid(6, 0.4);
        let mass = voronoi_mass(&mesh, mesh.positions()).unwrap();
        let total: f64 = mesh
            .faces()
            .iter()
            .map(|f| {
                let p = f.map(|v| mesh.positions()[v as usize]);
                0.5 * (p[1] - p[0]).cross(&(p[2] - p[0])).norm()
            })
            .sum();
        assert_relative_eq!(mass.iter().sum::<f64>(), total, epsilon = 1e-9);
    }

    #[test]
    fn flat_interior_has_zero_curvature() {
        let mesh = flat_grid(5);
        let h = mean_curvature_normals(&mesh, mesh.positions()).unwrap();
        assert_relative_eq!(h[12].norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn convex_vertex_curvature_points_outward() {
        let mesh = octahedron();
        let h = mean_curvature_normals(&mesh, mesh.positions()).unwrap();
        for (p, hv) in mesh.positions().iter().zip(&h) {
            assert!(hv.dot(&p.coords) > 0.0);
        }
    }

    #[test]
    fn length_mismatch_rejected() {
        let mesh = flat_grid(3);
        assert!(cotangent_laplacian(&mesh, &[], 1.0).is_err());
        assert!(voronoi_mass(&mesh, &[]).is_err());
    }

    proptest! {
        #[test]
        fn laplacian_rows_sum_to_zero(
            jitter in prop::collection::vec(-0.3_f64..0.3, 75),
        ) {
            // Irregular triangulation: a 5x5 grid with every vertex displaced.
            let mesh = flat_grid(5);
            let positions: Vec<_> = mesh
                .positions()
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    Point3::new(p.x + jitter[3 * i], p.y + jitter[3 * i + 1], p.z + jitter[3 * i + 2])
                })
                .collect();
            let l = cotangent_laplacian(&mesh, &positions, 0.5).unwrap();
            for i in 0..l.rows() {
                prop_assert!(l.row_sum(i).abs() < 1e-9);
            }
        }
    }
}

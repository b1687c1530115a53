//! Plane cutting with index remapping.
//!
//! A face survives the cut only when all three of its vertices lie strictly
//! on the positive side of the plane. Faces straddling the plane are
//! dropped whole, so the rim is jagged and no vertex is ever created on the
//! plane itself. Surviving vertices are renumbered in first-seen order and
//! the renumbering is returned as a [`VertexIndexMap`] so fields computed on
//! the uncut mesh can be carried over.

use dental_mesh::{Plane, ScanMesh, VertexIndexMap};
use tracing::{debug, info};

use crate::error::{SegmentError, SegmentResult};

/// Result of [`cut_mesh`].
#[derive(Debug, Clone)]
pub struct MeshCut {
    /// The retained part of the mesh, normals recomputed.
    pub mesh: ScanMesh,
    /// Cut-rim vertices in the new numbering, deduplicated, in the order
    /// their dropped faces were visited.
    pub boundary: Vec<usize>,
    /// Old/new vertex correspondence.
    pub index_map: VertexIndexMap,
}

impl MeshCut {
    /// Whether the cut retained any face.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mesh.face_count() == 0
    }

    /// Reject a cut that retained nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::TopologyDegeneracy`] if no face survived.
    pub fn ensure_non_empty(&self) -> SegmentResult<()> {
        if self.is_empty() {
            return Err(SegmentError::topology(format!(
                "cut plane removed all {} faces",
                self.index_map.old_count()
            )));
        }
        Ok(())
    }
}

/// Cut `mesh` with `plane`, keeping the positive side.
///
/// When every face survives, the mesh is returned unchanged with an
/// identity index map and an empty boundary. When none survives, the
/// result is an empty mesh; see [`MeshCut::ensure_non_empty`].
///
/// # Errors
///
/// Propagates mesh construction errors.
pub fn cut_mesh(mesh: &ScanMesh, plane: &Plane) -> SegmentResult<MeshCut> {
    let distances: Vec<f64> = mesh
        .positions()
        .iter()
        .map(|p| plane.signed_distance(p))
        .collect();
    let inside = |v: u32| distances[v as usize] > 0.0;

    let mut kept = Vec::with_capacity(mesh.face_count());
    let mut rim = Vec::new();
    for (f, face) in mesh.faces().iter().enumerate() {
        if face.iter().all(|&v| inside(v)) {
            kept.push(f);
        } else {
            rim.extend(face.iter().filter(|&&v| inside(v)).map(|&v| v as usize));
        }
    }

    if kept.len() == mesh.face_count() {
        debug!(faces = kept.len(), "Cut plane retained every face");
        return Ok(MeshCut {
            mesh: mesh.clone(),
            boundary: Vec::new(),
            index_map: VertexIndexMap::identity(mesh.vertex_count()),
        });
    }

    let (cut, index_map) = mesh.submesh(&kept)?;
    let boundary = index_map.map_indices(&rim);

    info!(
        faces_before = mesh.face_count(),
        faces_after = cut.face_count(),
        vertices_after = cut.vertex_count(),
        boundary = boundary.len(),
        "Cut mesh with plane"
    );

    Ok(MeshCut {
        mesh: cut,
        boundary,
        index_map,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_meshes::{bumped_grid, flat_grid};
    use nalgebra::{Point3, Vector3};
    use proptest::prelude::*;

    fn plane(point: [f64; 3], normal: [f64; 3]) -> Plane {
        Plane::new(Point3::from(point), Vector3::from(normal)).unwrap()
    }

    #[test]
    fn plane_below_mesh_keeps_everything() {
        let mesh = bumped_grid(5, 1.0);
        let cut = cut_mesh(&mesh, &plane([0.0, 0.0, -1000.0], [0.0, 0.0, 1.0])).unwrap();
        assert_eq!(cut.mesh.faces(), mesh.faces());
        assert_eq!(cut.mesh.positions(), mesh.positions());
        assert!(cut.boundary.is_empty());
        assert!(cut.index_map.is_consistent());
        assert!(cut.ensure_non_empty().is_ok());
    }

    #[test]
    fn plane_above_mesh_discards_everything() {
        let mesh = bumped_grid(5, 1.0);
        let cut = cut_mesh(&mesh, &plane([0.0, 0.0, 1000.0], [0.0, 0.0, 1.0])).unwrap();
        assert!(cut.is_empty());
        assert_eq!(cut.mesh.vertex_count(), 0);
        assert!(cut.boundary.is_empty());
        assert_eq!(cut.index_map.new_count(), 0);
        assert!(matches!(
            cut.ensure_non_empty(),
            Err(SegmentError::TopologyDegeneracy { .. })
        ));
    }

    #[test]
    fn half_cut_keeps_strictly_positive_faces() {
        // Keep x > 1.5 on a 4x4 grid: columns 2 and 3.
        let mesh = flat_grid(4);
        let cut = cut_mesh(&mesh, &plane([1.5, 0.0, 0.0], [1.0, 0.0, 0.0])).unwrap();

        assert_eq!(cut.mesh.face_count(), 6);
        assert_eq!(cut.mesh.vertex_count(), 8);
        for p in cut.mesh.positions() {
            assert!(p.x > 1.5);
        }
        // Column 2 vertices lost their left faces and form the rim.
        let mut rim_old: Vec<usize> = cut
            .boundary
            .iter()
            .map(|&n| cut.index_map.old_index(n).unwrap())
            .collect();
        rim_old.sort_unstable();
        assert_eq!(rim_old, vec![2, 6, 10, 14]);
    }

    #[test]
    fn straddling_faces_are_dropped() {
        // Plane through a vertex column: distance zero is not inside.
        let mesh = flat_grid(3);
        let cut = cut_mesh(&mesh, &plane([1.0, 0.0, 0.0], [1.0, 0.0, 0.0])).unwrap();
        assert!(cut.is_empty());
    }

    #[test]
    fn new_indices_follow_first_seen_order() {
        let mesh = flat_grid(3);
        let cut = cut_mesh(&mesh, &plane([0.5, 0.0, 0.0], [1.0, 0.0, 0.0])).unwrap();
        // First kept face is [1, 2, 5] from cell (1, 0).
        assert_eq!(&cut.index_map.inverse()[..3], &[1, 2, 5]);
        assert_eq!(cut.mesh.faces()[0], [0, 1, 2]);
    }

    #[test]
    fn remapped_field_matches_positions() {
        let mesh = bumped_grid(6, 1.0);
        let cut = cut_mesh(&mesh, &plane([0.0, 0.0, 0.3], [0.0, 0.0, 1.0])).unwrap();
        let heights: Vec<f64> = mesh.positions().iter().map(|p| p.z).collect();
        let remapped = cut.index_map.remap_field(&heights).unwrap();
        for (p, h) in cut.mesh.positions().iter().zip(&remapped) {
            assert!((p.z - h).abs() < 1e-15);
        }
    }

    proptest! {
        #[test]
        fn index_maps_are_mutual_inverses(
            offset in -2.0_f64..8.0,
            nx in -1.0_f64..1.0,
            ny in -1.0_f64..1.0,
        ) {
            let mesh = bumped_grid(7, 1.0);
            let normal = Vector3::new(nx, ny, 0.3);
            let plane = Plane::new(Point3::new(offset, offset, 0.0), normal).unwrap();
            let cut = cut_mesh(&mesh, &plane).unwrap();
            let map = &cut.index_map;

            for n in 0..map.new_count() {
                let old = map.old_index(n).unwrap();
                prop_assert_eq!(map.new_index(old), Some(n));
            }
            for old in 0..map.old_count() {
                if let Some(n) = map.new_index(old) {
                    prop_assert_eq!(map.old_index(n), Some(old));
                }
            }
            for &b in &cut.boundary {
                prop_assert!(b < cut.mesh.vertex_count());
            }
        }
    }
}

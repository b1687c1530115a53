//! Scanned triangle mesh with derived topology and spatial index.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::bounds::Aabb;
use crate::error::{MeshError, MeshResult};
use crate::index_map::VertexIndexMap;
use crate::normals::compute_vertex_normals;
use crate::spatial::SpatialIndex;
use crate::topology::{AdjacencyList, IncidenceList};

/// A triangle mesh as produced by an intraoral or model scanner.
///
/// Stores parallel arrays of positions and normals plus a face list, and
/// keeps three derived structures in sync with them:
///
/// - an [`AdjacencyList`] (vertex → neighboring vertices),
/// - an [`IncidenceList`] (vertex → incident triangles),
/// - a [`SpatialIndex`] over the current positions.
///
/// Vertices are identified only by their position in the arrays. All
/// constructors validate the face list and build the derived structures
/// eagerly, and every mutating method rebuilds whatever it invalidates, so
/// queries are always consistent with the current geometry.
///
/// # Example
///
/// ```
/// use dental_mesh::ScanMesh;
/// use nalgebra::Point3;
///
/// let positions = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let mesh = ScanMesh::from_geometry(positions, vec![[0, 1, 2]]).unwrap();
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.adjacency().neighbors(0).len(), 2);
/// assert!((mesh.normals()[0].z - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct ScanMesh {
    positions: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
    faces: Vec<[u32; 3]>,
    adjacency: AdjacencyList,
    incidence: IncidenceList,
    spatial: SpatialIndex,
}

impl ScanMesh {
    /// Build a mesh from positions, normals and faces.
    ///
    /// # Errors
    ///
    /// Returns an error if `normals` and `positions` differ in length or a
    /// face references a missing vertex.
    pub fn new(
        positions: Vec<Point3<f64>>,
        normals: Vec<Vector3<f64>>,
        faces: Vec<[u32; 3]>,
    ) -> MeshResult<Self> {
        if normals.len() != positions.len() {
            return Err(MeshError::NormalCountMismatch {
                normals: normals.len(),
                vertices: positions.len(),
            });
        }
        validate_faces(positions.len(), &faces)?;

        let adjacency = AdjacencyList::from_faces(positions.len(), &faces);
        let incidence = IncidenceList::from_faces(positions.len(), &faces);
        let spatial = SpatialIndex::from_points(&positions);

        Ok(Self {
            positions,
            normals,
            faces,
            adjacency,
            incidence,
            spatial,
        })
    }

    /// Build a mesh from positions and faces, computing area-weighted
    /// vertex normals.
    ///
    /// # Errors
    ///
    /// Returns an error if a face references a missing vertex.
    pub fn from_geometry(positions: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> MeshResult<Self> {
        validate_faces(positions.len(), &faces)?;
        let normals = compute_vertex_normals(&positions, &faces);
        Self::new(positions, normals, faces)
    }

    /// An empty mesh.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            faces: Vec::new(),
            adjacency: AdjacencyList::default(),
            incidence: IncidenceList::default(),
            spatial: SpatialIndex::from_points(&[]),
        }
    }

    /// Vertex positions.
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Vertex normals, parallel to [`positions`](Self::positions).
    #[inline]
    #[must_use]
    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    /// Triangle faces as vertex index triples.
    #[inline]
    #[must_use]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Vertex adjacency.
    #[inline]
    #[must_use]
    pub const fn adjacency(&self) -> &AdjacencyList {
        &self.adjacency
    }

    /// Vertex-to-triangle incidence.
    #[inline]
    #[must_use]
    pub const fn incidence(&self) -> &IncidenceList {
        &self.incidence
    }

    /// Faces containing `vertex`.
    #[inline]
    #[must_use]
    pub fn incident_faces(&self, vertex: usize) -> &[u32] {
        self.incidence.faces(vertex)
    }

    /// Spatial index over the current positions.
    #[inline]
    #[must_use]
    pub const fn spatial_index(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Whether the mesh has no vertices or no faces.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.faces.is_empty()
    }

    /// Bounding box of all vertices.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter())
    }

    /// Mean of all vertex positions, or the origin for an empty mesh.
    #[must_use]
    pub fn centroid(&self) -> Point3<f64> {
        if self.positions.is_empty() {
            return Point3::origin();
        }
        let sum: Vector3<f64> = self.positions.iter().map(|p| p.coords).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.positions.len() as f64;
        Point3::from(sum / count)
    }

    /// The `k` vertices nearest to `point` as `(index, distance)`, nearest first.
    #[must_use]
    pub fn nearest(&self, point: &Point3<f64>, k: usize) -> Vec<(usize, f64)> {
        self.spatial.nearest(point, k)
    }

    /// The vertex nearest to `point`, if the mesh has any vertices.
    #[must_use]
    pub fn nearest_vertex(&self, point: &Point3<f64>) -> Option<usize> {
        self.spatial.nearest_one(point).map(|(i, _)| i)
    }

    /// Apply `p ↦ rotation · p + translation` to every position and
    /// `n ↦ rotation · n` to every normal, then rebuild the spatial index.
    ///
    /// Topology is unaffected.
    pub fn transform(&mut self, rotation: &Matrix3<f64>, translation: &Vector3<f64>) {
        for p in &mut self.positions {
            *p = Point3::from(rotation * p.coords + translation);
        }
        for n in &mut self.normals {
            *n = rotation * *n;
        }
        self.spatial = SpatialIndex::from_points(&self.positions);
    }

    /// Same topology with new vertex positions; normals are recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::FieldLengthMismatch`] if `positions` does not
    /// have one entry per vertex.
    pub fn with_positions(&self, positions: Vec<Point3<f64>>) -> MeshResult<Self> {
        if positions.len() != self.positions.len() {
            return Err(MeshError::FieldLengthMismatch {
                expected: self.positions.len(),
                actual: positions.len(),
            });
        }
        let normals = compute_vertex_normals(&positions, &self.faces);
        let spatial = SpatialIndex::from_points(&positions);
        Ok(Self {
            positions,
            normals,
            faces: self.faces.clone(),
            adjacency: self.adjacency.clone(),
            incidence: self.incidence.clone(),
            spatial,
        })
    }

    /// Extract the sub-mesh made of the given faces.
    ///
    /// Vertices used by the selected faces are renumbered in first-seen
    /// order while walking `face_indices`; unreferenced vertices are
    /// dropped. Normals are recomputed from the extracted geometry because
    /// the local neighborhood of rim vertices changes.
    ///
    /// # Errors
    ///
    /// Returns an error if a face index is out of range.
    pub fn submesh(&self, face_indices: &[usize]) -> MeshResult<(Self, VertexIndexMap)> {
        let mut forward: Vec<Option<usize>> = vec![None; self.positions.len()];
        let mut positions = Vec::new();
        let mut faces = Vec::with_capacity(face_indices.len());

        for &f in face_indices {
            let face = self.faces.get(f).ok_or(MeshError::InvalidVertex {
                index: f,
                vertex_count: self.faces.len(),
            })?;
            let mut new_face = [0_u32; 3];
            for (slot, &old) in new_face.iter_mut().zip(face.iter()) {
                let old = old as usize;
                let new = *forward[old].get_or_insert_with(|| {
                    positions.push(self.positions[old]);
                    positions.len() - 1
                });
                #[allow(clippy::cast_possible_truncation)]
                let new = new as u32;
                *slot = new;
            }
            faces.push(new_face);
        }

        let map = VertexIndexMap::from_forward(forward)?;
        let mesh = Self::from_geometry(positions, faces)?;
        Ok((mesh, map))
    }

    /// Take the raw arrays back out of the mesh.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Point3<f64>>, Vec<Vector3<f64>>, Vec<[u32; 3]>) {
        (self.positions, self.normals, self.faces)
    }
}

impl Default for ScanMesh {
    fn default() -> Self {
        Self::empty()
    }
}

fn validate_faces(vertex_count: usize, faces: &[[u32; 3]]) -> MeshResult<()> {
    for (face, indices) in faces.iter().enumerate() {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::InvalidFaceIndex {
                face,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: u32) -> ScanMesh {
        let mut positions = Vec::new();
        for j in 0..n {
            for i in 0..n {
                positions.push(Point3::new(f64::from(i), f64::from(j), 0.0));
            }
        }
        let mut faces = Vec::new();
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                let v = j * n + i;
                faces.push([v, v + 1, v + n + 1]);
                faces.push([v, v + n + 1, v + n]);
            }
        }
        ScanMesh::from_geometry(positions, faces).unwrap()
    }

    #[test]
    fn planar_scan_base_builds_spatial_index() {
        // 144 vertices on z = 0, twelve per x and y value.
        let mesh = grid(12);
        assert_eq!(mesh.spatial_index().len(), 144);
        assert_eq!(mesh.nearest_vertex(&Point3::new(7.2, 4.9, 1.0)), Some(5 * 12 + 7));
        let hits = mesh.nearest(&Point3::new(11.0, 11.0, 0.0), 3);
        assert_eq!(hits[0], (143, 0.0));
        assert_relative_eq!(hits[2].1, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn construction_builds_topology() {
        let mesh = grid(3);
        assert_eq!(mesh.vertex_count(), 9);
        assert_eq!(mesh.face_count(), 8);
        // Center vertex of a 3x3 grid with diagonal splits touches all others
        // except the two corners off its diagonal.
        assert_eq!(mesh.adjacency().neighbors(4).len(), 6);
        assert_eq!(mesh.incident_faces(4).len(), 6);
        assert_eq!(mesh.spatial_index().len(), 9);
    }

    #[test]
    fn bad_face_index_is_rejected() {
        let positions = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let result = ScanMesh::from_geometry(positions, vec![[0, 1, 2]]);
        assert!(matches!(
            result,
            Err(MeshError::InvalidFaceIndex {
                face: 0,
                index: 2,
                vertex_count: 2
            })
        ));
    }

    #[test]
    fn normal_count_mismatch_is_rejected() {
        let positions = vec![Point3::origin(); 3];
        let result = ScanMesh::new(positions, vec![Vector3::z()], vec![[0, 1, 2]]);
        assert!(matches!(result, Err(MeshError::NormalCountMismatch { .. })));
    }

    #[test]
    fn nearest_tracks_transform() {
        let mut mesh = grid(3);
        let before = mesh.nearest_vertex(&Point3::new(2.1, 2.1, 0.0));
        assert_eq!(before, Some(8));

        mesh.transform(&Matrix3::identity(), &Vector3::new(10.0, 0.0, 0.0));
        let after = mesh.nearest_vertex(&Point3::new(12.1, 2.1, 0.0));
        assert_eq!(after, Some(8));
        let hits = mesh.nearest(&Point3::new(10.0, 0.0, 0.0), 1);
        assert_eq!(hits[0].0, 0);
        assert_relative_eq!(hits[0].1, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn transform_rotates_normals_only() {
        let mut mesh = grid(2);
        let rotation = Matrix3::new(1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0);
        mesh.transform(&rotation, &Vector3::new(0.0, 0.0, 5.0));
        for n in mesh.normals() {
            assert_relative_eq!(n.y, -1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(mesh.positions()[0].z, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn centroid_of_grid() {
        let mesh = grid(3);
        let c = mesh.centroid();
        assert_relative_eq!(c.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(c.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn submesh_renumbers_in_first_seen_order() {
        let mesh = grid(3);
        let (sub, map) = mesh.submesh(&[7, 6]).unwrap();
        assert_eq!(sub.face_count(), 2);
        assert_eq!(sub.vertex_count(), 4);
        assert!(map.is_consistent());
        // Face 7 is [4, 8, 7] -> new 0, 1, 2; face 6 adds vertex 5.
        assert_eq!(sub.faces()[0], [0, 1, 2]);
        assert_eq!(map.inverse(), &[4, 8, 7, 5]);
        assert_eq!(map.new_index(0), None);
    }

    #[test]
    fn with_positions_keeps_topology() {
        let mesh = grid(3);
        let lifted: Vec<_> = mesh
            .positions()
            .iter()
            .map(|p| Point3::new(p.x, p.y, p.x))
            .collect();
        let moved = mesh.with_positions(lifted).unwrap();
        assert_eq!(moved.faces(), mesh.faces());
        assert_relative_eq!(moved.normals()[4].norm(), 1.0, epsilon = 1e-12);
        assert!(moved.normals()[4].x < 0.0);
        assert!(mesh.with_positions(Vec::new()).is_err());
    }

    #[test]
    fn empty_mesh() {
        let mesh = ScanMesh::empty();
        assert!(mesh.is_empty());
        assert!(mesh.nearest_vertex(&Point3::origin()).is_none());
        assert_eq!(mesh.centroid(), Point3::origin());
    }
}

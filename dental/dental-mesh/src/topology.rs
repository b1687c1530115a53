//! Vertex adjacency and triangle incidence.
//!
//! Both structures are derived purely from the face list and are rebuilt
//! whenever the face list changes. Neighbor order is the order in which
//! edges are first encountered while walking the faces, so two meshes with
//! the same face list always produce the same lists.

/// Vertex-to-vertex adjacency (one entry per shared edge).
#[derive(Debug, Clone, Default)]
pub struct AdjacencyList {
    neighbors: Vec<Vec<u32>>,
}

impl AdjacencyList {
    /// Build the adjacency of `vertex_count` vertices from a face list.
    ///
    /// Face indices must already be validated against `vertex_count`.
    #[must_use]
    pub fn from_faces(vertex_count: usize, faces: &[[u32; 3]]) -> Self {
        let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];

        for &[i0, i1, i2] in faces {
            Self::add_edge(&mut neighbors, i0, i1);
            Self::add_edge(&mut neighbors, i1, i2);
            Self::add_edge(&mut neighbors, i2, i0);
        }

        Self { neighbors }
    }

    fn add_edge(neighbors: &mut [Vec<u32>], v0: u32, v1: u32) {
        if v0 == v1 {
            return;
        }
        if !neighbors[v0 as usize].contains(&v1) {
            neighbors[v0 as usize].push(v1);
        }
        if !neighbors[v1 as usize].contains(&v0) {
            neighbors[v1 as usize].push(v0);
        }
    }

    /// Neighbors of a vertex. Empty for isolated or out-of-range vertices.
    #[inline]
    #[must_use]
    pub fn neighbors(&self, vertex: usize) -> &[u32] {
        self.neighbors.get(vertex).map_or(&[], Vec::as_slice)
    }

    /// Whether `a` and `b` share an edge.
    #[must_use]
    pub fn are_adjacent(&self, a: usize, b: usize) -> bool {
        u32::try_from(b).is_ok_and(|b| self.neighbors(a).contains(&b))
    }

    /// Number of vertices covered.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }
}

/// Vertex-to-triangle incidence.
#[derive(Debug, Clone, Default)]
pub struct IncidenceList {
    faces: Vec<Vec<u32>>,
}

impl IncidenceList {
    /// Build the incidence of `vertex_count` vertices from a face list.
    #[must_use]
    pub fn from_faces(vertex_count: usize, faces: &[[u32; 3]]) -> Self {
        let mut incident: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];

        for (face_idx, face) in faces.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let face_idx = face_idx as u32;
            for &v in face {
                let list = &mut incident[v as usize];
                if list.last() != Some(&face_idx) {
                    list.push(face_idx);
                }
            }
        }

        Self { faces: incident }
    }

    /// Faces containing a vertex.
    #[inline]
    #[must_use]
    pub fn faces(&self, vertex: usize) -> &[u32] {
        self.faces.get(vertex).map_or(&[], Vec::as_slice)
    }

    /// Number of vertices covered.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.faces.len()
    }
}

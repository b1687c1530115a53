//! Error types for mesh construction and index mapping.

use thiserror::Error;

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors that can occur while building or querying a [`ScanMesh`](crate::ScanMesh).
#[derive(Debug, Error)]
pub enum MeshError {
    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index} (mesh has {vertex_count} vertices)")]
    InvalidFaceIndex {
        /// Face that holds the bad index.
        face: usize,
        /// The out-of-range vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// Normals and positions are not parallel arrays.
    #[error("normal count {normals} does not match vertex count {vertices}")]
    NormalCountMismatch {
        /// Number of normals supplied.
        normals: usize,
        /// Number of vertices supplied.
        vertices: usize,
    },

    /// A per-vertex field does not match the vertex count it is defined over.
    #[error("field has {actual} values, expected {expected}")]
    FieldLengthMismatch {
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        actual: usize,
    },

    /// A vertex index is out of range.
    #[error("invalid vertex index: {index} (mesh has {vertex_count} vertices)")]
    InvalidVertex {
        /// The invalid index.
        index: usize,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// An index map is not a bijection between kept and new indices.
    #[error("inconsistent index map: {reason}")]
    InconsistentIndexMap {
        /// What is wrong with the map.
        reason: String,
    },

    /// A plane was requested with a zero-length normal.
    #[error("plane normal has zero length")]
    DegeneratePlane,
}

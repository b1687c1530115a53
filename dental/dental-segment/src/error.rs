//! Error types for tooth segmentation.

use dental_mesh::MeshError;
use thiserror::Error;

/// Result type for segmentation operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors that can occur during segmentation.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Degenerate configuration or input detected before heavy computation.
    ///
    /// Raised for zero-range normalization (a flat mesh), parallel or zero
    /// pose axes, an empty active vertex set, invalid parameters and
    /// out-of-range indices.
    #[error("precondition violated: {reason}")]
    PreconditionViolation {
        /// What was wrong.
        reason: String,
    },

    /// A sparse factorization failed or produced non-finite values.
    #[error("numerical failure: {reason}")]
    NumericalFailure {
        /// Solver diagnostic.
        reason: String,
    },

    /// A mesh edit left a mesh the following stages cannot work on.
    #[error("topology degeneracy: {reason}")]
    TopologyDegeneracy {
        /// What was left.
        reason: String,
    },

    /// Error from the mesh layer.
    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),
}

impl SegmentError {
    pub(crate) fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            reason: reason.into(),
        }
    }

    pub(crate) fn numerical(reason: impl Into<String>) -> Self {
        Self::NumericalFailure {
            reason: reason.into(),
        }
    }

    pub(crate) fn topology(reason: impl Into<String>) -> Self {
        Self::TopologyDegeneracy {
            reason: reason.into(),
        }
    }

    /// Whether this is a [`SegmentError::PreconditionViolation`].
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::PreconditionViolation { .. })
    }
}

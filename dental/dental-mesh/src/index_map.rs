//! Bidirectional vertex index maps produced by mesh mutation.
//!
//! When faces are removed from a mesh the surviving vertices are renumbered
//! densely. A [`VertexIndexMap`] records that renumbering in both
//! directions so per-vertex data computed on the old mesh can be carried to
//! the new one without recomputation.

use crate::error::{MeshError, MeshResult};

/// Old-to-new and new-to-old vertex index relation.
///
/// Invariants:
/// - every new index has exactly one old index;
/// - `forward[inverse[n]] == Some(n)` for every new index `n`;
/// - `inverse[forward[o]] == o` for every kept old index `o`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexIndexMap {
    forward: Vec<Option<usize>>,
    inverse: Vec<usize>,
}

impl VertexIndexMap {
    /// Identity map over `count` vertices.
    #[must_use]
    pub fn identity(count: usize) -> Self {
        Self {
            forward: (0..count).map(Some).collect(),
            inverse: (0..count).collect(),
        }
    }

    /// Build the map from its forward half.
    ///
    /// New indices must be dense (`0..k` each used exactly once).
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InconsistentIndexMap`] if a new index is used
    /// twice or the new indices leave a gap.
    pub fn from_forward(forward: Vec<Option<usize>>) -> MeshResult<Self> {
        let new_count = forward.iter().flatten().count();
        let mut inverse = vec![usize::MAX; new_count];

        for (old, new) in forward.iter().enumerate() {
            let Some(new) = *new else { continue };
            let slot = inverse.get_mut(new).ok_or_else(|| MeshError::InconsistentIndexMap {
                reason: format!("new index {new} out of range for {new_count} kept vertices"),
            })?;
            if *slot != usize::MAX {
                return Err(MeshError::InconsistentIndexMap {
                    reason: format!("new index {new} assigned to old {slot} and {old}"),
                });
            }
            *slot = old;
        }

        Ok(Self { forward, inverse })
    }

    /// Number of vertices before the mutation.
    #[inline]
    #[must_use]
    pub fn old_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of vertices after the mutation.
    #[inline]
    #[must_use]
    pub fn new_count(&self) -> usize {
        self.inverse.len()
    }

    /// New index of an old vertex, or `None` if it was removed.
    #[inline]
    #[must_use]
    pub fn new_index(&self, old: usize) -> Option<usize> {
        self.forward.get(old).copied().flatten()
    }

    /// Old index of a new vertex.
    #[inline]
    #[must_use]
    pub fn old_index(&self, new: usize) -> Option<usize> {
        self.inverse.get(new).copied()
    }

    /// The forward map (old → new).
    #[must_use]
    pub fn forward(&self) -> &[Option<usize>] {
        &self.forward
    }

    /// The inverse map (new → old).
    #[must_use]
    pub fn inverse(&self) -> &[usize] {
        &self.inverse
    }

    /// Carry a per-vertex field defined on the old mesh over to the new one.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::FieldLengthMismatch`] if `field` is not defined
    /// over exactly the old vertex set.
    pub fn remap_field<T: Copy>(&self, field: &[T]) -> MeshResult<Vec<T>> {
        if field.len() != self.forward.len() {
            return Err(MeshError::FieldLengthMismatch {
                expected: self.forward.len(),
                actual: field.len(),
            });
        }
        Ok(self.inverse.iter().map(|&old| field[old]).collect())
    }

    /// Map old indices to new ones, dropping removed vertices and
    /// duplicates while keeping first-seen order.
    #[must_use]
    pub fn map_indices(&self, old_indices: &[usize]) -> Vec<usize> {
        let mut seen = vec![false; self.inverse.len()];
        let mut mapped = Vec::new();
        for &old in old_indices {
            if let Some(new) = self.new_index(old) {
                if !seen[new] {
                    seen[new] = true;
                    mapped.push(new);
                }
            }
        }
        mapped
    }

    /// Compose two successive maps: `self` (A → B) then `next` (B → C).
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InconsistentIndexMap`] if `next` is not defined
    /// over the vertex set `self` produces.
    pub fn then(&self, next: &Self) -> MeshResult<Self> {
        if next.old_count() != self.new_count() {
            return Err(MeshError::InconsistentIndexMap {
                reason: format!(
                    "cannot chain a map over {} vertices after one producing {}",
                    next.old_count(),
                    self.new_count()
                ),
            });
        }
        let forward = self
            .forward
            .iter()
            .map(|new| new.and_then(|mid| next.new_index(mid)))
            .collect();
        Self::from_forward(forward)
    }

    /// Check that the two halves are mutual inverses.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let inverse_ok = self
            .inverse
            .iter()
            .enumerate()
            .all(|(new, &old)| self.new_index(old) == Some(new));
        let forward_ok = self
            .forward
            .iter()
            .enumerate()
            .all(|(old, new)| new.is_none_or(|n| self.old_index(n) == Some(old)));
        inverse_ok && forward_ok
    }
}

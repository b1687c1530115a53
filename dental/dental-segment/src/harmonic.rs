//! Harmonic field solve with point and boundary constraints.
//!
//! The field `x` over the vertices minimizes
//!
//! ```text
//! |L x|² + Σ_features (w x_f - b_f)² + Σ_boundary (w x_c - w/2)²
//! ```
//!
//! where `L` is the cotangent Laplacian (off-diagonals `-cot`, diagonal the
//! negated row sum) and `b_f` alternates between `0` and `w` along the
//! flattened feature list. The weight `w` scales both sides of a
//! constraint row, so feature points are pulled to 0 or 1 and cut-rim
//! vertices to 0.5. The level sets of the result approximate the
//! boundaries between teeth.
//!
//! A connected component with no feature or boundary vertex (a scan
//! fragment left above the cut) gets one extra rim-style row at its lowest
//! vertex, which holds the whole component at 0.5 without touching the
//! rest of the field.

use dental_mesh::ScanMesh;
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::curvature::min_max;
use crate::error::{SegmentError, SegmentResult};
use crate::operators::cotangent_laplacian;
use crate::params::HarmonicParams;
use crate::sparse::{CsrMatrix, solve_least_squares};

/// A named group of feature-point vertex indices belonging to one tooth.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ToothFeature {
    /// Tooth label.
    pub name: String,
    /// Vertex indices of the tooth's feature points.
    pub points: Vec<usize>,
}

impl ToothFeature {
    /// Create a tooth feature group.
    #[must_use]
    pub fn new(name: impl Into<String>, points: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Number of feature points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the group has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Whether the harmonic solve succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStatus {
    /// The system was solved.
    Solved,
    /// Factorization failed; the field is all zeros.
    Failed {
        /// Solver diagnostic.
        reason: String,
    },
}

/// Output of [`solve_harmonic_field`].
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicField {
    /// One value per vertex, nominally in `[0, 1]`.
    pub values: Vec<f64>,
    /// Solve outcome.
    pub status: SolveStatus,
    /// Rows in the least-squares system.
    pub rows: usize,
    /// Constraint weight `w` used.
    pub constraint_weight: f64,
    /// Lowest vertex of every component that had no constraint and was
    /// held at [`HarmonicField::MID_VALUE`].
    pub pinned: Vec<usize>,
}

impl HarmonicField {
    /// The value the cut rim is anchored to.
    pub const MID_VALUE: f64 = 0.5;

    /// Whether the solve succeeded.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.status == SolveStatus::Solved
    }

    /// Whether some component had to be pinned to the mid value.
    #[must_use]
    pub fn has_pinned_components(&self) -> bool {
        !self.pinned.is_empty()
    }
}

/// Right-hand side of the `k`-th feature row in the flattened feature list.
#[inline]
#[must_use]
pub fn feature_target(k: usize, weight: f64) -> f64 {
    if k % 2 == 0 { 0.0 } else { weight }
}

/// Assemble the over-determined system `A x ≈ b`.
///
/// Rows are ordered: one Laplacian row per vertex, then one row per
/// feature point (flattened in group order), then one row per boundary
/// vertex.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] if a feature or
/// boundary index is out of range.
pub fn build_harmonic_system(
    mesh: &ScanMesh,
    features: &[ToothFeature],
    boundary: &[usize],
    weight: f64,
) -> SegmentResult<(CsrMatrix, Vec<f64>)> {
    let n = mesh.vertex_count();
    let laplacian = cotangent_laplacian(mesh, mesh.positions(), -1.0)?;

    let flat: Vec<usize> = features.iter().flat_map(|t| t.points.iter().copied()).collect();
    if let Some(&bad) = flat.iter().chain(boundary).find(|&&v| v >= n) {
        return Err(SegmentError::precondition(format!(
            "constraint vertex {bad} out of range for {n} vertices"
        )));
    }

    let rows = n + flat.len() + boundary.len();
    let mut triplets = Vec::with_capacity(laplacian.nnz() + flat.len() + boundary.len());
    for i in 0..n {
        triplets.extend(laplacian.row(i).map(|(j, v)| (i, j, v)));
    }
    let mut rhs = vec![0.0; rows];

    for (k, &v) in flat.iter().enumerate() {
        triplets.push((n + k, v, weight));
        rhs[n + k] = feature_target(k, weight);
    }
    let offset = n + flat.len();
    for (k, &v) in boundary.iter().enumerate() {
        triplets.push((offset + k, v, weight));
        rhs[offset + k] = 0.5 * weight;
    }

    Ok((CsrMatrix::from_triplets(rows, n, &triplets)?, rhs))
}

/// Solve the harmonic field on `mesh`.
///
/// `curvature`, when given, must have one entry per vertex; it is an
/// auxiliary signal and does not enter the system. Zero feature points or
/// zero boundary vertices are allowed; the solve runs with whatever
/// constraints exist. Components without any constraint are held at
/// [`HarmonicField::MID_VALUE`] and listed in [`HarmonicField::pinned`].
/// If the system still cannot be factorized the field is all zeros and the
/// status records the failure.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] for invalid params, a
/// curvature length mismatch, or out-of-range constraint indices.
pub fn solve_harmonic_field(
    mesh: &ScanMesh,
    curvature: Option<&[f64]>,
    features: &[ToothFeature],
    boundary: &[usize],
    params: &HarmonicParams,
) -> SegmentResult<HarmonicField> {
    params.validate()?;
    if let Some(c) = curvature {
        if c.len() != mesh.vertex_count() {
            return Err(SegmentError::precondition(format!(
                "curvature has {} entries for {} vertices",
                c.len(),
                mesh.vertex_count()
            )));
        }
        if let Some((lo, hi)) = min_max(c.iter().copied()) {
            debug!(min = lo, max = hi, "Curvature on harmonic domain");
        }
    }

    let w = params.constraint_weight;
    let n = mesh.vertex_count();
    let constrained: Vec<usize> = features
        .iter()
        .flat_map(|t| t.points.iter().copied())
        .chain(boundary.iter().copied())
        .collect();
    if let Some(&bad) = constrained.iter().find(|&&v| v >= n) {
        return Err(SegmentError::precondition(format!(
            "constraint vertex {bad} out of range for {n} vertices"
        )));
    }

    let pinned = unconstrained_components(mesh, &constrained);
    if !pinned.is_empty() {
        warn!(
            components = pinned.len(),
            first = pinned[0],
            "Unconstrained components held at the mid value"
        );
    }
    let anchors: Vec<usize> = boundary.iter().chain(&pinned).copied().collect();

    let (a, b) = build_harmonic_system(mesh, features, &anchors, w)?;
    info!(
        vertices = n,
        feature_rows = constrained.len() - boundary.len(),
        boundary_rows = boundary.len(),
        pinned_rows = pinned.len(),
        nnz = a.nnz(),
        "Solving harmonic field"
    );
    let solved = solve_least_squares(&a, &b);

    let (values, status) = match solved {
        Ok(values) => (values, SolveStatus::Solved),
        Err(SegmentError::NumericalFailure { reason }) => {
            warn!(%reason, "Harmonic solve failed; substituting zero field");
            (vec![0.0; n], SolveStatus::Failed { reason })
        }
        Err(SegmentError::PreconditionViolation { reason }) if n == 0 => {
            warn!(%reason, "Harmonic solve on an empty mesh");
            (Vec::new(), SolveStatus::Failed { reason })
        }
        Err(e) => return Err(e),
    };

    Ok(HarmonicField {
        values,
        status,
        rows: a.rows(),
        constraint_weight: w,
        pinned,
    })
}

/// Lowest vertex of each connected component that no constraint reaches.
///
/// The Laplacian is blind to constant offsets per component, so each of
/// these needs a row of its own to keep the system full rank.
fn unconstrained_components(mesh: &ScanMesh, constrained: &[usize]) -> Vec<usize> {
    let adjacency = mesh.adjacency();
    let mut reached = vec![false; mesh.vertex_count()];
    let flood = |seeds: &[usize], reached: &mut [bool]| {
        let mut stack = Vec::new();
        for &v in seeds {
            if !reached[v] {
                reached[v] = true;
                stack.push(v);
            }
        }
        while let Some(v) = stack.pop() {
            for &u in adjacency.neighbors(v) {
                let u = u as usize;
                if !reached[u] {
                    reached[u] = true;
                    stack.push(u);
                }
            }
        }
    };

    flood(constrained, &mut reached);
    let mut pinned = Vec::new();
    for v in 0..reached.len() {
        if !reached[v] {
            pinned.push(v);
            flood(&[v], &mut reached);
        }
    }
    pinned
}

/// Like [`solve_harmonic_field`] but returns the failure instead of a zero
/// field.
///
/// # Errors
///
/// As [`solve_harmonic_field`], plus [`SegmentError::NumericalFailure`]
/// when the solve fails.
pub fn solve_harmonic_field_strict(
    mesh: &ScanMesh,
    curvature: Option<&[f64]>,
    features: &[ToothFeature],
    boundary: &[usize],
    params: &HarmonicParams,
) -> SegmentResult<HarmonicField> {
    let field = solve_harmonic_field(mesh, curvature, features, boundary, params)?;
    match field.status {
        SolveStatus::Solved => Ok(field),
        SolveStatus::Failed { reason } => Err(SegmentError::numerical(reason)),
    }
}

//! Cusp feature extraction: local maxima seeded mode-seeking clustering.
//!
//! Candidate cusps are the local maxima of the combined weight field over
//! the active vertices. The strongest fraction of them seed particles that
//! climb the weight field: each iteration moves every particle to the
//! highest-weight active vertex within `2h` of it. This is a winner-take-all
//! mode estimate rather than a kernel-weighted mean. Converged particles
//! that lie close together are merged and the survivors snapped to mesh
//! vertices.

use dental_mesh::{Aabb, ScanMesh, SpatialIndex};
use hashbrown::HashSet;
use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{SegmentError, SegmentResult};
use crate::params::CuspDetectionParams;

/// Detected cusp features and clustering statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    /// Feature vertex indices, strongest seed first.
    pub vertices: Vec<usize>,
    /// Local maxima found before pruning.
    pub maxima: usize,
    /// Particles seeded for mean-shift.
    pub particles: usize,
    /// Mean-shift iterations run.
    pub iterations: usize,
    /// Whether the total shift fell below the threshold before the
    /// iteration limit.
    pub converged: bool,
    /// Surviving clusters dropped because they snapped to a vertex another
    /// cluster already holds.
    pub snapped_duplicates: usize,
}

impl FeatureSet {
    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether no feature was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl std::fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} features from {} maxima ({} particles, {} iterations{})",
            self.vertices.len(),
            self.maxima,
            self.particles,
            self.iterations,
            if self.converged { ", converged" } else { "" }
        )
    }
}

/// Active vertices whose weight no neighbor exceeds, strongest first.
///
/// A single strictly greater neighbor disqualifies a vertex; equal
/// neighbors do not, so plateaus yield several maxima. Ties in weight keep
/// ascending vertex order.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] if `weights` or `active`
/// do not have one entry per vertex.
pub fn find_local_maxima(
    mesh: &ScanMesh,
    weights: &[f64],
    active: &[bool],
) -> SegmentResult<Vec<usize>> {
    check_vertex_fields(mesh, weights, active)?;
    let mut maxima: Vec<usize> = (0..mesh.vertex_count())
        .filter(|&i| active[i])
        .filter(|&i| {
            mesh.adjacency()
                .neighbors(i)
                .iter()
                .all(|&j| weights[j as usize] <= weights[i])
        })
        .collect();
    maxima.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));
    Ok(maxima)
}

fn check_vertex_fields(mesh: &ScanMesh, weights: &[f64], active: &[bool]) -> SegmentResult<()> {
    if weights.len() != mesh.vertex_count() || active.len() != mesh.vertex_count() {
        return Err(SegmentError::precondition(format!(
            "{} weights and {} mask entries for {} vertices",
            weights.len(),
            active.len(),
            mesh.vertex_count()
        )));
    }
    Ok(())
}

/// Number of maxima kept as particles: `round(frac * count)` clamped to
/// `[1, count]`, or zero when there are no maxima.
#[must_use]
pub fn particle_count(maxima: usize, frac: f64) -> usize {
    if maxima == 0 {
        return 0;
    }
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let wanted = (frac * maxima as f64).round() as usize;
    wanted.clamp(1, maxima)
}

/// Outcome of [`mean_shift`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeanShiftResult {
    /// Final particle positions, in seed order.
    pub positions: Vec<Point3<f64>>,
    /// Iterations run.
    pub iterations: usize,
    /// Whether the shift threshold was reached.
    pub converged: bool,
}

/// Mode-seeking iteration over a weighted point set.
///
/// `points` and `weights` are the candidate vertices (typically the active
/// ones). Each iteration queries all points within `radius` of every
/// particle and moves the particle to the one with the greatest weight;
/// the nearest wins ties. Iteration stops once the summed displacement of
/// one iteration is below `min_total_shift` or after `max_iterations`.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] if `points` and
/// `weights` differ in length.
pub fn mean_shift(
    points: &[Point3<f64>],
    weights: &[f64],
    seeds: Vec<Point3<f64>>,
    radius: f64,
    max_iterations: usize,
    min_total_shift: f64,
) -> SegmentResult<MeanShiftResult> {
    if points.len() != weights.len() {
        return Err(SegmentError::precondition(format!(
            "{} points but {} weights",
            points.len(),
            weights.len()
        )));
    }
    let index = SpatialIndex::from_points(points);

    let mut positions = seeds;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        let moved: Vec<(Point3<f64>, f64)> = positions
            .par_iter()
            .map(|p| {
                let target = index
                    .within(p, radius)
                    .into_iter()
                    .fold(None::<(usize, f64)>, |best, (i, _)| match best {
                        Some((_, w)) if weights[i] <= w => best,
                        _ => Some((i, weights[i])),
                    })
                    .map_or(*p, |(i, _)| points[i]);
                (target, (target - p).norm())
            })
            .collect();

        iterations += 1;
        let total_shift: f64 = moved.iter().map(|(_, d)| d).sum();
        positions = moved.into_iter().map(|(p, _)| p).collect();
        debug!(iteration = iterations, total_shift, "Mean-shift iteration");

        if total_shift < min_total_shift {
            converged = true;
            break;
        }
    }

    Ok(MeanShiftResult {
        positions,
        iterations,
        converged,
    })
}

/// Indices of the particles that survive merging.
///
/// Walking in order, each particle not yet merged absorbs every later or
/// earlier particle within `distance` that is not merged either.
#[must_use]
pub fn collapse_particles(positions: &[Point3<f64>], distance: f64) -> Vec<usize> {
    let mut merged = vec![false; positions.len()];
    for i in 0..positions.len() {
        if merged[i] {
            continue;
        }
        for j in 0..positions.len() {
            if i != j && !merged[j] && (positions[i] - positions[j]).norm() < distance {
                merged[j] = true;
            }
        }
    }
    (0..positions.len()).filter(|&i| !merged[i]).collect()
}

/// Detect cusp features on `mesh`.
///
/// Runs local-maximum search over the active vertices, seeds mean-shift
/// with the strongest `ms_frac` of the maxima, merges particles closer than
/// `ms_ft_collapse_dist` of the active bounding-box diagonal and snaps the
/// survivors to their nearest mesh vertex. Zero maxima give an empty set.
///
/// Each vertex appears at most once. When two surviving clusters snap to
/// the same vertex only the first (stronger seed) is kept and the drop is
/// counted in [`FeatureSet::snapped_duplicates`]; a repeated vertex would
/// otherwise receive both a low and a high harmonic target.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] if `weights` or `active`
/// do not have one entry per vertex or the params are invalid.
pub fn extract_features(
    mesh: &ScanMesh,
    weights: &[f64],
    active: &[bool],
    params: &CuspDetectionParams,
) -> SegmentResult<FeatureSet> {
    params.validate()?;
    let maxima = find_local_maxima(mesh, weights, active)?;
    let particles = particle_count(maxima.len(), params.ms_frac);
    if particles == 0 {
        warn!("No local maxima among active vertices; no features extracted");
        return Ok(FeatureSet::default());
    }

    let active_indices: Vec<usize> = (0..mesh.vertex_count()).filter(|&i| active[i]).collect();
    let active_points: Vec<Point3<f64>> = active_indices
        .iter()
        .map(|&i| mesh.positions()[i])
        .collect();
    let active_weights: Vec<f64> = active_indices.iter().map(|&i| weights[i]).collect();

    let diagonal = Aabb::from_points(active_points.iter()).diagonal();
    let window = params.ms_window_size * diagonal;
    let seeds = maxima[..particles]
        .iter()
        .map(|&i| mesh.positions()[i])
        .collect();

    let shifted = mean_shift(
        &active_points,
        &active_weights,
        seeds,
        2.0 * window,
        params.ms_max_iterations,
        params.ms_min_total_shift,
    )?;

    let survivors = collapse_particles(&shifted.positions, params.ms_ft_collapse_dist * diagonal);

    let survivor_points: Vec<Point3<f64>> =
        survivors.iter().map(|&s| shifted.positions[s]).collect();
    let (vertices, snapped_duplicates) = snap_to_vertices(mesh, &survivor_points);
    if snapped_duplicates > 0 {
        debug!(snapped_duplicates, "Clusters shared a snapped vertex");
    }

    let features = FeatureSet {
        vertices,
        maxima: maxima.len(),
        particles,
        iterations: shifted.iterations,
        converged: shifted.converged,
        snapped_duplicates,
    };
    info!(
        features = features.len(),
        maxima = features.maxima,
        particles,
        iterations = features.iterations,
        converged = features.converged,
        window,
        "Extracted cusp features"
    );
    Ok(features)
}

/// Nearest vertex of each point in order, first occurrence only, and the
/// number of points whose vertex was already taken.
fn snap_to_vertices(mesh: &ScanMesh, points: &[Point3<f64>]) -> (Vec<usize>, usize) {
    let mut seen = HashSet::with_capacity(points.len());
    let mut vertices = Vec::with_capacity(points.len());
    let mut duplicates = 0;
    for p in points {
        let Some(v) = mesh.nearest_vertex(p) else {
            continue;
        };
        if seen.insert(v) {
            vertices.push(v);
        } else {
            duplicates += 1;
        }
    }
    (vertices, duplicates)
}

//! Cusp-likeness weights from curvature and height.

use tracing::info;

use crate::curvature::min_max;
use crate::error::{SegmentError, SegmentResult};
use crate::params::CuspDetectionParams;

/// Combine curvature and height into one cusp-likeness weight per vertex.
///
/// Each channel is min–max normalized over the active vertices, zeroed on
/// inactive vertices, clamped at zero, raised to its exponent and
/// normalized over the active vertices again. The blend then raises each
/// channel to its exponent a second time:
///
/// ```text
/// w = (1 - alpha) * max(cw, 0)^curve_exp + alpha * max(hw, 0)^height_exp
/// ```
///
/// and the result is min–max normalized over all vertices, so the output
/// lies in `[0, 1]` with inactive vertices at or near zero.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] if the slices differ in
/// length, no vertex is active, or curvature or height is constant over the
/// active vertices.
pub fn combine_weights(
    curvature: &[f64],
    heights: &[f64],
    active: &[bool],
    params: &CuspDetectionParams,
) -> SegmentResult<Vec<f64>> {
    if curvature.len() != active.len() || heights.len() != active.len() {
        return Err(SegmentError::precondition(format!(
            "field lengths differ: curvature {}, heights {}, mask {}",
            curvature.len(),
            heights.len(),
            active.len()
        )));
    }
    if !active.contains(&true) {
        return Err(SegmentError::precondition("no active vertices to weight"));
    }

    let curve = channel_weight("curvature", curvature, active, params.curve_exp)?;
    let height = channel_weight("height", heights, active, params.height_exp)?;

    let blended: Vec<f64> = curve
        .iter()
        .zip(&height)
        .map(|(&c, &h)| {
            (1.0 - params.alpha) * c.max(0.0).powf(params.curve_exp)
                + params.alpha * h.max(0.0).powf(params.height_exp)
        })
        .collect();

    let weights = normalize_over("combined weight", &blended, |_| true)?;

    info!(
        vertices = weights.len(),
        alpha = params.alpha,
        curve_exp = params.curve_exp,
        height_exp = params.height_exp,
        "Combined feature weights"
    );
    Ok(weights)
}

/// First normalization stage of one channel: normalize, mask, clamp, power,
/// normalize.
fn channel_weight(
    name: &str,
    values: &[f64],
    active: &[bool],
    exponent: f64,
) -> SegmentResult<Vec<f64>> {
    let normalized = normalize_over(name, values, |i| active[i])?;
    let powered: Vec<f64> = normalized
        .iter()
        .zip(active)
        .map(|(&v, &a)| if a { v.max(0.0).powf(exponent) } else { 0.0 })
        .collect();
    normalize_over(name, &powered, |i| active[i])
}

/// Min–max normalize `values` using the range over indices selected by
/// `include`.
fn normalize_over(
    name: &str,
    values: &[f64],
    include: impl Fn(usize) -> bool,
) -> SegmentResult<Vec<f64>> {
    let selected = values
        .iter()
        .enumerate()
        .filter(|&(i, _)| include(i))
        .map(|(_, &v)| v);
    let (min, max) = min_max(selected)
        .ok_or_else(|| SegmentError::precondition(format!("no values to normalize {name}")))?;
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return Err(SegmentError::precondition(format!(
            "{name} range over active vertices is zero"
        )));
    }
    Ok(values.iter().map(|v| (v - min) / range).collect())
}

//! Jet colormap for scalar fields.

use crate::curvature::min_max;

/// RGB color with channels in `[0, 1]`.
pub type Rgb = [f64; 3];

/// Map one value in `[0, 1]` to the jet palette (blue, cyan, yellow, red).
///
/// Values outside the unit interval are clamped.
#[must_use]
pub fn jet_color(t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let ramp = |center: f64| (1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0);
    [ramp(3.0), ramp(2.0), ramp(1.0)]
}

/// Color a per-vertex field with the jet palette.
///
/// With `normalize`, values are first min–max scaled to `[0, 1]`; a
/// constant field maps to the bottom of the palette. Without it, values
/// are assumed to already lie in `[0, 1]`.
#[must_use]
pub fn jet(values: &[f64], normalize: bool) -> Vec<Rgb> {
    let scale = if normalize {
        min_max(values.iter().copied().filter(|v| v.is_finite()))
            .filter(|(lo, hi)| hi > lo)
            .map(|(lo, hi)| (lo, hi - lo))
    } else {
        None
    };
    values
        .iter()
        .map(|&v| match (normalize, scale) {
            (true, Some((lo, range))) => jet_color((v - lo) / range),
            (true, None) => jet_color(0.0),
            (false, _) => jet_color(v),
        })
        .collect()
}

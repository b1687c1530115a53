//! Parameters for tooth segmentation.

use dental_mesh::{MeshResult, Plane};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SegmentError, SegmentResult};

/// Parameters for cusp detection: curvature smoothing, feature weighting
/// and mean-shift clustering.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CuspDetectionParams {
    /// Number of explicit Laplacian smoothing steps before curvature is
    /// measured. Default: 3
    pub smoothing_steps: usize,

    /// Step size of each smoothing step. Default: 0.01
    pub smoothing_step_size: f64,

    /// Normalized height (0 at the lowest vertex, 1 at the highest) a vertex
    /// must exceed along the up axis to be considered. Default: 0.5
    pub min_feature_height: f64,

    /// Blend between curvature weight (0) and height weight (1). Default: 0.5
    pub alpha: f64,

    /// Exponent applied to the curvature weight. Default: 2.0
    pub curve_exp: f64,

    /// Exponent applied to the height weight. Default: 2.0
    pub height_exp: f64,

    /// Mean-shift window as a fraction of the active bounding-box diagonal.
    /// Default: 0.02
    pub ms_window_size: f64,

    /// Maximum mean-shift iterations. Default: 50
    pub ms_max_iterations: usize,

    /// Mean-shift stops once the summed particle displacement of one
    /// iteration falls below this. Default: 1e-3
    pub ms_min_total_shift: f64,

    /// Particles closer than this fraction of the active bounding-box
    /// diagonal are merged. Default: 0.01
    pub ms_ft_collapse_dist: f64,

    /// Curvature values with a z-score above this are clamped to the mean.
    /// Default: 3.0
    pub max_zscore: f64,

    /// Fraction of the strongest local maxima used as mean-shift particles.
    /// Default: 0.5
    pub ms_frac: f64,
}

impl Default for CuspDetectionParams {
    fn default() -> Self {
        Self {
            smoothing_steps: 3,
            smoothing_step_size: 0.01,
            min_feature_height: 0.5,
            alpha: 0.5,
            curve_exp: 2.0,
            height_exp: 2.0,
            ms_window_size: 0.02,
            ms_max_iterations: 50,
            ms_min_total_shift: 1e-3,
            ms_ft_collapse_dist: 0.01,
            max_zscore: 3.0,
            ms_frac: 0.5,
        }
    }
}

impl CuspDetectionParams {
    /// Params that keep more candidates: a lower height cut, every local
    /// maximum seeded, and a looser outlier threshold.
    #[must_use]
    pub fn sensitive() -> Self {
        Self {
            min_feature_height: 0.3,
            max_zscore: 4.0,
            ms_frac: 1.0,
            ..Default::default()
        }
    }

    /// Params that measure curvature on the raw scan.
    #[must_use]
    pub fn unsmoothed() -> Self {
        Self {
            smoothing_steps: 0,
            ..Default::default()
        }
    }

    /// Set the smoothing iteration count and step size.
    #[must_use]
    pub const fn with_smoothing(mut self, steps: usize, step_size: f64) -> Self {
        self.smoothing_steps = steps;
        self.smoothing_step_size = step_size;
        self
    }

    /// Set the minimum normalized feature height.
    #[must_use]
    pub const fn with_min_feature_height(mut self, height: f64) -> Self {
        self.min_feature_height = height;
        self
    }

    /// Set the curvature/height blend.
    #[must_use]
    pub const fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the curvature and height exponents.
    #[must_use]
    pub const fn with_exponents(mut self, curve_exp: f64, height_exp: f64) -> Self {
        self.curve_exp = curve_exp;
        self.height_exp = height_exp;
        self
    }

    /// Set the mean-shift window fraction.
    #[must_use]
    pub const fn with_window_size(mut self, window: f64) -> Self {
        self.ms_window_size = window;
        self
    }

    /// Set the z-score outlier threshold.
    #[must_use]
    pub const fn with_max_zscore(mut self, zscore: f64) -> Self {
        self.max_zscore = zscore;
        self
    }

    /// Set the fraction of local maxima used as particles.
    #[must_use]
    pub const fn with_ms_frac(mut self, frac: f64) -> Self {
        self.ms_frac = frac;
        self
    }

    /// Check every field for a usable value.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::PreconditionViolation`] naming the first bad
    /// field.
    pub fn validate(&self) -> SegmentResult<()> {
        non_negative("smoothing_step_size", self.smoothing_step_size)?;
        unit_interval("min_feature_height", self.min_feature_height)?;
        unit_interval("alpha", self.alpha)?;
        positive("curve_exp", self.curve_exp)?;
        positive("height_exp", self.height_exp)?;
        positive("ms_window_size", self.ms_window_size)?;
        non_negative("ms_min_total_shift", self.ms_min_total_shift)?;
        non_negative("ms_ft_collapse_dist", self.ms_ft_collapse_dist)?;
        positive("max_zscore", self.max_zscore)?;
        unit_interval("ms_frac", self.ms_frac)?;
        Ok(())
    }
}

/// The plane that separates the dental arch from the gum and scan base.
///
/// Given in the canonical frame (Y up). Faces entirely on the normal side
/// are kept.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CutPlaneParams {
    /// Plane normal; need not be unit length.
    pub normal: Vector3<f64>,
    /// A point on the plane.
    pub point: Point3<f64>,
}

impl Default for CutPlaneParams {
    fn default() -> Self {
        Self {
            normal: Vector3::new(0.0, 1.0, -0.05),
            point: Point3::new(0.0, -3.0, 0.0),
        }
    }
}

impl CutPlaneParams {
    /// Plane through `point` with normal `normal`.
    #[must_use]
    pub const fn new(normal: Vector3<f64>, point: Point3<f64>) -> Self {
        Self { normal, point }
    }

    /// Build the oriented plane.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal is zero.
    pub fn to_plane(&self) -> MeshResult<Plane> {
        Plane::new(self.point, self.normal)
    }
}

/// Parameters for the harmonic field solve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HarmonicParams {
    /// Weight of each point and boundary constraint row relative to the
    /// Laplacian rows. Odd feature points are pinned to this value, even
    /// ones to zero, and the cut rim to half of it. Default: 1000.0
    pub constraint_weight: f64,
}

impl Default for HarmonicParams {
    fn default() -> Self {
        Self {
            constraint_weight: 1000.0,
        }
    }
}

impl HarmonicParams {
    /// Set the constraint weight.
    #[must_use]
    pub const fn with_constraint_weight(mut self, weight: f64) -> Self {
        self.constraint_weight = weight;
        self
    }

    /// Check the constraint weight.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::PreconditionViolation`] unless the weight is
    /// positive and finite.
    pub fn validate(&self) -> SegmentResult<()> {
        positive("constraint_weight", self.constraint_weight)
    }
}

/// Parameters for splitting the harmonic field into tooth regions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionParams {
    /// Half-width of the neutral band around the mid value, as a fraction
    /// of the constraint weight. Vertices below `0.5 - band` are low, above
    /// `0.5 + band` high. Default: 0.25
    pub band: f64,

    /// Regions with fewer faces are discarded. Default: 1
    pub min_faces: usize,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            band: 0.25,
            min_faces: 1,
        }
    }
}

impl RegionParams {
    /// Set the neutral band half-width.
    #[must_use]
    pub const fn with_band(mut self, band: f64) -> Self {
        self.band = band;
        self
    }

    /// Set the minimum region size in faces.
    #[must_use]
    pub const fn with_min_faces(mut self, min_faces: usize) -> Self {
        self.min_faces = min_faces;
        self
    }

    /// Check the band lies in `[0, 0.5)`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::PreconditionViolation`] otherwise.
    pub fn validate(&self) -> SegmentResult<()> {
        if !(self.band.is_finite() && (0.0..0.5).contains(&self.band)) {
            return Err(SegmentError::precondition(format!(
                "band must lie in [0, 0.5), got {}",
                self.band
            )));
        }
        Ok(())
    }
}

/// All parameters of one segmentation run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentationParams {
    /// Cusp detection.
    pub cusp: CuspDetectionParams,
    /// Cut plane in the canonical frame.
    pub cut_plane: CutPlaneParams,
    /// Harmonic field solve.
    pub harmonic: HarmonicParams,
    /// Tooth region extraction.
    pub regions: RegionParams,
    /// Hand intermediate state to the observer after each stage.
    pub visualize_steps: bool,
}

impl SegmentationParams {
    /// Set the cusp detection params.
    #[must_use]
    pub fn with_cusp(mut self, cusp: CuspDetectionParams) -> Self {
        self.cusp = cusp;
        self
    }

    /// Set the cut plane.
    #[must_use]
    pub const fn with_cut_plane(mut self, cut_plane: CutPlaneParams) -> Self {
        self.cut_plane = cut_plane;
        self
    }

    /// Set the harmonic constraint weight.
    #[must_use]
    pub const fn with_constraint_weight(mut self, weight: f64) -> Self {
        self.harmonic.constraint_weight = weight;
        self
    }

    /// Set the region params.
    #[must_use]
    pub const fn with_regions(mut self, regions: RegionParams) -> Self {
        self.regions = regions;
        self
    }

    /// Enable or disable observer checkpoints.
    #[must_use]
    pub const fn with_visualize_steps(mut self, visualize: bool) -> Self {
        self.visualize_steps = visualize;
        self
    }

    /// Validate every nested parameter set.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> SegmentResult<()> {
        self.cusp.validate()?;
        self.harmonic.validate()?;
        self.regions.validate()?;
        let normal = self.cut_plane.normal;
        if !normal.iter().all(|c| c.is_finite()) || normal.norm() <= f64::EPSILON {
            return Err(SegmentError::precondition(
                "cut plane normal must be finite and non-zero",
            ));
        }
        Ok(())
    }
}

fn non_negative(name: &str, value: f64) -> SegmentResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SegmentError::precondition(format!(
            "{name} must be finite and non-negative, got {value}"
        )))
    }
}

fn positive(name: &str, value: f64) -> SegmentResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SegmentError::precondition(format!(
            "{name} must be finite and positive, got {value}"
        )))
    }
}

fn unit_interval(name: &str, value: f64) -> SegmentResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SegmentError::precondition(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = CuspDetectionParams::default();
        assert_eq!(params.smoothing_steps, 3);
        assert!((params.min_feature_height - 0.5).abs() < 1e-12);
        assert_eq!(params.ms_max_iterations, 50);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        assert!(CuspDetectionParams::sensitive().validate().is_ok());
        assert_eq!(CuspDetectionParams::unsmoothed().smoothing_steps, 0);
        assert!(SegmentationParams::default().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let params = CuspDetectionParams::default()
            .with_smoothing(5, 0.02)
            .with_alpha(0.25)
            .with_exponents(1.0, 3.0)
            .with_ms_frac(1.0);
        assert_eq!(params.smoothing_steps, 5);
        assert!((params.alpha - 0.25).abs() < 1e-12);
        assert!((params.height_exp - 3.0).abs() < 1e-12);
        assert!((params.ms_frac - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let err = CuspDetectionParams::default().with_alpha(1.5).validate();
        assert!(matches!(err, Err(SegmentError::PreconditionViolation { .. })));

        let err = CuspDetectionParams::default().with_ms_frac(f64::NAN).validate();
        assert!(err.is_err());
    }

    #[test]
    fn test_non_positive_exponent_rejected() {
        let err = CuspDetectionParams::default()
            .with_exponents(0.0, 2.0)
            .validate();
        assert!(err.is_err());
    }

    #[test]
    fn test_default_cut_plane() {
        let plane = CutPlaneParams::default().to_plane();
        assert!(plane.is_ok());
        if let Ok(plane) = plane {
            assert!((plane.normal.norm() - 1.0).abs() < 1e-12);
            assert!(plane.normal.y > 0.99);
            assert!(plane.normal.z < 0.0);
        }
    }

    #[test]
    fn test_zero_cut_normal_rejected() {
        let params = SegmentationParams::default()
            .with_cut_plane(CutPlaneParams::new(Vector3::zeros(), Point3::origin()));
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_harmonic_weight() {
        assert!(HarmonicParams::default().validate().is_ok());
        assert!(
            HarmonicParams::default()
                .with_constraint_weight(-1.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_region_band() {
        assert!(RegionParams::default().validate().is_ok());
        assert!(RegionParams::default().with_band(0.5).validate().is_err());
    }
}

//! Pipeline configuration.
//!
//! [`TriangulationSettings`] toggles every stage of the
//! [`Triangulator`](crate::core::triangulator::Triangulator) and carries the
//! numeric limits each stage needs. Settings are plain data: they serialize
//! with serde and can be assembled through [`TriangulationSettingsBuilder`].
//!
//! # Examples
//!
//! ```
//! use cdt_mesher::core::settings::TriangulationSettingsBuilder;
//!
//! let settings = TriangulationSettingsBuilder::default()
//!     .refine_mesh(true)
//!     .auto_holes_and_boundary(true)
//!     .build()
//!     .unwrap();
//! assert!(settings.refine_mesh);
//! assert_eq!(settings.sloan_max_iters, 1_000_000);
//! ```

use serde::{Deserialize, Serialize};

use crate::core::algorithms::alpha_shape::AlphaShapeSettings;
use crate::core::algorithms::refinement::RefinementThresholds;
use crate::core::preprocessing::Preprocessor;
use crate::core::validation::ValidationChecks;

/// Settings for one triangulation run.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(default, build_fn(validate = "Self::validate"))]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct TriangulationSettings {
    /// Run the input checks before building.
    pub validate_input: bool,
    /// Which input checks run.
    pub validation_checks: ValidationChecks,
    /// Log every failing input check, not only the first.
    pub verbose: bool,
    /// Conditioning transform applied to positions and hole seeds.
    pub preprocessor: Preprocessor,
    /// Remove triangles outside the constrained boundary.
    ///
    /// Only triangles reachable from the convex hull across unconstrained
    /// edges go, so an unseeded constrained hole stays filled: a square
    /// framed inside a square keeps 10 triangles. Pass a hole seed, or use
    /// `auto_holes_and_boundary`, to clear the hole as well (8 triangles).
    pub restore_boundary: bool,
    /// Detect holes and boundary from constraint nesting; hole seeds and
    /// `restore_boundary` are ignored.
    pub auto_holes_and_boundary: bool,
    /// Run Ruppert refinement.
    pub refine_mesh: bool,
    /// Quality bounds for refinement, in input units.
    pub refinement_thresholds: RefinementThresholds,
    /// Base length for concentric-shell segment splits.
    pub concentric_shells_parameter: f64,
    /// Flip budget per constraint during restoration, and for the
    /// legalization that follows each restored constraint.
    pub sloan_max_iters: usize,
    /// Refinement stops with an error beyond this many triangles.
    pub refinement_max_triangles: usize,
    /// Run the alpha-shape filter.
    pub use_alpha_shape_filter: bool,
    /// Circumradius bound for the alpha-shape filter, in input units.
    pub alpha: f64,
    /// Protections applied by the alpha-shape filter.
    pub alpha_shape_settings: AlphaShapeSettings,
}

impl Default for TriangulationSettings {
    fn default() -> Self {
        Self {
            validate_input: true,
            validation_checks: ValidationChecks::all(),
            verbose: false,
            preprocessor: Preprocessor::None,
            restore_boundary: false,
            auto_holes_and_boundary: false,
            refine_mesh: false,
            refinement_thresholds: RefinementThresholds::default(),
            concentric_shells_parameter: 0.001,
            sloan_max_iters: 1_000_000,
            refinement_max_triangles: 1_000_000,
            use_alpha_shape_filter: false,
            alpha: 1.0,
            alpha_shape_settings: AlphaShapeSettings::default(),
        }
    }
}

impl TriangulationSettingsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(shells) = self.concentric_shells_parameter
            && !(shells.is_finite() && shells > 0.0)
        {
            return Err(format!("concentric_shells_parameter must be positive, got {shells}"));
        }
        if let Some(alpha) = self.alpha
            && !(alpha.is_finite() && alpha >= 0.0)
        {
            return Err(format!("alpha must be finite and non-negative, got {alpha}"));
        }
        if let Some(thresholds) = self.refinement_thresholds
            && !(thresholds.area.is_finite()
                && thresholds.area > 0.0
                && thresholds.angle.is_finite()
                && thresholds.angle >= 0.0)
        {
            return Err(format!("invalid refinement thresholds {thresholds:?}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        let built = TriangulationSettingsBuilder::default().build().unwrap();
        assert_eq!(built, TriangulationSettings::default());
        approx::assert_relative_eq!(built.refinement_thresholds.angle, 5f64.to_radians());
        approx::assert_relative_eq!(built.concentric_shells_parameter, 0.001);
        assert_eq!(built.refinement_max_triangles, 1_000_000);
    }

    #[test]
    fn builder_rejects_bad_numbers() {
        assert!(
            TriangulationSettingsBuilder::default()
                .concentric_shells_parameter(0.0)
                .build()
                .is_err()
        );
        assert!(TriangulationSettingsBuilder::default().alpha(f64::NAN).build().is_err());
        let thresholds = RefinementThresholds {
            area: -1.0,
            angle: 0.1,
        };
        assert!(
            TriangulationSettingsBuilder::default()
                .refinement_thresholds(thresholds)
                .build()
                .is_err()
        );
    }

    #[test]
    fn settings_serialize_and_fill_missing_fields() {
        let settings = TriangulationSettingsBuilder::default()
            .refine_mesh(true)
            .preprocessor(Preprocessor::PrincipalAxis)
            .build()
            .unwrap();
        let json = serde_json::to_string(&settings).unwrap();
        let back: TriangulationSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);

        let partial: TriangulationSettings = serde_json::from_str(r#"{"alpha": 2.5}"#).unwrap();
        approx::assert_relative_eq!(partial.alpha, 2.5);
        assert!(partial.validate_input);
    }
}

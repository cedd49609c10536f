//! Numerical conditioning of input positions.
//!
//! A [`Preprocessor`] fits a similarity transform `q = s * R * (p - c)` to
//! the input: `c` is the centroid, `R` a rotation (identity except for
//! [`Preprocessor::PrincipalAxis`]) and `s` a uniform scale mapping the
//! points into `[-1, 1]`. Rotations have determinant one, so triangle
//! orientation survives the round trip.

use serde::{Deserialize, Serialize};

use crate::geometry::point::Point;
use crate::geometry::traits::coordinate::CoordinateScalar;
use crate::geometry::util::centroid;

/// Input transform applied before building.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preprocessor {
    /// Leave positions untouched.
    #[default]
    None,
    /// Translate to the centroid and scale into `[-1, 1]`.
    CenterOfMass,
    /// Translate, rotate onto the covariance eigenvectors, then scale.
    PrincipalAxis,
}

/// Errors reported while fitting a transform.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum PreprocessingError {
    /// Transformed positions cannot be represented by the coordinate type.
    #[error("Preprocessing requires a continuous coordinate type, got {scalar}")]
    DiscreteCoordinates {
        /// Name of the coordinate type.
        scalar: &'static str,
    },
}

/// A fitted similarity transform and its inverse.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransform {
    center: [f64; 2],
    /// Rows of the rotation matrix.
    rotation: [[f64; 2]; 2],
    scale: f64,
}

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl SimilarityTransform {
    /// The identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            center: [0.0, 0.0],
            rotation: [[1.0, 0.0], [0.0, 1.0]],
            scale: 1.0,
        }
    }

    /// Fits the transform selected by `mode` to `points`.
    ///
    /// # Errors
    ///
    /// Returns [`PreprocessingError::DiscreteCoordinates`] for any mode other
    /// than [`Preprocessor::None`] when `T` is an integer type.
    pub fn fit<T: CoordinateScalar>(mode: Preprocessor, points: &[Point<T>]) -> Result<Self, PreprocessingError> {
        if mode == Preprocessor::None {
            return Ok(Self::identity());
        }
        if !T::CONTINUOUS {
            return Err(PreprocessingError::DiscreteCoordinates { scalar: T::NAME });
        }
        let Some(center) = centroid(points) else {
            return Ok(Self::identity());
        };

        let rotation = if mode == Preprocessor::PrincipalAxis {
            principal_rotation(points, center)
        } else {
            Self::identity().rotation
        };

        let mut extent = 0.0f64;
        for p in points {
            let [x, y] = p.to_f64_array();
            let d = [x - center[0], y - center[1]];
            for row in &rotation {
                extent = extent.max(row[0].mul_add(d[0], row[1] * d[1]).abs());
            }
        }
        let scale = if extent > 0.0 && extent.is_finite() { 1.0 / extent } else { 1.0 };

        let transform = Self {
            center,
            rotation,
            scale,
        };
        tracing::debug!("[preprocess] {mode:?}: center {center:?}, scale {scale}");
        Ok(transform)
    }

    /// The uniform scale factor `s`.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Maps `p` into the conditioned frame.
    #[must_use]
    pub fn forward(&self, p: [f64; 2]) -> [f64; 2] {
        let d = [p[0] - self.center[0], p[1] - self.center[1]];
        let [r0, r1] = self.rotation;
        [
            self.scale * r0[0].mul_add(d[0], r0[1] * d[1]),
            self.scale * r1[0].mul_add(d[0], r1[1] * d[1]),
        ]
    }

    /// Maps `q` from the conditioned frame back to input coordinates.
    #[must_use]
    pub fn inverse(&self, q: [f64; 2]) -> [f64; 2] {
        let [r0, r1] = self.rotation;
        let d = [q[0] / self.scale, q[1] / self.scale];
        [
            r0[0].mul_add(d[0], r1[0] * d[1]) + self.center[0],
            r0[1].mul_add(d[0], r1[1] * d[1]) + self.center[1],
        ]
    }

    /// Applies [`forward`](Self::forward) to every point in place.
    pub fn apply<T: CoordinateScalar>(&self, points: &mut [Point<T>]) {
        for p in points {
            *p = Point::from_f64_array(self.forward(p.to_f64_array()));
        }
    }

    /// Applies [`inverse`](Self::inverse) to every point in place.
    pub fn revert<T: CoordinateScalar>(&self, points: &mut [Point<T>]) {
        for p in points {
            *p = Point::from_f64_array(self.inverse(p.to_f64_array()));
        }
    }

    /// An area measured in input units, expressed in the conditioned frame.
    #[must_use]
    pub fn scale_area(&self, area: f64) -> f64 {
        area * self.scale * self.scale
    }

    /// A length measured in input units, expressed in the conditioned frame.
    #[must_use]
    pub fn scale_length(&self, length: f64) -> f64 {
        length * self.scale
    }
}

/// Rotation whose first row is the dominant eigenvector of the covariance.
fn principal_rotation<T: CoordinateScalar>(points: &[Point<T>], center: [f64; 2]) -> [[f64; 2]; 2] {
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let [x, y] = p.to_f64_array();
        let (dx, dy) = (x - center[0], y - center[1]);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let (sin, cos) = theta.sin_cos();
    [[cos, sin], [-sin, cos]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn diagonal_strip() -> Vec<Point<f64>> {
        vec![
            Point::new([10.0, 10.0]),
            Point::new([14.0, 14.0]),
            Point::new([12.0, 12.5]),
            Point::new([11.0, 10.5]),
        ]
    }

    #[test]
    fn none_is_the_identity() {
        let t = SimilarityTransform::fit(Preprocessor::None, &diagonal_strip()).unwrap();
        assert_eq!(t, SimilarityTransform::identity());
        assert_eq!(t.forward([3.0, -2.0]), [3.0, -2.0]);
    }

    #[test]
    fn center_of_mass_fits_the_unit_box() {
        let mut points = diagonal_strip();
        let t = SimilarityTransform::fit(Preprocessor::CenterOfMass, &points).unwrap();
        t.apply(&mut points);
        let max = points
            .iter()
            .flat_map(|p| p.to_f64_array())
            .fold(0.0f64, |m, c| m.max(c.abs()));
        assert_relative_eq!(max, 1.0, epsilon = 1e-12);
        let [cx, cy] = centroid(&points).unwrap();
        assert_relative_eq!(cx, 0.0, epsilon = 1e-12);
        assert_relative_eq!(cy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn principal_axis_aligns_the_strip_with_x() {
        let points = vec![
            Point::new([0.0, 0.0]),
            Point::new([1.0, 1.0]),
            Point::new([2.0, 2.0]),
            Point::new([3.0, 3.0]),
        ];
        let t = SimilarityTransform::fit(Preprocessor::PrincipalAxis, &points).unwrap();
        for p in &points {
            let [_, y] = t.forward(p.to_f64_array());
            assert_relative_eq!(y, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn round_trip_and_orientation() {
        let original = diagonal_strip();
        for mode in [Preprocessor::CenterOfMass, Preprocessor::PrincipalAxis] {
            let mut points = original.clone();
            let t = SimilarityTransform::fit(mode, &points).unwrap();
            t.apply(&mut points);
            let [a, b, c] = [points[0], points[1], points[2]];
            assert_eq!(
                crate::geometry::predicates::orientation(&a, &b, &c),
                crate::geometry::predicates::orientation(&original[0], &original[1], &original[2])
            );
            t.revert(&mut points);
            for (p, q) in points.iter().zip(&original) {
                assert_relative_eq!(p.x(), q.x(), epsilon = 1e-9);
                assert_relative_eq!(p.y(), q.y(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn thresholds_follow_the_scale() {
        let t = SimilarityTransform::fit(Preprocessor::CenterOfMass, &diagonal_strip()).unwrap();
        // The farthest coordinate is 2.25 from the centroid (11.75, 11.75).
        let s = t.scale();
        assert_relative_eq!(s, 1.0 / 2.25);
        assert_relative_eq!(t.scale_area(4.0), 4.0 * s * s);
        assert_relative_eq!(t.scale_length(4.0), 4.0 * s);
    }

    #[test]
    fn integer_coordinates_only_allow_none() {
        let points = vec![Point::new([0, 0]), Point::new([4, 0]), Point::new([0, 4])];
        assert!(SimilarityTransform::fit(Preprocessor::None, &points).is_ok());
        assert_eq!(
            SimilarityTransform::fit(Preprocessor::CenterOfMass, &points),
            Err(PreprocessingError::DiscreteCoordinates { scalar: "i32" })
        );
    }
}

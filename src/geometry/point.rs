//! 2D point type.
//!
//! [`Point`] is a thin wrapper over `[T; 2]`. Equality and hashing follow
//! [`OrderedEq`]/[`HashCoordinate`] so points can be stored in hash sets for
//! duplicate detection, including points with NaN coordinates.
//!
//! # Examples
//!
//! ```
//! use cdt_mesher::geometry::point::Point;
//!
//! let p = Point::new([1.0, 2.0]);
//! assert_eq!(p.x(), 1.0);
//! assert_eq!(p.y(), 2.0);
//! assert_eq!(p, Point::from([1.0, 2.0]));
//! ```

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::geometry::traits::coordinate::{
    CoordinateScalar, FiniteCheck, HashCoordinate, OrderedEq,
};

/// A point in the plane.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point<T> {
    coords: [T; 2],
}

impl<T: CoordinateScalar> Point<T> {
    /// Creates a point from `[x, y]`.
    #[inline]
    #[must_use]
    pub const fn new(coords: [T; 2]) -> Self {
        Self { coords }
    }

    /// The x coordinate.
    #[inline]
    #[must_use]
    pub const fn x(&self) -> T {
        self.coords[0]
    }

    /// The y coordinate.
    #[inline]
    #[must_use]
    pub const fn y(&self) -> T {
        self.coords[1]
    }

    /// The raw coordinate array.
    #[inline]
    #[must_use]
    pub const fn coords(&self) -> [T; 2] {
        self.coords
    }

    /// Coordinates widened to `f64`.
    #[inline]
    #[must_use]
    pub fn to_f64_array(&self) -> [f64; 2] {
        [self.coords[0].to_f64_lossy(), self.coords[1].to_f64_lossy()]
    }

    /// Builds a point from `f64` coordinates, rounding for integer precision.
    #[inline]
    #[must_use]
    pub fn from_f64_array(coords: [f64; 2]) -> Self {
        Self::new([T::from_f64_lossy(coords[0]), T::from_f64_lossy(coords[1])])
    }

    /// Returns `true` if both coordinates are usable by the predicates.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(FiniteCheck::is_finite_generic)
    }
}

impl<T: CoordinateScalar> From<[T; 2]> for Point<T> {
    #[inline]
    fn from(coords: [T; 2]) -> Self {
        Self::new(coords)
    }
}

impl<T: CoordinateScalar> From<Point<T>> for [T; 2] {
    #[inline]
    fn from(point: Point<T>) -> Self {
        point.coords
    }
}

impl<T: CoordinateScalar> PartialEq for Point<T> {
    fn eq(&self, other: &Self) -> bool {
        self.coords
            .iter()
            .zip(other.coords.iter())
            .all(|(a, b)| a.ordered_eq(b))
    }
}

impl<T: CoordinateScalar> Eq for Point<T> {}

impl<T: CoordinateScalar> Hash for Point<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        for coord in &self.coords {
            coord.hash_scalar(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collections::FastHashSet;

    #[test]
    fn signed_zero_points_are_equal_and_hash_alike() {
        let mut set = FastHashSet::default();
        assert!(set.insert(Point::new([0.0, 1.0])));
        assert!(!set.insert(Point::new([-0.0, 1.0])));
        assert!(set.insert(Point::new([0.0, 2.0])));
    }

    #[test]
    fn finiteness() {
        assert!(Point::new([1.0f32, -3.0]).is_finite());
        assert!(!Point::new([f64::NAN, 0.0]).is_finite());
        assert!(!Point::new([0.0, f64::NEG_INFINITY]).is_finite());
    }

    #[test]
    fn integer_round_trip_through_f64() {
        let p: Point<i32> = Point::from_f64_array([1.4, -2.6]);
        assert_eq!(p.coords(), [1, -3]);
        assert_eq!(p.to_f64_array(), [1.0, -3.0]);
    }

    #[test]
    fn serde_is_a_plain_array() {
        let p = Point::new([1.5, -2.0]);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "[1.5,-2.0]");
        let back: Point<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}

//! Coordinate scalar policy.
//!
//! Every geometric routine in this crate is written against [`CoordinateScalar`]
//! only. The trait bundles the scalar capabilities the mesher relies on:
//!
//! - finiteness checks ([`FiniteCheck`]), used by input validation
//! - NaN-aware equality and hashing ([`OrderedEq`], [`HashCoordinate`]), used for
//!   duplicate detection
//! - the two sign predicates ([`CoordinateScalar::orient2d`] and
//!   [`CoordinateScalar::incircle`]) that decide every topological choice
//!
//! Three precisions are provided: `f32`, `f64` and `i32`. The floating-point
//! policies widen to `f64` and use the adaptive predicates of
//! [`robust_predicates`](crate::geometry::robust_predicates), whose signs are
//! exact. The integer policy evaluates them exactly through widened `i128`
//! arithmetic, which is why integer coordinates are limited to
//! `±INTEGER_COORDINATE_LIMIT`.
//!
//! # Examples
//!
//! ```
//! use cdt_mesher::geometry::predicates::Orientation;
//! use cdt_mesher::geometry::traits::coordinate::CoordinateScalar;
//!
//! let o = f64::orient2d([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]);
//! assert_eq!(o, Orientation::POSITIVE);
//!
//! let o = i32::orient2d([0, 0], [1, 0], [2, 0]);
//! assert_eq!(o, Orientation::DEGENERATE);
//! ```

use num_traits::{NumCast, ToPrimitive, Zero};
use ordered_float::OrderedFloat;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fmt::Debug,
    hash::{Hash, Hasher},
};

use crate::geometry::predicates::{InCircle, Orientation};
use crate::geometry::robust_predicates;

/// Largest absolute integer coordinate for which the exact `i128` in-circle
/// determinant cannot overflow.
pub const INTEGER_COORDINATE_LIMIT: i32 = 1 << 29;

// =============================================================================
// HELPER TRAITS
// =============================================================================

/// Checks whether a scalar is usable as a coordinate.
///
/// For floating-point types this is `is_finite`. For `i32` the value must lie
/// within [`INTEGER_COORDINATE_LIMIT`], the range in which exact predicates are
/// guaranteed.
///
/// ```
/// use cdt_mesher::geometry::traits::coordinate::FiniteCheck;
///
/// assert!(1.0f64.is_finite_generic());
/// assert!(!f64::NAN.is_finite_generic());
/// assert!(!f32::INFINITY.is_finite_generic());
/// assert!(!i32::MAX.is_finite_generic());
/// ```
pub trait FiniteCheck {
    /// Returns `true` if the value can take part in predicate evaluation.
    fn is_finite_generic(&self) -> bool;
}

/// Equality with `OrderedFloat` semantics: NaN equals NaN and `0.0 == -0.0`.
///
/// ```
/// use cdt_mesher::geometry::traits::coordinate::OrderedEq;
///
/// assert!(f64::NAN.ordered_eq(&f64::NAN));
/// assert!(0.0f64.ordered_eq(&(-0.0f64)));
/// assert!(!1.0f32.ordered_eq(&2.0f32));
/// ```
pub trait OrderedEq {
    /// Compares two values using ordered semantics.
    fn ordered_eq(&self, other: &Self) -> bool;
}

/// Hashing consistent with [`OrderedEq`].
pub trait HashCoordinate {
    /// Feeds the scalar into `state`.
    fn hash_scalar<H: Hasher>(&self, state: &mut H);
}

macro_rules! impl_float_helpers {
    ($($t:ty),*) => {
        $(
            impl FiniteCheck for $t {
                #[inline(always)]
                fn is_finite_generic(&self) -> bool {
                    self.is_finite()
                }
            }

            impl OrderedEq for $t {
                #[inline(always)]
                fn ordered_eq(&self, other: &Self) -> bool {
                    OrderedFloat(*self) == OrderedFloat(*other)
                }
            }

            impl HashCoordinate for $t {
                #[inline(always)]
                fn hash_scalar<H: Hasher>(&self, state: &mut H) {
                    OrderedFloat(*self).hash(state);
                }
            }
        )*
    };
}

impl_float_helpers!(f32, f64);

impl FiniteCheck for i32 {
    #[inline(always)]
    fn is_finite_generic(&self) -> bool {
        (-INTEGER_COORDINATE_LIMIT..=INTEGER_COORDINATE_LIMIT).contains(self)
    }
}

impl OrderedEq for i32 {
    #[inline(always)]
    fn ordered_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl HashCoordinate for i32 {
    #[inline(always)]
    fn hash_scalar<H: Hasher>(&self, state: &mut H) {
        self.hash(state);
    }
}

// =============================================================================
// COORDINATE SCALAR
// =============================================================================

/// Numeric policy for mesh coordinates.
///
/// Predicates take raw `[x, y]` arrays so the trait stays independent of
/// [`Point`](crate::geometry::point::Point). Metric quantities (areas, radii,
/// angles) are always computed in `f64` after [`to_f64_lossy`](Self::to_f64_lossy).
pub trait CoordinateScalar:
    Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Zero
    + ToPrimitive
    + NumCast
    + FiniteCheck
    + OrderedEq
    + HashCoordinate
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// `true` when the type can represent positions between lattice points.
    ///
    /// Refinement, non-trivial preprocessing and barycentric insertion all
    /// create new positions and therefore require a continuous scalar.
    const CONTINUOUS: bool;

    /// Human readable name used in error messages.
    const NAME: &'static str;

    /// Converts to `f64`, yielding NaN if the value is not representable.
    #[inline]
    fn to_f64_lossy(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    /// Converts from `f64`. Integer policies round to nearest and saturate.
    fn from_f64_lossy(value: f64) -> Self;

    /// Sign of the orientation determinant of `(a, b, c)`.
    ///
    /// [`Orientation::POSITIVE`] means counter-clockwise with the y axis up.
    fn orient2d(a: [Self; 2], b: [Self; 2], c: [Self; 2]) -> Orientation;

    /// Position of `d` relative to the circumcircle of the counter-clockwise
    /// triangle `(a, b, c)`.
    fn incircle(a: [Self; 2], b: [Self; 2], c: [Self; 2], d: [Self; 2]) -> InCircle;
}

#[inline]
fn orientation_from_sign<S: PartialOrd + Zero>(det: S) -> Orientation {
    let zero = S::zero();
    if det > zero {
        Orientation::POSITIVE
    } else if det < zero {
        Orientation::NEGATIVE
    } else {
        Orientation::DEGENERATE
    }
}

#[inline]
fn incircle_from_sign<S: PartialOrd + Zero>(det: S) -> InCircle {
    let zero = S::zero();
    if det > zero {
        InCircle::INSIDE
    } else if det < zero {
        InCircle::OUTSIDE
    } else {
        InCircle::BOUNDARY
    }
}

macro_rules! impl_float_scalar {
    ($($t:ty => $name:literal),*) => {
        $(
            impl CoordinateScalar for $t {
                const CONTINUOUS: bool = true;
                const NAME: &'static str = $name;

                #[inline]
                fn from_f64_lossy(value: f64) -> Self {
                    <$t as NumCast>::from(value).unwrap_or(<$t>::NAN)
                }

                #[inline]
                fn orient2d(a: [Self; 2], b: [Self; 2], c: [Self; 2]) -> Orientation {
                    let widen = |p: [Self; 2]| p.map(<f64 as From<$t>>::from);
                    orientation_from_sign(robust_predicates::orient2d(widen(a), widen(b), widen(c)))
                }

                #[inline]
                fn incircle(a: [Self; 2], b: [Self; 2], c: [Self; 2], d: [Self; 2]) -> InCircle {
                    let widen = |p: [Self; 2]| p.map(<f64 as From<$t>>::from);
                    incircle_from_sign(robust_predicates::incircle(widen(a), widen(b), widen(c), widen(d)))
                }
            }
        )*
    };
}

impl_float_scalar!(f32 => "f32", f64 => "f64");

impl CoordinateScalar for i32 {
    const CONTINUOUS: bool = false;
    const NAME: &'static str = "i32";

    #[inline]
    fn from_f64_lossy(value: f64) -> Self {
        // `as` saturates and maps NaN to zero.
        value.round() as Self
    }

    #[inline]
    fn orient2d(a: [Self; 2], b: [Self; 2], c: [Self; 2]) -> Orientation {
        let [ax, ay] = a.map(<i128 as From<i32>>::from);
        let [bx, by] = b.map(<i128 as From<i32>>::from);
        let [cx, cy] = c.map(<i128 as From<i32>>::from);
        orientation_from_sign((bx - ax) * (cy - ay) - (by - ay) * (cx - ax))
    }

    #[inline]
    fn incircle(a: [Self; 2], b: [Self; 2], c: [Self; 2], d: [Self; 2]) -> InCircle {
        let widen = |p: [Self; 2]| p.map(<i128 as From<i32>>::from);
        let [dx, dy] = widen(d);
        let [ax, ay] = widen(a);
        let [bx, by] = widen(b);
        let [cx, cy] = widen(c);
        let [adx, ady] = [ax - dx, ay - dy];
        let [bdx, bdy] = [bx - dx, by - dy];
        let [cdx, cdy] = [cx - dx, cy - dy];

        let al = adx * adx + ady * ady;
        let bl = bdx * bdx + bdy * bdy;
        let cl = cdx * cdx + cdy * cdy;

        let det = adx * (bdy * cl - bl * cdy) - ady * (bdx * cl - bl * cdx)
            + al * (bdx * cdy - bdy * cdx);
        incircle_from_sign(det)
    }
}

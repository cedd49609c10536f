//! Adaptive `f64` predicates with exact signs.
//!
//! [`orient2d`] and [`incircle`] first evaluate the determinant in plain
//! floating point and accept it when its magnitude clears a forward error
//! bound (Shewchuk's stage A filter). Otherwise the determinant is expanded
//! into a sum of exact products and accumulated into a nonoverlapping
//! expansion, whose most significant component carries the exact sign.
//!
//! The fallback assumes no product underflows to a subnormal, which holds for
//! every coordinate magnitude the mesher works with after preprocessing.
//!
//! # Examples
//!
//! ```
//! use cdt_mesher::geometry::robust_predicates::orient2d;
//!
//! // Nearly collinear: plain f64 arithmetic cannot decide this one.
//! let p = [0.5 + f64::EPSILON / 2.0, 0.5];
//! assert!(orient2d(p, [12.0, 12.0], [24.0, 24.0]) < 0.0);
//! assert_eq!(orient2d([0.5, 0.5], [12.0, 12.0], [24.0, 24.0]), 0.0);
//! ```

use crate::core::collections::SmallBuffer;

/// Half an ulp of 1.0; the relative rounding error of one operation.
const EPSILON: f64 = f64::EPSILON / 2.0;

/// Error bound factor for the floating-point orientation determinant.
const CCW_ERRBOUND_A: f64 = (3.0 + 16.0 * EPSILON) * EPSILON;

/// Error bound factor for the floating-point in-circle determinant.
const ICC_ERRBOUND_A: f64 = (10.0 + 96.0 * EPSILON) * EPSILON;

// =============================================================================
// EXACT EXPANSIONS
// =============================================================================

/// `a + b` as a rounded sum and its exact error.
#[inline]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    let err = (a - (s - bb)) + (b - bb);
    (s, err)
}

/// `a * b` as a rounded product and its exact error.
#[inline]
fn two_product(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

/// Exact sum of doubles held as nonoverlapping components of increasing
/// magnitude. Zero components are dropped as they appear.
#[derive(Clone, Debug, Default)]
struct Expansion {
    parts: SmallBuffer<f64, 16>,
}

impl Expansion {
    fn add(&mut self, mut x: f64) {
        let mut kept = 0;
        for j in 0..self.parts.len() {
            let (hi, lo) = two_sum(x, self.parts[j]);
            if lo != 0.0 {
                self.parts[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        self.parts.truncate(kept);
        if x != 0.0 {
            self.parts.push(x);
        }
    }

    fn add_product(&mut self, a: f64, b: f64) {
        let (p, e) = two_product(a, b);
        self.add(e);
        self.add(p);
    }

    /// Adds `other * factor` exactly.
    fn add_scaled(&mut self, other: &Self, factor: f64) {
        for &part in &other.parts {
            self.add_product(part, factor);
        }
    }

    /// A value with the exact sign of the expansion.
    fn estimate(&self) -> f64 {
        self.parts.last().copied().unwrap_or(0.0)
    }
}

/// `O(a, b, c)` as an exact expansion of six products.
fn orient_expansion(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Expansion {
    let [ax, ay] = a;
    let [bx, by] = b;
    let [cx, cy] = c;
    let mut sum = Expansion::default();
    sum.add_product(bx, cy);
    sum.add_product(-bx, ay);
    sum.add_product(-ax, cy);
    sum.add_product(-by, cx);
    sum.add_product(ax, by);
    sum.add_product(ay, cx);
    sum
}

/// `x² + y²` as an exact expansion.
fn lift_expansion([x, y]: [f64; 2]) -> Expansion {
    let mut sum = Expansion::default();
    sum.add_product(x, x);
    sum.add_product(y, y);
    sum
}

// =============================================================================
// PREDICATES
// =============================================================================

/// Orientation determinant of `(a, b, c)`: positive when counter-clockwise,
/// negative when clockwise and zero when collinear. The sign is exact for
/// finite inputs; the magnitude is approximate.
#[must_use]
pub fn orient2d(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    let detleft = (a[0] - c[0]) * (b[1] - c[1]);
    let detright = (a[1] - c[1]) * (b[0] - c[0]);
    let det = detleft - detright;

    let detsum = if detleft > 0.0 {
        if detright <= 0.0 {
            return det;
        }
        detleft + detright
    } else if detleft < 0.0 {
        if detright >= 0.0 {
            return det;
        }
        -detleft - detright
    } else {
        return det;
    };

    let errbound = CCW_ERRBOUND_A * detsum;
    if det >= errbound || -det >= errbound {
        return det;
    }
    orient_expansion(a, b, c).estimate()
}

/// In-circle determinant: positive when `d` lies inside the circumcircle of
/// the counter-clockwise triangle `(a, b, c)`, negative outside and zero on
/// the circle. The sign is exact for finite inputs.
#[must_use]
pub fn incircle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);

    let bdxcdy = bdx * cdy;
    let cdxbdy = cdx * bdy;
    let alift = adx * adx + ady * ady;

    let cdxady = cdx * ady;
    let adxcdy = adx * cdy;
    let blift = bdx * bdx + bdy * bdy;

    let adxbdy = adx * bdy;
    let bdxady = bdx * ady;
    let clift = cdx * cdx + cdy * cdy;

    let det = alift * (bdxcdy - cdxbdy) + blift * (cdxady - adxcdy) + clift * (adxbdy - bdxady);
    let permanent = (bdxcdy.abs() + cdxbdy.abs()) * alift
        + (cdxady.abs() + adxcdy.abs()) * blift
        + (adxbdy.abs() + bdxady.abs()) * clift;
    let errbound = ICC_ERRBOUND_A * permanent;
    if det > errbound || -det > errbound {
        return det;
    }
    incircle_exact(a, b, c, d)
}

/// Cofactor expansion of the lifted 4x4 determinant along the lift column.
fn incircle_exact(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    let terms = [
        (lift_expansion(a), orient_expansion(b, c, d), 1.0),
        (lift_expansion(b), orient_expansion(a, c, d), -1.0),
        (lift_expansion(c), orient_expansion(a, b, d), 1.0),
        (lift_expansion(d), orient_expansion(a, b, c), -1.0),
    ];
    let mut sum = Expansion::default();
    for (lift, orient, sign) in &terms {
        for &l in &lift.parts {
            sum.add_scaled(orient, sign * l);
        }
    }
    sum.estimate()
}

//! Geometric predicates and measures on 2D points.
//!
//! Topological decisions go through the two sign predicates [`orientation`] and
//! [`in_circumcircle`], which defer to the active [`CoordinateScalar`] policy.
//! Metric helpers (lengths, areas, angles, circumcircles) are evaluated in `f64`.

use crate::geometry::point::Point;
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Represents the position of a point relative to a circumcircle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InCircle {
    /// The point is outside the circumcircle
    OUTSIDE,
    /// The point is exactly on the circumcircle
    BOUNDARY,
    /// The point is strictly inside the circumcircle
    INSIDE,
}

impl std::fmt::Display for InCircle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OUTSIDE => write!(f, "OUTSIDE"),
            Self::BOUNDARY => write!(f, "BOUNDARY"),
            Self::INSIDE => write!(f, "INSIDE"),
        }
    }
}

/// Represents the orientation of a point triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Clockwise (determinant < 0)
    NEGATIVE,
    /// Collinear (determinant == 0)
    DEGENERATE,
    /// Counter-clockwise (determinant > 0)
    POSITIVE,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NEGATIVE => write!(f, "NEGATIVE"),
            Self::DEGENERATE => write!(f, "DEGENERATE"),
            Self::POSITIVE => write!(f, "POSITIVE"),
        }
    }
}

/// Orientation of the triple `(a, b, c)`.
///
/// # Examples
///
/// ```
/// use cdt_mesher::geometry::point::Point;
/// use cdt_mesher::geometry::predicates::{orientation, Orientation};
///
/// let a = Point::new([0.0, 0.0]);
/// let b = Point::new([1.0, 0.0]);
/// let c = Point::new([0.0, 1.0]);
/// assert_eq!(orientation(&a, &b, &c), Orientation::POSITIVE);
/// assert_eq!(orientation(&a, &c, &b), Orientation::NEGATIVE);
/// ```
#[inline]
#[must_use]
pub fn orientation<T: CoordinateScalar>(a: &Point<T>, b: &Point<T>, c: &Point<T>) -> Orientation {
    T::orient2d(a.coords(), b.coords(), c.coords())
}

/// Whether `p` lies inside, on, or outside the circumcircle of `(a, b, c)`.
///
/// The triangle may have either orientation; a clockwise triangle is
/// evaluated as its counter-clockwise reversal.
///
/// # Examples
///
/// ```
/// use cdt_mesher::geometry::point::Point;
/// use cdt_mesher::geometry::predicates::{in_circumcircle, InCircle};
///
/// let a = Point::new([0.0, 0.0]);
/// let b = Point::new([1.0, 0.0]);
/// let c = Point::new([1.0, 1.0]);
/// assert_eq!(in_circumcircle(&a, &b, &c, &Point::new([0.0, 1.0])), InCircle::BOUNDARY);
/// assert_eq!(in_circumcircle(&a, &b, &c, &Point::new([0.5, 0.5])), InCircle::INSIDE);
/// ```
#[inline]
#[must_use]
pub fn in_circumcircle<T: CoordinateScalar>(
    a: &Point<T>,
    b: &Point<T>,
    c: &Point<T>,
    p: &Point<T>,
) -> InCircle {
    if orientation(a, b, c) == Orientation::NEGATIVE {
        T::incircle(a.coords(), c.coords(), b.coords(), p.coords())
    } else {
        T::incircle(a.coords(), b.coords(), c.coords(), p.coords())
    }
}

/// Squared length of the segment `a b`.
#[inline]
#[must_use]
pub fn squared_length<T: CoordinateScalar>(a: &Point<T>, b: &Point<T>) -> f64 {
    let [ax, ay] = a.to_f64_array();
    let [bx, by] = b.to_f64_array();
    let (dx, dy) = (bx - ax, by - ay);
    dx.mul_add(dx, dy * dy)
}

/// Point at parameter `t` along `a b` (`t = 0` gives `a`).
#[inline]
#[must_use]
pub fn lerp<T: CoordinateScalar>(a: &Point<T>, b: &Point<T>, t: f64) -> Point<T> {
    let [ax, ay] = a.to_f64_array();
    let [bx, by] = b.to_f64_array();
    Point::from_f64_array([t.mul_add(bx - ax, ax), t.mul_add(by - ay, ay)])
}

/// Unsigned area of the triangle `(a, b, c)`.
#[inline]
#[must_use]
pub fn area<T: CoordinateScalar>(a: &Point<T>, b: &Point<T>, c: &Point<T>) -> f64 {
    signed_area(a, b, c).abs()
}

/// Signed area of `(a, b, c)`, positive for counter-clockwise triangles.
#[inline]
#[must_use]
pub fn signed_area<T: CoordinateScalar>(a: &Point<T>, b: &Point<T>, c: &Point<T>) -> f64 {
    let [ax, ay] = a.to_f64_array();
    let [bx, by] = b.to_f64_array();
    let [cx, cy] = c.to_f64_array();
    0.5 * (bx - ax).mul_add(cy - ay, -((by - ay) * (cx - ax)))
}

/// Returns `true` if any interior angle of `(a, b, c)` is smaller than
/// `min_angle` (radians).
///
/// When all three vertices coincide every cosine is NaN and the triangle is
/// reported as having no small angle.
///
/// # Examples
///
/// ```
/// use cdt_mesher::geometry::point::Point;
/// use cdt_mesher::geometry::predicates::angle_below;
///
/// let a = Point::new([0.0, 0.0]);
/// let b = Point::new([1.0, 0.0]);
/// let c = Point::new([0.5, 0.05]);
/// assert!(angle_below(&a, &b, &c, 20f64.to_radians()));
/// assert!(!angle_below(&a, &b, &Point::new([0.5, 0.8]), 20f64.to_radians()));
/// ```
#[must_use]
pub fn angle_below<T: CoordinateScalar>(
    a: &Point<T>,
    b: &Point<T>,
    c: &Point<T>,
    min_angle: f64,
) -> bool {
    let corners = [a.to_f64_array(), b.to_f64_array(), c.to_f64_array()];
    let cos_threshold = min_angle.cos();
    (0..3).any(|i| {
        let p = corners[i];
        let q = corners[(i + 1) % 3];
        let r = corners[(i + 2) % 3];
        let u = [q[0] - p[0], q[1] - p[1]];
        let v = [r[0] - p[0], r[1] - p[1]];
        let dot = u[0].mul_add(v[0], u[1] * v[1]);
        let norms = (u[0].hypot(u[1])) * (v[0].hypot(v[1]));
        dot / norms > cos_threshold
    })
}

/// Circumcenter of `(a, b, c)` in `f64`, or `None` for collinear triples.
#[must_use]
pub fn circumcenter_f64<T: CoordinateScalar>(
    a: &Point<T>,
    b: &Point<T>,
    c: &Point<T>,
) -> Option<[f64; 2]> {
    let [ax, ay] = a.to_f64_array();
    let [bx, by] = b.to_f64_array();
    let [cx, cy] = c.to_f64_array();
    let (bdx, bdy) = (bx - ax, by - ay);
    let (cdx, cdy) = (cx - ax, cy - ay);
    let d = 2.0 * bdx.mul_add(cdy, -(bdy * cdx));
    if d == 0.0 || !d.is_finite() {
        return None;
    }
    let bl = bdx.mul_add(bdx, bdy * bdy);
    let cl = cdx.mul_add(cdx, cdy * cdy);
    let ux = cdy.mul_add(bl, -(bdy * cl)) / d;
    let uy = bdx.mul_add(cl, -(cdx * bl)) / d;
    Some([ax + ux, ay + uy])
}

/// Circumcenter of `(a, b, c)` converted into the active precision.
#[must_use]
pub fn circumcenter<T: CoordinateScalar>(a: &Point<T>, b: &Point<T>, c: &Point<T>) -> Option<Point<T>> {
    circumcenter_f64(a, b, c).map(Point::from_f64_array)
}

/// Squared circumradius of `(a, b, c)`; infinite for collinear triples.
#[must_use]
pub fn circumradius_squared<T: CoordinateScalar>(a: &Point<T>, b: &Point<T>, c: &Point<T>) -> f64 {
    circumcenter_f64(a, b, c).map_or(f64::INFINITY, |[x, y]| {
        let [ax, ay] = a.to_f64_array();
        (x - ax).mul_add(x - ax, (y - ay) * (y - ay))
    })
}

/// Returns `true` if `p` lies strictly inside the diametral circle of `a b`.
///
/// ```
/// use cdt_mesher::geometry::point::Point;
/// use cdt_mesher::geometry::predicates::encroaches;
///
/// let a = Point::new([0.0, 0.0]);
/// let b = Point::new([2.0, 0.0]);
/// assert!(encroaches(&Point::new([1.0, 0.5]), &a, &b));
/// assert!(!encroaches(&Point::new([1.0, 1.0]), &a, &b));
/// ```
#[inline]
#[must_use]
pub fn encroaches<T: CoordinateScalar>(p: &Point<T>, a: &Point<T>, b: &Point<T>) -> bool {
    let [px, py] = p.to_f64_array();
    let [ax, ay] = a.to_f64_array();
    let [bx, by] = b.to_f64_array();
    (ax - px).mul_add(bx - px, (ay - py) * (by - py)) < 0.0
}

/// Returns `true` if the open segments `a b` and `c d` cross at a single
/// interior point of both.
///
/// Touching at an endpoint or overlapping collinearly does not count.
#[must_use]
pub fn segments_cross<T: CoordinateScalar>(
    a: &Point<T>,
    b: &Point<T>,
    c: &Point<T>,
    d: &Point<T>,
) -> bool {
    let opposite = |x: Orientation, y: Orientation| {
        matches!(
            (x, y),
            (Orientation::POSITIVE, Orientation::NEGATIVE) | (Orientation::NEGATIVE, Orientation::POSITIVE)
        )
    };
    opposite(orientation(a, b, c), orientation(a, b, d)) && opposite(orientation(c, d, a), orientation(c, d, b))
}

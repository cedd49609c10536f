//! Pre-flight input validation.
//!
//! Every check is toggled by a field of [`ValidationChecks`]. The first
//! failing check is returned; with `verbose` set every failure is logged
//! first. Validation never touches the mesh.

use serde::{Deserialize, Serialize};

use crate::core::collections::{FastHashMap, fast_hash_map_with_capacity};
use crate::core::triangulator::TriangulationInput;
use crate::geometry::point::Point;
use crate::geometry::predicates::{Orientation, orientation, segments_cross};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Input rejected before any stage runs.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputValidationError {
    /// A triangulation needs at least three points.
    #[error("At least 3 points are required, got {count}")]
    TooFewPoints {
        /// Number of points supplied.
        count: usize,
    },
    /// A coordinate is NaN, infinite or outside the integer range.
    #[error("Point {point} has a non-finite coordinate")]
    NonFinitePosition {
        /// Offending point.
        point: usize,
    },
    /// Two points share a position.
    #[error("Point {duplicate} duplicates the position of point {first}")]
    DuplicatePosition {
        /// First occurrence.
        first: usize,
        /// Later occurrence.
        duplicate: usize,
    },
    /// A constraint references a point that does not exist.
    #[error("Constraint {constraint} references point {point}, but only {n_points} points exist")]
    ConstraintOutOfRange {
        /// Offending constraint.
        constraint: usize,
        /// Out of range index.
        point: usize,
        /// Number of points.
        n_points: usize,
    },
    /// Both endpoints of a constraint are the same point.
    #[error("Constraint {constraint} has zero length")]
    ZeroLengthConstraint {
        /// Offending constraint.
        constraint: usize,
    },
    /// The same edge is constrained twice, in either direction.
    #[error("Constraint {duplicate} duplicates constraint {first}")]
    DuplicateConstraint {
        /// First occurrence.
        first: usize,
        /// Later occurrence.
        duplicate: usize,
    },
    /// Two constraints cross or overlap.
    #[error("Constraints {first} and {second} intersect")]
    IntersectingConstraints {
        /// Lower constraint index.
        first: usize,
        /// Higher constraint index.
        second: usize,
    },
    /// A hole seed cannot be located.
    #[error("Hole seed {seed} has a non-finite coordinate")]
    NonFiniteHoleSeed {
        /// Offending seed.
        seed: usize,
    },
    /// The per-constraint ignore flags do not match the constraints.
    #[error("Expected {expected} ignore flags (one per constraint), got {found}")]
    IgnoredLengthMismatch {
        /// Number of constraints.
        expected: usize,
        /// Number of flags.
        found: usize,
    },
}

/// Selects which input checks run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidationChecks {
    /// Reject fewer than three points.
    pub point_count: bool,
    /// Reject non-finite coordinates.
    pub finite_positions: bool,
    /// Reject repeated positions.
    pub duplicate_positions: bool,
    /// Reject constraint indices past the last point.
    pub constraint_range: bool,
    /// Reject constraints from a point to itself.
    pub zero_length_constraints: bool,
    /// Reject edges constrained twice.
    pub duplicate_constraints: bool,
    /// Reject crossing or overlapping constraints.
    pub intersecting_constraints: bool,
    /// Reject non-finite hole seeds.
    pub finite_hole_seeds: bool,
    /// Reject ignore flags whose length differs from the constraint count.
    pub ignored_length: bool,
}

impl Default for ValidationChecks {
    fn default() -> Self {
        Self::all()
    }
}

impl ValidationChecks {
    /// Every check enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            point_count: true,
            finite_positions: true,
            duplicate_positions: true,
            constraint_range: true,
            zero_length_constraints: true,
            duplicate_constraints: true,
            intersecting_constraints: true,
            finite_hole_seeds: true,
            ignored_length: true,
        }
    }

    /// Every check disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            point_count: false,
            finite_positions: false,
            duplicate_positions: false,
            constraint_range: false,
            zero_length_constraints: false,
            duplicate_constraints: false,
            intersecting_constraints: false,
            finite_hole_seeds: false,
            ignored_length: false,
        }
    }
}

fn check_point_count<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    let count = input.positions.len();
    (count < 3).then_some(InputValidationError::TooFewPoints { count })
}

fn check_finite_positions<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    input
        .positions
        .iter()
        .position(|p| !p.is_finite())
        .map(|point| InputValidationError::NonFinitePosition { point })
}

fn check_duplicate_positions<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    let mut seen: FastHashMap<Point<T>, usize> = fast_hash_map_with_capacity(input.positions.len());
    for (duplicate, p) in input.positions.iter().enumerate() {
        if let Some(&first) = seen.get(p) {
            return Some(InputValidationError::DuplicatePosition { first, duplicate });
        }
        seen.insert(*p, duplicate);
    }
    None
}

fn check_constraint_range<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    let n_points = input.positions.len();
    input.constraints.iter().enumerate().find_map(|(constraint, edge)| {
        edge.iter()
            .find(|&&point| point >= n_points)
            .map(|&point| InputValidationError::ConstraintOutOfRange {
                constraint,
                point,
                n_points,
            })
    })
}

fn check_zero_length_constraints<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    input
        .constraints
        .iter()
        .position(|[a, b]| a == b)
        .map(|constraint| InputValidationError::ZeroLengthConstraint { constraint })
}

fn check_duplicate_constraints<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    let mut seen: FastHashMap<(usize, usize), usize> = fast_hash_map_with_capacity(input.constraints.len());
    for (duplicate, &[a, b]) in input.constraints.iter().enumerate() {
        let key = (a.min(b), a.max(b));
        if let Some(&first) = seen.get(&key) {
            return Some(InputValidationError::DuplicateConstraint { first, duplicate });
        }
        seen.insert(key, duplicate);
    }
    None
}

/// `true` if the collinear segments `a b` and `c d` share more than a point.
fn overlaps_collinear<T: CoordinateScalar>(a: &Point<T>, b: &Point<T>, c: &Point<T>, d: &Point<T>) -> bool {
    if orientation(a, b, c) != Orientation::DEGENERATE || orientation(a, b, d) != Orientation::DEGENERATE {
        return false;
    }
    let [ax, ay] = a.to_f64_array();
    let [bx, by] = b.to_f64_array();
    let dir = [bx - ax, by - ay];
    let project = |p: &Point<T>| {
        let [px, py] = p.to_f64_array();
        (px - ax).mul_add(dir[0], (py - ay) * dir[1])
    };
    let (s0, s1) = (0.0_f64, project(b));
    let (t0, t1) = {
        let (u, v) = (project(c), project(d));
        (u.min(v), u.max(v))
    };
    s1.min(t1) > s0.max(t0)
}

fn check_intersecting_constraints<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    let n_points = input.positions.len();
    let edges: Vec<(usize, [usize; 2])> = input
        .constraints
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, [a, b])| a != b && *a < n_points && *b < n_points)
        .collect();
    let at = |i: usize| &input.positions[i];
    for (k, &(first, [a, b])) in edges.iter().enumerate() {
        for &(second, [c, d]) in &edges[k + 1..] {
            let shared = [c, d].iter().filter(|&&x| x == a || x == b).count();
            let hit = match shared {
                0 => segments_cross(at(a), at(b), at(c), at(d)) || overlaps_collinear(at(a), at(b), at(c), at(d)),
                1 => overlaps_collinear(at(a), at(b), at(c), at(d)),
                _ => false,
            };
            if hit {
                return Some(InputValidationError::IntersectingConstraints { first, second });
            }
        }
    }
    None
}

fn check_finite_hole_seeds<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    input
        .hole_seeds
        .iter()
        .position(|p| !p.is_finite())
        .map(|seed| InputValidationError::NonFiniteHoleSeed { seed })
}

fn check_ignored_length<T: CoordinateScalar>(input: &TriangulationInput<T>) -> Option<InputValidationError> {
    let ignored = input.ignored_constraints.as_ref()?;
    let expected = input.constraints.len();
    (ignored.len() != expected).then_some(InputValidationError::IgnoredLengthMismatch {
        expected,
        found: ignored.len(),
    })
}

type Check<T> = fn(&TriangulationInput<T>) -> Option<InputValidationError>;

/// Runs the enabled checks in a fixed order and returns the first failure.
///
/// # Errors
///
/// Returns the first [`InputValidationError`] found. With `verbose`, every
/// failing check is logged through `tracing::error!` before returning.
///
/// # Examples
///
/// ```
/// use cdt_mesher::core::triangulator::TriangulationInput;
/// use cdt_mesher::core::validation::{InputValidationError, ValidationChecks, validate_input};
/// use cdt_mesher::geometry::point::Point;
///
/// let input = TriangulationInput::from_positions(vec![
///     Point::new([0.0, 0.0]),
///     Point::new([1.0, 0.0]),
///     Point::new([0.0, 0.0]),
/// ]);
/// assert_eq!(
///     validate_input(&input, &ValidationChecks::all(), false),
///     Err(InputValidationError::DuplicatePosition { first: 0, duplicate: 2 })
/// );
/// ```
pub fn validate_input<T: CoordinateScalar>(
    input: &TriangulationInput<T>,
    checks: &ValidationChecks,
    verbose: bool,
) -> Result<(), InputValidationError> {
    let table: [(bool, Check<T>); 9] = [
        (checks.point_count, check_point_count),
        (checks.finite_positions, check_finite_positions),
        (checks.duplicate_positions, check_duplicate_positions),
        (checks.constraint_range, check_constraint_range),
        (checks.zero_length_constraints, check_zero_length_constraints),
        (checks.duplicate_constraints, check_duplicate_constraints),
        (checks.intersecting_constraints, check_intersecting_constraints),
        (checks.finite_hole_seeds, check_finite_hole_seeds),
        (checks.ignored_length, check_ignored_length),
    ];

    let mut first = None;
    for (enabled, check) in table {
        if !enabled {
            continue;
        }
        if let Some(err) = check(input) {
            if !verbose {
                return Err(err);
            }
            tracing::error!("[validation] {err}");
            first.get_or_insert(err);
        }
    }
    first.map_or(Ok(()), Err)
}

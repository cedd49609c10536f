//! Point location by visibility walking.
//!
//! [`locate`] walks from a hint triangle toward the query point, crossing an
//! edge whenever the point lies strictly to its right. On a convex mesh the
//! walk always terminates in the containing triangle; on a non-convex mesh
//! (after hole planting) it may reach the boundary first, so
//! [`locate_or_scan`] falls back to a linear scan.
//!
//! # Examples
//!
//! ```rust
//! use cdt_mesher::core::algorithms::locate::{locate, LocateResult};
//! use cdt_mesher::core::mesh::Mesh;
//! use cdt_mesher::geometry::point::Point;
//!
//! let mesh = Mesh::from_parts(
//!     vec![
//!         Point::new([0.0, 0.0]),
//!         Point::new([1.0, 0.0]),
//!         Point::new([1.0, 1.0]),
//!         Point::new([0.0, 1.0]),
//!     ],
//!     vec![0, 1, 2, 0, 2, 3],
//! )
//! .unwrap();
//!
//! assert_eq!(locate(&mesh, &Point::new([0.2, 0.8]), None).unwrap(), LocateResult::InsideTriangle(1));
//! assert_eq!(locate(&mesh, &Point::new([2.0, 0.5]), None).unwrap(), LocateResult::Outside);
//! ```

use crate::core::collections::FastHashSet;
use crate::core::halfedge::{NONE, next_halfedge};
use crate::core::mesh::Mesh;
use crate::geometry::point::Point;
use crate::geometry::predicates::{Orientation, orientation};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Result of point location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocateResult {
    /// Point is strictly inside the triangle.
    InsideTriangle(usize),
    /// Point lies in the interior of the edge of this halfedge.
    OnEdge(usize),
    /// Point coincides with an existing point.
    OnVertex(usize),
    /// Point is outside the mesh.
    Outside,
}

/// Error during point location.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum LocateError {
    /// The mesh has no triangles.
    #[error("Cannot locate in empty triangulation")]
    EmptyTriangulation,

    /// The walk revisited a triangle (numerical degeneracy).
    #[error("Cycle detected after {steps} steps - possible numerical degeneracy")]
    CycleDetected {
        /// Number of steps taken before detecting the cycle.
        steps: usize,
    },
}

/// Classifies `point` against triangle `t` without walking.
///
/// Returns `None` if the point lies strictly outside the triangle.
#[must_use]
pub fn classify_in_triangle<T: CoordinateScalar>(
    mesh: &Mesh<T>,
    t: usize,
    point: &Point<T>,
) -> Option<LocateResult> {
    let mut on_edge = NONE;
    for he in 3 * t..3 * t + 3 {
        let a = mesh.positions[mesh.triangles[he]];
        if a == *point {
            return Some(LocateResult::OnVertex(mesh.triangles[he]));
        }
        let b = mesh.positions[mesh.triangles[next_halfedge(he)]];
        match orientation(&a, &b, point) {
            Orientation::NEGATIVE => return None,
            Orientation::DEGENERATE => on_edge = he,
            Orientation::POSITIVE => {}
        }
    }
    Some(if on_edge == NONE {
        LocateResult::InsideTriangle(t)
    } else {
        LocateResult::OnEdge(on_edge)
    })
}

/// Walks from `hint` (or triangle 0) toward `point`.
///
/// # Errors
///
/// Returns [`LocateError::EmptyTriangulation`] for an empty mesh and
/// [`LocateError::CycleDetected`] if the walk revisits a triangle.
pub fn locate<T: CoordinateScalar>(
    mesh: &Mesh<T>,
    point: &Point<T>,
    hint: Option<usize>,
) -> Result<LocateResult, LocateError> {
    let n_triangles = mesh.number_of_triangles();
    if n_triangles == 0 {
        return Err(LocateError::EmptyTriangulation);
    }
    let mut current = hint.filter(|&t| t < n_triangles).unwrap_or(0);
    let mut entry = NONE;
    let mut visited = FastHashSet::default();

    for step in 0..=n_triangles {
        if !visited.insert(current) {
            return Err(LocateError::CycleDetected { steps: step });
        }

        // Start testing after the edge we entered through.
        let start = if entry == NONE { 0 } else { (entry % 3 + 1) % 3 };
        let mut crossed = None;
        for k in 0..3 {
            let he = 3 * current + (start + k) % 3;
            if he == entry {
                continue;
            }
            let a = mesh.positions[mesh.triangles[he]];
            let b = mesh.positions[mesh.triangles[next_halfedge(he)]];
            if orientation(&a, &b, point) == Orientation::NEGATIVE {
                crossed = Some(he);
                break;
            }
        }

        match crossed {
            None => {
                return Ok(classify_in_triangle(mesh, current, point)
                    .unwrap_or(LocateResult::InsideTriangle(current)));
            }
            Some(he) => {
                let opposite = mesh.halfedges[he];
                if opposite == NONE {
                    return Ok(LocateResult::Outside);
                }
                entry = opposite;
                current = opposite / 3;
            }
        }
    }

    Err(LocateError::CycleDetected {
        steps: n_triangles + 1,
    })
}

/// Linear scan over every triangle.
#[must_use]
pub fn locate_by_scan<T: CoordinateScalar>(mesh: &Mesh<T>, point: &Point<T>) -> LocateResult {
    (0..mesh.number_of_triangles())
        .find_map(|t| classify_in_triangle(mesh, t, point))
        .unwrap_or(LocateResult::Outside)
}

/// Walks, then scans if the walk failed or stopped at the boundary.
#[must_use]
pub fn locate_or_scan<T: CoordinateScalar>(
    mesh: &Mesh<T>,
    point: &Point<T>,
    hint: Option<usize>,
) -> LocateResult {
    match locate(mesh, point, hint) {
        Ok(LocateResult::Outside) | Err(LocateError::CycleDetected { .. }) => {
            locate_by_scan(mesh, point)
        }
        Ok(found) => found,
        Err(LocateError::EmptyTriangulation) => LocateResult::Outside,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Four triangles fanned around the center of a square, plus one
    /// triangle hanging off the right side so the mesh is not convex.
    fn fan_with_ear() -> Mesh<f64> {
        Mesh::from_parts(
            vec![
                Point::new([0.0, 0.0]),
                Point::new([2.0, 0.0]),
                Point::new([2.0, 2.0]),
                Point::new([0.0, 2.0]),
                Point::new([1.0, 1.0]),
                Point::new([4.0, 3.0]),
            ],
            vec![0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4, 1, 5, 2],
        )
        .unwrap()
    }

    #[test]
    fn walk_finds_each_triangle() {
        let mesh = fan_with_ear();
        let queries = [([1.0, 0.3], 0), ([1.7, 1.0], 1), ([1.0, 1.7], 2), ([0.3, 1.0], 3)];
        for (coords, expected) in queries {
            for hint in 0..5 {
                assert_eq!(
                    locate(&mesh, &Point::new(coords), Some(hint)).unwrap(),
                    LocateResult::InsideTriangle(expected)
                );
            }
        }
    }

    #[test]
    fn degenerate_positions_are_classified() {
        let mesh = fan_with_ear();
        assert_eq!(
            locate(&mesh, &Point::new([1.0, 1.0]), Some(2)).unwrap(),
            LocateResult::OnVertex(4)
        );
        let on_edge = locate(&mesh, &Point::new([1.0, 0.0]), Some(2)).unwrap();
        let LocateResult::OnEdge(he) = on_edge else {
            panic!("expected an edge, got {on_edge:?}");
        };
        assert_eq!(mesh.endpoints(he), (0, 1));
    }

    #[test]
    fn walk_and_scan_agree_on_a_concave_mesh() {
        let mesh = fan_with_ear();
        let p = Point::new([3.0, 2.0]);
        assert_eq!(locate_or_scan(&mesh, &p, Some(3)), LocateResult::InsideTriangle(4));
        assert_eq!(locate_by_scan(&mesh, &p), LocateResult::InsideTriangle(4));
        // Right of the square and below the ear.
        assert_eq!(locate_or_scan(&mesh, &Point::new([3.0, 0.5]), Some(0)), LocateResult::Outside);
        assert_eq!(locate_by_scan(&mesh, &Point::new([-1.0, 0.0])), LocateResult::Outside);
    }

    #[test]
    fn empty_mesh_is_an_error() {
        let mesh: Mesh<f64> = Mesh::new();
        assert_eq!(
            locate(&mesh, &Point::new([0.0, 0.0]), None),
            Err(LocateError::EmptyTriangulation)
        );
    }
}

//! Constrained Delaunay empty-circumcircle validation.
//!
//! An unconstrained interior edge is locally Delaunay when the apex opposite
//! it does not lie strictly inside the circumcircle of the triangle on the
//! other side. A mesh in which every unconstrained edge is locally Delaunay is
//! a constrained Delaunay triangulation.

use crate::core::halfedge::{NONE, prev_halfedge};
use crate::core::mesh::Mesh;
use crate::geometry::predicates::{InCircle, in_circumcircle};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Errors that can occur during Delaunay property validation.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum DelaunayValidationError {
    /// A triangle's circumcircle strictly contains the apex across an
    /// unconstrained edge.
    #[error("Delaunay violation: apex {apex} lies inside the circumcircle across halfedge {halfedge}")]
    DelaunayViolation {
        /// Halfedge whose neighbor apex violates the property.
        halfedge: usize,
        /// The offending apex point.
        apex: usize,
    },
}

/// Returns `true` if the unconstrained edge `he` should be flipped.
///
/// Boundary and constrained edges are always legal. A cocircular apex is
/// legal, so ties never cause a flip.
#[inline]
#[must_use]
pub fn is_illegal_edge<T: CoordinateScalar>(mesh: &Mesh<T>, he: usize) -> bool {
    let opposite = mesh.halfedges[he];
    if opposite == NONE || mesh.constrained_halfedges[he] {
        return false;
    }
    let t = he / 3;
    let [a, b, c] = mesh.triangle_points(t);
    let apex = mesh.positions[mesh.triangles[prev_halfedge(opposite)]];
    in_circumcircle(&a, &b, &c, &apex) == InCircle::INSIDE
}

/// Finds every halfedge across which the constrained Delaunay property fails.
///
/// Each violating edge is reported once, by its smaller halfedge.
#[must_use]
pub fn find_delaunay_violations<T: CoordinateScalar>(mesh: &Mesh<T>) -> Vec<usize> {
    (0..mesh.halfedges.len())
        .filter(|&he| {
            let o = mesh.halfedges[he];
            o != NONE && he < o && (is_illegal_edge(mesh, he) || is_illegal_edge(mesh, o))
        })
        .collect()
}

/// Checks the constrained Delaunay property.
///
/// # Errors
///
/// Returns [`DelaunayValidationError::DelaunayViolation`] for the first
/// offending edge.
pub fn is_delaunay<T: CoordinateScalar>(mesh: &Mesh<T>) -> Result<(), DelaunayValidationError> {
    match find_delaunay_violations(mesh).first() {
        None => Ok(()),
        Some(&halfedge) => {
            let o = mesh.halfedges[halfedge];
            Err(DelaunayValidationError::DelaunayViolation {
                halfedge,
                apex: mesh.triangles[prev_halfedge(o)],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point;

    /// Thin quad whose short diagonal is the Delaunay one.
    fn kite(diagonal_long: bool) -> Mesh<f64> {
        let positions = vec![
            Point::new([0.0, 0.0]),
            Point::new([2.0, -0.2]),
            Point::new([4.0, 0.0]),
            Point::new([2.0, 0.2]),
        ];
        let triangles = if diagonal_long {
            vec![0, 1, 2, 0, 2, 3]
        } else {
            vec![0, 1, 3, 1, 2, 3]
        };
        Mesh::from_parts(positions, triangles).unwrap()
    }

    #[test]
    fn long_diagonal_is_reported() {
        let mesh = kite(true);
        assert_eq!(find_delaunay_violations(&mesh), vec![2]);
        assert!(matches!(
            is_delaunay(&mesh),
            Err(DelaunayValidationError::DelaunayViolation { halfedge: 2, apex: 3 })
        ));
    }

    #[test]
    fn short_diagonal_is_delaunay() {
        assert!(is_delaunay(&kite(false)).is_ok());
    }

    #[test]
    fn constrained_edges_are_exempt() {
        let mut mesh = kite(true);
        mesh.set_edge_flags(2, true, false);
        assert!(find_delaunay_violations(&mesh).is_empty());
    }
}

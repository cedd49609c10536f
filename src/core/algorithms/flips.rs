//! Edge flips and Lawson legalization.
//!
//! A flip replaces the shared edge of two adjacent triangles by the other
//! diagonal of their quadrilateral:
//!
//! ```text
//!            pl                      pl
//!           /||\                    /  \
//!        al/ || \bl              al/    \a
//!         /  ||  \                /      \
//!        / a || b \    flip      /__ar____\
//!     p0 \   ||   / p1   =>   p0 \---bl---/ p1
//!         \  ||  /                \      /
//!        ar\ || /br               b\    /br
//!           \||/                    \  /
//!            pr                      pr
//! ```
//!
//! Slots are reused in place: halfedge `a` becomes `p1 -> pl`, `b` becomes
//! `p0 -> pr`, and the new diagonal is the pair `ar`/`bl`. Constrained and
//! ignored flags travel with the outer edges; the new diagonal starts
//! unconstrained.
//!
//! [`legalize_edges`] runs Lawson's algorithm from a queue of candidate edges.

use crate::core::halfedge::{NONE, next_halfedge, prev_halfedge};
use crate::core::mesh::Mesh;
use crate::core::util::delaunay_validation::is_illegal_edge;
use crate::geometry::predicates::{Orientation, orientation};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Errors that can occur when flipping a single edge.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum FlipError {
    /// The edge has no neighbor triangle.
    #[error("Halfedge {halfedge} is on the boundary and cannot be flipped")]
    BoundaryEdge {
        /// Offending halfedge.
        halfedge: usize,
    },
    /// The edge is constrained.
    #[error("Halfedge {halfedge} is constrained and cannot be flipped")]
    ConstrainedEdge {
        /// Offending halfedge.
        halfedge: usize,
    },
    /// The quadrilateral around the edge is not strictly convex.
    #[error("Quadrilateral around halfedge {halfedge} is not strictly convex")]
    NonConvexQuad {
        /// Offending halfedge.
        halfedge: usize,
    },
}

/// Errors from Lawson legalization.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum DelaunayRepairError {
    /// Legalization did not converge within the flip budget.
    #[error("Delaunay repair failed to converge after {max_flips} flips")]
    NonConvergent {
        /// Maximum flips allowed.
        max_flips: usize,
    },
}

/// Points and slots touched by a flip.
///
/// Slot numbering follows the module diagram, after the flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlipInfo {
    /// Halfedge `p0 -> p1` of the new diagonal.
    pub diagonal: usize,
    /// Halfedge `p1 -> p0` of the new diagonal.
    pub diagonal_twin: usize,
    /// Apex of the first triangle, endpoint of the new diagonal.
    pub p0: usize,
    /// Apex of the second triangle, endpoint of the new diagonal.
    pub p1: usize,
    /// Endpoint of the removed diagonal.
    pub pl: usize,
    /// Endpoint of the removed diagonal.
    pub pr: usize,
    /// Outgoing halfedge of `pl` that is still valid after the flip.
    pub pl_out: usize,
    /// Outgoing halfedge of `pr` that is still valid after the flip.
    pub pr_out: usize,
}

impl FlipInfo {
    /// Repairs a point-to-outgoing-halfedge table after the flip.
    ///
    /// Only the endpoints of the removed diagonal can lose their recorded
    /// halfedge.
    pub fn update_point_table(&self, table: &mut [usize]) {
        table[self.pl] = self.pl_out;
        table[self.pr] = self.pr_out;
        if table[self.p0] == NONE {
            table[self.p0] = self.diagonal;
        }
        if table[self.p1] == NONE {
            table[self.p1] = self.diagonal_twin;
        }
    }

    /// The four outer edges of the flipped quadrilateral.
    #[must_use]
    pub const fn outer_edges(&self) -> [usize; 4] {
        let a = next_halfedge(self.diagonal);
        let b = next_halfedge(self.diagonal_twin);
        [a, next_halfedge(a), b, next_halfedge(b)]
    }
}

/// Statistics reported by [`legalize_edges`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DelaunayRepairStats {
    /// Number of queued edges checked.
    pub edges_checked: usize,
    /// Number of flips performed.
    pub flips_performed: usize,
    /// Maximum queue length observed.
    pub max_queue_len: usize,
}

/// Returns `true` if the quadrilateral around interior edge `a` is strictly
/// convex, i.e. both triangles produced by flipping would be positive.
#[must_use]
pub fn is_flippable<T: CoordinateScalar>(mesh: &Mesh<T>, a: usize) -> bool {
    let b = mesh.halfedges[a];
    if b == NONE {
        return false;
    }
    let p0 = mesh.positions[mesh.triangles[prev_halfedge(a)]];
    let pr = mesh.positions[mesh.triangles[a]];
    let pl = mesh.positions[mesh.triangles[next_halfedge(a)]];
    let p1 = mesh.positions[mesh.triangles[prev_halfedge(b)]];
    orientation(&p1, &pl, &p0) == Orientation::POSITIVE
        && orientation(&p0, &pr, &p1) == Orientation::POSITIVE
}

/// Flips interior edge `a` after checking that it is unconstrained and that
/// its quadrilateral is strictly convex.
///
/// # Errors
///
/// Returns a [`FlipError`] describing why the edge cannot be flipped; the
/// mesh is unchanged in that case.
pub fn flip_edge<T: CoordinateScalar>(mesh: &mut Mesh<T>, a: usize) -> Result<FlipInfo, FlipError> {
    if mesh.halfedges[a] == NONE {
        return Err(FlipError::BoundaryEdge { halfedge: a });
    }
    if mesh.constrained_halfedges[a] {
        return Err(FlipError::ConstrainedEdge { halfedge: a });
    }
    if !is_flippable(mesh, a) {
        return Err(FlipError::NonConvexQuad { halfedge: a });
    }
    Ok(flip_edge_unchecked(mesh, a))
}

/// Flips interior edge `a` without any geometric check.
pub(crate) fn flip_edge_unchecked<T: CoordinateScalar>(mesh: &mut Mesh<T>, a: usize) -> FlipInfo {
    let b = mesh.halfedges[a];
    debug_assert_ne!(b, NONE, "flip of boundary halfedge {a}");

    let al = next_halfedge(a);
    let ar = prev_halfedge(a);
    let bl = prev_halfedge(b);
    let br = next_halfedge(b);

    let p0 = mesh.triangles[ar];
    let pr = mesh.triangles[a];
    let pl = mesh.triangles[al];
    let p1 = mesh.triangles[bl];

    let har = mesh.halfedges[ar];
    let hbl = mesh.halfedges[bl];
    let flags_ar = (mesh.constrained_halfedges[ar], mesh.ignored_halfedges[ar]);
    let flags_bl = (mesh.constrained_halfedges[bl], mesh.ignored_halfedges[bl]);

    mesh.triangles[a] = p1;
    mesh.triangles[b] = p0;

    mesh.link(a, hbl);
    mesh.link(b, har);
    mesh.link(ar, bl);

    (mesh.constrained_halfedges[a], mesh.ignored_halfedges[a]) = flags_bl;
    (mesh.constrained_halfedges[b], mesh.ignored_halfedges[b]) = flags_ar;
    for he in [ar, bl] {
        mesh.constrained_halfedges[he] = false;
        mesh.ignored_halfedges[he] = false;
    }

    FlipInfo {
        diagonal: ar,
        diagonal_twin: bl,
        p0,
        p1,
        pl,
        pr,
        pl_out: al,
        pr_out: br,
    }
}

/// Lawson legalization: flips illegal unconstrained edges until none of the
/// queued edges (and the edges exposed by flips) violate the empty
/// circumcircle property.
///
/// A flip pushes the four outer edges of its quadrilateral. Edges whose
/// quadrilateral is not strictly convex are left alone. If `point_table` is
/// given it is kept consistent with every flip.
///
/// # Errors
///
/// Returns [`DelaunayRepairError::NonConvergent`] if more than `max_flips`
/// flips would be needed; the mesh is left valid but possibly not Delaunay.
pub fn legalize_edges<T: CoordinateScalar>(
    mesh: &mut Mesh<T>,
    queue: impl IntoIterator<Item = usize>,
    mut point_table: Option<&mut [usize]>,
    max_flips: usize,
) -> Result<DelaunayRepairStats, DelaunayRepairError> {
    let mut stack: Vec<usize> = queue.into_iter().collect();
    let mut stats = DelaunayRepairStats {
        max_queue_len: stack.len(),
        ..DelaunayRepairStats::default()
    };

    while let Some(he) = stack.pop() {
        stats.edges_checked += 1;
        if !is_illegal_edge(mesh, he) || !is_flippable(mesh, he) {
            continue;
        }
        if stats.flips_performed == max_flips {
            tracing::warn!("[legalize] flip budget of {max_flips} exhausted");
            return Err(DelaunayRepairError::NonConvergent { max_flips });
        }
        let info = flip_edge_unchecked(mesh, he);
        stats.flips_performed += 1;
        if let Some(table) = point_table.as_deref_mut() {
            info.update_point_table(table);
        }
        stack.extend(info.outer_edges());
        stats.max_queue_len = stats.max_queue_len.max(stack.len());
    }

    Ok(stats)
}

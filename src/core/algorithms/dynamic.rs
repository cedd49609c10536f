//! Local edits on a built mesh.
//!
//! - [`insert_point_in_triangle`] splits a triangle into three around a point
//!   given by barycentric weights.
//! - [`split_halfedge`] inserts a point on an edge and splits the one or two
//!   incident triangles; both halves keep the edge's flags.
//! - [`remove_point`] removes an interior point, retriangulates its star by ear
//!   clipping and compacts the mesh.
//!
//! Each edit is followed by Lawson legalization and leaves the opposite-link
//! involution and the counter-clockwise orientation intact. Failed
//! preconditions are reported before anything is modified.

use crate::core::algorithms::flips::legalize_edges;
use crate::core::collections::{FastHashMap, HalfedgeBuffer, SmallBuffer};
use crate::core::halfedge::{NONE, next_halfedge, prev_halfedge, vertex_star};
use crate::core::mesh::Mesh;
use crate::geometry::point::Point;
use crate::geometry::predicates::{InCircle, Orientation, in_circumcircle, lerp, orientation};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Errors reported by the dynamic editor.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum EditError {
    /// The coordinate type cannot represent the new point.
    #[error("Inserting new points requires a continuous coordinate type, got {scalar}")]
    DiscreteCoordinates {
        /// Name of the coordinate type.
        scalar: &'static str,
    },
    /// The triangle does not exist.
    #[error("Triangle {triangle} is out of range")]
    TriangleOutOfRange {
        /// Offending triangle.
        triangle: usize,
    },
    /// The halfedge does not exist.
    #[error("Halfedge {halfedge} is out of range")]
    HalfedgeOutOfRange {
        /// Offending halfedge.
        halfedge: usize,
    },
    /// Barycentric weights must all be finite and strictly positive.
    #[error("Barycentric weights {weights:?} are not all strictly positive")]
    InvalidWeights {
        /// The rejected weights.
        weights: [f64; 3],
    },
    /// The split parameter must lie strictly between 0 and 1.
    #[error("Split parameter {t} is not strictly between 0 and 1")]
    InvalidSplitParameter {
        /// The rejected parameter.
        t: f64,
    },
    /// The point is not a vertex of any triangle.
    #[error("Point {point} is not a mesh vertex")]
    UnknownPoint {
        /// Offending point.
        point: usize,
    },
    /// Boundary points cannot be removed.
    #[error("Point {point} lies on the mesh boundary")]
    BoundaryPoint {
        /// Offending point.
        point: usize,
    },
    /// Points with an incident constrained edge cannot be removed.
    #[error("Point {point} is an endpoint of a constrained edge")]
    ConstrainedPoint {
        /// Offending point.
        point: usize,
    },
    /// The star of the point could not be retriangulated.
    #[error("Star of point {point} could not be retriangulated")]
    Retriangulation {
        /// Offending point.
        point: usize,
    },
    /// The new point would leave a flat or clockwise triangle, e.g. a weight
    /// or split parameter so close to zero that the point rounds onto an edge.
    #[error("Point at {position:?} would create a flat or inverted triangle")]
    DegenerateInsertion {
        /// Position of the rejected point.
        position: [f64; 2],
    },
    /// Legalization after the edit did not converge; the edit itself is kept
    /// and the mesh is structurally valid.
    #[error("Legalization after the edit did not converge within {max_flips} flips")]
    NonConvergent {
        /// Flip budget.
        max_flips: usize,
    },
}

fn require_continuous<T: CoordinateScalar>() -> Result<(), EditError> {
    if T::CONTINUOUS {
        Ok(())
    } else {
        Err(EditError::DiscreteCoordinates { scalar: T::NAME })
    }
}

/// Flip budget for legalizing after a single edit.
fn edit_flip_budget<T: CoordinateScalar>(mesh: &Mesh<T>) -> usize {
    mesh.halfedges.len().max(16)
}

fn relegalize<T: CoordinateScalar>(
    mesh: &mut Mesh<T>,
    queue: impl IntoIterator<Item = usize>,
    max_flips: usize,
) -> Result<(), EditError> {
    legalize_edges(mesh, queue, None, max_flips)
        .map(|_| ())
        .map_err(|_| EditError::NonConvergent { max_flips })
}

/// Rejects `p` unless every triangle in `triangles` stays counter-clockwise
/// with `p` in place of the `NONE` corner.
fn require_ccw<T: CoordinateScalar>(mesh: &Mesh<T>, p: &Point<T>, triangles: &[[usize; 3]]) -> Result<(), EditError> {
    let corner = |q: usize| if q == NONE { *p } else { mesh.positions[q] };
    let all_ccw = triangles
        .iter()
        .all(|&[a, b, c]| orientation(&corner(a), &corner(b), &corner(c)) == Orientation::POSITIVE);
    if all_ccw {
        Ok(())
    } else {
        Err(EditError::DegenerateInsertion { position: p.to_f64_array() })
    }
}

/// Inserts the point with barycentric `weights` in triangle `t` (corners in
/// slot order) and splits `t` into three. Weights are normalized to sum to 1.
/// Returns the new point index.
///
/// # Errors
///
/// Returns an [`EditError`] if the coordinates are discrete, `t` is out of
/// range, a weight is not strictly positive, or the point rounds onto an edge
/// of `t`; the mesh is unchanged in these cases.
/// [`EditError::NonConvergent`] is reported after the split, with the mesh
/// valid but possibly not Delaunay.
pub fn insert_point_in_triangle<T: CoordinateScalar>(
    mesh: &mut Mesh<T>,
    t: usize,
    weights: [f64; 3],
) -> Result<usize, EditError> {
    require_continuous::<T>()?;
    if t >= mesh.number_of_triangles() {
        return Err(EditError::TriangleOutOfRange { triangle: t });
    }
    if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
        return Err(EditError::InvalidWeights { weights });
    }
    let sum: f64 = weights.iter().sum();
    let base = 3 * t;
    let [a, b, c] = mesh.triangle(t);
    let corners = [a, b, c].map(|q| mesh.positions[q].to_f64_array());
    let coord = |k: usize| (0..3).map(|i| weights[i] / sum * corners[i][k]).sum::<f64>();
    let position = Point::from_f64_array([coord(0), coord(1)]);
    require_ccw(mesh, &position, &[[a, b, NONE], [b, c, NONE], [c, a, NONE]])?;
    let p = mesh.push_point(position);

    let ext_bc = mesh.halfedges[base + 1];
    let ext_ca = mesh.halfedges[base + 2];
    let flags_bc = (mesh.constrained_halfedges[base + 1], mesh.ignored_halfedges[base + 1]);
    let flags_ca = (mesh.constrained_halfedges[base + 2], mesh.ignored_halfedges[base + 2]);

    mesh.set_triangle(base, [a, b, p]);
    for he in [base + 1, base + 2] {
        mesh.halfedges[he] = NONE;
        mesh.constrained_halfedges[he] = false;
        mesh.ignored_halfedges[he] = false;
    }
    let s1 = mesh.add_triangle(b, c, p, ext_bc, NONE, base + 1);
    let s2 = mesh.add_triangle(c, a, p, ext_ca, base + 2, s1 + 1);
    (mesh.constrained_halfedges[s1], mesh.ignored_halfedges[s1]) = flags_bc;
    (mesh.constrained_halfedges[s2], mesh.ignored_halfedges[s2]) = flags_ca;

    let budget = edit_flip_budget(mesh);
    relegalize(mesh, [base, s1, s2], budget)?;
    Ok(p)
}

/// Inserts the point at parameter `t` along halfedge `he` and splits the
/// incident triangles. Returns the new point index.
///
/// # Errors
///
/// Returns an [`EditError`] if the coordinates are discrete, `he` is out of
/// range, `t` is not strictly inside `(0, 1)`, or the point rounds onto an
/// endpoint or off the edge; the mesh is unchanged in these cases.
/// [`EditError::NonConvergent`] is reported after the split, with the mesh
/// valid but possibly not Delaunay.
pub fn split_halfedge<T: CoordinateScalar>(mesh: &mut Mesh<T>, he: usize, t: f64) -> Result<usize, EditError> {
    require_continuous::<T>()?;
    if he >= mesh.halfedges.len() {
        return Err(EditError::HalfedgeOutOfRange { halfedge: he });
    }
    if !(t > 0.0 && t < 1.0) {
        return Err(EditError::InvalidSplitParameter { t });
    }

    let (a, b) = mesh.endpoints(he);
    let c = mesh.triangles[prev_halfedge(he)];
    let flags = (mesh.constrained_halfedges[he], mesh.ignored_halfedges[he]);
    let position = lerp(&mesh.positions[a], &mesh.positions[b], t);
    let mut halves: SmallBuffer<[usize; 3], 4> = SmallBuffer::new();
    halves.extend([[a, NONE, c], [NONE, b, c]]);
    if mesh.halfedges[he] != NONE {
        let d = mesh.triangles[prev_halfedge(mesh.halfedges[he])];
        halves.extend([[b, NONE, d], [NONE, a, d]]);
    }
    require_ccw(mesh, &position, &halves)?;
    let p = mesh.push_point(position);

    // Triangle (a, b, c) becomes (a, p, c) plus a new (p, b, c).
    let hn = next_halfedge(he);
    let ext_bc = mesh.halfedges[hn];
    let flags_bc = (mesh.constrained_halfedges[hn], mesh.ignored_halfedges[hn]);
    mesh.triangles[hn] = p;
    mesh.constrained_halfedges[hn] = false;
    mesh.ignored_halfedges[hn] = false;
    let q = mesh.add_triangle(p, b, c, NONE, ext_bc, hn);
    (mesh.constrained_halfedges[q + 1], mesh.ignored_halfedges[q + 1]) = flags_bc;

    let mut queue: SmallBuffer<usize, 4> = SmallBuffer::new();
    queue.extend([prev_halfedge(he), q + 1]);

    let o = mesh.halfedges[he];
    if o == NONE {
        mesh.set_edge_flags(q, flags.0, flags.1);
    } else {
        // Triangle (b, a, d) becomes (b, p, d) plus a new (p, a, d).
        let d = mesh.triangles[prev_halfedge(o)];
        let on = next_halfedge(o);
        let ext_ad = mesh.halfedges[on];
        let flags_ad = (mesh.constrained_halfedges[on], mesh.ignored_halfedges[on]);
        mesh.triangles[on] = p;
        mesh.constrained_halfedges[on] = false;
        mesh.ignored_halfedges[on] = false;
        let r = mesh.add_triangle(p, a, d, NONE, ext_ad, on);
        (mesh.constrained_halfedges[r + 1], mesh.ignored_halfedges[r + 1]) = flags_ad;

        mesh.link(he, r);
        mesh.link(o, q);
        mesh.set_edge_flags(o, flags.0, flags.1);
        queue.extend([prev_halfedge(o), r + 1]);
    }
    mesh.set_edge_flags(he, flags.0, flags.1);

    let budget = edit_flip_budget(mesh);
    relegalize(mesh, queue, budget)?;
    Ok(p)
}

/// Ear-clips the polygon `ring` (counter-clockwise) into triangles. Ears
/// whose circumcircle holds no other remaining vertex are taken first, which
/// keeps collinear runs from collapsing into a flat last triangle.
fn clip_ears<T: CoordinateScalar>(positions: &[Point<T>], ring: &[usize]) -> Option<Vec<[usize; 3]>> {
    let mut idx: Vec<usize> = ring.to_vec();
    let mut out = Vec::with_capacity(ring.len().saturating_sub(2));
    while idx.len() > 3 {
        let m = idx.len();
        let corners = |i: usize| (idx[(i + m - 1) % m], idx[i], idx[(i + 1) % m]);
        let is_ear = |i: usize| {
            let (a, b, c) = corners(i);
            let (pa, pb, pc) = (&positions[a], &positions[b], &positions[c]);
            orientation(pa, pb, pc) == Orientation::POSITIVE
                && idx.iter().all(|&x| {
                    x == a
                        || x == b
                        || x == c
                        || [(pa, pb), (pb, pc), (pc, pa)]
                            .iter()
                            .any(|&(u, v)| orientation(u, v, &positions[x]) == Orientation::NEGATIVE)
                })
        };
        let is_delaunay_ear = |i: usize| {
            let (a, b, c) = corners(i);
            idx.iter().all(|&x| {
                x == a
                    || x == b
                    || x == c
                    || in_circumcircle(&positions[a], &positions[b], &positions[c], &positions[x])
                        != InCircle::INSIDE
            })
        };
        let ear = (0..m)
            .find(|&i| is_ear(i) && is_delaunay_ear(i))
            .or_else(|| (0..m).find(|&i| is_ear(i)))?;
        let (a, b, c) = corners(ear);
        out.push([a, b, c]);
        idx.remove(ear);
    }
    let [a, b, c] = [idx[0], idx[1], idx[2]];
    if orientation(&positions[a], &positions[b], &positions[c]) != Orientation::POSITIVE {
        return None;
    }
    out.push([a, b, c]);
    Some(out)
}

/// Removes interior point `p`, retriangulates its star and compacts the mesh.
/// Every point index above `p` shifts down by one.
///
/// # Errors
///
/// Returns an [`EditError`] if `p` is unknown, lies on the boundary, is an
/// endpoint of a constrained edge, or its star cannot be retriangulated.
/// The mesh is unchanged in these cases. [`EditError::NonConvergent`] is
/// reported after the point is removed and the mesh compacted.
pub fn remove_point<T: CoordinateScalar>(mesh: &mut Mesh<T>, p: usize) -> Result<(), EditError> {
    let Some(start) = mesh.triangles.iter().position(|&x| x == p) else {
        return Err(EditError::UnknownPoint { point: p });
    };
    let (star, on_boundary): (HalfedgeBuffer, bool) = vertex_star(&mesh.halfedges, start);
    if on_boundary {
        return Err(EditError::BoundaryPoint { point: p });
    }
    if star.iter().any(|&h| mesh.constrained_halfedges[h]) {
        return Err(EditError::ConstrainedPoint { point: p });
    }

    // Polygon edge i runs from ring[i] to ring[i + 1] along next(star[i]).
    let ring: HalfedgeBuffer = star.iter().map(|&h| mesh.triangles[next_halfedge(h)]).collect();
    let Some(triangles) = clip_ears(&mesh.positions, &ring) else {
        return Err(EditError::Retriangulation { point: p });
    };

    let mut rim: FastHashMap<(usize, usize), (usize, (bool, bool))> = FastHashMap::default();
    for &h in &star {
        let e = next_halfedge(h);
        rim.insert(
            mesh.endpoints(e),
            (mesh.halfedges[e], (mesh.constrained_halfedges[e], mesh.ignored_halfedges[e])),
        );
    }

    let slots: HalfedgeBuffer = star.iter().map(|&h| 3 * (h / 3)).collect();
    for &base in &slots {
        for he in base..base + 3 {
            mesh.halfedges[he] = NONE;
            mesh.constrained_halfedges[he] = false;
            mesh.ignored_halfedges[he] = false;
        }
    }

    let mut inner: FastHashMap<(usize, usize), usize> = FastHashMap::default();
    let mut diagonals = Vec::new();
    for (corners, &base) in triangles.iter().zip(&slots) {
        mesh.set_triangle(base, *corners);
        for he in base..base + 3 {
            let (u, v) = mesh.endpoints(he);
            if let Some(&(outside, (constrained, ignored))) = rim.get(&(u, v)) {
                mesh.link(he, outside);
                mesh.constrained_halfedges[he] = constrained;
                mesh.ignored_halfedges[he] = ignored;
            } else if let Some(twin) = inner.remove(&(v, u)) {
                mesh.link(he, twin);
                diagonals.push(he);
            } else {
                inner.insert((u, v), he);
            }
        }
    }
    debug_assert!(inner.is_empty(), "unmatched diagonals after ear clipping");

    let budget = edit_flip_budget(mesh);
    let legalized = relegalize(mesh, diagonals, budget);

    let mut remove = vec![false; mesh.number_of_triangles()];
    for &base in &slots[triangles.len()..] {
        remove[base / 3] = true;
    }
    mesh.compact(&remove);
    legalized
}

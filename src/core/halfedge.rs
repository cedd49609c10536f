//! Flat half-edge utilities.
//!
//! A triangulation is stored as a flat `triangles` array where triangle `k`
//! occupies slots `3k`, `3k + 1` and `3k + 2`. Slot `he` doubles as the
//! identifier of the halfedge leaving corner `he` toward the next corner of
//! the same triangle, so halfedge `he` runs from `triangles[he]` to
//! `triangles[next_halfedge(he)]`. A parallel `halfedges` array stores the
//! opposite halfedge, or [`NONE`] on the boundary.
//!
//! ```text
//!           c
//!          / \
//!    he+2 /   \ he+1
//!        /     \
//!       a ----- b
//!          he
//! ```
//!
//! # Examples
//!
//! ```rust
//! use cdt_mesher::core::halfedge::{next_halfedge, prev_halfedge, rebuild_halfedges, NONE};
//!
//! assert_eq!(next_halfedge(5), 3);
//! assert_eq!(prev_halfedge(3), 5);
//!
//! // Two triangles sharing the edge 1-2.
//! let triangles = [0, 1, 2, 2, 1, 3];
//! let halfedges = rebuild_halfedges(&triangles).unwrap();
//! assert_eq!(halfedges, vec![NONE, 3, NONE, 1, NONE, NONE]);
//! ```

use crate::core::collections::{FastHashMap, HalfedgeBuffer, fast_hash_map_with_capacity};

/// Sentinel for "no halfedge" / "no triangle" / "no point".
pub const NONE: usize = usize::MAX;

/// Errors reported by halfedge reconstruction.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum HalfedgeError {
    /// The triangle buffer length is not a multiple of three.
    #[error("Triangle buffer length {len} is not a multiple of 3")]
    TruncatedTriangleBuffer {
        /// Length of the offending buffer.
        len: usize,
    },
    /// The same directed edge occurs in two triangles.
    #[error("Non-manifold input: directed edge {from} -> {to} occurs in more than one triangle")]
    NonManifoldEdge {
        /// Origin point of the repeated edge.
        from: usize,
        /// Destination point of the repeated edge.
        to: usize,
    },
}

/// Halfedge following `he` within its triangle.
#[inline]
#[must_use]
pub const fn next_halfedge(he: usize) -> usize {
    he - he % 3 + (he + 1) % 3
}

/// Halfedge preceding `he` within its triangle.
#[inline]
#[must_use]
pub const fn prev_halfedge(he: usize) -> usize {
    he - he % 3 + (he + 2) % 3
}

/// Triangle containing halfedge `he`.
#[inline]
#[must_use]
pub const fn triangle_of(he: usize) -> usize {
    he / 3
}

/// Rebuilds opposite links from the corner array alone.
///
/// # Errors
///
/// Returns [`HalfedgeError::TruncatedTriangleBuffer`] if `triangles.len()` is
/// not a multiple of three, and [`HalfedgeError::NonManifoldEdge`] if a
/// directed edge repeats.
pub fn rebuild_halfedges(triangles: &[usize]) -> Result<Vec<usize>, HalfedgeError> {
    if triangles.len() % 3 != 0 {
        return Err(HalfedgeError::TruncatedTriangleBuffer {
            len: triangles.len(),
        });
    }

    let mut directed: FastHashMap<(usize, usize), usize> =
        fast_hash_map_with_capacity(triangles.len());
    for (he, &from) in triangles.iter().enumerate() {
        let to = triangles[next_halfedge(he)];
        if directed.insert((from, to), he).is_some() {
            return Err(HalfedgeError::NonManifoldEdge { from, to });
        }
    }

    Ok((0..triangles.len())
        .map(|he| {
            let from = triangles[he];
            let to = triangles[next_halfedge(he)];
            directed.get(&(to, from)).copied().unwrap_or(NONE)
        })
        .collect())
}

/// Outgoing halfedges of the origin of `start`, in counter-clockwise order.
///
/// The walk first rotates clockwise until it reaches the boundary (or comes
/// back to `start`), then collects counter-clockwise. The returned flag is
/// `true` when the vertex lies on the mesh boundary; in that case the first
/// entry is the most clockwise outgoing halfedge and its opposite is [`NONE`].
/// For interior vertices the first entry is `start`.
#[must_use]
pub fn vertex_star(halfedges: &[usize], start: usize) -> (HalfedgeBuffer, bool) {
    let limit = halfedges.len();
    let mut first = start;
    let mut on_boundary = false;
    let mut he = start;
    for _ in 0..limit {
        let opposite = halfedges[he];
        if opposite == NONE {
            on_boundary = true;
            first = he;
            break;
        }
        let candidate = next_halfedge(opposite);
        if candidate == start {
            break;
        }
        he = candidate;
    }

    let mut star = HalfedgeBuffer::new();
    he = first;
    for _ in 0..limit {
        star.push(he);
        let incoming = halfedges[prev_halfedge(he)];
        if incoming == NONE || incoming == first {
            if incoming == NONE {
                on_boundary = true;
            }
            break;
        }
        he = incoming;
    }
    (star, on_boundary)
}

/// One outgoing halfedge per point (or [`NONE`] for unreferenced points).
///
/// For points on the boundary the entry is the most clockwise outgoing
/// halfedge, so [`vertex_star`] starting from it needs no backward walk.
#[must_use]
pub fn point_to_halfedge(triangles: &[usize], halfedges: &[usize], n_points: usize) -> Vec<usize> {
    let mut table = vec![NONE; n_points];
    for (he, &p) in triangles.iter().enumerate() {
        if table[p] == NONE || halfedges[he] == NONE {
            table[p] = he;
        }
    }
    table
}

/// Triangles incident to `point`, in slot order.
#[must_use]
pub fn triangles_around_point(triangles: &[usize], point: usize) -> Vec<usize> {
    triangles
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p == point)
        .map(|(he, _)| triangle_of(he))
        .collect()
}

/// Halfedge running from `from` to `to`, if the mesh contains it.
#[must_use]
pub fn find_halfedge(triangles: &[usize], from: usize, to: usize) -> Option<usize> {
    (0..triangles.len()).find(|&he| triangles[he] == from && triangles[next_halfedge(he)] == to)
}

/// Halfedge of the edge between the origin of `start` and `to`, searched in
/// the star of that origin. Either direction of the edge may be returned.
#[must_use]
pub fn find_edge_in_star(triangles: &[usize], halfedges: &[usize], start: usize, to: usize) -> Option<usize> {
    if start == NONE {
        return None;
    }
    let (star, _) = vertex_star(halfedges, start);
    star.iter().find_map(|&h| {
        if triangles[next_halfedge(h)] == to {
            Some(h)
        } else if triangles[prev_halfedge(h)] == to {
            Some(prev_halfedge(h))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fan of four triangles around point 4 in the middle of a square.
    ///
    /// ```text
    /// 3 ----- 2
    /// | \   / |
    /// |   4   |
    /// | /   \ |
    /// 0 ----- 1
    /// ```
    fn fan() -> Vec<usize> {
        vec![0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4]
    }

    #[test]
    fn next_and_prev_cycle_within_a_triangle() {
        for he in 0..9 {
            assert_eq!(prev_halfedge(next_halfedge(he)), he);
            assert_eq!(triangle_of(next_halfedge(he)), triangle_of(he));
            assert_eq!(next_halfedge(next_halfedge(next_halfedge(he))), he);
        }
    }

    #[test]
    fn rebuild_links_interior_and_boundary_edges() {
        let tris = fan();
        let he = rebuild_halfedges(&tris).unwrap();
        // 1->4 (slot 1) is opposite 4->1 (slot 5).
        assert_eq!(he[1], 5);
        assert_eq!(he[5], 1);
        // Outer edges are boundary.
        for slot in [0, 3, 6, 9] {
            assert_eq!(he[slot], NONE);
        }
        for (i, &o) in he.iter().enumerate() {
            if o != NONE {
                assert_eq!(he[o], i);
            }
        }
    }

    #[test]
    fn rebuild_rejects_repeated_directed_edges() {
        let tris = [0, 1, 2, 0, 1, 3];
        assert_eq!(
            rebuild_halfedges(&tris),
            Err(HalfedgeError::NonManifoldEdge { from: 0, to: 1 })
        );
        assert!(matches!(
            rebuild_halfedges(&[0, 1]),
            Err(HalfedgeError::TruncatedTriangleBuffer { len: 2 })
        ));
    }

    #[test]
    fn interior_star_is_closed_and_ccw() {
        let tris = fan();
        let he = rebuild_halfedges(&tris).unwrap();
        // Slot 2 is 4 -> 0.
        let (star, boundary) = vertex_star(&he, 2);
        assert!(!boundary);
        let targets: Vec<usize> = star.iter().map(|&h| tris[next_halfedge(h)]).collect();
        assert_eq!(targets, vec![0, 1, 2, 3]);
    }

    #[test]
    fn boundary_star_starts_at_the_clockwise_end() {
        let tris = fan();
        let he = rebuild_halfedges(&tris).unwrap();
        // Corner 0 of triangle 0 is point 0, whose star is 0->1 and 0->4.
        let (star, boundary) = vertex_star(&he, 10);
        assert!(boundary);
        let targets: Vec<usize> = star.iter().map(|&h| tris[next_halfedge(h)]).collect();
        assert_eq!(targets, vec![1, 4]);
    }

    #[test]
    fn adjacency_queries() {
        let tris = fan();
        let he = rebuild_halfedges(&tris).unwrap();
        assert_eq!(triangles_around_point(&tris, 4), vec![0, 1, 2, 3]);
        assert_eq!(triangles_around_point(&tris, 1), vec![0, 1]);
        assert_eq!(find_halfedge(&tris, 2, 3), Some(6));
        assert_eq!(find_halfedge(&tris, 3, 2), None);
        let table = point_to_halfedge(&tris, &he, 6);
        assert_eq!(table[5], NONE);
        assert_eq!(tris[table[0]], 0);
        assert_eq!(he[table[0]], NONE);

        // 0-3 is only reachable as the incoming edge 3 -> 0 of the last star entry.
        assert_eq!(find_edge_in_star(&tris, &he, table[0], 3), Some(9));
        assert_eq!(find_edge_in_star(&tris, &he, table[0], 4), Some(2));
        assert_eq!(find_edge_in_star(&tris, &he, table[0], 2), None);
        assert_eq!(find_edge_in_star(&tris, &he, NONE, 2), None);
    }
}

//! Constraint edge restoration.
//!
//! Each required edge `(u, v)` that is not already a mesh edge is recovered
//! with Sloan's flipping algorithm:
//!
//! 1. Walk from `u` toward `v`, collecting every edge the open segment
//!    crosses.
//! 2. Repeatedly take a crossed edge; if its quadrilateral is strictly convex
//!    flip it, otherwise defer it to the back of the queue. A new diagonal that
//!    still crosses the segment is queued again; otherwise it is recorded as
//!    a new edge.
//! 3. Mark `(u, v)` constrained, then Lawson-legalize the new edges.
//!
//! A segment that passes exactly through another vertex is restored as the
//! two sub-segments on either side of it. Crossing an edge that is already
//! constrained is an intersection error.

use std::collections::VecDeque;

use crate::core::algorithms::flips::{FlipInfo, flip_edge_unchecked, is_flippable, legalize_edges};
use crate::core::collections::CavityBuffer;
use crate::core::halfedge::{
    NONE, find_edge_in_star, next_halfedge, point_to_halfedge, prev_halfedge, vertex_star,
};
use crate::core::mesh::Mesh;
use crate::geometry::predicates::{Orientation, orientation, segments_cross};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Errors reported by [`restore_constraints`].
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConstraintError {
    /// The segment crosses an edge that is already constrained.
    #[error("Constraint {constraint} ({from} -> {to}) intersects the constrained edge {edge:?}")]
    IntersectingConstraint {
        /// Index of the constraint being restored.
        constraint: usize,
        /// Segment origin.
        from: usize,
        /// Segment destination.
        to: usize,
        /// Endpoints of the constrained edge that was hit.
        edge: (usize, usize),
    },
    /// Flipping did not recover the segment, or did not make the mesh around
    /// it Delaunay again, within the iteration budget.
    #[error("Constraint restoration did not converge for constraint {constraint} after {iterations} iterations")]
    NonConvergent {
        /// Index of the constraint being restored.
        constraint: usize,
        /// Iterations performed.
        iterations: usize,
    },
    /// An endpoint is not a vertex of the mesh (e.g. a skipped duplicate).
    #[error("Constraint {constraint} references point {point}, which is not a mesh vertex")]
    MissingEndpoint {
        /// Index of the constraint.
        constraint: usize,
        /// The missing point.
        point: usize,
    },
    /// The walk from `from` toward `to` left the mesh.
    #[error("Constraint {constraint} ({from} -> {to}) leaves the triangulated domain")]
    OutsideDomain {
        /// Index of the constraint.
        constraint: usize,
        /// Segment origin.
        from: usize,
        /// Segment destination.
        to: usize,
    },
}

/// Counters reported by [`restore_constraints`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConstraintStats {
    /// Segments that were already mesh edges.
    pub already_present: usize,
    /// Segments recovered by flipping.
    pub recovered: usize,
    /// Segments split because they pass through a vertex.
    pub split_at_vertices: usize,
    /// Flips performed by the recovery loop (legalization excluded).
    pub flips: usize,
}

/// How a segment leaves its origin vertex.
enum Departure {
    /// The segment is the edge of this halfedge.
    Edge(usize),
    /// The segment runs along an existing edge to this intermediate vertex.
    Through { halfedge: usize, vertex: usize },
    /// The segment enters the triangle of `u` and crosses this halfedge.
    Crosses(usize),
}

/// Result of walking along a segment.
struct Walk {
    crossed: CavityBuffer,
    /// Vertex lying on the segment where the walk stopped, if any.
    through: Option<usize>,
}

struct Restorer<'a, T: CoordinateScalar> {
    mesh: &'a mut Mesh<T>,
    table: Vec<usize>,
    max_iters: usize,
    stats: ConstraintStats,
}

impl<T: CoordinateScalar> Restorer<'_, T> {
    fn same_direction(&self, u: usize, w: usize, v: usize) -> bool {
        let [ux, uy] = self.mesh.positions[u].to_f64_array();
        let [wx, wy] = self.mesh.positions[w].to_f64_array();
        let [vx, vy] = self.mesh.positions[v].to_f64_array();
        (wx - ux).mul_add(vx - ux, (wy - uy) * (vy - uy)) > 0.0
    }

    fn orient(&self, a: usize, b: usize, c: usize) -> Orientation {
        let p = &self.mesh.positions;
        orientation(&p[a], &p[b], &p[c])
    }

    fn depart(&self, constraint: usize, u: usize, v: usize) -> Result<Departure, ConstraintError> {
        let start = self.table[u];
        if start == NONE {
            return Err(ConstraintError::MissingEndpoint { constraint, point: u });
        }
        let tri = &self.mesh.triangles;
        let (star, _) = vertex_star(&self.mesh.halfedges, start);
        for &h in &star {
            let w = tri[next_halfedge(h)];
            let x = tri[prev_halfedge(h)];
            if w == v {
                return Ok(Departure::Edge(h));
            }
            if x == v {
                return Ok(Departure::Edge(prev_halfedge(h)));
            }
            let ow = self.orient(u, w, v);
            let ox = self.orient(u, x, v);
            if ow == Orientation::DEGENERATE && self.same_direction(u, w, v) {
                return Ok(Departure::Through { halfedge: h, vertex: w });
            }
            if ox == Orientation::DEGENERATE && self.same_direction(u, x, v) {
                return Ok(Departure::Through {
                    halfedge: prev_halfedge(h),
                    vertex: x,
                });
            }
            if ow == Orientation::POSITIVE && ox == Orientation::NEGATIVE {
                return Ok(Departure::Crosses(next_halfedge(h)));
            }
        }
        Err(ConstraintError::OutsideDomain { constraint, from: u, to: v })
    }

    fn walk(&self, constraint: usize, u: usize, v: usize, first: usize) -> Result<Walk, ConstraintError> {
        let mesh = &*self.mesh;
        let mut crossed = CavityBuffer::new();
        let mut e = first;
        loop {
            if mesh.constrained_halfedges[e] {
                return Err(ConstraintError::IntersectingConstraint {
                    constraint,
                    from: u,
                    to: v,
                    edge: mesh.endpoints(e),
                });
            }
            crossed.push(e);
            let o = mesh.halfedges[e];
            if o == NONE {
                return Err(ConstraintError::OutsideDomain { constraint, from: u, to: v });
            }
            let y = mesh.triangles[prev_halfedge(o)];
            if y == v {
                return Ok(Walk { crossed, through: None });
            }
            e = match self.orient(u, v, y) {
                Orientation::DEGENERATE => {
                    return Ok(Walk {
                        crossed,
                        through: Some(y),
                    });
                }
                Orientation::POSITIVE => next_halfedge(o),
                Orientation::NEGATIVE => prev_halfedge(o),
            };
        }
    }

    fn crosses(&self, he: usize, u: usize, v: usize) -> bool {
        let (p, q) = self.mesh.endpoints(he);
        if p == u || p == v || q == u || q == v {
            return false;
        }
        let pos = &self.mesh.positions;
        segments_cross(&pos[u], &pos[v], &pos[p], &pos[q])
    }

    fn flip(&mut self, he: usize) -> FlipInfo {
        let info = flip_edge_unchecked(self.mesh, he);
        info.update_point_table(&mut self.table);
        self.stats.flips += 1;
        info
    }

    /// Sloan's recovery loop over the crossed edges of `(u, v)`. Returns the
    /// new edges created on the way.
    fn recover(&mut self, constraint: usize, u: usize, v: usize, crossed: &[usize]) -> Result<Vec<usize>, ConstraintError> {
        let mut queue: VecDeque<usize> = crossed.iter().copied().collect();
        let mut new_edges = Vec::new();
        let mut iterations = 0;

        while let Some(e) = queue.pop_front() {
            iterations += 1;
            if iterations > self.max_iters {
                tracing::warn!("[constraints] constraint {constraint} ({u} -> {v}) hit the iteration limit");
                return Err(ConstraintError::NonConvergent { constraint, iterations: self.max_iters });
            }
            if !is_flippable(self.mesh, e) {
                queue.push_back(e);
                continue;
            }
            let info = self.flip(e);
            let [moved_bl, _, moved_ar, _] = info.outer_edges();
            let remap = |x: &mut usize| {
                if *x == info.diagonal_twin {
                    *x = moved_bl;
                } else if *x == info.diagonal {
                    *x = moved_ar;
                }
            };
            queue.iter_mut().for_each(remap);
            new_edges.iter_mut().for_each(remap);

            if self.crosses(info.diagonal, u, v) {
                queue.push_back(info.diagonal);
            } else {
                new_edges.push(info.diagonal);
            }
        }
        Ok(new_edges)
    }

    fn restore(&mut self, constraint: usize, from: usize, to: usize, ignored: bool) -> Result<(), ConstraintError> {
        let mut pending = vec![(from, to)];
        while let Some((u, v)) = pending.pop() {
            if u == v {
                continue;
            }
            match self.depart(constraint, u, v)? {
                Departure::Edge(he) => {
                    self.mesh.set_edge_flags(he, true, ignored);
                    self.stats.already_present += 1;
                }
                Departure::Through { halfedge, vertex } => {
                    self.mesh.set_edge_flags(halfedge, true, ignored);
                    self.stats.split_at_vertices += 1;
                    pending.push((vertex, v));
                }
                Departure::Crosses(first) => {
                    let walk = self.walk(constraint, u, v, first)?;
                    let end = match walk.through {
                        Some(w) => {
                            self.stats.split_at_vertices += 1;
                            pending.push((w, v));
                            w
                        }
                        None => v,
                    };
                    let new_edges = self.recover(constraint, u, end, &walk.crossed)?;
                    let Some(he) = find_edge_in_star(&self.mesh.triangles, &self.mesh.halfedges, self.table[u], end) else {
                        return Err(ConstraintError::NonConvergent {
                            constraint,
                            iterations: self.max_iters,
                        });
                    };
                    self.mesh.set_edge_flags(he, true, ignored);
                    self.stats.recovered += 1;
                    // Constrained edges are never flipped, so the segment survives.
                    legalize_edges(self.mesh, new_edges, Some(self.table.as_mut_slice()), self.max_iters)
                        .map_err(|_| ConstraintError::NonConvergent {
                            constraint,
                            iterations: self.max_iters,
                        })?;
                }
            }
        }
        Ok(())
    }
}

/// Forces every `constraints[i]` into the mesh as a constrained edge.
///
/// `ignored[i]` (when given) additionally marks the edge as ignored for hole
/// planting. `max_iters` bounds the recovery loop per constraint.
///
/// # Errors
///
/// Returns a [`ConstraintError`] on the first failing constraint. The mesh
/// stays structurally valid and keeps every constraint restored so far.
pub fn restore_constraints<T: CoordinateScalar>(
    mesh: &mut Mesh<T>,
    constraints: &[[usize; 2]],
    ignored: Option<&[bool]>,
    max_iters: usize,
) -> Result<ConstraintStats, ConstraintError> {
    let table = point_to_halfedge(&mesh.triangles, &mesh.halfedges, mesh.positions.len());
    let mut restorer = Restorer {
        mesh,
        table,
        max_iters,
        stats: ConstraintStats::default(),
    };

    for (i, &[from, to]) in constraints.iter().enumerate() {
        for point in [from, to] {
            if point >= restorer.table.len() {
                return Err(ConstraintError::MissingEndpoint { constraint: i, point });
            }
        }
        let ignore = ignored.and_then(|flags| flags.get(i)).copied().unwrap_or(false);
        restorer.restore(i, from, to, ignore)?;
    }

    let stats = restorer.stats;
    tracing::debug!(
        "[constraints] {} present, {} recovered, {} split at vertices, {} flips",
        stats.already_present,
        stats.recovered,
        stats.split_at_vertices,
        stats.flips
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::build_delaunay;
    use crate::core::halfedge::find_halfedge;
    use crate::core::util::delaunay_validation::is_delaunay;
    use crate::geometry::point::Point;
    use crate::geometry::util::{generate_grid_points, generate_random_points_seeded};

    fn built(points: Vec<Point<f64>>) -> Mesh<f64> {
        let mut mesh = Mesh::from_points(points);
        build_delaunay(&mut mesh).unwrap();
        mesh
    }

    fn has_constrained_edge(mesh: &Mesh<f64>, u: usize, v: usize) -> bool {
        find_halfedge(mesh.triangles(), u, v)
            .or_else(|| find_halfedge(mesh.triangles(), v, u))
            .is_some_and(|he| mesh.constrained_halfedges()[he])
    }

    #[test]
    fn existing_edges_are_only_marked() {
        let mut mesh = built(vec![
            Point::new([0.0, 0.0]),
            Point::new([1.0, 0.0]),
            Point::new([1.0, 1.0]),
            Point::new([0.0, 1.0]),
        ]);
        let stats = restore_constraints(&mut mesh, &[[0, 1], [1, 2]], Some(&[false, true]), 100).unwrap();
        assert_eq!(stats.already_present, 2);
        assert_eq!(stats.flips, 0);
        assert!(has_constrained_edge(&mesh, 0, 1));
        let he = find_halfedge(mesh.triangles(), 1, 2).unwrap();
        assert!(mesh.ignored_halfedges()[he]);
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn crossing_segment_is_recovered_by_flips() {
        // A wide, flat hexagon: the Delaunay mesh never contains the long
        // horizontal diagonal 0 -> 3.
        let mut mesh = built(vec![
            Point::new([0.0, 0.0]),
            Point::new([2.0, -1.0]),
            Point::new([4.0, -1.0]),
            Point::new([6.0, 0.0]),
            Point::new([4.0, 1.0]),
            Point::new([2.0, 1.0]),
        ]);
        assert!(find_halfedge(mesh.triangles(), 0, 3).is_none() && find_halfedge(mesh.triangles(), 3, 0).is_none());
        let stats = restore_constraints(&mut mesh, &[[0, 3]], None, 1000).unwrap();
        assert_eq!(stats.recovered, 1);
        assert!(stats.flips > 0);
        assert!(has_constrained_edge(&mesh, 0, 3));
        assert!(mesh.is_valid().is_ok());
        assert!(is_delaunay(&mesh).is_ok());
    }

    #[test]
    fn segment_through_a_vertex_is_split() {
        let points = generate_grid_points::<f64>(5, 5, 1.0, [0.0, 0.0]);
        let mut mesh = built(points);
        // Diagonal of the grid passes through 6, 12 and 18.
        let stats = restore_constraints(&mut mesh, &[[0, 24]], None, 1000).unwrap();
        assert!(stats.split_at_vertices >= 3);
        for (u, v) in [(0, 6), (6, 12), (12, 18), (18, 24)] {
            assert!(has_constrained_edge(&mesh, u, v), "missing {u}-{v}");
        }
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn crossing_constraints_are_rejected() {
        let mut mesh = built(vec![
            Point::new([0.0, 0.0]),
            Point::new([2.0, 0.0]),
            Point::new([2.0, 2.0]),
            Point::new([0.0, 2.0]),
            Point::new([1.0, 3.0]),
            Point::new([1.0, -1.0]),
        ]);
        let err = restore_constraints(&mut mesh, &[[0, 2], [4, 5]], None, 1000).unwrap_err();
        assert!(matches!(err, ConstraintError::IntersectingConstraint { constraint: 1, .. }));
        assert!(has_constrained_edge(&mesh, 0, 2));
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let mut mesh = built(vec![
            Point::new([0.0, 0.0]),
            Point::new([2.0, -1.0]),
            Point::new([4.0, -1.0]),
            Point::new([6.0, 0.0]),
            Point::new([4.0, 1.0]),
            Point::new([2.0, 1.0]),
        ]);
        let err = restore_constraints(&mut mesh, &[[0, 3]], None, 1).unwrap_err();
        assert!(matches!(err, ConstraintError::NonConvergent { constraint: 0, .. }));
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn success_implies_a_delaunay_mesh_at_every_budget() {
        let points: Vec<Point<f64>> = generate_random_points_seeded(80, (-10.0, 10.0), 11).unwrap();
        let (left, right) = {
            let by_x = |&a: &usize, &b: &usize| points[a].x().total_cmp(&points[b].x());
            let left = (0..points.len()).min_by(by_x).unwrap();
            let right = (0..points.len()).max_by(by_x).unwrap();
            (left, right)
        };
        let base = built(points);
        for budget in 1..=64 {
            let mut mesh = base.clone();
            match restore_constraints(&mut mesh, &[[left, right]], None, budget) {
                Ok(_) => assert!(is_delaunay(&mesh).is_ok(), "budget {budget} reported success"),
                Err(ConstraintError::NonConvergent { constraint: 0, iterations }) => {
                    assert_eq!(iterations, budget);
                }
                Err(other) => panic!("budget {budget}: {other}"),
            }
            assert!(mesh.is_valid().is_ok());
        }
        let mut mesh = base;
        restore_constraints(&mut mesh, &[[left, right]], None, 1_000_000).unwrap();
        assert!(is_delaunay(&mesh).is_ok());
    }

    #[test]
    fn out_of_range_endpoint() {
        let mut mesh = built(vec![
            Point::new([0.0, 0.0]),
            Point::new([1.0, 0.0]),
            Point::new([0.0, 1.0]),
        ]);
        assert_eq!(
            restore_constraints(&mut mesh, &[[0, 7]], None, 10),
            Err(ConstraintError::MissingEndpoint { constraint: 0, point: 7 })
        );
    }
}

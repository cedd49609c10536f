//! Ruppert quality refinement.
//!
//! Steiner points are inserted until every triangle has an area at most
//! [`RefinementThresholds::area`] and no angle below
//! [`RefinementThresholds::angle`], and no segment is encroached. Segments are
//! the constrained halfedges plus the mesh boundary.
//!
//! The refiner alternates two queues:
//!
//! - **Segments**: a segment is encroached when the apex of one of its
//!   triangles lies strictly inside its diametral circle. Encroached segments
//!   are split before any triangle is processed.
//! - **Bad triangles**, largest area first (ties by lower slot). The
//!   circumcenter is located by a straight walk from the triangle. If the
//!   walk is blocked by a segment, or the circumcenter encroaches a segment on
//!   its cavity boundary, those segments are split instead; otherwise the
//!   circumcenter is inserted with a constrained Bowyer–Watson cavity.
//!
//! Segments between two input points (or two Steiner points) are split at the
//! midpoint. A segment with one input endpoint is split on a concentric shell
//! around that endpoint, at a power-of-two multiple of the shell parameter,
//! which keeps Ruppert's algorithm from cascading near small input angles.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::algorithms::incremental_insertion::{
    Cavity, InsertionError, find_cavity, insert_with_cavity,
};
use crate::core::algorithms::locate::{LocateResult, classify_in_triangle};
use crate::core::halfedge::{NONE, find_edge_in_star, next_halfedge, point_to_halfedge, prev_halfedge};
use crate::core::mesh::Mesh;
use crate::geometry::point::Point;
use crate::geometry::predicates::{
    Orientation, angle_below, area, circumcenter, encroaches, lerp, orientation, squared_length,
};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Quality bounds for refinement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefinementThresholds {
    /// Maximum triangle area.
    pub area: f64,
    /// Minimum interior angle, in radians.
    pub angle: f64,
}

impl Default for RefinementThresholds {
    fn default() -> Self {
        Self {
            area: 1.0,
            angle: 5f64.to_radians(),
        }
    }
}

impl RefinementThresholds {
    /// Returns `true` if the triangle `(a, b, c)` violates either bound.
    #[must_use]
    pub fn is_bad<T: CoordinateScalar>(&self, a: &Point<T>, b: &Point<T>, c: &Point<T>) -> bool {
        area(a, b, c) > self.area || angle_below(a, b, c, self.angle)
    }
}

/// Errors reported by [`refine_mesh`].
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum RefinementError {
    /// The coordinate type cannot represent Steiner points.
    #[error("Refinement requires a continuous coordinate type, got {scalar}")]
    DiscreteCoordinates {
        /// Name of the coordinate type.
        scalar: &'static str,
    },
    /// The triangle ceiling was exceeded; the partial mesh is kept.
    #[error("Refinement exceeded the limit of {limit} triangles")]
    TriangleLimitExceeded {
        /// Configured ceiling.
        limit: usize,
    },
    /// Splitting a segment failed.
    #[error("Segment split failed: {0}")]
    SegmentSplit(#[from] InsertionError),
}

/// Counters reported by [`refine_mesh`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefinementStats {
    /// Circumcenters inserted.
    pub circumcenters: usize,
    /// Segment splits performed.
    pub segment_splits: usize,
    /// Bad triangles that could not be improved and were left as they are.
    pub skipped_triangles: usize,
}

/// Where a straight walk toward a circumcenter ended.
enum Walk {
    Located(LocateResult),
    Blocked(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct BadTriangle {
    area: OrderedFloat<f64>,
    slot: Reverse<usize>,
    corners: [usize; 3],
}

struct Refiner<'a, T: CoordinateScalar> {
    mesh: &'a mut Mesh<T>,
    thresholds: RefinementThresholds,
    shells: f64,
    max_triangles: usize,
    n_input: usize,
    table: Vec<usize>,
    segments: VecDeque<(usize, usize)>,
    bad: BinaryHeap<BadTriangle>,
    stats: RefinementStats,
}

impl<T: CoordinateScalar> Refiner<'_, T> {
    fn push_if_bad(&mut self, t: usize) {
        let corners = self.mesh.triangle(t);
        let [a, b, c] = corners.map(|p| self.mesh.positions[p]);
        if self.thresholds.is_bad(&a, &b, &c) {
            self.bad.push(BadTriangle {
                area: OrderedFloat(area(&a, &b, &c)),
                slot: Reverse(t),
                corners,
            });
        }
    }

    fn segment_halfedge(&self, (a, b): (usize, usize)) -> Option<usize> {
        let he = find_edge_in_star(&self.mesh.triangles, &self.mesh.halfedges, self.table[a], b)?;
        self.mesh.is_segment(he).then_some(he)
    }

    fn is_encroached(&self, he: usize) -> bool {
        let (a, b) = self.mesh.endpoints(he);
        let pos = &self.mesh.positions;
        let apex = |h: usize| pos[self.mesh.triangles[prev_halfedge(h)]];
        let o = self.mesh.halfedges[he];
        encroaches(&apex(he), &pos[a], &pos[b]) || (o != NONE && encroaches(&apex(o), &pos[a], &pos[b]))
    }

    fn split_point(&self, he: usize) -> Point<T> {
        let (a, b) = self.mesh.endpoints(he);
        let a_input = a < self.n_input;
        let b_input = b < self.n_input;
        let pa = &self.mesh.positions[a];
        let pb = &self.mesh.positions[b];
        if a_input == b_input {
            return lerp(pa, pb, 0.5);
        }
        let d = squared_length(pa, pb).sqrt();
        let k = (0.5 * d / self.shells).log2().round();
        let t = self.shells * k.exp2() / d;
        let t = if t > 0.0 && t < 1.0 { t } else { 0.5 };
        if a_input { lerp(pa, pb, t) } else { lerp(pa, pb, 1.0 - t) }
    }

    fn record_fan(&mut self, p: usize, fan: &[usize]) {
        if self.table.len() <= p {
            self.table.resize(p + 1, NONE);
        }
        for &t in fan {
            let base = 3 * t;
            self.table[self.mesh.triangles[base]] = base;
            self.table[self.mesh.triangles[base + 1]] = base + 1;
            self.table[p] = base + 2;
        }
        for &t in fan {
            self.push_if_bad(t);
        }
    }

    fn check_limit(&self) -> Result<(), RefinementError> {
        if self.mesh.number_of_triangles() > self.max_triangles {
            tracing::warn!(
                "[refine] triangle limit {} exceeded after {} circumcenters and {} segment splits",
                self.max_triangles,
                self.stats.circumcenters,
                self.stats.segment_splits
            );
            return Err(RefinementError::TriangleLimitExceeded {
                limit: self.max_triangles,
            });
        }
        Ok(())
    }

    fn split_segment(&mut self, he: usize) -> Result<(), RefinementError> {
        let point = self.split_point(he);
        let ends = self.mesh.endpoints(he);
        let o = self.mesh.halfedges[he];
        let seeds = [he / 3, if o == NONE { he / 3 } else { o / 3 }];
        let cavity = find_cavity(self.mesh, &point, &seeds, Some(he))?;
        let rim: Vec<(usize, usize)> = cavity
            .boundary_segments(self.mesh)
            .map(|s| self.mesh.endpoints(s))
            .collect();
        let (p, fan) = insert_with_cavity(self.mesh, point, &cavity)?;
        self.stats.segment_splits += 1;
        self.record_fan(p, &fan);
        self.segments.push_back((ends.0, p));
        self.segments.push_back((p, ends.1));
        self.segments.extend(rim);
        self.check_limit()
    }

    fn drain_segments(&mut self) -> Result<(), RefinementError> {
        while let Some(segment) = self.segments.pop_front() {
            if let Some(he) = self.segment_halfedge(segment)
                && self.is_encroached(he)
            {
                self.split_segment(he)?;
            }
        }
        Ok(())
    }

    /// Straight walk from the centroid of `start` toward `target`, stopping
    /// at the first segment crossed.
    fn walk(&self, start: usize, target: &Point<T>) -> Option<Walk> {
        let mesh = &*self.mesh;
        let [a, b, c] = mesh.triangle_points(start).map(|p| p.to_f64_array());
        let origin = Point::<T>::from_f64_array([(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0]);

        let mut current = start;
        let mut entry = NONE;
        for _ in 0..=mesh.number_of_triangles() {
            let mut exit = None;
            for he in 3 * current..3 * current + 3 {
                if he == entry {
                    continue;
                }
                let pa = &mesh.positions[mesh.triangles[he]];
                let pb = &mesh.positions[mesh.triangles[next_halfedge(he)]];
                if orientation(pa, pb, target) == Orientation::NEGATIVE
                    && orientation(&origin, target, pa) != Orientation::POSITIVE
                    && orientation(&origin, target, pb) != Orientation::NEGATIVE
                {
                    exit = Some(he);
                    break;
                }
            }
            let Some(he) = exit else {
                let found =
                    classify_in_triangle(mesh, current, target).unwrap_or(LocateResult::InsideTriangle(current));
                return Some(Walk::Located(found));
            };
            if mesh.is_segment(he) {
                return Some(Walk::Blocked(he));
            }
            entry = mesh.halfedges[he];
            current = entry / 3;
        }
        None
    }

    fn process(&mut self, bad: BadTriangle) -> Result<(), RefinementError> {
        let t = bad.slot.0;
        let [a, b, c] = self.mesh.triangle_points(t);
        let Some(center) = circumcenter(&a, &b, &c) else {
            self.stats.skipped_triangles += 1;
            return Ok(());
        };

        let seed = match self.walk(t, &center) {
            Some(Walk::Blocked(he)) => {
                self.split_segment(he)?;
                self.requeue(bad);
                return Ok(());
            }
            Some(Walk::Located(LocateResult::InsideTriangle(found))) => found,
            Some(Walk::Located(LocateResult::OnEdge(he))) => {
                if self.mesh.is_segment(he) {
                    self.split_segment(he)?;
                    self.requeue(bad);
                    return Ok(());
                }
                he / 3
            }
            Some(Walk::Located(LocateResult::OnVertex(_) | LocateResult::Outside)) | None => {
                self.stats.skipped_triangles += 1;
                return Ok(());
            }
        };

        let cavity = find_cavity(self.mesh, &center, &[seed], None)?;
        let encroached: Vec<(usize, usize)> = cavity
            .boundary_segments(self.mesh)
            .filter(|&he| {
                let (p, q) = self.mesh.endpoints(he);
                encroaches(&center, &self.mesh.positions[p], &self.mesh.positions[q])
            })
            .map(|he| self.mesh.endpoints(he))
            .collect();
        if !encroached.is_empty() {
            for segment in encroached {
                if let Some(he) = self.segment_halfedge(segment) {
                    self.split_segment(he)?;
                }
            }
            self.requeue(bad);
            return Ok(());
        }

        self.insert_circumcenter(center, &cavity)
    }

    fn insert_circumcenter(&mut self, center: Point<T>, cavity: &Cavity) -> Result<(), RefinementError> {
        match insert_with_cavity(self.mesh, center, cavity) {
            Ok((p, fan)) => {
                self.stats.circumcenters += 1;
                self.record_fan(p, &fan);
                self.check_limit()
            }
            Err(err) => {
                tracing::debug!("[refine] circumcenter skipped: {err}");
                self.stats.skipped_triangles += 1;
                Ok(())
            }
        }
    }

    /// Pushes `bad` back if its triangle survived a segment split unchanged.
    fn requeue(&mut self, bad: BadTriangle) {
        let t = bad.slot.0;
        if t < self.mesh.number_of_triangles() && self.mesh.triangle(t) == bad.corners {
            self.bad.push(bad);
        }
    }

    fn run(&mut self) -> Result<(), RefinementError> {
        for he in self.mesh.edges().collect::<Vec<_>>() {
            if self.mesh.is_segment(he) {
                self.segments.push_back(self.mesh.endpoints(he));
            }
        }
        self.drain_segments()?;
        for t in 0..self.mesh.number_of_triangles() {
            self.push_if_bad(t);
        }

        while let Some(bad) = self.bad.pop() {
            let t = bad.slot.0;
            if t >= self.mesh.number_of_triangles() || self.mesh.triangle(t) != bad.corners {
                continue;
            }
            self.process(bad)?;
            self.drain_segments()?;
        }
        Ok(())
    }
}

/// Refines `mesh` in place until it meets `thresholds`.
///
/// Every point present on entry is treated as an input point for the
/// concentric-shell rule; `concentric_shells` is the shell unit length.
///
/// # Errors
///
/// - [`RefinementError::DiscreteCoordinates`] for integer coordinates; the
///   mesh is unchanged.
/// - [`RefinementError::TriangleLimitExceeded`] when the mesh grows beyond
///   `max_triangles`; the partially refined mesh is kept and remains valid.
pub fn refine_mesh<T: CoordinateScalar>(
    mesh: &mut Mesh<T>,
    thresholds: RefinementThresholds,
    concentric_shells: f64,
    max_triangles: usize,
) -> Result<RefinementStats, RefinementError> {
    if !T::CONTINUOUS {
        return Err(RefinementError::DiscreteCoordinates { scalar: T::NAME });
    }
    let table = point_to_halfedge(&mesh.triangles, &mesh.halfedges, mesh.positions.len());
    let mut refiner = Refiner {
        n_input: mesh.positions.len(),
        mesh,
        thresholds,
        shells: concentric_shells,
        max_triangles,
        table,
        segments: VecDeque::new(),
        bad: BinaryHeap::new(),
        stats: RefinementStats::default(),
    };
    let outcome = refiner.run();
    let stats = refiner.stats;
    tracing::debug!(
        "[refine] {} circumcenters, {} segment splits, {} skipped",
        stats.circumcenters,
        stats.segment_splits,
        stats.skipped_triangles
    );
    outcome.map(|()| stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithms::constraints::restore_constraints;
    use crate::core::builder::build_delaunay;
    use crate::core::halfedge::find_halfedge;
    use crate::core::util::delaunay_validation::is_delaunay;
    use approx::assert_relative_eq;

    fn unit_square() -> Mesh<f64> {
        let mut mesh = Mesh::from_points(vec![
            Point::new([0.0, 0.0]),
            Point::new([1.0, 0.0]),
            Point::new([1.0, 1.0]),
            Point::new([0.0, 1.0]),
        ]);
        build_delaunay(&mut mesh).unwrap();
        mesh
    }

    fn total_area(mesh: &Mesh<f64>) -> f64 {
        (0..mesh.number_of_triangles())
            .map(|t| {
                let [a, b, c] = mesh.triangle_points(t);
                area(&a, &b, &c)
            })
            .sum()
    }

    #[test]
    fn area_threshold_is_met() {
        let mut mesh = unit_square();
        let thresholds = RefinementThresholds {
            area: 0.01,
            angle: 20f64.to_radians(),
        };
        let stats = refine_mesh(&mut mesh, thresholds, 0.001, 100_000).unwrap();
        assert!(stats.circumcenters + stats.segment_splits > 0);
        assert!(mesh.is_valid().is_ok());
        assert!(is_delaunay(&mesh).is_ok());
        assert_relative_eq!(total_area(&mesh), 1.0, epsilon = 1e-9);
        for t in 0..mesh.number_of_triangles() {
            let [a, b, c] = mesh.triangle_points(t);
            assert!(area(&a, &b, &c) <= 0.01 + 1e-12);
            assert!(!angle_below(&a, &b, &c, 20f64.to_radians()));
        }
    }

    #[test]
    fn loose_thresholds_change_nothing() {
        let mut mesh = unit_square();
        let stats = refine_mesh(&mut mesh, RefinementThresholds::default(), 0.001, 100).unwrap();
        assert_eq!(stats, RefinementStats::default());
        assert_eq!(mesh.number_of_triangles(), 2);
    }

    #[test]
    fn constrained_edges_survive_as_chains() {
        let mut mesh = unit_square();
        restore_constraints(&mut mesh, &[[0, 2]], None, 100).unwrap();
        let thresholds = RefinementThresholds {
            area: 0.02,
            angle: 15f64.to_radians(),
        };
        refine_mesh(&mut mesh, thresholds, 0.001, 100_000).unwrap();
        assert!(mesh.is_valid().is_ok());
        // Every constrained halfedge lies on the diagonal y = x.
        let constrained: Vec<usize> = (0..mesh.halfedges().len())
            .filter(|&he| mesh.constrained_halfedges()[he])
            .collect();
        assert!(constrained.len() >= 4);
        for he in constrained {
            let (a, b) = mesh.endpoints(he);
            for p in [a, b] {
                let [x, y] = mesh.point(p).to_f64_array();
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
        assert!(find_halfedge(mesh.triangles(), 0, 2).is_none());
    }

    #[test]
    fn triangle_ceiling_is_reported() {
        let mut mesh = unit_square();
        let thresholds = RefinementThresholds {
            area: 1e-4,
            angle: 20f64.to_radians(),
        };
        let err = refine_mesh(&mut mesh, thresholds, 0.001, 50).unwrap_err();
        assert_eq!(err, RefinementError::TriangleLimitExceeded { limit: 50 });
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn integer_meshes_are_rejected() {
        let mut mesh = Mesh::from_points(vec![
            Point::new([0, 0]),
            Point::new([4, 0]),
            Point::new([0, 4]),
        ]);
        build_delaunay(&mut mesh).unwrap();
        assert_eq!(
            refine_mesh(&mut mesh, RefinementThresholds::default(), 0.001, 100),
            Err(RefinementError::DiscreteCoordinates { scalar: "i32" })
        );
    }

    #[test]
    fn shells_split_near_the_input_endpoint() {
        let mut mesh = unit_square();
        let refiner = Refiner {
            n_input: 3,
            table: point_to_halfedge(&mesh.triangles, &mesh.halfedges, 4),
            mesh: &mut mesh,
            thresholds: RefinementThresholds::default(),
            shells: 0.01,
            max_triangles: 100,
            segments: VecDeque::new(),
            bad: BinaryHeap::new(),
            stats: RefinementStats::default(),
        };
        // 2 -> 3 joins an input point to a "Steiner" point.
        let he = find_halfedge(&refiner.mesh.triangles, 2, 3).unwrap();
        let p = refiner.split_point(he).to_f64_array();
        // d = 1, k = round(log2(50)) = 6, so the split lands 0.64 from point 2.
        assert_relative_eq!(p[0], 1.0 - 0.64, epsilon = 1e-12);
        assert_relative_eq!(p[1], 1.0);
        // 0 -> 1 joins two input points.
        let he = find_halfedge(&refiner.mesh.triangles, 0, 1).unwrap();
        assert_relative_eq!(refiner.split_point(he).to_f64_array()[0], 0.5);
    }
}

//! Sweep-hull Delaunay construction.
//!
//! [`build_delaunay`] triangulates the positions already stored in a [`Mesh`]:
//!
//! 1. Pick a seed triangle: the point closest to the bounding-box center, its
//!    nearest neighbor, and the third point giving the smallest circumcircle.
//! 2. Sort the remaining points by distance from the seed circumcenter (ties by
//!    index), so every new point lies outside the current convex hull.
//! 3. Attach each point to every hull edge it sees and restore the Delaunay
//!    property with flips.
//!
//! The advancing hull is a doubly linked ring over point indices with an
//! angular hash for finding a visible edge quickly.
//!
//! # Examples
//!
//! ```rust
//! use cdt_mesher::core::builder::build_delaunay;
//! use cdt_mesher::core::mesh::Mesh;
//! use cdt_mesher::geometry::point::Point;
//!
//! let mut mesh = Mesh::from_points(vec![
//!     Point::new([0.0, 0.0]),
//!     Point::new([1.0, 0.0]),
//!     Point::new([1.0, 1.0]),
//!     Point::new([0.0, 1.0]),
//! ]);
//! let stats = build_delaunay(&mut mesh).unwrap();
//! assert_eq!(stats.inserted, 4);
//! assert_eq!(mesh.number_of_triangles(), 2);
//! assert!(mesh.is_valid().is_ok());
//! ```

use crate::core::algorithms::flips::{flip_edge_unchecked, is_flippable};
use crate::core::collections::{FastHashSet, fast_hash_set_with_capacity};
use crate::core::halfedge::{NONE, prev_halfedge};
use crate::core::mesh::Mesh;
use crate::core::util::delaunay_validation::is_illegal_edge;
use crate::geometry::point::Point;
use crate::geometry::predicates::{
    Orientation, circumcenter_f64, circumradius_squared, orientation,
};
use crate::geometry::traits::coordinate::CoordinateScalar;
use crate::geometry::util::bounding_box;

/// Errors reported by [`build_delaunay`].
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    /// Fewer than three points were supplied.
    #[error("At least 3 points are required to triangulate, found {found}")]
    InsufficientPoints {
        /// Number of points supplied.
        found: usize,
    },
    /// No three points span a triangle.
    #[error("Degenerate input: all {n_points} points are collinear or coincident")]
    DegenerateInput {
        /// Number of points supplied.
        n_points: usize,
    },
}

/// Counters reported by [`build_delaunay`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Points that became mesh vertices (including the seed triangle).
    pub inserted: usize,
    /// Exact duplicates of an already inserted point.
    pub skipped_duplicates: usize,
    /// Points that saw no hull edge (numerically on the hull).
    pub skipped_invisible: usize,
    /// Edge flips performed while legalizing.
    pub flips: usize,
}

// =============================================================================
// ADVANCING HULL
// =============================================================================

struct Hull {
    next: Vec<usize>,
    prev: Vec<usize>,
    /// Boundary halfedge `v -> next[v]` for each hull vertex `v`.
    tri: Vec<usize>,
    hash: Vec<usize>,
    start: usize,
    center: [f64; 2],
}

impl Hull {
    fn new(n: usize, center: [f64; 2]) -> Self {
        let hash_len = ((n as f64).sqrt().ceil() as usize).max(1);
        Self {
            next: vec![NONE; n],
            prev: vec![NONE; n],
            tri: vec![NONE; n],
            hash: vec![NONE; hash_len],
            start: NONE,
            center,
        }
    }

    fn hash_key(&self, p: [f64; 2]) -> usize {
        let dx = p[0] - self.center[0];
        let dy = p[1] - self.center[1];
        let k = dx / (dx.abs() + dy.abs());
        let angle = (if dy > 0.0 { 3.0 - k } else { 1.0 + k }) / 4.0;
        let len = self.hash.len();
        ((angle * len as f64).floor() as usize) % len
    }

    fn hash_edge(&mut self, p: [f64; 2], i: usize) {
        let key = self.hash_key(p);
        self.hash[key] = i;
    }

    /// Finds a hull vertex `e` whose edge `e -> next[e]` is visible from `p`.
    /// The flag is `true` when edges before `e` may be visible as well.
    fn find_visible_edge<T: CoordinateScalar>(&self, p: &Point<T>, positions: &[Point<T>]) -> Option<(usize, bool)> {
        let key = self.hash_key(p.to_f64_array());
        let len = self.hash.len();
        let mut start = self.start;
        for j in 0..len {
            let candidate = self.hash[(key + j) % len];
            if candidate != NONE && self.next[candidate] != NONE {
                start = candidate;
                break;
            }
        }
        start = self.prev[start];
        let mut e = start;
        while orientation(&positions[e], &positions[self.next[e]], p) != Orientation::NEGATIVE {
            e = self.next[e];
            if e == start {
                return None;
            }
        }
        Some((e, e == start))
    }

    /// Points the hull entry that referenced `from` at `to` after a flip moved
    /// a boundary halfedge.
    fn retarget(&mut self, from: usize, to: usize) {
        let mut e = self.start;
        loop {
            if self.tri[e] == from {
                self.tri[e] = to;
                return;
            }
            e = self.prev[e];
            if e == self.start || e == NONE {
                return;
            }
        }
    }
}

// =============================================================================
// SEED SELECTION
// =============================================================================

fn closest_point<T: CoordinateScalar>(positions: &[Point<T>], target: [f64; 2], exclude: usize) -> Option<usize> {
    let mut best = None;
    let mut best_distance = f64::INFINITY;
    for (i, p) in positions.iter().enumerate() {
        if i == exclude || (exclude != NONE && *p == positions[exclude]) {
            continue;
        }
        let [x, y] = p.to_f64_array();
        let d = (x - target[0]).mul_add(x - target[0], (y - target[1]) * (y - target[1]));
        if d < best_distance {
            best_distance = d;
            best = Some(i);
        }
    }
    best
}

fn find_seed_triangle<T: CoordinateScalar>(positions: &[Point<T>]) -> Option<[usize; 3]> {
    let (lo, hi) = bounding_box(positions)?;
    let center = [0.5 * (lo[0] + hi[0]), 0.5 * (lo[1] + hi[1])];
    let i0 = closest_point(positions, center, NONE)?;
    let i1 = closest_point(positions, positions[i0].to_f64_array(), i0)?;
    let (p0, p1) = (positions[i0], positions[i1]);

    let mut best = None;
    let mut min_radius = f64::INFINITY;
    for (i, p) in positions.iter().enumerate() {
        if i == i0 || i == i1 || orientation(&p0, &p1, p) == Orientation::DEGENERATE {
            continue;
        }
        let r = circumradius_squared(&p0, &p1, p);
        if r < min_radius {
            min_radius = r;
            best = Some(i);
        }
    }
    let i2 = best?;

    Some(if orientation(&p0, &p1, &positions[i2]) == Orientation::NEGATIVE {
        [i0, i2, i1]
    } else {
        [i0, i1, i2]
    })
}

// =============================================================================
// LEGALIZATION
// =============================================================================

/// Restores the Delaunay property around the new point, starting from `a`.
///
/// Returns the halfedge that finally occupies the role of `prev(a)`, i.e. the
/// new point's outgoing hull edge when `a` is the edge opposite the point.
fn legalize<T: CoordinateScalar>(mesh: &mut Mesh<T>, hull: &mut Hull, start: usize, stack: &mut Vec<usize>, flips: &mut usize) -> usize {
    let mut a = start;
    let mut ar;
    stack.clear();
    loop {
        ar = prev_halfedge(a);
        if mesh.halfedges[a] != NONE && is_illegal_edge(mesh, a) && is_flippable(mesh, a) {
            let b = mesh.halfedges[a];
            let bl = prev_halfedge(b);
            let moves_hull_edge = mesh.halfedges[bl] == NONE;
            let info = flip_edge_unchecked(mesh, a);
            *flips += 1;
            if moves_hull_edge {
                hull.retarget(bl, a);
            }
            // Re-check `a`, then the edge beyond `b`.
            stack.push(info.outer_edges()[3]);
            continue;
        }
        match stack.pop() {
            Some(next) => a = next,
            None => break,
        }
    }
    ar
}

// =============================================================================
// BUILDER
// =============================================================================

/// Builds the Delaunay triangulation of `mesh.positions()`, replacing any
/// existing triangles.
///
/// Exact duplicates and points that see no hull edge are skipped and logged
/// at debug level; they remain in the position buffer unreferenced.
///
/// # Errors
///
/// Returns [`BuildError::InsufficientPoints`] for fewer than three points and
/// [`BuildError::DegenerateInput`] when all points are collinear. The mesh
/// has no triangles in either case.
pub fn build_delaunay<T: CoordinateScalar>(mesh: &mut Mesh<T>) -> Result<BuildStats, BuildError> {
    mesh.clear_topology();
    let n = mesh.positions.len();
    if n < 3 {
        return Err(BuildError::InsufficientPoints { found: n });
    }

    let [i0, i1, i2] = find_seed_triangle(&mesh.positions).ok_or(BuildError::DegenerateInput { n_points: n })?;
    let center = circumcenter_f64(&mesh.positions[i0], &mesh.positions[i1], &mesh.positions[i2])
        .ok_or(BuildError::DegenerateInput { n_points: n })?;

    let mut order: Vec<(usize, f64)> = mesh
        .positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let [x, y] = p.to_f64_array();
            (i, (x - center[0]).mul_add(x - center[0], (y - center[1]) * (y - center[1])))
        })
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut stats = BuildStats {
        inserted: 3,
        ..BuildStats::default()
    };
    let mut hull = Hull::new(n, center);
    mesh.add_triangle(i0, i1, i2, NONE, NONE, NONE);
    hull.next[i0] = i1;
    hull.next[i1] = i2;
    hull.next[i2] = i0;
    hull.prev[i0] = i2;
    hull.prev[i1] = i0;
    hull.prev[i2] = i1;
    hull.tri[i0] = 0;
    hull.tri[i1] = 1;
    hull.tri[i2] = 2;
    hull.start = i0;
    for i in [i0, i1, i2] {
        hull.hash_edge(mesh.positions[i].to_f64_array(), i);
    }

    let mut inserted: FastHashSet<Point<T>> = fast_hash_set_with_capacity(n);
    for i in [i0, i1, i2] {
        inserted.insert(mesh.positions[i]);
    }
    let mut stack = Vec::new();

    for &(i, _) in &order {
        if i == i0 || i == i1 || i == i2 {
            continue;
        }
        let p = mesh.positions[i];
        if !inserted.insert(p) {
            tracing::debug!("[build] skipping duplicate point {i} at {:?}", p.coords());
            stats.skipped_duplicates += 1;
            continue;
        }

        let Some((mut e, walk_back)) = hull.find_visible_edge(&p, &mesh.positions) else {
            tracing::debug!("[build] skipping point {i}: no visible hull edge");
            stats.skipped_invisible += 1;
            continue;
        };

        let t = mesh.add_triangle(e, i, hull.next[e], NONE, NONE, hull.tri[e]);
        hull.tri[i] = legalize(mesh, &mut hull, t + 2, &mut stack, &mut stats.flips);
        hull.tri[e] = t;

        let mut n_vertex = hull.next[e];
        loop {
            let q = hull.next[n_vertex];
            if orientation(&mesh.positions[n_vertex], &mesh.positions[q], &p) != Orientation::NEGATIVE {
                break;
            }
            let t = mesh.add_triangle(n_vertex, i, q, hull.tri[i], NONE, hull.tri[n_vertex]);
            hull.tri[i] = legalize(mesh, &mut hull, t + 2, &mut stack, &mut stats.flips);
            hull.next[n_vertex] = NONE;
            n_vertex = q;
        }

        if walk_back {
            loop {
                let q = hull.prev[e];
                if orientation(&mesh.positions[q], &mesh.positions[e], &p) != Orientation::NEGATIVE {
                    break;
                }
                let t = mesh.add_triangle(q, i, e, NONE, hull.tri[e], hull.tri[q]);
                legalize(mesh, &mut hull, t + 2, &mut stack, &mut stats.flips);
                hull.tri[q] = t;
                hull.next[e] = NONE;
                e = q;
            }
        }

        hull.prev[i] = e;
        hull.next[i] = n_vertex;
        hull.prev[n_vertex] = i;
        hull.next[e] = i;
        hull.start = e;
        hull.hash_edge(p.to_f64_array(), i);
        hull.hash_edge(mesh.positions[e].to_f64_array(), e);
        stats.inserted += 1;
    }

    tracing::debug!(
        "[build] {} triangles from {} points ({} duplicates, {} invisible, {} flips)",
        mesh.number_of_triangles(),
        n,
        stats.skipped_duplicates,
        stats.skipped_invisible,
        stats.flips
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::util::delaunay_validation::is_delaunay;
    use crate::geometry::util::{generate_grid_points, generate_random_points_seeded};

    fn mesh_of<T: CoordinateScalar>(points: Vec<Point<T>>) -> Mesh<T> {
        let mut mesh = Mesh::new();
        mesh.positions = points;
        mesh
    }

    #[test]
    fn unit_square_keeps_the_cocircular_diagonal() {
        let mut mesh = mesh_of(vec![
            Point::new([0.0, 0.0]),
            Point::new([1.0, 0.0]),
            Point::new([1.0, 1.0]),
            Point::new([0.0, 1.0]),
        ]);
        build_delaunay(&mut mesh).unwrap();
        assert_eq!(mesh.number_of_triangles(), 2);
        assert!(mesh.is_valid().is_ok());
        assert!(is_delaunay(&mesh).is_ok());
        assert_eq!(mesh.halfedges().iter().filter(|&&h| h == NONE).count(), 4);
    }

    #[test]
    fn random_points_give_a_valid_delaunay_mesh() {
        let points = generate_random_points_seeded::<f64>(500, (-10.0, 10.0), 42).unwrap();
        let mut mesh = mesh_of(points);
        let stats = build_delaunay(&mut mesh).unwrap();
        assert_eq!(stats.inserted, 500);
        assert!(mesh.is_valid().is_ok());
        assert!(is_delaunay(&mesh).is_ok());
    }

    #[test]
    fn integer_grid_is_exact() {
        let points = generate_grid_points::<i32>(6, 5, 1.0, [0.0, 0.0]);
        let mut mesh = mesh_of(points);
        build_delaunay(&mut mesh).unwrap();
        // A full grid triangulates into two triangles per cell.
        assert_eq!(mesh.number_of_triangles(), 2 * 5 * 4);
        assert!(mesh.is_valid().is_ok());
        assert!(is_delaunay(&mesh).is_ok());
    }

    #[test]
    fn duplicates_are_skipped() {
        let mut mesh = mesh_of(vec![
            Point::new([0.0, 0.0]),
            Point::new([2.0, 0.0]),
            Point::new([0.0, 2.0]),
            Point::new([2.0, 0.0]),
            Point::new([1.5, 1.5]),
        ]);
        let stats = build_delaunay(&mut mesh).unwrap();
        assert_eq!(stats.skipped_duplicates, 1);
        assert_eq!(stats.inserted, 4);
        assert!(!mesh.triangles().contains(&3));
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn collinear_and_tiny_inputs_are_rejected() {
        let mut line = mesh_of((0..5).map(|i| Point::new([f64::from(i), 2.0 * f64::from(i)])).collect());
        assert_eq!(build_delaunay(&mut line), Err(BuildError::DegenerateInput { n_points: 5 }));
        assert!(line.is_empty());

        let mut pair = mesh_of(vec![Point::new([0.0f32, 0.0]), Point::new([1.0, 0.0])]);
        assert_eq!(build_delaunay(&mut pair), Err(BuildError::InsufficientPoints { found: 2 }));
    }

    #[test]
    fn build_is_deterministic() {
        let points = generate_random_points_seeded::<f32>(200, (0.0, 1.0), 9).unwrap();
        let mut a = mesh_of(points.clone());
        let mut b = mesh_of(points);
        build_delaunay(&mut a).unwrap();
        build_delaunay(&mut b).unwrap();
        assert_eq!(a.triangles(), b.triangles());
        assert_eq!(a.halfedges(), b.halfedges());
    }
}

//! Hole and boundary planting.
//!
//! Planting removes the triangles that lie outside the domain or inside holes,
//! as delimited by constrained edges. Three strategies are available:
//!
//! - **Hole seeds**: every seed point picks the triangle containing it, and a
//!   flood fill spreads from there across every edge that is not a barrier.
//! - **Boundary restoration**: the same flood fill, started from each hull
//!   triangle whose hull edge is not constrained.
//! - **Automatic**: a level flood fill from the hull. Crossing a barrier moves
//!   to the next level; even levels (the outside, and holes nested inside the
//!   domain) are removed.
//!
//! A barrier is a constrained edge that is not flagged as ignored. Removed
//! triangles are compacted out together with the points they leave
//! unreferenced, so every index recorded earlier is invalidated.

use std::collections::VecDeque;

use crate::core::algorithms::locate::{LocateResult, locate_or_scan};
use crate::core::halfedge::NONE;
use crate::core::mesh::Mesh;
use crate::geometry::point::Point;
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Errors reported by planting.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlantingError {
    /// A hole seed has a non-finite coordinate and cannot be located.
    #[error("Hole seed {seed} has non-finite coordinates")]
    NonFiniteSeed {
        /// Index of the seed.
        seed: usize,
    },
}

/// Counters reported by planting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlantingStats {
    /// Triangles removed.
    pub removed_triangles: usize,
    /// Points removed because no triangle referenced them any more.
    pub removed_points: usize,
    /// Hole seeds that did not land inside the mesh.
    pub unplaced_seeds: usize,
}

#[inline]
fn is_barrier<T: CoordinateScalar>(mesh: &Mesh<T>, he: usize) -> bool {
    mesh.constrained_halfedges[he] && !mesh.ignored_halfedges[he]
}

/// Marks every triangle reachable from `start` without crossing a barrier.
fn flood<T: CoordinateScalar>(mesh: &Mesh<T>, start: usize, marked: &mut [bool]) {
    if marked[start] {
        return;
    }
    marked[start] = true;
    let mut stack = vec![start];
    while let Some(t) = stack.pop() {
        for he in 3 * t..3 * t + 3 {
            let o = mesh.halfedges[he];
            if o == NONE || is_barrier(mesh, he) {
                continue;
            }
            let neighbor = o / 3;
            if !marked[neighbor] {
                marked[neighbor] = true;
                stack.push(neighbor);
            }
        }
    }
}

fn mark_seeds<T: CoordinateScalar>(
    mesh: &Mesh<T>,
    seeds: &[Point<T>],
    marked: &mut [bool],
) -> Result<usize, PlantingError> {
    let mut unplaced = 0;
    for (seed, point) in seeds.iter().enumerate() {
        if !point.is_finite() {
            return Err(PlantingError::NonFiniteSeed { seed });
        }
        let start = match locate_or_scan(mesh, point, None) {
            LocateResult::InsideTriangle(t) => t,
            LocateResult::OnEdge(he) => he / 3,
            LocateResult::OnVertex(p) => {
                tracing::debug!("[planting] seed {seed} lies on point {p}, skipped");
                unplaced += 1;
                continue;
            }
            LocateResult::Outside => {
                tracing::debug!("[planting] seed {seed} lies outside the mesh, skipped");
                unplaced += 1;
                continue;
            }
        };
        flood(mesh, start, marked);
    }
    Ok(unplaced)
}

fn mark_boundary<T: CoordinateScalar>(mesh: &Mesh<T>, marked: &mut [bool]) {
    for he in 0..mesh.halfedges.len() {
        if mesh.halfedges[he] == NONE && !is_barrier(mesh, he) {
            flood(mesh, he / 3, marked);
        }
    }
}

/// Nesting level of every triangle: 0 for the region connected to the hull
/// through non-barrier edges, +1 for each barrier crossed.
fn levels<T: CoordinateScalar>(mesh: &Mesh<T>) -> Vec<usize> {
    let n_triangles = mesh.number_of_triangles();
    let mut level = vec![NONE; n_triangles];
    let mut deque = VecDeque::new();

    for he in 0..mesh.halfedges.len() {
        if mesh.halfedges[he] != NONE {
            continue;
        }
        let t = he / 3;
        let l = usize::from(is_barrier(mesh, he));
        if l < level[t] {
            level[t] = l;
            deque.push_back((t, l));
        }
    }

    // 0-1 breadth first search: same-level neighbors go to the front.
    while let Some((t, l)) = deque.pop_front() {
        if l > level[t] {
            continue;
        }
        for he in 3 * t..3 * t + 3 {
            let o = mesh.halfedges[he];
            if o == NONE {
                continue;
            }
            let step = usize::from(is_barrier(mesh, he));
            let candidate = l + step;
            let neighbor = o / 3;
            if candidate < level[neighbor] {
                level[neighbor] = candidate;
                if step == 0 {
                    deque.push_front((neighbor, candidate));
                } else {
                    deque.push_back((neighbor, candidate));
                }
            }
        }
    }
    level
}

fn remove_marked<T: CoordinateScalar>(mesh: &mut Mesh<T>, marked: &[bool], unplaced_seeds: usize) -> PlantingStats {
    let n_points = mesh.number_of_points();
    let removed_triangles = mesh.compact(marked);
    let stats = PlantingStats {
        removed_triangles,
        removed_points: n_points - mesh.number_of_points(),
        unplaced_seeds,
    };
    tracing::debug!(
        "[planting] removed {} triangles and {} points",
        stats.removed_triangles,
        stats.removed_points
    );
    stats
}

/// Removes the triangles reachable from each hole seed and, if
/// `restore_boundary` is set, the triangles outside the constrained boundary.
///
/// Seeds outside the mesh or exactly on a point are skipped and counted in
/// [`PlantingStats::unplaced_seeds`].
///
/// # Errors
///
/// Returns [`PlantingError::NonFiniteSeed`] before touching the mesh if any
/// seed has a non-finite coordinate.
pub fn plant_holes<T: CoordinateScalar>(
    mesh: &mut Mesh<T>,
    seeds: &[Point<T>],
    restore_boundary: bool,
) -> Result<PlantingStats, PlantingError> {
    let mut marked = vec![false; mesh.number_of_triangles()];
    let unplaced = mark_seeds(mesh, seeds, &mut marked)?;
    if restore_boundary {
        mark_boundary(mesh, &mut marked);
    }
    Ok(remove_marked(mesh, &marked, unplaced))
}

/// Removes the outside of the domain and every hole, judged purely by how
/// many barriers separate a triangle from the hull.
pub fn plant_auto<T: CoordinateScalar>(mesh: &mut Mesh<T>) -> PlantingStats {
    let marked: Vec<bool> = levels(mesh).into_iter().map(|l| l != NONE && l % 2 == 0).collect();
    remove_marked(mesh, &marked, 0)
}

//! Alpha-shape filtering.
//!
//! Triangles whose circumradius exceeds `alpha` are removed. Three optional
//! protections soften the cut:
//!
//! - `protect_constraints`: a constrained edge that would lose both of its
//!   triangles keeps the one with the smaller circumradius (a constrained
//!   boundary edge keeps its only triangle).
//! - `protect_points`: a point that would lose every triangle keeps the one
//!   with the smallest circumradius.
//! - `prevent_windmills`: around each point only the largest contiguous fan
//!   of surviving triangles is kept, repeated until nothing changes.
//!
//! A triangle kept by a protection is pinned: windmill breaking also keeps
//! every fan holding a pinned triangle. Protections and windmill breaking alternate
//! until neither changes the mesh, so a point or constrained edge orphaned by
//! a broken windmill is protected again.
//!
//! Removed triangles are compacted out together with the points they leave
//! unreferenced.

use serde::{Deserialize, Serialize};

use crate::core::collections::SmallBuffer;
use crate::core::halfedge::{NONE, point_to_halfedge, vertex_star};
use crate::core::mesh::Mesh;
use crate::geometry::predicates::{circumradius_squared, squared_length};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Protections applied by [`alpha_shape_filter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaShapeSettings {
    /// Keep every point referenced by at least one triangle.
    pub protect_points: bool,
    /// Keep only the largest contiguous fan around each point.
    pub prevent_windmills: bool,
    /// Keep at least one triangle along every constrained edge.
    pub protect_constraints: bool,
}

/// Errors reported by [`alpha_shape_filter`].
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum AlphaShapeError {
    /// Alpha must be finite and non-negative.
    #[error("Alpha must be finite and non-negative, got {alpha}")]
    InvalidAlpha {
        /// The rejected value.
        alpha: f64,
    },
}

/// Counters reported by [`alpha_shape_filter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlphaShapeStats {
    /// Triangles removed.
    pub removed_triangles: usize,
    /// Points removed because no triangle referenced them any more.
    pub removed_points: usize,
    /// Triangles kept, or restored after windmill breaking, by a protection.
    pub protected_triangles: usize,
    /// Triangles removed to break windmills, counting any a protection later
    /// restored.
    pub windmill_triangles: usize,
}

fn protect_constraints<T: CoordinateScalar>(
    mesh: &Mesh<T>,
    radius: &[f64],
    remove: &mut [bool],
    pinned: &mut [bool],
) -> usize {
    let mut kept = 0;
    for he in mesh.edges() {
        if !mesh.constrained_halfedges[he] {
            continue;
        }
        let t = he / 3;
        let o = mesh.halfedges[he];
        let keep = if o == NONE {
            remove[t].then_some(t)
        } else {
            let u = o / 3;
            (remove[t] && remove[u]).then(|| if radius[u] < radius[t] { u } else { t })
        };
        if let Some(keep) = keep {
            remove[keep] = false;
            pinned[keep] = true;
            kept += 1;
        }
    }
    kept
}

fn protect_points<T: CoordinateScalar>(
    mesh: &Mesh<T>,
    radius: &[f64],
    remove: &mut [bool],
    pinned: &mut [bool],
) -> usize {
    let n_points = mesh.number_of_points();
    let mut alive = vec![false; n_points];
    let mut best = vec![NONE; n_points];
    for (he, &p) in mesh.triangles.iter().enumerate() {
        let t = he / 3;
        if !remove[t] {
            alive[p] = true;
        }
        if best[p] == NONE || radius[t] < radius[best[p]] {
            best[p] = t;
        }
    }
    let mut kept = 0;
    for p in 0..n_points {
        let t = best[p];
        if !alive[p] && t != NONE && remove[t] {
            remove[t] = false;
            pinned[t] = true;
            kept += 1;
        }
    }
    kept
}

/// Removes every surviving run around `p` except the largest one and the
/// runs holding a pinned triangle. Returns the number of triangles removed.
fn break_windmill<T: CoordinateScalar>(mesh: &Mesh<T>, start: usize, pinned: &[bool], remove: &mut [bool]) -> usize {
    let (star, on_boundary) = vertex_star(&mesh.halfedges, start);
    let n = star.len();
    let alive: SmallBuffer<bool, 16> = star.iter().map(|&h| !remove[h / 3]).collect();
    if alive.iter().all(|&a| a) || alive.iter().all(|&a| !a) {
        return 0;
    }

    // Runs as (first index, length). For a closed star, start scanning right
    // after a removed triangle so no run wraps around.
    let offset = if on_boundary { 0 } else { alive.iter().position(|&a| !a).map_or(0, |i| i + 1) };
    let mut runs: SmallBuffer<(usize, usize), 8> = SmallBuffer::new();
    let mut k = 0;
    while k < n {
        let i = (offset + k) % n;
        if alive[i] {
            let mut len = 0;
            while k + len < n && alive[(offset + k + len) % n] {
                len += 1;
            }
            runs.push((i, len));
            k += len;
        } else {
            k += 1;
        }
    }
    if runs.len() < 2 {
        return 0;
    }

    let holds_pin: SmallBuffer<bool, 8> = runs
        .iter()
        .map(|&(first, len)| (0..len).any(|j| pinned[star[(first + j) % n] / 3]))
        .collect();
    let mut largest = 0;
    for (r, &(_, len)) in runs.iter().enumerate() {
        if len > runs[largest].1 {
            largest = r;
        }
    }
    let mut removed = 0;
    for (r, &(first, len)) in runs.iter().enumerate() {
        if r == largest || holds_pin[r] {
            continue;
        }
        for j in 0..len {
            remove[star[(first + j) % n] / 3] = true;
            removed += 1;
        }
    }
    removed
}

fn prevent_windmills<T: CoordinateScalar>(mesh: &Mesh<T>, pinned: &[bool], remove: &mut [bool]) -> usize {
    let table = point_to_halfedge(&mesh.triangles, &mesh.halfedges, mesh.number_of_points());
    let mut total = 0;
    loop {
        let removed: usize = table
            .iter()
            .filter(|&&start| start != NONE)
            .map(|&start| break_windmill(mesh, start, pinned, remove))
            .sum();
        if removed == 0 {
            return total;
        }
        total += removed;
    }
}

/// Removes triangles whose circumradius exceeds `alpha`.
///
/// # Errors
///
/// Returns [`AlphaShapeError::InvalidAlpha`] for a negative or non-finite
/// `alpha`; the mesh is unchanged.
pub fn alpha_shape_filter<T: CoordinateScalar>(
    mesh: &mut Mesh<T>,
    alpha: f64,
    settings: AlphaShapeSettings,
) -> Result<AlphaShapeStats, AlphaShapeError> {
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(AlphaShapeError::InvalidAlpha { alpha });
    }
    let alpha_sq = alpha * alpha;
    let radius: Vec<f64> = (0..mesh.number_of_triangles())
        .map(|t| {
            let [a, b, c] = mesh.triangle_points(t);
            circumradius_squared(&a, &b, &c)
        })
        .collect();
    let mut remove: Vec<bool> = radius.iter().map(|&r| r > alpha_sq).collect();

    let mut stats = AlphaShapeStats::default();
    let mut pinned = vec![false; radius.len()];
    loop {
        let mut changed = 0;
        if settings.protect_constraints {
            changed += protect_constraints(mesh, &radius, &mut remove, &mut pinned);
        }
        if settings.protect_points {
            changed += protect_points(mesh, &radius, &mut remove, &mut pinned);
        }
        stats.protected_triangles += changed;
        if !settings.prevent_windmills {
            break;
        }
        let broken = prevent_windmills(mesh, &pinned, &mut remove);
        stats.windmill_triangles += broken;
        // Pins only accumulate and pinned triangles are never removed, so
        // this reaches a fixed point.
        if changed + broken == 0 {
            break;
        }
    }

    if cfg!(debug_assertions) {
        for t in (0..mesh.number_of_triangles()).filter(|&t| radius[t] <= alpha_sq) {
            for he in 3 * t..3 * t + 3 {
                let (a, b) = mesh.endpoints(he);
                debug_assert!(
                    0.25 * squared_length(&mesh.positions[a], &mesh.positions[b]) <= alpha_sq * (1.0 + 1e-9),
                    "edge {a}-{b} is longer than 2 alpha inside a kept triangle"
                );
            }
        }
    }

    let n_points = mesh.number_of_points();
    stats.removed_triangles = mesh.compact(&remove);
    stats.removed_points = n_points - mesh.number_of_points();
    tracing::debug!(
        "[alpha] removed {} triangles and {} points (protected {}, windmills {})",
        stats.removed_triangles,
        stats.removed_points,
        stats.protected_triangles,
        stats.windmill_triangles
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point;

    /// Two unit right triangles forming a square, plus a long sliver to the
    /// right whose circumradius is large.
    fn square_with_sliver() -> Mesh<f64> {
        Mesh::from_parts(
            vec![
                Point::new([0.0, 0.0]),
                Point::new([1.0, 0.0]),
                Point::new([1.0, 1.0]),
                Point::new([0.0, 1.0]),
                Point::new([10.0, 0.5]),
            ],
            vec![0, 1, 2, 0, 2, 3, 1, 4, 2],
        )
        .unwrap()
    }

    #[test]
    fn large_triangles_are_removed_with_their_points() {
        let mut mesh = square_with_sliver();
        let stats = alpha_shape_filter(&mut mesh, 1.0, AlphaShapeSettings::default()).unwrap();
        assert_eq!(stats.removed_triangles, 1);
        assert_eq!(stats.removed_points, 1);
        assert_eq!(mesh.number_of_triangles(), 2);
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn protected_points_keep_a_triangle() {
        let mut mesh = square_with_sliver();
        let settings = AlphaShapeSettings {
            protect_points: true,
            ..AlphaShapeSettings::default()
        };
        let stats = alpha_shape_filter(&mut mesh, 1.0, settings).unwrap();
        assert_eq!(stats.protected_triangles, 1);
        assert_eq!(mesh.number_of_triangles(), 3);
    }

    #[test]
    fn protected_constraints_keep_a_side() {
        let mut mesh = square_with_sliver();
        // Constrain the sliver's outer edge 4 -> 2 (slot 7).
        mesh.set_edge_flags(7, true, false);
        let settings = AlphaShapeSettings {
            protect_constraints: true,
            ..AlphaShapeSettings::default()
        };
        let stats = alpha_shape_filter(&mut mesh, 1.0, settings).unwrap();
        assert_eq!(stats.removed_triangles, 0);
        assert_eq!(stats.protected_triangles, 1);
    }

    /// Bow tie around point 0: a big fan of two triangles on the right and a
    /// single triangle on the left (slots 9..12), joined by two wide triangles
    /// above and below that alpha 1 removes.
    fn bow_tie() -> Mesh<f64> {
        Mesh::from_parts(
            vec![
                Point::new([0.0, 0.0]),
                Point::new([1.0, -0.5]),
                Point::new([1.2, 0.0]),
                Point::new([1.0, 0.5]),
                Point::new([-1.0, 0.5]),
                Point::new([-1.0, -0.5]),
            ],
            vec![0, 1, 2, 0, 2, 3, 0, 3, 4, 0, 4, 5, 0, 5, 1],
        )
        .unwrap()
    }

    #[test]
    fn windmill_breaking_keeps_protected_points() {
        let mut mesh = bow_tie();
        let settings = AlphaShapeSettings {
            protect_points: true,
            prevent_windmills: true,
            ..AlphaShapeSettings::default()
        };
        let stats = alpha_shape_filter(&mut mesh, 1.0, settings).unwrap();
        // The left triangle is the only one holding points 4 and 5.
        assert_eq!(stats.removed_points, 0);
        assert_eq!(mesh.number_of_points(), 6);
        assert_eq!(mesh.number_of_triangles(), 3);
        assert!(stats.protected_triangles >= 1);
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn windmill_breaking_keeps_protected_constraints() {
        let mut mesh = bow_tie();
        // Outer edge 4 -> 5 of the left triangle.
        mesh.set_edge_flags(10, true, false);
        let settings = AlphaShapeSettings {
            protect_constraints: true,
            prevent_windmills: true,
            ..AlphaShapeSettings::default()
        };
        alpha_shape_filter(&mut mesh, 1.0, settings).unwrap();
        assert_eq!(mesh.number_of_triangles(), 3);
        assert_eq!(mesh.constrained_halfedges().iter().filter(|&&c| c).count(), 1);
        let he = (0..mesh.halfedges().len())
            .find(|&he| mesh.constrained_halfedges()[he])
            .unwrap();
        let [x0, y0] = mesh.point(mesh.endpoints(he).0).to_f64_array();
        let [x1, y1] = mesh.point(mesh.endpoints(he).1).to_f64_array();
        assert_eq!([x0, y0, x1, y1], [-1.0, 0.5, -1.0, -0.5]);
    }

    #[test]
    fn windmills_keep_the_largest_fan() {
        let mut mesh = bow_tie();
        let plain = {
            let mut copy = mesh.clone();
            alpha_shape_filter(&mut copy, 1.0, AlphaShapeSettings::default()).unwrap();
            copy.number_of_triangles()
        };
        assert_eq!(plain, 3);

        let settings = AlphaShapeSettings {
            prevent_windmills: true,
            ..AlphaShapeSettings::default()
        };
        let stats = alpha_shape_filter(&mut mesh, 1.0, settings).unwrap();
        assert_eq!(stats.windmill_triangles, 1);
        assert_eq!(mesh.number_of_triangles(), 2);
        assert!(mesh.is_valid().is_ok());
    }

    #[test]
    fn invalid_alpha_is_rejected() {
        let mut mesh = square_with_sliver();
        for alpha in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(alpha_shape_filter(&mut mesh, alpha, AlphaShapeSettings::default()).is_err());
        }
        assert_eq!(mesh.number_of_triangles(), 3);
    }
}

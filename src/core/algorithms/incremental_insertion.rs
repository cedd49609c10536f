//! Bowyer–Watson cavity insertion on the flat mesh.
//!
//! Inserting a point `p` proceeds in two steps:
//! 1. [`find_cavity`]: starting from seed triangles (the triangle containing
//!    `p`, or the triangles on both sides of a segment being split), grow the
//!    conflict region across every non-segment edge whose neighbor triangle
//!    has `p` strictly inside its circumcircle.
//! 2. [`insert_with_cavity`]: replace the cavity by a fan of triangles joining
//!    `p` to each cavity boundary edge, reusing the freed slots first and
//!    wiring opposite links locally.
//!
//! Segments (constrained or boundary halfedges) are never crossed, so
//! constraints survive insertion.

use crate::core::collections::{CavityBuffer, FastHashSet, fast_hash_map_with_capacity};
use crate::core::halfedge::NONE;
use crate::core::mesh::Mesh;
use crate::geometry::point::Point;
use crate::geometry::predicates::{InCircle, Orientation, in_circumcircle, orientation};
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Error during cavity insertion.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum InsertionError {
    /// A seed triangle does not exist.
    #[error("Cavity seed triangle {triangle} is out of range")]
    InvalidSeed {
        /// Offending triangle.
        triangle: usize,
    },

    /// The new point does not see a cavity boundary edge from its positive side.
    #[error("Cavity is not star-shaped: point does not see boundary halfedge {halfedge}")]
    NotStarShaped {
        /// Offending boundary halfedge.
        halfedge: usize,
    },
}

/// Conflict region of a point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cavity {
    /// Triangles to be replaced.
    pub triangles: CavityBuffer,
    /// Halfedges of cavity triangles on the cavity boundary.
    pub boundary: CavityBuffer,
    /// Segment being split, excluded from the boundary together with its
    /// opposite.
    pub split: Option<usize>,
}

impl Cavity {
    /// Boundary halfedges that are segments.
    pub fn boundary_segments<'a, T: CoordinateScalar>(
        &'a self,
        mesh: &'a Mesh<T>,
    ) -> impl Iterator<Item = usize> + 'a {
        self.boundary.iter().copied().filter(|&he| mesh.is_segment(he))
    }
}

/// Collects the constrained Bowyer–Watson cavity of `point`.
///
/// # Errors
///
/// Returns [`InsertionError::InvalidSeed`] if a seed triangle does not exist.
pub fn find_cavity<T: CoordinateScalar>(
    mesh: &Mesh<T>,
    point: &Point<T>,
    seeds: &[usize],
    split: Option<usize>,
) -> Result<Cavity, InsertionError> {
    let n_triangles = mesh.number_of_triangles();
    let mut cavity = Cavity {
        split,
        ..Cavity::default()
    };
    let mut inside = FastHashSet::default();
    for &t in seeds {
        if t >= n_triangles {
            return Err(InsertionError::InvalidSeed { triangle: t });
        }
        if inside.insert(t) {
            cavity.triangles.push(t);
        }
    }

    let excluded = split.map_or([NONE; 2], |he| [he, mesh.halfedges[he]]);
    let mut next = 0;
    while next < cavity.triangles.len() {
        let t = cavity.triangles[next];
        next += 1;
        for he in 3 * t..3 * t + 3 {
            if excluded.contains(&he) || mesh.is_segment(he) {
                continue;
            }
            let neighbor = mesh.halfedges[he] / 3;
            if inside.contains(&neighbor) {
                continue;
            }
            let [a, b, c] = mesh.triangle_points(neighbor);
            if in_circumcircle(&a, &b, &c, point) == InCircle::INSIDE {
                inside.insert(neighbor);
                cavity.triangles.push(neighbor);
            }
        }
    }

    for &t in &cavity.triangles {
        for he in 3 * t..3 * t + 3 {
            if excluded.contains(&he) {
                continue;
            }
            let o = mesh.halfedges[he];
            if o == NONE || mesh.constrained_halfedges[he] || !inside.contains(&(o / 3)) {
                cavity.boundary.push(he);
            }
        }
    }
    Ok(cavity)
}

/// Appends `point` to the mesh and retriangulates `cavity` as a fan around
/// it. Returns the new point index and the triangles of the fan.
///
/// Flags on boundary edges are kept. When the cavity splits a segment, both
/// halves inherit the segment's flags.
///
/// # Errors
///
/// Returns [`InsertionError::NotStarShaped`] if some boundary edge would
/// produce a non-positive triangle; the mesh is unchanged in that case.
pub fn insert_with_cavity<T: CoordinateScalar>(
    mesh: &mut Mesh<T>,
    point: Point<T>,
    cavity: &Cavity,
) -> Result<(usize, CavityBuffer), InsertionError> {
    struct Rim {
        from: usize,
        to: usize,
        outside: usize,
        flags: (bool, bool),
    }

    let mut rims = Vec::with_capacity(cavity.boundary.len());
    for &he in &cavity.boundary {
        let (from, to) = mesh.endpoints(he);
        if orientation(&mesh.positions[from], &mesh.positions[to], &point) != Orientation::POSITIVE {
            return Err(InsertionError::NotStarShaped { halfedge: he });
        }
        rims.push(Rim {
            from,
            to,
            outside: mesh.halfedges[he],
            flags: (mesh.constrained_halfedges[he], mesh.ignored_halfedges[he]),
        });
    }
    let split_flags = cavity.split.map(|he| {
        let ends = mesh.endpoints(he);
        (ends, (mesh.constrained_halfedges[he], mesh.ignored_halfedges[he]))
    });

    let p = mesh.push_point(point);
    let mut bases = CavityBuffer::new();
    let mut origin = fast_hash_map_with_capacity(rims.len());
    for (i, rim) in rims.iter().enumerate() {
        let base = match cavity.triangles.get(i) {
            Some(&t) => {
                let base = 3 * t;
                mesh.set_triangle(base, [rim.from, rim.to, p]);
                for he in base..base + 3 {
                    mesh.halfedges[he] = NONE;
                    mesh.constrained_halfedges[he] = false;
                    mesh.ignored_halfedges[he] = false;
                }
                base
            }
            None => mesh.add_triangle(rim.from, rim.to, p, NONE, NONE, NONE),
        };
        bases.push(base);
        origin.insert(rim.from, base);
    }
    debug_assert!(rims.len() >= cavity.triangles.len(), "cavity fan lost triangles");

    for (rim, &base) in rims.iter().zip(&bases) {
        mesh.link(base, rim.outside);
        mesh.constrained_halfedges[base] = rim.flags.0;
        mesh.ignored_halfedges[base] = rim.flags.1;
        if let Some(&next_base) = origin.get(&rim.to) {
            mesh.link(base + 1, next_base + 2);
        }
    }

    if let Some(((a, b), (constrained, ignored))) = split_flags {
        for &base in &bases {
            let from = mesh.triangles[base];
            let to = mesh.triangles[base + 1];
            if to == a || to == b {
                mesh.set_edge_flags(base + 1, constrained, ignored);
            }
            if from == a || from == b {
                mesh.set_edge_flags(base + 2, constrained, ignored);
            }
        }
    }

    let triangles = bases.iter().map(|&base| base / 3).collect();
    Ok((p, triangles))
}

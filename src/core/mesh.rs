//! Flat-array triangle mesh store.
//!
//! [`Mesh`] owns the five parallel buffers that make up a triangulation:
//!
//! | buffer                  | length          | meaning                                   |
//! |-------------------------|-----------------|-------------------------------------------|
//! | `positions`             | `#points`       | point coordinates; index is identity       |
//! | `triangles`             | `3 * #triangles`| corner point indices, counter-clockwise    |
//! | `halfedges`             | `3 * #triangles`| opposite halfedge or [`NONE`]              |
//! | `constrained_halfedges` | `3 * #triangles`| edge may not be flipped                    |
//! | `ignored_halfedges`     | `3 * #triangles`| constrained edge that is no planting barrier |
//!
//! See [`crate::core::halfedge`] for the slot conventions. The algorithms in
//! [`crate::core::algorithms`] mutate the buffers directly through the
//! crate-private helpers here; external callers get read-only slices plus
//! structural validation.
//!
//! # Examples
//!
//! ```rust
//! use cdt_mesher::core::mesh::Mesh;
//! use cdt_mesher::geometry::point::Point;
//!
//! let positions = vec![
//!     Point::new([0.0, 0.0]),
//!     Point::new([1.0, 0.0]),
//!     Point::new([1.0, 1.0]),
//!     Point::new([0.0, 1.0]),
//! ];
//! let mesh = Mesh::from_parts(positions, vec![0, 1, 2, 0, 2, 3]).unwrap();
//! assert_eq!(mesh.number_of_triangles(), 2);
//! assert!(mesh.is_valid().is_ok());
//! assert_eq!(mesh.edges().count(), 5);
//! ```

use serde::{Deserialize, Serialize};

use crate::core::halfedge::{HalfedgeError, NONE, next_halfedge, rebuild_halfedges};
use crate::core::util::delaunay_validation::find_delaunay_violations;
use crate::geometry::point::Point;
use crate::geometry::predicates::{Orientation, orientation};
use crate::geometry::traits::coordinate::CoordinateScalar;

// =============================================================================
// VALIDATION TYPES
// =============================================================================

/// Structural problems detected by [`Mesh::validation_report`].
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeshValidationError {
    /// The per-halfedge buffers disagree in length, or are not a multiple of 3.
    #[error(
        "Buffer length mismatch: triangles={triangles}, halfedges={halfedges}, constrained={constrained}, ignored={ignored}"
    )]
    BufferLengthMismatch {
        /// Length of the corner buffer.
        triangles: usize,
        /// Length of the opposite buffer.
        halfedges: usize,
        /// Length of the constrained-flag buffer.
        constrained: usize,
        /// Length of the ignored-flag buffer.
        ignored: usize,
    },
    /// A corner references a point that does not exist.
    #[error("Halfedge {halfedge} references point {point}, but only {n_points} points exist")]
    PointIndexOutOfRange {
        /// Offending slot.
        halfedge: usize,
        /// Referenced point.
        point: usize,
        /// Number of stored points.
        n_points: usize,
    },
    /// An opposite link points outside the halfedge buffer.
    #[error("Halfedge {halfedge} has out-of-range opposite {opposite}")]
    OppositeOutOfRange {
        /// Offending halfedge.
        halfedge: usize,
        /// Stored opposite.
        opposite: usize,
    },
    /// `opposite(opposite(he)) != he`.
    #[error("Halfedge {halfedge} -> {opposite} is not an involution (back link {back})")]
    BrokenInvolution {
        /// Offending halfedge.
        halfedge: usize,
        /// Its opposite.
        opposite: usize,
        /// Opposite of the opposite.
        back: usize,
    },
    /// Partner halfedges do not run between the same points in reverse.
    #[error("Halfedges {halfedge} and {opposite} are linked but do not share endpoints")]
    MismatchedEndpoints {
        /// Offending halfedge.
        halfedge: usize,
        /// Its opposite.
        opposite: usize,
    },
    /// A per-edge flag differs between the two halves of an edge.
    #[error("{flag} flag differs between halfedges {halfedge} and {opposite}")]
    AsymmetricFlag {
        /// Offending halfedge.
        halfedge: usize,
        /// Its opposite.
        opposite: usize,
        /// Which flag.
        flag: &'static str,
    },
    /// A triangle is not strictly counter-clockwise.
    #[error("Triangle {triangle} has orientation {orientation}")]
    BadOrientation {
        /// Offending triangle.
        triangle: usize,
        /// Observed orientation.
        orientation: Orientation,
    },
    /// The opposite apex lies strictly inside the circumcircle across an
    /// unconstrained edge.
    #[error("Delaunay violation across halfedge {halfedge}")]
    DelaunayViolation {
        /// Offending halfedge.
        halfedge: usize,
    },
}

/// Classification of invariants checked by [`Mesh::validation_report`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    /// Buffer lengths and `3 * #triangles == #halfedges`.
    BufferLengths,
    /// Point and opposite indices in range.
    IndexRange,
    /// Opposite links form an involution between matching edges.
    HalfedgeInvolution,
    /// Constrained/ignored flags agree on both halves of an edge.
    FlagSymmetry,
    /// Every triangle is strictly counter-clockwise.
    Orientation,
    /// Constrained Delaunay empty-circumcircle property.
    Delaunay,
}

/// A single invariant violation recorded during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvariantViolation {
    /// The kind of invariant that failed.
    pub kind: InvariantKind,
    /// Details.
    pub error: MeshValidationError,
}

/// Aggregate report of every violation found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshValidationReport {
    /// Violations in detection order.
    pub violations: Vec<InvariantViolation>,
}

impl MeshValidationReport {
    /// Returns `true` if no violations were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn push(&mut self, kind: InvariantKind, error: MeshValidationError) {
        self.violations.push(InvariantViolation { kind, error });
    }
}

/// Options for [`Mesh::validation_report`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidationOptions {
    /// Also check the constrained Delaunay property.
    pub check_delaunay: bool,
}

// =============================================================================
// MESH
// =============================================================================

/// Triangle mesh stored as flat index buffers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Mesh<T> {
    pub(crate) positions: Vec<Point<T>>,
    pub(crate) triangles: Vec<usize>,
    pub(crate) halfedges: Vec<usize>,
    pub(crate) constrained_halfedges: Vec<bool>,
    pub(crate) ignored_halfedges: Vec<bool>,
}

impl<T: CoordinateScalar> Mesh<T> {
    /// Creates an empty mesh.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            positions: Vec::new(),
            triangles: Vec::new(),
            halfedges: Vec::new(),
            constrained_halfedges: Vec::new(),
            ignored_halfedges: Vec::new(),
        }
    }

    /// Creates an empty mesh with room for `n_points` points and the
    /// `2n - 5` triangles a planar triangulation of them can have.
    #[must_use]
    pub fn with_capacity(n_points: usize) -> Self {
        let slots = 3 * (2 * n_points).saturating_sub(5).max(1);
        Self {
            positions: Vec::with_capacity(n_points),
            triangles: Vec::with_capacity(slots),
            halfedges: Vec::with_capacity(slots),
            constrained_halfedges: Vec::with_capacity(slots),
            ignored_halfedges: Vec::with_capacity(slots),
        }
    }

    /// Creates a mesh holding `positions` and no triangles yet.
    #[must_use]
    pub fn from_points(positions: Vec<Point<T>>) -> Self {
        let mut mesh = Self::with_capacity(positions.len());
        mesh.positions = positions;
        mesh
    }

    /// Builds a mesh from positions and counter-clockwise corner triples,
    /// reconstructing opposite links. All flags start cleared.
    ///
    /// # Errors
    ///
    /// Returns a [`HalfedgeError`] if `triangles` is truncated or non-manifold.
    pub fn from_parts(positions: Vec<Point<T>>, triangles: Vec<usize>) -> Result<Self, HalfedgeError> {
        let halfedges = rebuild_halfedges(&triangles)?;
        let n = triangles.len();
        Ok(Self {
            positions,
            triangles,
            halfedges,
            constrained_halfedges: vec![false; n],
            ignored_halfedges: vec![false; n],
        })
    }

    /// Empties every buffer, keeping allocations.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.clear_topology();
    }

    /// Empties the triangle buffers but keeps positions.
    pub(crate) fn clear_topology(&mut self) {
        self.triangles.clear();
        self.halfedges.clear();
        self.constrained_halfedges.clear();
        self.ignored_halfedges.clear();
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    /// Point coordinates.
    #[must_use]
    pub fn positions(&self) -> &[Point<T>] {
        &self.positions
    }

    /// Corner indices, three per triangle.
    #[must_use]
    pub fn triangles(&self) -> &[usize] {
        &self.triangles
    }

    /// Opposite halfedge per slot, [`NONE`] on the boundary.
    #[must_use]
    pub fn halfedges(&self) -> &[usize] {
        &self.halfedges
    }

    /// Constrained flag per halfedge.
    #[must_use]
    pub fn constrained_halfedges(&self) -> &[bool] {
        &self.constrained_halfedges
    }

    /// Ignored-for-planting flag per halfedge.
    #[must_use]
    pub fn ignored_halfedges(&self) -> &[bool] {
        &self.ignored_halfedges
    }

    /// Number of stored points.
    #[must_use]
    pub fn number_of_points(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn number_of_triangles(&self) -> usize {
        self.triangles.len() / 3
    }

    /// `true` when the mesh has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Corner indices of triangle `t`.
    #[inline]
    #[must_use]
    pub fn triangle(&self, t: usize) -> [usize; 3] {
        [self.triangles[3 * t], self.triangles[3 * t + 1], self.triangles[3 * t + 2]]
    }

    /// Corner positions of triangle `t`.
    #[inline]
    #[must_use]
    pub fn triangle_points(&self, t: usize) -> [Point<T>; 3] {
        self.triangle(t).map(|p| self.positions[p])
    }

    /// Position of point `p`.
    #[inline]
    #[must_use]
    pub fn point(&self, p: usize) -> Point<T> {
        self.positions[p]
    }

    /// Opposite of `he`, or [`NONE`].
    #[inline]
    #[must_use]
    pub fn opposite(&self, he: usize) -> usize {
        self.halfedges[he]
    }

    /// Origin and destination point of halfedge `he`.
    #[inline]
    #[must_use]
    pub fn endpoints(&self, he: usize) -> (usize, usize) {
        (self.triangles[he], self.triangles[next_halfedge(he)])
    }

    /// `true` if `he` lies on the mesh boundary.
    #[inline]
    #[must_use]
    pub fn is_boundary(&self, he: usize) -> bool {
        self.halfedges[he] == NONE
    }

    /// `true` if `he` is a refinement segment: constrained or on the boundary.
    #[inline]
    #[must_use]
    pub fn is_segment(&self, he: usize) -> bool {
        self.constrained_halfedges[he] || self.halfedges[he] == NONE
    }

    /// Undirected edges, one representative halfedge each.
    pub fn edges(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.halfedges.len()).filter(|&he| {
            let o = self.halfedges[he];
            o == NONE || he < o
        })
    }

    // -------------------------------------------------------------------------
    // Crate-private mutation helpers
    // -------------------------------------------------------------------------

    /// Appends a point and returns its index.
    pub(crate) fn push_point(&mut self, p: Point<T>) -> usize {
        self.positions.push(p);
        self.positions.len() - 1
    }

    /// Appends triangle `(a, b, c)` linked to opposites `(ha, hb, hc)` and
    /// returns its first slot. Flags start cleared.
    pub(crate) fn add_triangle(&mut self, a: usize, b: usize, c: usize, ha: usize, hb: usize, hc: usize) -> usize {
        let t = self.triangles.len();
        self.triangles.extend([a, b, c]);
        self.halfedges.extend([NONE; 3]);
        self.constrained_halfedges.extend([false; 3]);
        self.ignored_halfedges.extend([false; 3]);
        self.link(t, ha);
        self.link(t + 1, hb);
        self.link(t + 2, hc);
        t
    }

    /// Overwrites the corners of the triangle whose first slot is `base`.
    pub(crate) fn set_triangle(&mut self, base: usize, corners: [usize; 3]) {
        self.triangles[base..base + 3].copy_from_slice(&corners);
    }

    /// Links `a` and `b` as opposites; `b` may be [`NONE`].
    #[inline]
    pub(crate) fn link(&mut self, a: usize, b: usize) {
        self.halfedges[a] = b;
        if b != NONE {
            self.halfedges[b] = a;
        }
    }

    /// Sets per-edge flags on `he` and on its opposite.
    pub fn set_edge_flags(&mut self, he: usize, constrained: bool, ignored: bool) {
        self.constrained_halfedges[he] = constrained;
        self.ignored_halfedges[he] = ignored;
        let o = self.halfedges[he];
        if o != NONE {
            self.constrained_halfedges[o] = constrained;
            self.ignored_halfedges[o] = ignored;
        }
    }

    /// Removes the triangles marked in `remove` and every point no longer
    /// referenced afterwards, remapping all indices. Returns the number of
    /// removed triangles.
    ///
    /// Links into removed triangles become [`NONE`]; flags are kept.
    pub(crate) fn compact(&mut self, remove: &[bool]) -> usize {
        debug_assert_eq!(remove.len(), self.number_of_triangles());
        let n_tri = self.number_of_triangles();
        let mut new_index = vec![NONE; n_tri];
        let mut kept = 0;
        for (t, &r) in remove.iter().enumerate() {
            if !r {
                new_index[t] = kept;
                kept += 1;
            }
        }
        let removed = n_tri - kept;

        if removed > 0 {
            for t in 0..n_tri {
                let nt = new_index[t];
                if nt == NONE {
                    continue;
                }
                for c in 0..3 {
                    let (from, to) = (3 * t + c, 3 * nt + c);
                    let o = self.halfedges[from];
                    self.triangles[to] = self.triangles[from];
                    self.halfedges[to] = if o == NONE || new_index[o / 3] == NONE {
                        NONE
                    } else {
                        3 * new_index[o / 3] + o % 3
                    };
                    self.constrained_halfedges[to] = self.constrained_halfedges[from];
                    self.ignored_halfedges[to] = self.ignored_halfedges[from];
                }
            }
            let len = 3 * kept;
            self.triangles.truncate(len);
            self.halfedges.truncate(len);
            self.constrained_halfedges.truncate(len);
            self.ignored_halfedges.truncate(len);
        }

        self.remove_unreferenced_points();
        removed
    }

    /// Drops positions that no triangle references and renumbers the rest.
    pub(crate) fn remove_unreferenced_points(&mut self) {
        let mut used = vec![false; self.positions.len()];
        for &p in &self.triangles {
            used[p] = true;
        }
        if used.iter().all(|&u| u) {
            return;
        }
        let mut remap = vec![NONE; used.len()];
        let mut next = 0;
        for (p, &u) in used.iter().enumerate() {
            if u {
                remap[p] = next;
                next += 1;
            }
        }
        let mut index = 0;
        self.positions.retain(|_| {
            let keep = used[index];
            index += 1;
            keep
        });
        for p in &mut self.triangles {
            *p = remap[*p];
        }
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Returns the first structural violation, if any.
    ///
    /// # Errors
    ///
    /// Returns the first [`MeshValidationError`] found by
    /// [`validation_report`](Self::validation_report) with default options.
    pub fn is_valid(&self) -> Result<(), MeshValidationError> {
        match self.validation_report(ValidationOptions::default()) {
            Ok(()) => Ok(()),
            Err(report) => match report.violations.into_iter().next() {
                Some(first) => Err(first.error),
                None => Ok(()),
            },
        }
    }

    /// Checks every structural invariant and reports all failures.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshValidationReport`] listing each violation. Buffer
    /// length or index-range failures stop the check early, since later
    /// checks would index out of bounds.
    pub fn validation_report(&self, options: ValidationOptions) -> Result<(), MeshValidationReport> {
        let mut report = MeshValidationReport::default();
        let n = self.triangles.len();

        if n % 3 != 0
            || self.halfedges.len() != n
            || self.constrained_halfedges.len() != n
            || self.ignored_halfedges.len() != n
        {
            report.push(
                InvariantKind::BufferLengths,
                MeshValidationError::BufferLengthMismatch {
                    triangles: n,
                    halfedges: self.halfedges.len(),
                    constrained: self.constrained_halfedges.len(),
                    ignored: self.ignored_halfedges.len(),
                },
            );
            return Err(report);
        }

        let n_points = self.positions.len();
        for he in 0..n {
            let point = self.triangles[he];
            if point >= n_points {
                report.push(
                    InvariantKind::IndexRange,
                    MeshValidationError::PointIndexOutOfRange {
                        halfedge: he,
                        point,
                        n_points,
                    },
                );
            }
            let opposite = self.halfedges[he];
            if opposite != NONE && opposite >= n {
                report.push(
                    InvariantKind::IndexRange,
                    MeshValidationError::OppositeOutOfRange { halfedge: he, opposite },
                );
            }
        }
        if !report.is_empty() {
            return Err(report);
        }

        for he in 0..n {
            let opposite = self.halfedges[he];
            if opposite == NONE {
                continue;
            }
            let back = self.halfedges[opposite];
            if back != he {
                report.push(
                    InvariantKind::HalfedgeInvolution,
                    MeshValidationError::BrokenInvolution {
                        halfedge: he,
                        opposite,
                        back,
                    },
                );
                continue;
            }
            let (a, b) = self.endpoints(he);
            let (c, d) = self.endpoints(opposite);
            if a != d || b != c {
                report.push(
                    InvariantKind::HalfedgeInvolution,
                    MeshValidationError::MismatchedEndpoints { halfedge: he, opposite },
                );
            }
            if he < opposite {
                for (flag, buffer) in [
                    ("constrained", &self.constrained_halfedges),
                    ("ignored", &self.ignored_halfedges),
                ] {
                    if buffer[he] != buffer[opposite] {
                        report.push(
                            InvariantKind::FlagSymmetry,
                            MeshValidationError::AsymmetricFlag {
                                halfedge: he,
                                opposite,
                                flag,
                            },
                        );
                    }
                }
            }
        }

        for t in 0..self.number_of_triangles() {
            let [a, b, c] = self.triangle_points(t);
            let o = orientation(&a, &b, &c);
            if o != Orientation::POSITIVE {
                report.push(
                    InvariantKind::Orientation,
                    MeshValidationError::BadOrientation {
                        triangle: t,
                        orientation: o,
                    },
                );
            }
        }

        if options.check_delaunay {
            for halfedge in find_delaunay_violations(self) {
                report.push(
                    InvariantKind::Delaunay,
                    MeshValidationError::DelaunayViolation { halfedge },
                );
            }
        }

        if report.is_empty() { Ok(()) } else { Err(report) }
    }
}

//! # cdt-mesher
//!
//! Constrained Delaunay triangulation of planar point sets, with hole
//! planting, Ruppert quality refinement, alpha-shape filtering and local
//! dynamic edits.
//!
//! # Features
//!
//! - Incremental sweep construction of the Delaunay triangulation
//! - Constraint edges recovered by edge flips, including segments that pass
//!   through input points
//! - Hole removal from seed points, from the constrained boundary, or fully
//!   automatic from constraint nesting
//! - Ruppert refinement to area and minimum angle bounds with concentric-shell
//!   segment splitting
//! - Alpha-shape filtering with point, constraint and windmill protections
//! - Point insertion, edge splitting and point removal on a built mesh
//! - `f32`, `f64` and exact `i32` coordinates through [`CoordinateScalar`](geometry::traits::coordinate::CoordinateScalar)
//! - Serialization of meshes, inputs and settings with [serde](https://serde.rs)
//!
//! # Basic Usage
//!
//! ```rust
//! use cdt_mesher::prelude::*;
//!
//! // A square with a square hole in the middle.
//! let mut triangulator = Triangulator::new(
//!     TriangulationSettingsBuilder::default()
//!         .auto_holes_and_boundary(true)
//!         .build()
//!         .unwrap(),
//! );
//! triangulator.input = TriangulationInput {
//!     positions: vec![
//!         Point::new([0.0, 0.0]),
//!         Point::new([3.0, 0.0]),
//!         Point::new([3.0, 3.0]),
//!         Point::new([0.0, 3.0]),
//!         Point::new([1.0, 1.0]),
//!         Point::new([2.0, 1.0]),
//!         Point::new([2.0, 2.0]),
//!         Point::new([1.0, 2.0]),
//!     ],
//!     constraints: vec![[0, 1], [1, 2], [2, 3], [3, 0], [4, 5], [5, 6], [6, 7], [7, 4]],
//!     ..TriangulationInput::default()
//! };
//! triangulator.run().unwrap();
//!
//! let mesh = triangulator.output();
//! assert_eq!(mesh.number_of_triangles(), 8);
//! assert!(mesh.is_valid().is_ok());
//! ```
//!
//! # Mesh Layout
//!
//! A [`Mesh`](core::mesh::Mesh) is a set of flat buffers indexed by
//! halfedge. Triangle `t` occupies slots `3t`, `3t + 1` and `3t + 2`; slot
//! `he` holds the point the halfedge starts from, and the halfedge runs to the
//! next corner of the same triangle. The invariants checked by
//! [`Mesh::is_valid`](core::mesh::Mesh::is_valid) are:
//!
//! - **Involution**: `halfedges[halfedges[he]] == he` whenever the opposite is
//!   not [`NONE`](core::halfedge::NONE).
//! - **Shared endpoints**: opposite halfedges connect the same two points in
//!   reverse order.
//! - **Orientation**: every triangle is counter-clockwise.
//! - **Flag symmetry**: constrained and ignored flags agree on both sides of
//!   an edge.
//!
//! The Delaunay property is checked separately by
//! [`is_delaunay`](core::util::delaunay_validation::is_delaunay); constrained
//! edges are exempt.
//!
//! # Errors
//!
//! Each stage has its own error type; [`TriangulationError`](core::triangulator::TriangulationError)
//! wraps them all and [`ErrorKind`](core::triangulator::ErrorKind) tells
//! whether the input was rejected, a ceiling was reached with a partial mesh
//! kept, or an edit's precondition failed with the mesh untouched.
//!
//! # Concurrency
//!
//! A triangulation runs on the calling thread. Every public type owns its
//! buffers and is `Send + Sync`, so independent triangulations can run on
//! separate threads.

// Allow multiple crate versions due to transitive dependencies
#![allow(clippy::multiple_crate_versions)]
#![forbid(unsafe_code)]

#[macro_use]
extern crate derive_builder;

/// Mesh storage, construction and every stage of the pipeline.
pub mod core {
    /// Algorithms operating on a [`Mesh`](mesh::Mesh).
    pub mod algorithms {
        /// Alpha-shape filtering
        pub mod alpha_shape;
        /// Constraint recovery by edge flips
        pub mod constraints;
        /// Point insertion, edge split and point removal on a built mesh
        pub mod dynamic;
        /// Edge flips and Lawson legalization
        pub mod flips;
        /// Constrained Bowyer-Watson cavities
        pub mod incremental_insertion;
        /// Point location by straight walk
        pub mod locate;
        /// Hole and boundary planting
        pub mod planting;
        /// Ruppert refinement
        pub mod refinement;
    }
    pub mod builder;
    /// High-performance collection types for local scratch buffers
    pub mod collections;
    pub mod halfedge;
    pub mod mesh;
    pub mod preprocessing;
    pub mod settings;
    pub mod triangulator;
    pub mod validation;
    /// Mesh-level checks.
    pub mod util {
        pub mod delaunay_validation;
    }

    pub use mesh::*;
    pub use settings::*;
    pub use triangulator::*;
}

/// Points, coordinate scalars and geometric predicates.
///
/// Every predicate is generic over [`CoordinateScalar`](traits::coordinate::CoordinateScalar);
/// exactness is a property of the scalar, not of the caller.
pub mod geometry {
    pub mod point;
    pub mod predicates;
    pub mod robust_predicates;
    /// Point-set helpers and reproducible point generation
    pub mod util;
    /// Coordinate scalar policy.
    pub mod traits {
        pub mod coordinate;
        pub use coordinate::*;
    }
    pub use point::*;
    pub use predicates::*;
    pub use traits::*;
}

/// Re-exports of the types most programs need.
pub mod prelude {
    pub use crate::core::{
        algorithms::{
            alpha_shape::{AlphaShapeError, AlphaShapeSettings, AlphaShapeStats, alpha_shape_filter},
            constraints::{ConstraintError, ConstraintStats, restore_constraints},
            dynamic::{EditError, insert_point_in_triangle, remove_point, split_halfedge},
            flips::{DelaunayRepairError, FlipError, flip_edge, legalize_edges},
            locate::{LocateResult, locate},
            planting::{PlantingError, PlantingStats, plant_auto, plant_holes},
            refinement::{RefinementError, RefinementStats, RefinementThresholds, refine_mesh},
        },
        builder::{BuildError, BuildStats, build_delaunay},
        halfedge::{HalfedgeError, NONE, next_halfedge, prev_halfedge, rebuild_halfedges, vertex_star},
        mesh::*,
        preprocessing::{Preprocessor, PreprocessingError, SimilarityTransform},
        settings::*,
        triangulator::*,
        util::delaunay_validation::*,
        validation::{InputValidationError, ValidationChecks, validate_input},
    };

    pub use crate::core::collections::{
        FastHashMap, FastHashSet, SmallBuffer, fast_hash_map_with_capacity, fast_hash_set_with_capacity,
    };

    pub use crate::geometry::{point::*, predicates::*, traits::coordinate::*, util::*};
}

/// The function `is_normal` checks that structs implement `auto` traits.
/// Traits are checked at compile time, so this function is only used for
/// testing.
#[must_use]
pub const fn is_normal<T: Sized + Send + Sync + Unpin>() -> bool {
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{
        core::{
            mesh::Mesh,
            settings::TriangulationSettings,
            triangulator::{TriangulationError, TriangulationInput, Triangulator},
        },
        geometry::Point,
        is_normal,
    };

    #[test]
    fn normal_types() {
        assert!(is_normal::<Point<f64>>());
        assert!(is_normal::<Point<i32>>());
        assert!(is_normal::<Mesh<f32>>());
        assert!(is_normal::<Mesh<f64>>());
        assert!(is_normal::<TriangulationInput<f64>>());
        assert!(is_normal::<TriangulationSettings>());
        assert!(is_normal::<TriangulationError>());
        assert!(is_normal::<Triangulator<f64>>());
        assert!(is_normal::<Triangulator<i32>>());
    }

    #[test]
    fn test_prelude_exports() {
        use crate::prelude::*;

        let mut map: FastHashMap<u64, usize> = FastHashMap::default();
        map.insert(123, 456);
        assert_eq!(map.get(&123), Some(&456));

        let mut buffer: SmallBuffer<i32, 8> = SmallBuffer::new();
        buffer.push(42);
        assert_eq!(buffer.len(), 1);

        let set_with_cap = fast_hash_set_with_capacity::<u64>(50);
        assert!(set_with_cap.capacity() >= 50);

        let mut mesh = Mesh::from_points(vec![
            Point::new([0.0, 0.0]),
            Point::new([1.0, 0.0]),
            Point::new([0.0, 1.0]),
        ]);
        build_delaunay(&mut mesh).unwrap();
        assert_eq!(mesh.number_of_triangles(), 1);
        assert!(is_delaunay(&mesh).is_ok());
    }
}

//! Property-based tests for mesh invariants.
//!
//! - Halfedge involution and `3 * #triangles == #halfedges`
//! - Empty circumcircle condition after construction and after edits
//! - Constraint persistence through restoration and edge splits
//! - Determinism of construction and of the whole pipeline
//! - Halfedge reconstruction from the triangle buffer
//! - Alpha-shape protections combined with windmill breaking

use cdt_mesher::prelude::*;
use proptest::prelude::*;

// =============================================================================
// TEST CONFIGURATION
// =============================================================================

fn finite_coordinate() -> impl Strategy<Value = f64> {
    (-100.0..100.0).prop_filter("must be finite", |x: &f64| x.is_finite())
}

fn point_set(min: usize, max: usize) -> impl Strategy<Value = Vec<Point<f64>>> {
    prop::collection::vec((finite_coordinate(), finite_coordinate()), min..max).prop_map(|coords| {
        let mut unique: Vec<Point<f64>> = Vec::with_capacity(coords.len());
        for (x, y) in coords {
            let p = Point::new([x, y]);
            if !unique.contains(&p) {
                unique.push(p);
            }
        }
        unique
    })
}

fn build(points: Vec<Point<f64>>) -> Option<Mesh<f64>> {
    let mut mesh = Mesh::from_points(points);
    build_delaunay(&mut mesh).ok()?;
    Some(mesh)
}

fn canonical_triangles(mesh: &Mesh<f64>) -> Vec<[usize; 3]> {
    let mut out: Vec<[usize; 3]> = (0..mesh.number_of_triangles())
        .map(|t| {
            let [a, b, c] = mesh.triangle(t);
            if a < b && a < c {
                [a, b, c]
            } else if b < c {
                [b, c, a]
            } else {
                [c, a, b]
            }
        })
        .collect();
    out.sort_unstable();
    out
}

/// Disjoint constraints joining consecutive points in x order.
fn x_sorted_chain(points: &[Point<f64>]) -> Vec<[usize; 2]> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (points[a].to_f64_array(), points[b].to_f64_array());
        pa[0].total_cmp(&pb[0]).then(pa[1].total_cmp(&pb[1]))
    });
    order.windows(2).step_by(2).map(|w| [w[0], w[1]]).collect()
}

fn has_edge(mesh: &Mesh<f64>, a: usize, b: usize) -> Option<usize> {
    (0..mesh.halfedges().len()).find(|&he| {
        let (u, v) = mesh.endpoints(he);
        (u, v) == (a, b) || (u, v) == (b, a)
    })
}

/// Points lying strictly inside segment `a b`.
fn points_on_segment(mesh: &Mesh<f64>, a: usize, b: usize) -> usize {
    let (pa, pb) = (mesh.point(a), mesh.point(b));
    (0..mesh.number_of_points())
        .filter(|&p| p != a && p != b)
        .filter(|&p| {
            let q = mesh.point(p);
            orientation(&pa, &pb, &q) == Orientation::DEGENERATE && encroaches(&q, &pa, &pb)
        })
        .count()
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a freshly built mesh is structurally valid and Delaunay.
    #[test]
    fn prop_built_mesh_is_valid_and_delaunay(points in point_set(3, 60)) {
        let Some(mesh) = build(points) else {
            // All points collinear.
            return Ok(());
        };
        prop_assert!(mesh.is_valid().is_ok(), "{:?}", mesh.is_valid());
        prop_assert_eq!(mesh.halfedges().len(), 3 * mesh.number_of_triangles());
        for (he, &o) in mesh.halfedges().iter().enumerate() {
            if o != NONE {
                prop_assert_eq!(mesh.halfedges()[o], he);
            }
        }
        prop_assert!(is_delaunay(&mesh).is_ok());
    }

    /// Property: rebuilding halfedges from the triangle buffer reproduces them.
    #[test]
    fn prop_rebuild_round_trip(points in point_set(3, 60)) {
        let Some(mesh) = build(points) else {
            return Ok(());
        };
        let rebuilt = rebuild_halfedges(mesh.triangles()).unwrap();
        prop_assert_eq!(rebuilt.as_slice(), mesh.halfedges());
    }

    /// Property: construction is a pure function of its input.
    #[test]
    fn prop_construction_is_deterministic(points in point_set(3, 60)) {
        let first = build(points.clone());
        let second = build(points);
        match (first, second) {
            (Some(a), Some(b)) => {
                prop_assert_eq!(a.triangles(), b.triangles());
                prop_assert_eq!(a.halfedges(), b.halfedges());
            }
            (None, None) => {}
            _ => prop_assert!(false, "only one of two identical builds failed"),
        }
    }

    /// Property: an x-monotone chain through the points survives as
    /// constrained edges, split only at points lying exactly on it.
    #[test]
    fn prop_constraints_persist(points in point_set(4, 40)) {
        let Some(mut mesh) = build(points) else {
            return Ok(());
        };
        let chain = x_sorted_chain(mesh.positions());

        match restore_constraints(&mut mesh, &chain, None, 100_000) {
            // The builder skipped a point that sits numerically on the hull.
            Err(ConstraintError::MissingEndpoint { .. }) => return Ok(()),
            result => {
                result.unwrap();
            }
        }
        prop_assert!(mesh.is_valid().is_ok());
        for &[a, b] in &chain {
            match has_edge(&mesh, a, b) {
                Some(he) => prop_assert!(mesh.constrained_halfedges()[he]),
                None => prop_assert!(points_on_segment(&mesh, a, b) > 0),
            }
        }

        // Splitting a constrained edge keeps both halves constrained.
        let Some(he) = (0..mesh.halfedges().len()).find(|&he| mesh.constrained_halfedges()[he]) else {
            return Ok(());
        };
        let (a, b) = mesh.endpoints(he);
        let p = match split_halfedge(&mut mesh, he, 0.5) {
            // The midpoint of a sliver edge rounded onto a neighbor's side.
            Err(EditError::DegenerateInsertion { .. }) => return Ok(()),
            result => result.unwrap(),
        };
        prop_assert!(mesh.is_valid().is_ok());
        for end in [a, b] {
            let half = has_edge(&mesh, p, end);
            prop_assert!(half.is_some());
            prop_assert!(half.is_some_and(|h| mesh.constrained_halfedges()[h]));
        }
    }

    /// Property: inserting a point and removing it again restores the mesh.
    #[test]
    fn prop_insert_then_remove(
        points in point_set(4, 40),
        pick in any::<prop::sample::Index>(),
        w in (0.05f64..1.0, 0.05f64..1.0, 0.05f64..1.0),
    ) {
        let Some(mut mesh) = build(points) else {
            return Ok(());
        };
        let referenced: FastHashSet<usize> = mesh.triangles().iter().copied().collect();
        if referenced.len() != mesh.number_of_points() {
            // Compaction after removal would also drop the skipped points.
            return Ok(());
        }
        let before = canonical_triangles(&mesh);
        let t = pick.index(mesh.number_of_triangles());

        let p = match insert_point_in_triangle(&mut mesh, t, [w.0, w.1, w.2]) {
            // Sliver triangle too thin to hold a distinct interior point.
            Err(EditError::DegenerateInsertion { .. }) => {
                prop_assert_eq!(canonical_triangles(&mesh), before);
                return Ok(());
            }
            result => result.unwrap(),
        };
        prop_assert!(mesh.is_valid().is_ok());
        prop_assert!(is_delaunay(&mesh).is_ok());

        remove_point(&mut mesh, p).unwrap();
        prop_assert!(mesh.is_valid().is_ok());
        prop_assert!(is_delaunay(&mesh).is_ok());
        prop_assert_eq!(canonical_triangles(&mesh), before);
    }

    /// Property: with every protection on, windmill breaking keeps each point
    /// and each constrained edge, whatever alpha removes.
    #[test]
    fn prop_alpha_protections_survive_windmill_breaking(
        points in point_set(4, 60),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..6),
        alpha in 0.5f64..40.0,
    ) {
        let Some(mut mesh) = build(points) else {
            return Ok(());
        };
        let referenced: FastHashSet<usize> = mesh.triangles().iter().copied().collect();
        if referenced.len() != mesh.number_of_points() {
            return Ok(());
        }
        let constrained: Vec<(usize, usize)> = picks
            .iter()
            .map(|pick| {
                let he = pick.index(mesh.halfedges().len());
                mesh.set_edge_flags(he, true, false);
                mesh.endpoints(he)
            })
            .collect();
        let n_points = mesh.number_of_points();

        let settings = AlphaShapeSettings {
            protect_points: true,
            prevent_windmills: true,
            protect_constraints: true,
        };
        let stats = alpha_shape_filter(&mut mesh, alpha, settings).unwrap();
        prop_assert_eq!(stats.removed_points, 0);
        prop_assert_eq!(mesh.number_of_points(), n_points);
        prop_assert!(mesh.is_valid().is_ok(), "{:?}", mesh.is_valid());
        for &(a, b) in &constrained {
            let he = has_edge(&mesh, a, b);
            prop_assert!(he.is_some(), "constrained edge {}-{} was removed", a, b);
            prop_assert!(he.is_some_and(|h| mesh.constrained_halfedges()[h]));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: two runs of the full pipeline on the same input agree
    /// bit for bit, including planting, refinement and the inverse transform.
    #[test]
    fn prop_pipeline_is_deterministic(points in point_set(4, 40)) {
        let settings = TriangulationSettingsBuilder::default()
            .preprocessor(Preprocessor::PrincipalAxis)
            .restore_boundary(true)
            .refine_mesh(true)
            .refinement_thresholds(RefinementThresholds {
                area: 500.0,
                angle: 20f64.to_radians(),
            })
            .refinement_max_triangles(20_000)
            .build()
            .unwrap();
        let mut input = TriangulationInput::from_positions(points.clone());
        input.constraints = x_sorted_chain(&points);
        // A constrained frame around the coordinate range.
        let n = points.len();
        input.positions.extend([
            Point::new([-150.0, -150.0]),
            Point::new([150.0, -150.0]),
            Point::new([150.0, 150.0]),
            Point::new([-150.0, 150.0]),
        ]);
        input.constraints.extend([[n, n + 1], [n + 1, n + 2], [n + 2, n + 3], [n + 3, n]]);

        let mut first = Triangulator::new(settings.clone());
        first.input = input.clone();
        let mut second = Triangulator::new(settings);
        second.input = input;

        prop_assert_eq!(first.run(), second.run());
        prop_assert_eq!(first.status(), second.status());
        let (a, b) = (first.output(), second.output());
        prop_assert_eq!(a.triangles(), b.triangles());
        prop_assert_eq!(a.halfedges(), b.halfedges());
        prop_assert_eq!(a.constrained_halfedges(), b.constrained_halfedges());
        let bits = |mesh: &Mesh<f64>| -> Vec<[u64; 2]> {
            mesh.positions().iter().map(|p| p.to_f64_array().map(f64::to_bits)).collect()
        };
        prop_assert_eq!(bits(a), bits(b));
    }
}

//! Input validation through the pipeline: every rejected input leaves an
//! empty output and `Status::Err`.

use cdt_mesher::prelude::*;

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

fn pentagon() -> TriangulationInput<f64> {
    TriangulationInput::from_positions(vec![
        Point::new([0.0, 0.0]),
        Point::new([2.0, 0.0]),
        Point::new([3.0, 1.5]),
        Point::new([1.0, 3.0]),
        Point::new([-1.0, 1.5]),
    ])
}

fn rejected(input: TriangulationInput<f64>, settings: TriangulationSettings) -> InputValidationError {
    let mut tri = Triangulator::new(settings);
    tri.input = input;
    let err = tri.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(tri.status(), Status::Err);
    assert!(tri.output().is_empty());
    match err {
        TriangulationError::Validation(inner) => inner,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn each_check_reports_its_own_error() {
    init_tracing();
    let settings = TriangulationSettings::default();

    let mut input = pentagon();
    input.positions.truncate(2);
    assert_eq!(
        rejected(input, settings.clone()),
        InputValidationError::TooFewPoints { count: 2 }
    );

    let mut input = pentagon();
    input.positions[1] = Point::new([f64::NAN, 0.0]);
    assert_eq!(
        rejected(input, settings.clone()),
        InputValidationError::NonFinitePosition { point: 1 }
    );

    let mut input = pentagon();
    input.constraints = vec![[0, 5]];
    assert!(matches!(
        rejected(input, settings.clone()),
        InputValidationError::ConstraintOutOfRange { point: 5, .. }
    ));

    let mut input = pentagon();
    input.constraints = vec![[3, 3]];
    assert_eq!(
        rejected(input, settings.clone()),
        InputValidationError::ZeroLengthConstraint { constraint: 0 }
    );

    let mut input = pentagon();
    input.constraints = vec![[0, 2], [2, 0]];
    assert_eq!(
        rejected(input, settings.clone()),
        InputValidationError::DuplicateConstraint { first: 0, duplicate: 1 }
    );

    let mut input = pentagon();
    input.constraints = vec![[0, 2], [1, 3]];
    assert_eq!(
        rejected(input, settings.clone()),
        InputValidationError::IntersectingConstraints { first: 0, second: 1 }
    );

    let mut input = pentagon();
    input.hole_seeds = vec![Point::new([1.0, f64::INFINITY])];
    assert_eq!(
        rejected(input, settings.clone()),
        InputValidationError::NonFiniteHoleSeed { seed: 0 }
    );

    let mut input = pentagon();
    input.constraints = vec![[0, 2]];
    input.ignored_constraints = Some(Vec::new());
    assert_eq!(
        rejected(input, settings),
        InputValidationError::IgnoredLengthMismatch { expected: 1, found: 0 }
    );
}

#[test]
fn verbose_validation_still_returns_the_first_error() {
    init_tracing();
    let settings = TriangulationSettingsBuilder::default().verbose(true).build().unwrap();
    let mut input = pentagon();
    input.positions.push(Point::new([2.0, 0.0]));
    input.constraints = vec![[1, 1], [0, 9]];
    assert_eq!(
        rejected(input, settings),
        InputValidationError::DuplicatePosition { first: 1, duplicate: 5 }
    );
}

#[test]
fn shared_endpoints_are_accepted() {
    init_tracing();
    let mut tri = Triangulator::new(TriangulationSettings::default());
    tri.input = pentagon();
    tri.input.constraints = vec![[0, 1], [1, 2], [2, 3], [3, 4], [4, 0], [0, 2], [0, 3]];
    tri.run().unwrap();
    let mesh = tri.output();
    assert_eq!(mesh.number_of_triangles(), 3);
    assert_eq!(mesh.constrained_halfedges().iter().filter(|&&c| c).count(), 5 + 2 * 2);
}

#[test]
fn disabled_validation_lets_the_builder_skip_duplicates() {
    init_tracing();
    let settings = TriangulationSettingsBuilder::default()
        .validate_input(false)
        .build()
        .unwrap();
    let mut tri = Triangulator::new(settings);
    tri.input = pentagon();
    tri.input.positions.push(Point::new([3.0, 1.5]));
    tri.run().unwrap();
    let mesh = tri.output();
    assert!(mesh.is_valid().is_ok());
    assert_eq!(mesh.number_of_triangles(), 3);
    assert!(mesh.triangles().iter().all(|&p| p != 5));
}

#[test]
fn integer_coordinates_reject_continuous_stages() {
    init_tracing();
    let positions = vec![
        Point::new([0, 0]),
        Point::new([8, 0]),
        Point::new([8, 8]),
        Point::new([0, 8]),
    ];

    let mut tri = Triangulator::new(TriangulationSettings::default());
    tri.input = TriangulationInput::from_positions(positions.clone());
    tri.run().unwrap();
    assert_eq!(tri.output().number_of_triangles(), 2);

    let settings = TriangulationSettingsBuilder::default().refine_mesh(true).build().unwrap();
    let mut tri = Triangulator::new(settings);
    tri.input = TriangulationInput::from_positions(positions.clone());
    let err = tri.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(tri.output().number_of_triangles(), 2);

    let settings = TriangulationSettingsBuilder::default()
        .preprocessor(Preprocessor::CenterOfMass)
        .build()
        .unwrap();
    let mut tri = Triangulator::new(settings);
    tri.input = TriangulationInput::from_positions(positions);
    assert_eq!(
        tri.run().unwrap_err(),
        TriangulationError::Preprocessing(PreprocessingError::DiscreteCoordinates { scalar: "i32" })
    );
    assert!(tri.output().is_empty());
}

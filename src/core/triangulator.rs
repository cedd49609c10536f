//! The triangulation pipeline.
//!
//! A [`Triangulator`] owns its input, settings and output mesh and runs the
//! stages in a fixed order, each one optional:
//!
//! 1. input validation ([`validate_input`])
//! 2. preprocessing ([`SimilarityTransform`])
//! 3. Delaunay construction ([`build_delaunay`])
//! 4. constraint restoration ([`restore_constraints`])
//! 5. hole and boundary planting ([`plant_holes`], [`plant_auto`])
//! 6. quality refinement ([`refine_mesh`])
//! 7. alpha-shape filtering ([`alpha_shape_filter`])
//! 8. the inverse preprocessing transform
//!
//! The first failing stage stops the run and sets [`Status::Err`]. Validation
//! failures leave the output empty; later failures keep the partial mesh,
//! already mapped back to input coordinates.
//!
//! # Examples
//!
//! ```
//! use cdt_mesher::prelude::*;
//!
//! let mut triangulator = Triangulator::new(TriangulationSettings::default());
//! triangulator.input = TriangulationInput::from_positions(vec![
//!     Point::new([0.0, 0.0]),
//!     Point::new([1.0, 0.0]),
//!     Point::new([1.0, 1.0]),
//!     Point::new([0.0, 1.0]),
//! ]);
//! triangulator.run().unwrap();
//! assert_eq!(triangulator.status(), Status::Ok);
//! assert_eq!(triangulator.output().number_of_triangles(), 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::core::algorithms::alpha_shape::{AlphaShapeError, alpha_shape_filter};
use crate::core::algorithms::constraints::{ConstraintError, restore_constraints};
use crate::core::algorithms::dynamic::{EditError, insert_point_in_triangle, remove_point, split_halfedge};
use crate::core::algorithms::planting::{PlantingError, plant_auto, plant_holes};
use crate::core::algorithms::refinement::{RefinementError, RefinementThresholds, refine_mesh};
use crate::core::builder::{BuildError, build_delaunay};
use crate::core::halfedge::HalfedgeError;
use crate::core::mesh::Mesh;
use crate::core::preprocessing::{PreprocessingError, SimilarityTransform};
use crate::core::settings::TriangulationSettings;
use crate::core::validation::{InputValidationError, validate_input};
use crate::geometry::point::Point;
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Everything a run consumes besides the settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: CoordinateScalar"))]
pub struct TriangulationInput<T: CoordinateScalar> {
    /// Point positions; the index is the point's identity.
    pub positions: Vec<Point<T>>,
    /// Required edges as point index pairs.
    pub constraints: Vec<[usize; 2]>,
    /// One point inside each hole.
    pub hole_seeds: Vec<Point<T>>,
    /// Per-constraint flag: the edge does not stop hole flood fills.
    pub ignored_constraints: Option<Vec<bool>>,
}

impl<T: CoordinateScalar> TriangulationInput<T> {
    /// Input with positions only.
    #[must_use]
    pub fn from_positions(positions: Vec<Point<T>>) -> Self {
        Self {
            positions,
            constraints: Vec::new(),
            hole_seeds: Vec::new(),
            ignored_constraints: None,
        }
    }
}

/// Outcome of the last run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Every enabled stage succeeded.
    #[default]
    Ok,
    /// A stage failed; see the error returned by [`Triangulator::run`].
    Err,
}

/// Coarse classification of a [`TriangulationError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected input; nothing was built.
    Validation,
    /// An iteration or size ceiling was hit; the partial mesh is kept.
    Convergence,
    /// An operation's precondition failed; the mesh is unchanged.
    Precondition,
    /// An internal invariant broke.
    Internal,
}

/// Any failure of the pipeline or of a dynamic edit.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum TriangulationError {
    /// Input validation failed.
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    /// The preprocessing transform could not be fitted.
    #[error(transparent)]
    Preprocessing(#[from] PreprocessingError),
    /// Delaunay construction failed.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// Constraint restoration failed.
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    /// Hole planting failed.
    #[error(transparent)]
    Planting(#[from] PlantingError),
    /// Refinement failed.
    #[error(transparent)]
    Refinement(#[from] RefinementError),
    /// The alpha-shape filter failed.
    #[error(transparent)]
    AlphaShape(#[from] AlphaShapeError),
    /// A dynamic edit failed.
    #[error(transparent)]
    Edit(#[from] EditError),
    /// Halfedge reconstruction failed.
    #[error(transparent)]
    Halfedge(#[from] HalfedgeError),
}

impl TriangulationError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::Planting(PlantingError::NonFiniteSeed { .. })
            | Self::AlphaShape(AlphaShapeError::InvalidAlpha { .. })
            | Self::Constraint(ConstraintError::IntersectingConstraint { .. }) => ErrorKind::Validation,
            Self::Constraint(ConstraintError::NonConvergent { .. })
            | Self::Refinement(RefinementError::TriangleLimitExceeded { .. })
            | Self::Edit(EditError::NonConvergent { .. }) => ErrorKind::Convergence,
            Self::Preprocessing(_)
            | Self::Build(_)
            | Self::Constraint(ConstraintError::MissingEndpoint { .. } | ConstraintError::OutsideDomain { .. })
            | Self::Refinement(RefinementError::DiscreteCoordinates { .. })
            | Self::Edit(_) => ErrorKind::Precondition,
            Self::Refinement(RefinementError::SegmentSplit(_)) | Self::Halfedge(_) => ErrorKind::Internal,
        }
    }
}

/// Pipeline driver holding settings, input and output.
#[derive(Clone, Debug)]
pub struct Triangulator<T: CoordinateScalar> {
    /// Stage toggles and limits.
    pub settings: TriangulationSettings,
    /// Input consumed by [`run`](Self::run).
    pub input: TriangulationInput<T>,
    mesh: Mesh<T>,
    status: Status,
}

impl<T: CoordinateScalar> Default for Triangulator<T> {
    fn default() -> Self {
        Self::new(TriangulationSettings::default())
    }
}

impl<T: CoordinateScalar> Triangulator<T> {
    /// Creates a triangulator with empty input.
    #[must_use]
    pub fn new(settings: TriangulationSettings) -> Self {
        Self::with_capacity(settings, 0)
    }

    /// Creates a triangulator whose output buffers are sized for `n_points`.
    #[must_use]
    pub fn with_capacity(settings: TriangulationSettings, n_points: usize) -> Self {
        Self {
            settings,
            input: TriangulationInput::default(),
            mesh: Mesh::with_capacity(n_points),
            status: Status::Ok,
        }
    }

    /// The output mesh of the last run, in input coordinates.
    #[must_use]
    pub const fn output(&self) -> &Mesh<T> {
        &self.mesh
    }

    /// Takes the output mesh, leaving an empty one behind.
    pub fn take_output(&mut self) -> Mesh<T> {
        std::mem::take(&mut self.mesh)
    }

    /// Status of the last run or edit.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Runs every enabled stage on the current input.
    ///
    /// # Errors
    ///
    /// Returns the first stage error and sets [`Status::Err`]. See
    /// [`ErrorKind`] for what each class of error leaves behind.
    pub fn run(&mut self) -> Result<(), TriangulationError> {
        self.mesh.clear();
        self.status = Status::Ok;

        let result = self.run_stages();
        if let Err(err) = &result {
            tracing::debug!("[triangulator] run failed: {err}");
            self.status = Status::Err;
        }
        result
    }

    fn run_stages(&mut self) -> Result<(), TriangulationError> {
        let settings = &self.settings;
        let input = &self.input;

        if settings.validate_input {
            validate_input(input, &settings.validation_checks, settings.verbose)?;
        }

        let transform = SimilarityTransform::fit(settings.preprocessor, &input.positions)?;
        self.mesh.positions.extend_from_slice(&input.positions);
        let mut seeds = input.hole_seeds.clone();
        transform.apply(&mut self.mesh.positions);
        transform.apply(&mut seeds);

        let outcome = Self::mesh_stages(&mut self.mesh, settings, input, &seeds, &transform);
        transform.revert(&mut self.mesh.positions);
        outcome
    }

    fn mesh_stages(
        mesh: &mut Mesh<T>,
        settings: &TriangulationSettings,
        input: &TriangulationInput<T>,
        seeds: &[Point<T>],
        transform: &SimilarityTransform,
    ) -> Result<(), TriangulationError> {
        if let Err(err) = build_delaunay(mesh) {
            mesh.clear();
            return Err(err.into());
        }

        if !input.constraints.is_empty() {
            restore_constraints(
                mesh,
                &input.constraints,
                input.ignored_constraints.as_deref(),
                settings.sloan_max_iters,
            )?;
        }

        if settings.auto_holes_and_boundary {
            plant_auto(mesh);
        } else if settings.restore_boundary || !seeds.is_empty() {
            plant_holes(mesh, seeds, settings.restore_boundary)?;
        }

        if settings.refine_mesh {
            let thresholds = RefinementThresholds {
                area: transform.scale_area(settings.refinement_thresholds.area),
                angle: settings.refinement_thresholds.angle,
            };
            refine_mesh(
                mesh,
                thresholds,
                transform.scale_length(settings.concentric_shells_parameter),
                settings.refinement_max_triangles,
            )?;
        }

        if settings.use_alpha_shape_filter {
            alpha_shape_filter(
                mesh,
                transform.scale_length(settings.alpha),
                settings.alpha_shape_settings,
            )?;
        }
        Ok(())
    }

    fn record<R>(&mut self, result: Result<R, EditError>) -> Result<R, TriangulationError> {
        if result.is_err() {
            self.status = Status::Err;
        }
        result.map_err(TriangulationError::from)
    }

    /// Inserts a point into triangle `t` of the output mesh by barycentric
    /// weights. Returns the new point index.
    ///
    /// # Errors
    ///
    /// See [`insert_point_in_triangle`].
    pub fn insert_point_in_triangle(&mut self, t: usize, weights: [f64; 3]) -> Result<usize, TriangulationError> {
        let result = insert_point_in_triangle(&mut self.mesh, t, weights);
        self.record(result)
    }

    /// Splits halfedge `he` of the output mesh at parameter `t`. Returns the
    /// new point index.
    ///
    /// # Errors
    ///
    /// See [`split_halfedge`].
    pub fn split_halfedge(&mut self, he: usize, t: f64) -> Result<usize, TriangulationError> {
        let result = split_halfedge(&mut self.mesh, he, t);
        self.record(result)
    }

    /// Removes interior point `p` from the output mesh.
    ///
    /// # Errors
    ///
    /// See [`remove_point`].
    pub fn remove_point(&mut self, p: usize) -> Result<(), TriangulationError> {
        let result = remove_point(&mut self.mesh, p);
        self.record(result)
    }
}

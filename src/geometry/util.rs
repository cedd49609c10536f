//! Point-set utilities: bounds, centroids and point generation.
//!
//! The generators are used by the test suites and benchmarks to build
//! reproducible inputs.

use rand::{Rng, SeedableRng, distr::uniform::SampleUniform};

use crate::geometry::point::Point;
use crate::geometry::traits::coordinate::CoordinateScalar;

/// Errors that can occur during random point generation.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum RandomPointGenerationError {
    /// The coordinate range is empty.
    #[error("Invalid coordinate range: minimum {min} must be less than maximum {max}")]
    InvalidRange {
        /// The minimum value of the range.
        min: String,
        /// The maximum value of the range.
        max: String,
    },
}

/// Axis-aligned bounds `(min, max)` of `points` in `f64`, or `None` if empty.
#[must_use]
pub fn bounding_box<T: CoordinateScalar>(points: &[Point<T>]) -> Option<([f64; 2], [f64; 2])> {
    let first = points.first()?.to_f64_array();
    Some(points.iter().skip(1).fold((first, first), |(lo, hi), p| {
        let [x, y] = p.to_f64_array();
        ([lo[0].min(x), lo[1].min(y)], [hi[0].max(x), hi[1].max(y)])
    }))
}

/// Arithmetic mean of `points` in `f64`, or `None` if empty.
#[must_use]
pub fn centroid<T: CoordinateScalar>(points: &[Point<T>]) -> Option<[f64; 2]> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let [sx, sy] = points.iter().fold([0.0, 0.0], |[sx, sy], p| {
        let [x, y] = p.to_f64_array();
        [sx + x, sy + y]
    });
    Some([sx / n, sy / n])
}

/// Generate random points with a seeded RNG for reproducible results.
///
/// # Errors
///
/// Returns [`RandomPointGenerationError::InvalidRange`] if `range.0 >= range.1`.
///
/// # Examples
///
/// ```
/// use cdt_mesher::geometry::util::generate_random_points_seeded;
///
/// let a = generate_random_points_seeded::<f64>(100, (-5.0, 5.0), 42).unwrap();
/// let b = generate_random_points_seeded::<f64>(100, (-5.0, 5.0), 42).unwrap();
/// assert_eq!(a, b);
/// assert!(generate_random_points_seeded::<f64>(10, (1.0, 1.0), 42).is_err());
/// ```
pub fn generate_random_points_seeded<T: CoordinateScalar + SampleUniform>(
    n_points: usize,
    range: (T, T),
    seed: u64,
) -> Result<Vec<Point<T>>, RandomPointGenerationError> {
    if range.0 >= range.1 {
        return Err(RandomPointGenerationError::InvalidRange {
            min: format!("{:?}", range.0),
            max: format!("{:?}", range.1),
        });
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    Ok((0..n_points)
        .map(|_| {
            Point::new([
                rng.random_range(range.0..range.1),
                rng.random_range(range.0..range.1),
            ])
        })
        .collect())
}

/// Generate an `nx × ny` grid with the given spacing, starting at `origin`.
///
/// Points are emitted row by row, so the index of `(i, j)` is `j * nx + i`.
#[must_use]
pub fn generate_grid_points<T: CoordinateScalar>(
    nx: usize,
    ny: usize,
    spacing: f64,
    origin: [f64; 2],
) -> Vec<Point<T>> {
    let mut points = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            points.push(Point::from_f64_array([
                (i as f64).mul_add(spacing, origin[0]),
                (j as f64).mul_add(spacing, origin[1]),
            ]));
        }
    }
    points
}

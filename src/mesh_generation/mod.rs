//! Structured triangle meshes of a rectangular domain.
//!
//! These are the starting meshes for tests and benchmarks: a regular grid of
//! `points_x * points_y` vertices with every cell split along the same
//! diagonal, and the hull recorded as constrained segments. Interior vertices
//! can be jittered to break the symmetry of the grid.

use crate::mesh_error::MeshError;
use crate::param::{DomainBounds, MeshParameter};
use crate::topology::connectivity::Connectivity;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Largest jitter, as a fraction of the grid spacing, that keeps every
/// triangle counter-clockwise.
pub const MAX_JITTER: f64 = 0.15;

/// Optional configuration for mesh generation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshGenerationOptions {
    /// Random displacement of interior vertices, as a fraction of the grid
    /// spacing in each direction. Must lie in `[0, MAX_JITTER]`.
    pub jitter: f64,
    pub rng_seed: u64,
}

fn invalid_geometry(message: impl Into<String>) -> MeshError {
    MeshError::InvalidGeometry(message.into())
}

/// Triangulated `points_x` by `points_y` grid covering `bounds`.
///
/// # Example
/// ```rust
/// use mesh_coarsen::mesh_generation::{structured_mesh, MeshGenerationOptions};
/// use mesh_coarsen::param::DomainBounds;
///
/// let bounds = DomainBounds::new(0.0, 1.0, 0.0, 1.0)?;
/// let mesh = structured_mesh(4, 3, bounds, MeshGenerationOptions::default())?;
/// assert_eq!(mesh.n_vertex(), 12);
/// assert_eq!(mesh.n_triangle(), 12);
/// assert_eq!(mesh.segments.len(), 10);
/// # Ok::<(), mesh_coarsen::mesh_error::MeshError>(())
/// ```
pub fn structured_mesh(
    points_x: usize,
    points_y: usize,
    bounds: DomainBounds,
    options: MeshGenerationOptions,
) -> Result<Connectivity, MeshError> {
    if points_x < 2 || points_y < 2 {
        return Err(invalid_geometry(format!(
            "need at least 2 points per direction, got {points_x} x {points_y}"
        )));
    }
    bounds.check_validity()?;
    if !(0.0..=MAX_JITTER).contains(&options.jitter) {
        return Err(invalid_geometry(format!(
            "jitter {} outside [0, {MAX_JITTER}]",
            options.jitter
        )));
    }

    let dx = bounds.width() / (points_x - 1) as f64;
    let dy = bounds.height() / (points_y - 1) as f64;
    let mut rng = SmallRng::seed_from_u64(options.rng_seed);
    let index = |i: usize, j: usize| j * points_x + i;

    let mut coords = Vec::with_capacity(points_x * points_y);
    for j in 0..points_y {
        for i in 0..points_x {
            // Pin the hull to the exact bounds so that it is recognised as
            // domain boundary.
            let x = if i == points_x - 1 {
                bounds.max_x
            } else {
                bounds.min_x + i as f64 * dx
            };
            let y = if j == points_y - 1 {
                bounds.max_y
            } else {
                bounds.min_y + j as f64 * dy
            };
            let interior = i > 0 && j > 0 && i < points_x - 1 && j < points_y - 1;
            if interior && options.jitter > 0.0 {
                let jx = rng.gen_range(-options.jitter..=options.jitter) * dx;
                let jy = rng.gen_range(-options.jitter..=options.jitter) * dy;
                coords.push([x + jx, y + jy]);
            } else {
                coords.push([x, y]);
            }
        }
    }

    let mut triangles = Vec::with_capacity(2 * (points_x - 1) * (points_y - 1));
    for j in 0..points_y - 1 {
        for i in 0..points_x - 1 {
            let (a, b) = (index(i, j), index(i + 1, j));
            let (c, d) = (index(i + 1, j + 1), index(i, j + 1));
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }

    let mut segments = Vec::with_capacity(2 * (points_x + points_y - 2));
    for i in 0..points_x - 1 {
        segments.push([index(i, 0), index(i + 1, 0)]);
        segments.push([index(i + 1, points_y - 1), index(i, points_y - 1)]);
    }
    for j in 0..points_y - 1 {
        segments.push([index(points_x - 1, j), index(points_x - 1, j + 1)]);
        segments.push([index(0, j + 1), index(0, j)]);
    }

    Connectivity::new(coords, triangles, segments)
}

/// Structured mesh at the base resolution described by `param`.
///
/// The number of points along y is chosen so that the spacing matches the
/// x spacing as closely as possible.
pub fn structured_mesh_from_parameter(
    param: &MeshParameter,
    options: MeshGenerationOptions,
) -> Result<Connectivity, MeshError> {
    param.check_validity()?;
    let bounds = param.domain()?;
    let points_x = param.equivalent_points_x as usize;
    let dx = bounds.width() / (points_x - 1) as f64;
    let points_y = ((bounds.height() / dx).round() as usize + 1).max(2);
    structured_mesh(points_x, points_y, bounds, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;
    use crate::geometry::metrics::mesh_area;
    use crate::geometry::predicates::ExactPredicates;
    use crate::topology::validation::{encroached_segments, validate_orientation};

    #[test]
    fn grid_counts_and_area() {
        let bounds = DomainBounds::new(-1.0, 1.0, 0.0, 3.0).unwrap();
        let mesh = structured_mesh(12, 12, bounds, MeshGenerationOptions::default()).unwrap();
        assert_eq!(mesh.n_vertex(), 144);
        assert_eq!(mesh.n_triangle(), 242);
        assert_eq!(mesh.segments.len(), 44);
        assert!((mesh_area(&mesh) - 6.0).abs() < 1e-12);
        mesh.validate_invariants().unwrap();
    }

    #[test]
    fn jittered_grid_is_valid_and_reproducible() {
        let bounds = DomainBounds::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let options = MeshGenerationOptions {
            jitter: MAX_JITTER,
            rng_seed: 7,
        };
        let a = structured_mesh(9, 7, bounds, options).unwrap();
        let b = structured_mesh(9, 7, bounds, options).unwrap();
        assert_eq!(a, b);
        validate_orientation(&a, &ExactPredicates).unwrap();
        assert!(encroached_segments(&a, &ExactPredicates).is_empty());
        assert!((mesh_area(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bad_options_are_rejected() {
        let bounds = DomainBounds::new(0.0, 1.0, 0.0, 1.0).unwrap();
        assert!(structured_mesh(1, 4, bounds, MeshGenerationOptions::default()).is_err());
        let options = MeshGenerationOptions {
            jitter: 0.4,
            rng_seed: 0,
        };
        assert!(structured_mesh(4, 4, bounds, options).is_err());
    }
}

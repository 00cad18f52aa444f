//! Area metrics for 2D triangles and conserved totals over a mesh.
//!
//! Vertex state is integrated with lumped (one third per corner) dual areas,
//! so the conserved total of a state field `s` is `sum_v A_v * s_v` with
//! `A_v = sum_{t ∋ v} area(t) / 3`.

use crate::data::state::StateVector;
use crate::mesh_error::MeshError;
use crate::topology::connectivity::Connectivity;

/// Signed area of `a, b, c`; positive for counter-clockwise order.
#[inline]
pub fn signed_area(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]))
}

#[inline]
pub fn centroid(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> [f64; 2] {
    [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0]
}

/// Signed area of triangle `t`.
pub fn triangle_area(connectivity: &Connectivity, t: usize) -> f64 {
    let [a, b, c] = connectivity.triangle_coordinates(t);
    signed_area(a, b, c)
}

/// Total signed area of the mesh.
pub fn mesh_area(connectivity: &Connectivity) -> f64 {
    (0..connectivity.n_triangle())
        .map(|t| triangle_area(connectivity, t))
        .sum()
}

/// Lumped dual area of every vertex.
pub fn lumped_vertex_areas(connectivity: &Connectivity) -> Vec<f64> {
    let mut areas = vec![0.0; connectivity.n_vertex()];
    for (t, tv) in connectivity.triangle_vertices.iter().enumerate() {
        let third = triangle_area(connectivity, t) / 3.0;
        for &v in tv {
            areas[v] += third;
        }
    }
    areas
}

/// Area-weighted total `sum_v A_v * s_v` of a vertex state field.
///
/// # Errors
/// [`MeshError::StateLengthMismatch`] unless `state` has one entry per vertex.
///
/// # Example
/// ```rust
/// use mesh_coarsen::geometry::metrics::conserved_total;
/// use mesh_coarsen::topology::connectivity::Connectivity;
///
/// let mesh = Connectivity::new(
///     vec![[0.0, 0.0], [2.0, 0.0], [0.0, 1.0]],
///     vec![[0, 1, 2]],
///     vec![],
/// )?;
/// let total = conserved_total(&mesh, &[3.0, 3.0, 3.0])?;
/// assert!((total - 3.0).abs() < 1e-12);
/// # Ok::<(), mesh_coarsen::mesh_error::MeshError>(())
/// ```
pub fn conserved_total<S: StateVector>(
    connectivity: &Connectivity,
    state: &[S],
) -> Result<S, MeshError> {
    if state.len() != connectivity.n_vertex() {
        return Err(MeshError::StateLengthMismatch {
            expected: connectivity.n_vertex(),
            found: state.len(),
        });
    }
    let areas = lumped_vertex_areas(connectivity);
    let mut total = S::zero();
    for (a, s) in areas.iter().zip(state) {
        total.add_scaled(*a, s);
    }
    Ok(total)
}

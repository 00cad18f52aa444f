//! Vertex-to-triangle index.
//!
//! Each vertex gets one incident triangle (the lowest-indexed one) that seeds
//! star walks, plus the largest number of triangles around any vertex, which
//! bounds every walk on an uncorrupted mesh.

use crate::mesh_error::MeshError;
use crate::topology::connectivity::{Connectivity, Star};

/// Seed triangles and star capacity for one snapshot of the mesh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexTriangleIndex {
    /// Lowest-indexed incident triangle of each vertex; `None` for isolated
    /// vertices.
    pub vertex_triangle: Vec<Option<usize>>,
    pub max_tri_per_vert: usize,
}

/// Lowest-indexed triangle incident to every vertex.
pub fn fill_vertex_triangle(connectivity: &Connectivity) -> Vec<Option<usize>> {
    let mut vt = vec![None; connectivity.n_vertex()];
    for (t, tv) in connectivity.triangle_vertices.iter().enumerate() {
        for &v in tv {
            vt[v].get_or_insert(t);
        }
    }
    vt
}

/// Largest number of triangles sharing a vertex.
pub fn max_tri_per_vert(connectivity: &Connectivity) -> usize {
    let mut count = vec![0usize; connectivity.n_vertex()];
    for tv in &connectivity.triangle_vertices {
        for &v in tv {
            count[v] += 1;
        }
    }
    count.into_iter().max().unwrap_or(0)
}

impl VertexTriangleIndex {
    pub fn build(connectivity: &Connectivity) -> Self {
        Self {
            vertex_triangle: fill_vertex_triangle(connectivity),
            max_tri_per_vert: max_tri_per_vert(connectivity),
        }
    }

    /// Star of `vertex`, or `None` if it has no incident triangle.
    pub fn star(&self, connectivity: &Connectivity, vertex: usize) -> Result<Option<Star>, MeshError> {
        self.vertex_triangle[vertex]
            .map(|seed| connectivity.star(vertex, seed, self.max_tri_per_vert))
            .transpose()
    }
}

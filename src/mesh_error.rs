//! MeshError: Unified error type for mesh-coarsen public APIs
//!
//! Local rejections during coarsening (degenerate stars, missing targets,
//! oversized triangles, encroached segments) are *not* errors: they only shrink
//! the set of removed vertices and are reported through
//! [`CoarsenReport`](crate::coarsen::CoarsenReport). The variants below are the
//! conditions that make a pass meaningless, so they abort it.

use thiserror::Error;

/// Unified error type for mesh-coarsen operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    /// A triangle references a vertex that does not exist.
    #[error("triangle {triangle} references vertex {vertex}, but the mesh has {n_vertex} vertices")]
    VertexOutOfRange {
        triangle: usize,
        vertex: usize,
        n_vertex: usize,
    },
    /// A triangle index passed to a traversal does not exist.
    #[error("triangle {triangle} does not exist, the mesh has {n_triangle} triangles")]
    TriangleOutOfRange { triangle: usize, n_triangle: usize },
    /// A triangle lists a neighbour that does not exist.
    #[error("triangle {triangle} lists neighbour {neighbor} across edge {edge}, but the mesh has {n_triangle} triangles")]
    NeighborOutOfRange {
        triangle: usize,
        edge: usize,
        neighbor: usize,
        n_triangle: usize,
    },
    /// Triangle `triangle` points at `neighbor` across `edge`, but `neighbor`
    /// does not point back across the matching edge.
    #[error("asymmetric adjacency: triangle {triangle} edge {edge} -> {neighbor} has no back-reference")]
    AsymmetricAdjacency {
        triangle: usize,
        edge: usize,
        neighbor: usize,
    },
    /// The same directed edge appears in two triangles.
    #[error("edge ({0}, {1}) is used twice with the same orientation (non-manifold or inverted mesh)")]
    NonManifoldEdge(usize, usize),
    /// A boundary segment references a vertex that does not exist.
    #[error("boundary segment {segment} references vertex {vertex}, but the mesh has {n_vertex} vertices")]
    SegmentOutOfRange {
        segment: usize,
        vertex: usize,
        n_vertex: usize,
    },
    /// A traversal expected `vertex` to be a corner of `triangle`.
    #[error("vertex {vertex} is not a corner of triangle {triangle}")]
    VertexNotInTriangle { vertex: usize, triangle: usize },
    /// Walking around `vertex` did not close within the expected number of steps.
    #[error("star walk around vertex {vertex} did not terminate after {steps} steps")]
    CorruptStar { vertex: usize, steps: usize },
    /// The state array does not have one entry per vertex.
    #[error("state vector has {found} entries, expected {expected} (one per vertex)")]
    StateLengthMismatch { expected: usize, found: usize },
    /// The refinement-request array does not have one entry per triangle.
    #[error("refinement requests have {found} entries, expected {expected} (one per triangle)")]
    RequestLengthMismatch { expected: usize, found: usize },
    /// Degenerate, inverted or non-finite geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// A mesh parameter is missing or out of range.
    #[error("invalid mesh parameter: {0}")]
    InvalidParameter(String),
    /// A parameter file could not be read.
    #[error("failed to read mesh parameters from `{path}`: {message}")]
    ParameterIo { path: String, message: String },
}

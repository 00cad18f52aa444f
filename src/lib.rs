#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-coarsen
//!
//! mesh-coarsen removes vertices from adaptive unstructured triangle meshes
//! where an error estimator asks for coarsening. It is the coarsening half of
//! a refine/coarsen adaptivity loop for finite-volume and
//! residual-distribution PDE solvers on 2D Cartesian domains.
//!
//! ## Features
//! - Flat, index-based triangle connectivity with neighbour adjacency and
//!   boundary segments ([`topology::Connectivity`])
//! - Half-edge collapse removal with exact orientation predicates, link and
//!   boundary checks ([`coarsen::target`])
//! - Parallel selection of independent deletion sets by randomized triangle
//!   locking ([`coarsen::deletion_set`]), optionally on Rayon
//! - Segment encroachment guard and optional constrained Delaunay restoration
//! - Conservative redistribution of vertex state, scalar or vector valued
//!   ([`data::StateVector`])
//! - Structured mesh generation and parameter-file loading for tests and
//!   drivers
//!
//! ## Determinism
//!
//! Deletion-set priorities come from a `SmallRng` seeded from
//! [`coarsen::CoarsenOptions::rng_seed`]. Commits run sequentially in
//! ascending vertex order, so a given seed produces the same mesh in serial
//! and parallel execution.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-coarsen = "0.1"
//! # Optional features:
//! # features = ["rayon"]
//! ```

pub mod coarsen;
pub mod data;
pub mod debug_invariants;
pub mod geometry;
pub mod mesh_error;
pub mod mesh_generation;
pub mod param;
pub mod parallel;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::coarsen::{
        Coarsen, CoarsenOptions, CoarsenReport, CycleReport, RefineRequest, ResolutionBound,
        SpatialResolution, UniformResolution,
    };
    pub use crate::data::StateVector;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::{ExactPredicates, FastPredicates, Predicates};
    pub use crate::mesh_error::MeshError;
    pub use crate::mesh_generation::{MeshGenerationOptions, structured_mesh};
    pub use crate::param::{DomainBounds, MeshParameter};
    pub use crate::parallel::ExecutionMode;
    pub use crate::topology::{Connectivity, Star, restore_delaunay};
}

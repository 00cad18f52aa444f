//! Parallel vertex-removal coarsening.
//!
//! One call to [`Coarsen::remove_vertices`] runs up to `max_cycle` outer
//! cycles. Each cycle works on a frozen snapshot of the mesh:
//!
//! 1. build the vertex-triangle index ([`vertex_triangle`]);
//! 2. flag vertices whose whole star wants coarsening ([`candidates`]);
//! 3. find a valid collapse target for each ([`target`]);
//! 4. drop targets that would exceed the resolution bound;
//! 5. pick a maximal set with disjoint footprints ([`deletion_set`]);
//! 6. drop members that would encroach a segment ([`encroach`]);
//!
//! and then commits the set sequentially ([`remove`]), redistributing vertex
//! state conservatively, compacts the arrays and optionally restores the
//! Delaunay property. Steps 2 to 6 run on the engine chosen by
//! [`ExecutionMode`]. The loop stops early once a cycle removes nothing.
//!
//! # Example
//! ```rust
//! use mesh_coarsen::coarsen::{Coarsen, CoarsenOptions, RefineRequest, UniformResolution};
//! use mesh_coarsen::mesh_generation::{structured_mesh, MeshGenerationOptions};
//! use mesh_coarsen::param::DomainBounds;
//!
//! let bounds = DomainBounds::new(0.0, 1.0, 0.0, 1.0)?;
//! let mut mesh = structured_mesh(8, 8, bounds, MeshGenerationOptions::default())?;
//! let mut density = vec![1.0_f64; mesh.n_vertex()];
//! let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
//!
//! let mut engine = Coarsen::new(CoarsenOptions::default());
//! let removed = engine.remove_vertices(
//!     &mut mesh,
//!     &mut density,
//!     &requests,
//!     &UniformResolution(f64::INFINITY),
//!     5,
//! )?;
//! assert!(removed > 0);
//! assert_eq!(density.len(), mesh.n_vertex());
//! # Ok::<(), mesh_coarsen::mesh_error::MeshError>(())
//! ```

pub mod candidates;
pub mod deletion_set;
pub mod encroach;
pub mod remove;
pub mod target;
pub mod vertex_triangle;

pub use candidates::{
    BoundaryInfo, RefineRequest, ResolutionBound, SpatialResolution, UniformResolution,
    flag_vertex_remove, reject_large_triangles,
};
pub use deletion_set::{DeletionSet, find_parallel_deletion_set, footprint};
pub use encroach::check_encroach;
pub use remove::{adjust_state, remove};
pub use target::{Collapse, CollapseContext, CollapseReject, Target, find_allowed_target_triangles};
pub use vertex_triangle::{VertexTriangleIndex, fill_vertex_triangle, max_tri_per_vert};

use crate::data::state::StateVector;
use crate::debug_invariants::DebugInvariants;
use crate::geometry::metrics::{conserved_total, lumped_vertex_areas};
use crate::geometry::predicates::{ExactPredicates, Predicates};
use crate::mesh_error::MeshError;
use crate::parallel::ExecutionMode;
use crate::param::DomainBounds;
use crate::topology::connectivity::{Connectivity, Star, retain_live};
use crate::topology::delaunay::restore_delaunay_with;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

/// Configuration for [`Coarsen`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoarsenOptions {
    /// Allow removing vertices on the fixed boundary (hull, segment
    /// endpoints, domain sides). Only exactly collinear boundary vertices are
    /// ever removed, merging their two boundary edges.
    pub allow_boundary_removal: bool,
    /// Lock rounds per deletion set before giving up on undecided candidates.
    pub max_lock_rounds: usize,
    /// Seed of the priority generator.
    pub rng_seed: u64,
    pub execution: ExecutionMode,
    /// Flip back to a constrained Delaunay mesh after every committed set.
    pub restore_delaunay: bool,
    /// Domain rectangle whose sides are treated as fixed boundary.
    pub domain: Option<DomainBounds>,
}

impl Default for CoarsenOptions {
    fn default() -> Self {
        Self {
            allow_boundary_removal: false,
            max_lock_rounds: 8,
            rng_seed: 42,
            execution: ExecutionMode::Serial,
            restore_delaunay: true,
            domain: None,
        }
    }
}

impl CoarsenOptions {
    pub fn check_validity(&self) -> Result<(), MeshError> {
        if self.max_lock_rounds == 0 {
            return Err(MeshError::InvalidParameter(
                "max_lock_rounds must be at least 1".into(),
            ));
        }
        if let Some(domain) = &self.domain {
            domain.check_validity()?;
        }
        Ok(())
    }
}

/// Counts for one outer cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: usize,
    /// Vertices whose whole star wants coarsening.
    pub flagged: usize,
    /// Flagged vertices with a valid target.
    pub with_target: usize,
    /// Targets dropped by the resolution bound.
    pub too_large: usize,
    /// Size of the independent deletion set.
    pub independent: usize,
    pub lock_rounds: usize,
    /// Set members dropped by the encroachment guard.
    pub encroached: usize,
    /// Collapses refused when re-validated at commit.
    pub commit_rejected: usize,
    pub removed: usize,
    /// Delaunay flips after the commit.
    pub flips: usize,
}

/// Summary of a [`Coarsen::coarsen`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoarsenReport {
    pub cycles: Vec<CycleReport>,
}

impl CoarsenReport {
    /// Vertices removed over all cycles.
    pub fn removed(&self) -> usize {
        self.cycles.iter().map(|c| c.removed).sum()
    }
}

/// Frozen view of the mesh shared by the per-vertex phases of one cycle.
pub struct CycleView<'a, P> {
    pub connectivity: &'a Connectivity,
    pub index: VertexTriangleIndex,
    pub boundary: BoundaryInfo,
    pub predicates: &'a P,
    pub options: &'a CoarsenOptions,
}

impl<'a, P: Predicates> CycleView<'a, P> {
    pub fn new(connectivity: &'a Connectivity, predicates: &'a P, options: &'a CoarsenOptions) -> Self {
        Self {
            connectivity,
            index: VertexTriangleIndex::build(connectivity),
            boundary: BoundaryInfo::new(connectivity, options.domain),
            predicates,
            options,
        }
    }

    pub fn star(&self, vertex: usize) -> Result<Option<Star>, MeshError> {
        self.index.star(self.connectivity, vertex)
    }

    pub fn context(&self) -> CollapseContext<'_, P> {
        CollapseContext {
            connectivity: self.connectivity,
            boundary: &self.boundary,
            predicates: self.predicates,
            capacity: self.index.max_tri_per_vert,
            allow_boundary_removal: self.options.allow_boundary_removal,
        }
    }
}

/// The coarsening engine.
///
/// Holds the options, the predicates and the priority generator, which is
/// seeded once from [`CoarsenOptions::rng_seed`] and advanced by every
/// deletion set, so repeated calls on one engine are reproducible as a
/// sequence.
#[derive(Clone, Debug)]
pub struct Coarsen<P: Predicates = ExactPredicates> {
    options: CoarsenOptions,
    predicates: P,
    rng: SmallRng,
}

impl Coarsen<ExactPredicates> {
    pub fn new(options: CoarsenOptions) -> Self {
        Self::with_predicates(options, ExactPredicates)
    }
}

impl<P: Predicates> Coarsen<P> {
    pub fn with_predicates(options: CoarsenOptions, predicates: P) -> Self {
        if options.execution == ExecutionMode::Parallel && !options.execution.is_parallel() {
            log::warn!("parallel execution requested but the `rayon` feature is disabled; running serially");
        }
        let rng = SmallRng::seed_from_u64(options.rng_seed);
        Self {
            options,
            predicates,
            rng,
        }
    }

    pub fn options(&self) -> &CoarsenOptions {
        &self.options
    }

    /// Removes vertices where every surrounding triangle asks for coarsening
    /// and returns how many were removed.
    ///
    /// `vertex_state` and `triangle_want_refine` must have one entry per
    /// vertex and triangle; the state is compacted along with the mesh.
    ///
    /// # Errors
    /// Length mismatches, invalid options and structural corruption of the
    /// mesh. Corruption is detected before a deletion set is committed, so the
    /// mesh and state are always left consistent.
    pub fn remove_vertices<S, B>(
        &mut self,
        connectivity: &mut Connectivity,
        vertex_state: &mut Vec<S>,
        triangle_want_refine: &[RefineRequest],
        bound: &B,
        max_cycle: usize,
    ) -> Result<usize, MeshError>
    where
        S: StateVector,
        B: ResolutionBound + ?Sized,
    {
        self.coarsen(connectivity, vertex_state, triangle_want_refine, bound, max_cycle)
            .map(|report| report.removed())
    }

    /// Like [`remove_vertices`](Self::remove_vertices) but returns the
    /// per-cycle report.
    pub fn coarsen<S, B>(
        &mut self,
        connectivity: &mut Connectivity,
        vertex_state: &mut Vec<S>,
        triangle_want_refine: &[RefineRequest],
        bound: &B,
        max_cycle: usize,
    ) -> Result<CoarsenReport, MeshError>
    where
        S: StateVector,
        B: ResolutionBound + ?Sized,
    {
        self.options.check_validity()?;
        if vertex_state.len() != connectivity.n_vertex() {
            return Err(MeshError::StateLengthMismatch {
                expected: connectivity.n_vertex(),
                found: vertex_state.len(),
            });
        }
        if triangle_want_refine.len() != connectivity.n_triangle() {
            return Err(MeshError::RequestLengthMismatch {
                expected: connectivity.n_triangle(),
                found: triangle_want_refine.len(),
            });
        }

        let before = log::log_enabled!(log::Level::Debug)
            .then(|| conserved_total(connectivity, vertex_state))
            .transpose()?;

        let mut requests = triangle_want_refine.to_vec();
        let mut report = CoarsenReport::default();
        for cycle in 0..max_cycle {
            let r = self.cycle(cycle, connectivity, vertex_state, &mut requests, bound)?;
            log::debug!(
                "coarsen cycle {cycle}: flagged {} with target {} too large {} independent {} ({} rounds) encroached {} refused {} removed {} flips {}",
                r.flagged,
                r.with_target,
                r.too_large,
                r.independent,
                r.lock_rounds,
                r.encroached,
                r.commit_rejected,
                r.removed,
                r.flips
            );
            let done = r.removed == 0;
            report.cycles.push(r);
            if done {
                break;
            }
        }

        if let Some(before) = before {
            let after = conserved_total(connectivity, vertex_state)?;
            log::debug!(
                "coarsen: removed {} vertices, conserved total {:?} -> {:?}",
                report.removed(),
                before.components(),
                after.components()
            );
        }
        Ok(report)
    }

    fn cycle<S, B>(
        &mut self,
        cycle: usize,
        connectivity: &mut Connectivity,
        state: &mut Vec<S>,
        requests: &mut Vec<RefineRequest>,
        bound: &B,
    ) -> Result<CycleReport, MeshError>
    where
        S: StateVector,
        B: ResolutionBound + ?Sized,
    {
        connectivity.validate_invariants()?;
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        let view = CycleView::new(connectivity, &self.predicates, &self.options);
        let flags = flag_vertex_remove(&view, requests)?;
        report.flagged = flags.iter().filter(|&&f| f).count();
        if report.flagged == 0 {
            return Ok(report);
        }

        let mut targets = find_allowed_target_triangles(&view, &flags)?;
        report.with_target = targets.iter().flatten().count();
        report.too_large = reject_large_triangles(&view, &mut targets, bound)?;

        let candidates: Vec<(usize, Target)> = targets
            .iter()
            .enumerate()
            .filter_map(|(v, t)| t.map(|t| (v, t)))
            .collect();
        if candidates.is_empty() {
            return Ok(report);
        }
        let footprints = self.options.execution.try_map_indices(candidates.len(), |k| {
            let (v, target) = candidates[k];
            let star = view
                .connectivity
                .star(v, target.triangle, view.index.max_tri_per_vert)?;
            Ok(footprint(view.connectivity, &star))
        })?;
        let set = find_parallel_deletion_set(
            self.options.execution,
            view.connectivity.n_triangle(),
            &footprints,
            &mut self.rng,
            self.options.max_lock_rounds,
        );
        report.lock_rounds = set.rounds;
        report.independent = set.accepted.len();
        let set: Vec<usize> = set.accepted.iter().map(|&k| candidates[k].0).collect();

        let clean = check_encroach(&view, &set, &targets)?;
        report.encroached = set.len() - clean.len();
        if clean.is_empty() {
            return Ok(report);
        }
        let mut boundary = view.boundary;

        let mut areas = lumped_vertex_areas(connectivity);
        let outcome = remove(
            connectivity,
            state,
            &mut areas,
            &mut boundary,
            &self.predicates,
            self.options.allow_boundary_removal,
            &clean,
            &targets,
        )?;
        report.removed = outcome.removed.len();
        report.commit_rejected = outcome.rejected;

        connectivity.compact(&outcome.dead_vertices, &outcome.dead_triangles);
        retain_live(state, &outcome.dead_vertices);
        retain_live(requests, &outcome.dead_triangles);

        if self.options.restore_delaunay && report.removed > 0 {
            report.flips = restore_delaunay_with(connectivity, state, &self.predicates, |t, n| {
                let merged = requests[t].max(requests[n]);
                requests[t] = merged;
                requests[n] = merged;
            })?;
        }
        crate::debug_invariants!(connectivity.validate_invariants(), "after coarsening cycle");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(CoarsenOptions: Send, Sync);
    assert_impl_all!(Coarsen: Send, Sync);
    assert_impl_all!(Connectivity: Send, Sync);

    #[test]
    fn default_options_roundtrip_through_json() {
        let options = CoarsenOptions {
            domain: Some(DomainBounds::new(0.0, 2.0, 0.0, 1.0).unwrap()),
            ..CoarsenOptions::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: CoarsenOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
        let partial: CoarsenOptions = serde_json::from_str(r#"{"rng_seed": 7}"#).unwrap();
        assert_eq!(partial.rng_seed, 7);
        assert_eq!(partial.max_lock_rounds, 8);
    }

    #[test]
    fn invalid_options_are_reported() {
        let options = CoarsenOptions {
            max_lock_rounds: 0,
            ..CoarsenOptions::default()
        };
        assert!(matches!(
            options.check_validity(),
            Err(MeshError::InvalidParameter(_))
        ));
    }
}

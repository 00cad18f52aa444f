//! Candidate selection: which vertices may be removed this cycle.
//!
//! A vertex is flagged when every triangle of its star asks for coarsening,
//! its star is not degenerate, and it is not on the fixed boundary (unless
//! boundary removal is enabled). Once targets are known,
//! [`reject_large_triangles`] unflags vertices whose collapse would produce a
//! triangle larger than the local resolution bound.

use crate::coarsen::CycleView;
use crate::coarsen::target::Target;
use crate::geometry::metrics::{centroid, signed_area};
use crate::geometry::predicates::Predicates;
use crate::mesh_error::MeshError;
use crate::param::{DomainBounds, MeshParameter};
use crate::topology::connectivity::{Connectivity, Star, edge_key};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

/// What the error estimator wants done with a triangle.
///
/// Ordered from most to least permissive, so merging two requests is `max`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RefineRequest {
    Coarsen,
    #[default]
    Keep,
    Refine,
}

impl RefineRequest {
    /// Maps an error estimate onto a request: above `max_error` refines,
    /// below `min_error` coarsens.
    pub fn from_error(error: f64, min_error: f64, max_error: f64) -> Self {
        if error > max_error {
            RefineRequest::Refine
        } else if error < min_error {
            RefineRequest::Coarsen
        } else {
            RefineRequest::Keep
        }
    }

    pub fn wants_coarsen(self) -> bool {
        self == RefineRequest::Coarsen
    }
}

impl From<bool> for RefineRequest {
    /// `true` means "wants coarsening".
    fn from(wants_coarsen: bool) -> Self {
        if wants_coarsen {
            RefineRequest::Coarsen
        } else {
            RefineRequest::Keep
        }
    }
}

/// Largest triangle area allowed at a location.
pub trait ResolutionBound: Sync {
    fn max_area(&self, at: [f64; 2]) -> f64;
}

/// The same bound everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformResolution(pub f64);

impl ResolutionBound for UniformResolution {
    fn max_area(&self, _at: [f64; 2]) -> f64 {
        self.0
    }
}

/// A bound given by a function of position.
#[derive(Clone, Copy, Debug)]
pub struct SpatialResolution<F>(pub F);

impl<F> ResolutionBound for SpatialResolution<F>
where
    F: Fn([f64; 2]) -> f64 + Sync,
{
    fn max_area(&self, at: [f64; 2]) -> f64 {
        (self.0)(at)
    }
}

/// Coarsening never goes beyond the base resolution of the mesh.
impl ResolutionBound for MeshParameter {
    fn max_area(&self, _at: [f64; 2]) -> f64 {
        self.base_resolution()
    }
}

/// Constrained edges and fixed-boundary classification.
#[derive(Clone, Debug, Default)]
pub struct BoundaryInfo {
    segments: HashSet<[usize; 2]>,
    segment_neighbors: HashMap<usize, Vec<usize>>,
    domain: Option<DomainBounds>,
}

impl BoundaryInfo {
    pub fn new(connectivity: &Connectivity, domain: Option<DomainBounds>) -> Self {
        let mut segment_neighbors: HashMap<usize, Vec<usize>> = HashMap::new();
        for s in &connectivity.segments {
            segment_neighbors.entry(s[0]).or_default().push(s[1]);
            segment_neighbors.entry(s[1]).or_default().push(s[0]);
        }
        Self {
            segments: connectivity.segment_set(),
            segment_neighbors,
            domain,
        }
    }

    pub fn is_segment(&self, a: usize, b: usize) -> bool {
        self.segments.contains(&edge_key(a, b))
    }

    /// Whether the star centre is on the fixed boundary: open star, segment
    /// endpoint, or on a side of the domain rectangle.
    pub fn is_boundary(&self, connectivity: &Connectivity, star: &Star) -> bool {
        !star.closed
            || self.segment_neighbors.contains_key(&star.vertex)
            || self
                .domain
                .is_some_and(|d| d.on_boundary(connectivity.vertex_coordinates[star.vertex]))
    }

    /// Segment neighbours of the star centre plus, for an open star, the two
    /// hull neighbours. Sorted, without duplicates.
    pub fn boundary_neighbors(&self, star: &Star, link: &[usize]) -> Vec<usize> {
        let mut b = self
            .segment_neighbors
            .get(&star.vertex)
            .cloned()
            .unwrap_or_default();
        if !star.closed {
            b.extend(link.first());
            b.extend(link.last());
        }
        b.sort_unstable();
        b.dedup();
        b
    }

    /// Records that `vertex` collapsed onto `onto`, merging segments
    /// `(vertex, onto)` and `(vertex, other)` into `(onto, other)`.
    pub(crate) fn merge_segment(&mut self, vertex: usize, onto: usize) {
        let Some(neighbors) = self.segment_neighbors.remove(&vertex) else {
            return;
        };
        for u in neighbors {
            self.segments.remove(&edge_key(vertex, u));
            if u == onto {
                continue;
            }
            self.segments.insert(edge_key(onto, u));
            for n in [onto, u] {
                let other = if n == onto { u } else { onto };
                let list = self.segment_neighbors.entry(n).or_default();
                list.retain(|&x| x != vertex);
                if !list.contains(&other) {
                    list.push(other);
                }
            }
        }
        if let Some(list) = self.segment_neighbors.get_mut(&onto) {
            list.retain(|&x| x != vertex);
        }
    }
}

/// Flags the vertices whose whole star wants coarsening.
///
/// # Errors
/// [`MeshError::RequestLengthMismatch`] unless there is one request per
/// triangle; star-walk errors on corrupted adjacency.
pub fn flag_vertex_remove<P: Predicates>(
    view: &CycleView<'_, P>,
    requests: &[RefineRequest],
) -> Result<Vec<bool>, MeshError> {
    let connectivity = view.connectivity;
    if requests.len() != connectivity.n_triangle() {
        return Err(MeshError::RequestLengthMismatch {
            expected: connectivity.n_triangle(),
            found: requests.len(),
        });
    }
    let allow_boundary = view.options.allow_boundary_removal;
    view.options
        .execution
        .try_map_indices(connectivity.n_vertex(), |v| {
            let Some(star) = view.star(v)? else {
                return Ok(false);
            };
            if !star.triangles.iter().all(|&t| requests[t].wants_coarsen()) {
                return Ok(false);
            }
            if star.len() < 3 {
                log::trace!("vertex {v}: degenerate star of {} triangles", star.len());
                return Ok(false);
            }
            Ok(allow_boundary || !view.boundary.is_boundary(connectivity, &star))
        })
}

/// Unflags (clears the target of) every vertex whose collapse would create a
/// triangle larger than `bound` allows at its centroid. Returns the number of
/// vertices rejected.
pub fn reject_large_triangles<P: Predicates, B: ResolutionBound + ?Sized>(
    view: &CycleView<'_, P>,
    targets: &mut [Option<Target>],
    bound: &B,
) -> Result<usize, MeshError> {
    let connectivity = view.connectivity;
    let current: &[Option<Target>] = targets;
    let too_large = view
        .options
        .execution
        .try_map_indices(current.len(), |v| {
            let Some(target) = current[v] else {
                return Ok(false);
            };
            let star = connectivity.star(v, target.triangle, view.index.max_tri_per_vert)?;
            let collapse = view.context().plan(&star, target);
            Ok(collapse.survivors.iter().any(|(_, corners)| {
                let [a, b, c] = corners.map(|p| connectivity.vertex_coordinates[p]);
                signed_area(a, b, c) > bound.max_area(centroid(a, b, c))
            }))
        })?;
    let mut rejected = 0;
    for (v, large) in too_large.into_iter().enumerate() {
        if large {
            log::trace!("vertex {v}: collapse exceeds the resolution bound");
            targets[v] = None;
            rejected += 1;
        }
    }
    Ok(rejected)
}

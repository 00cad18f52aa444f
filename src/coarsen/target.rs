//! Collapse targets.
//!
//! Removing vertex `v` is a half-edge collapse `v -> w` onto a link vertex
//! `w`: the one or two star triangles containing edge `(v, w)` disappear and
//! every other star triangle has `v` replaced by `w`. The *target triangle* is
//! the lowest-indexed star triangle containing `(v, w)`.
//!
//! Targets are tried in ascending triangle index, and within a triangle in
//! ascending vertex index; the first valid collapse wins. Valid means:
//! - every surviving triangle is strictly counter-clockwise (exact test);
//! - no new edge duplicates an existing one (link condition);
//! - on the boundary, `v` has exactly two boundary neighbours, is exactly
//!   collinear with them, and `w` is one of them, so the two boundary edges
//!   at `v` merge into one and no segment is lost or split.

use crate::coarsen::CycleView;
use crate::coarsen::candidates::BoundaryInfo;
use crate::geometry::predicates::Predicates;
use crate::mesh_error::MeshError;
use crate::topology::connectivity::{Connectivity, Star, edge_key, next};

/// Chosen collapse of a flagged vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub triangle: usize,
    pub vertex: usize,
}

/// Why a collapse was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollapseReject {
    /// Fewer than three triangles around the vertex.
    DegenerateStar,
    /// The vertex is on the fixed boundary and boundary removal is off.
    BoundaryForbidden,
    /// Boundary vertex at a corner: not exactly two boundary neighbours, or
    /// not collinear with them.
    BoundaryCorner,
    /// Boundary vertex collapsing onto a vertex off its boundary line.
    OffBoundary,
    /// A surviving triangle would be inverted or degenerate.
    Inverted,
    /// A new edge already exists elsewhere in the mesh.
    DuplicateEdge,
}

/// Triangles touched by a collapse `vertex -> target.vertex`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collapse {
    pub vertex: usize,
    pub target: Target,
    /// Star triangles containing the collapsed edge.
    pub deleted: Vec<usize>,
    /// Remaining star triangles with their corners after the collapse.
    pub survivors: Vec<(usize, [usize; 3])>,
    /// Segment formed by merging the two boundary edges at `vertex`.
    pub merged_segment: Option<[usize; 2]>,
}

/// Read-only view needed to plan and validate collapses.
pub struct CollapseContext<'a, P> {
    pub connectivity: &'a Connectivity,
    pub boundary: &'a BoundaryInfo,
    pub predicates: &'a P,
    /// Upper bound on star sizes, for corruption detection.
    pub capacity: usize,
    pub allow_boundary_removal: bool,
}

impl<P: Predicates> CollapseContext<'_, P> {
    /// Splits the star into deleted and surviving triangles without any
    /// validity check.
    pub fn plan(&self, star: &Star, target: Target) -> Collapse {
        let w = target.vertex;
        let mut deleted = Vec::with_capacity(2);
        let mut survivors = Vec::with_capacity(star.len());
        for (&t, &i) in star.triangles.iter().zip(&star.local) {
            let tv = self.connectivity.triangle_vertices[t];
            if tv.contains(&w) {
                deleted.push(t);
            } else {
                let mut corners = tv;
                corners[i] = w;
                survivors.push((t, corners));
            }
        }
        Collapse {
            vertex: star.vertex,
            target,
            deleted,
            survivors,
            merged_segment: None,
        }
    }

    /// Plans the collapse onto `target` and checks it.
    ///
    /// The outer `Result` reports corruption; the inner one a local
    /// rejection.
    pub fn collapse(
        &self,
        star: &Star,
        link: &[usize],
        target: Target,
        on_boundary: bool,
    ) -> Result<Result<Collapse, CollapseReject>, MeshError> {
        if let Err(reject) = self.precheck(star, on_boundary) {
            return Ok(Err(reject));
        }
        let v = star.vertex;
        let w = target.vertex;
        let x = &self.connectivity.vertex_coordinates;

        let mut merged_segment = None;
        if on_boundary {
            let b = self.boundary.boundary_neighbors(star, link);
            if b.len() != 2 || self.predicates.orient2d(x[b[0]], x[v], x[b[1]]) != 0.0 {
                return Ok(Err(CollapseReject::BoundaryCorner));
            }
            if !b.contains(&w) {
                return Ok(Err(CollapseReject::OffBoundary));
            }
            merged_segment = Some(edge_key(b[0], b[1]));
        }

        let mut collapse = self.plan(star, target);
        collapse.merged_segment = merged_segment;
        let inverted = collapse.survivors.iter().any(|(_, c)| {
            self.predicates.orient2d(x[c[0]], x[c[1]], x[c[2]]) <= 0.0
        });
        if collapse.deleted.is_empty() || inverted {
            return Ok(Err(CollapseReject::Inverted));
        }

        // Link condition: the only vertices adjacent to both `v` and `w` are
        // the opposite corners of the deleted triangles.
        let opposite: Vec<usize> = collapse
            .deleted
            .iter()
            .flat_map(|&d| self.connectivity.triangle_vertices[d])
            .filter(|&p| p != v && p != w)
            .collect();
        let w_star = self
            .connectivity
            .star(w, collapse.deleted[0], self.capacity)?;
        let w_link = w_star.link(self.connectivity);
        let duplicate = link
            .iter()
            .any(|&u| u != w && !opposite.contains(&u) && w_link.contains(&u));
        if duplicate {
            return Ok(Err(CollapseReject::DuplicateEdge));
        }
        Ok(Ok(collapse))
    }

    fn precheck(&self, star: &Star, on_boundary: bool) -> Result<(), CollapseReject> {
        if star.len() < 3 {
            return Err(CollapseReject::DegenerateStar);
        }
        if on_boundary && !self.allow_boundary_removal {
            return Err(CollapseReject::BoundaryForbidden);
        }
        Ok(())
    }

    /// First valid collapse of the star centre, in ascending
    /// (triangle, vertex) order.
    pub fn find_target(
        &self,
        star: &Star,
        on_boundary: bool,
    ) -> Result<Result<Collapse, CollapseReject>, MeshError> {
        if let Err(reject) = self.precheck(star, on_boundary) {
            return Ok(Err(reject));
        }
        let link = star.link(self.connectivity);
        let mut order = star.triangles.clone();
        order.sort_unstable();

        let mut tried = Vec::with_capacity(link.len());
        let mut last = CollapseReject::Inverted;
        for t in order {
            let tv = self.connectivity.triangle_vertices[t];
            let i = self.connectivity.local_index(t, star.vertex)?;
            let (a, b) = (tv[next(i)], tv[(i + 2) % 3]);
            for w in [a.min(b), a.max(b)] {
                if tried.contains(&w) {
                    continue;
                }
                tried.push(w);
                let target = Target { triangle: t, vertex: w };
                match self.collapse(star, &link, target, on_boundary)? {
                    Ok(c) => return Ok(Ok(c)),
                    Err(reject) => last = reject,
                }
            }
        }
        Ok(Err(last))
    }

    /// Whether the triangles left by `collapse` would put a vertex strictly
    /// inside the diametral circle of a segment.
    pub fn encroaches(&self, collapse: &Collapse) -> bool {
        let x = &self.connectivity.vertex_coordinates;
        collapse.survivors.iter().any(|(_, c)| {
            (0..3).any(|i| {
                let (a, b, apex) = (c[i], c[next(i)], c[(i + 2) % 3]);
                let constrained = self.boundary.is_segment(a, b)
                    || collapse.merged_segment == Some(edge_key(a, b));
                constrained && self.predicates.encroaches(x[a], x[b], x[apex])
            })
        })
    }
}

/// Finds a target for every flagged vertex; vertices without a valid target
/// get `None`.
pub fn find_allowed_target_triangles<P: Predicates>(
    view: &CycleView<'_, P>,
    flags: &[bool],
) -> Result<Vec<Option<Target>>, MeshError> {
    let ctx = view.context();
    view.options
        .execution
        .try_map_indices(flags.len(), |v| {
            if !flags[v] {
                return Ok(None);
            }
            let Some(star) = view.star(v)? else {
                return Ok(None);
            };
            let on_boundary = view.boundary.is_boundary(view.connectivity, &star);
            match ctx.find_target(&star, on_boundary)? {
                Ok(collapse) => Ok(Some(collapse.target)),
                Err(reject) => {
                    log::trace!("vertex {v}: no target ({reject:?})");
                    Ok(None)
                }
            }
        })
}

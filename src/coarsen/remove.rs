//! Commit of an independent deletion set.
//!
//! Vertices are removed one at a time in ascending order. Each collapse is
//! re-validated against the current mesh, so a vertex is either removed with
//! its state redistributed or left untouched. Triangles and vertices are only
//! marked dead here; compaction happens once the whole set is committed.

use crate::coarsen::candidates::BoundaryInfo;
use crate::coarsen::target::{Collapse, CollapseContext, Target};
use crate::data::state::StateVector;
use crate::geometry::metrics::{signed_area, triangle_area};
use crate::geometry::predicates::Predicates;
use crate::mesh_error::MeshError;
use crate::topology::connectivity::{Connectivity, Star, next, prev};
use crate::topology::delaunay::replace_neighbor;

/// Lumped-area changes of the vertices around one collapse.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchDelta {
    pub vertex: usize,
    /// `(patch vertex, change of its lumped area)`.
    pub delta: Vec<(usize, f64)>,
}

impl PatchDelta {
    /// Measures the collapse before the topology changes.
    pub fn measure(connectivity: &Connectivity, star: &Star, collapse: &Collapse) -> Self {
        let v = star.vertex;
        let mut delta: Vec<(usize, f64)> = Vec::with_capacity(star.len() + 1);
        let mut add = |p: usize, d: f64| match delta.iter_mut().find(|(q, _)| *q == p) {
            Some((_, acc)) => *acc += d,
            None => delta.push((p, d)),
        };
        for &t in &star.triangles {
            let third = triangle_area(connectivity, t) / 3.0;
            for &p in &connectivity.triangle_vertices[t] {
                if p != v {
                    add(p, -third);
                }
            }
        }
        for (_, corners) in &collapse.survivors {
            let [a, b, c] = corners.map(|p| connectivity.vertex_coordinates[p]);
            let third = signed_area(a, b, c) / 3.0;
            for &p in corners {
                add(p, third);
            }
        }
        Self { vertex: v, delta }
    }
}

/// Hands the integrated state of the removed vertex to its patch.
///
/// With lumped areas `A` and changes `dA` (which sum to the removed vertex's
/// area), each patch vertex becomes `(s_p A_p + s_v dA_p) / (A_p + dA_p)`, so
/// `sum A s` is unchanged and constant states stay constant.
pub fn adjust_state<S: StateVector>(state: &mut [S], areas: &mut [f64], patch: &PatchDelta) {
    let removed = state[patch.vertex];
    for &(p, d) in &patch.delta {
        let a_new = areas[p] + d;
        debug_assert!(a_new > 0.0, "vertex {p} left with area {a_new}");
        let mut s = state[p];
        s.scale(areas[p]);
        s.add_scaled(d, &removed);
        s.scale(1.0 / a_new);
        state[p] = s;
        areas[p] = a_new;
    }
    areas[patch.vertex] = 0.0;
}

/// Rewires adjacency around the deleted triangles and renames the collapsed
/// vertex in the survivors.
fn apply_collapse(
    connectivity: &mut Connectivity,
    collapse: &Collapse,
    dead_triangles: &mut [bool],
) -> Result<(), MeshError> {
    let v = collapse.vertex;
    let w = collapse.target.vertex;
    for &d in &collapse.deleted {
        let i = connectivity.local_index(d, v)?;
        let dv = connectivity.triangle_vertices[d];
        let dn = connectivity.triangle_neighbors[d];
        let outer = dn[next(i)];
        // Survivor across the edge of `d` that contains `v` but not `w`.
        let inner = if dv[next(i)] == w { dn[prev(i)] } else { dn[i] };
        if let Some(s) = inner {
            replace_neighbor(connectivity, s, d, outer);
        }
        if let Some(o) = outer {
            replace_neighbor(connectivity, o, d, inner);
        }
        dead_triangles[d] = true;
    }
    for &(t, corners) in &collapse.survivors {
        connectivity.triangle_vertices[t] = corners;
    }
    if collapse.merged_segment.is_some() {
        for s in connectivity.segments.iter_mut() {
            for p in s.iter_mut() {
                if *p == v {
                    *p = w;
                }
            }
        }
        connectivity.segments.retain(|s| s[0] != s[1]);
    }
    Ok(())
}

/// Outcome of [`remove`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub removed: Vec<usize>,
    /// Vertices whose collapse no longer validated at commit time.
    pub rejected: usize,
    pub dead_vertices: Vec<bool>,
    pub dead_triangles: Vec<bool>,
}

/// Removes every vertex of `set` onto its target and adjusts the state.
///
/// `areas` holds the lumped vertex areas of the current mesh and is kept up
/// to date.
#[allow(clippy::too_many_arguments)]
pub fn remove<S: StateVector, P: Predicates>(
    connectivity: &mut Connectivity,
    state: &mut [S],
    areas: &mut [f64],
    boundary: &mut BoundaryInfo,
    predicates: &P,
    allow_boundary_removal: bool,
    set: &[usize],
    targets: &[Option<Target>],
) -> Result<RemoveOutcome, MeshError> {
    let mut outcome = RemoveOutcome {
        dead_vertices: vec![false; connectivity.n_vertex()],
        dead_triangles: vec![false; connectivity.n_triangle()],
        ..RemoveOutcome::default()
    };
    let mut set = set.to_vec();
    set.sort_unstable();

    for v in set {
        let Some(target) = targets[v] else {
            continue;
        };
        let capacity = connectivity.n_triangle();
        let star = connectivity.star(v, target.triangle, capacity)?;
        let link = star.link(connectivity);
        let on_boundary = boundary.is_boundary(connectivity, &star);
        let ctx = CollapseContext {
            connectivity: &*connectivity,
            boundary: &*boundary,
            predicates,
            capacity,
            allow_boundary_removal,
        };
        let collapse = match ctx.collapse(&star, &link, target, on_boundary)? {
            Ok(c) if !ctx.encroaches(&c) => c,
            verdict => {
                log::trace!("vertex {v}: collapse refused at commit ({verdict:?})");
                outcome.rejected += 1;
                continue;
            }
        };

        let patch = PatchDelta::measure(connectivity, &star, &collapse);
        apply_collapse(connectivity, &collapse, &mut outcome.dead_triangles)?;
        if collapse.merged_segment.is_some() {
            boundary.merge_segment(v, target.vertex);
        }
        adjust_state(state, areas, &patch);
        outcome.dead_vertices[v] = true;
        outcome.removed.push(v);
    }
    Ok(outcome)
}

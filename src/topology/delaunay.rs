//! Constrained Delaunay restoration by Lawson edge flips.
//!
//! Half-edge collapses keep the mesh valid but not Delaunay. After each
//! committed deletion set the engine can sweep the mesh and flip every edge
//! whose opposite vertex lies strictly inside the circumcircle of its
//! triangle. Segments are never flipped, and a flip is skipped when it would
//! leave an encroached segment behind. Vertex state is redistributed on every
//! flip so that the area-weighted total is unchanged.

use crate::data::state::StateVector;
use crate::geometry::metrics::{lumped_vertex_areas, signed_area};
use crate::geometry::predicates::Predicates;
use crate::mesh_error::MeshError;
use crate::topology::connectivity::{Connectivity, edge_key, next, prev};
use hashbrown::HashSet;

/// Replaces the neighbour entry `old` of triangle `t` by `new`.
pub(crate) fn replace_neighbor(
    connectivity: &mut Connectivity,
    t: usize,
    old: usize,
    new: Option<usize>,
) {
    if let Some(slot) = connectivity.triangle_neighbors[t]
        .iter_mut()
        .find(|n| **n == Some(old))
    {
        *slot = new;
    }
}

struct Quad {
    p: usize,
    q: usize,
    r: usize,
    s: usize,
    j: usize,
}

fn creates_encroachment<P: Predicates>(
    connectivity: &Connectivity,
    segments: &HashSet<[usize; 2]>,
    predicates: &P,
    quad: &Quad,
) -> bool {
    let x = &connectivity.vertex_coordinates;
    let Quad { p, q, r, s, .. } = *quad;
    [(p, s, r), (r, p, s), (s, q, r), (q, r, s)]
        .iter()
        .any(|&(a, b, apex)| {
            segments.contains(&edge_key(a, b)) && predicates.encroaches(x[a], x[b], x[apex])
        })
}

/// Flips edges until every unconstrained edge is locally Delaunay.
///
/// Returns the number of flips performed.
///
/// # Errors
/// [`MeshError::StateLengthMismatch`] when `state` does not have one entry
/// per vertex, [`MeshError::AsymmetricAdjacency`] when a neighbour does not
/// share the expected edge.
pub fn restore_delaunay<S: StateVector, P: Predicates>(
    connectivity: &mut Connectivity,
    state: &mut [S],
    predicates: &P,
) -> Result<usize, MeshError> {
    restore_delaunay_with(connectivity, state, predicates, |_, _| {})
}

/// Like [`restore_delaunay`], calling `on_flip(t, n)` after the shared edge
/// of triangles `t` and `n` has been flipped. Both indices stay valid; only
/// their corners change.
pub fn restore_delaunay_with<S, P, F>(
    connectivity: &mut Connectivity,
    state: &mut [S],
    predicates: &P,
    mut on_flip: F,
) -> Result<usize, MeshError>
where
    S: StateVector,
    P: Predicates,
    F: FnMut(usize, usize),
{
    if state.len() != connectivity.n_vertex() {
        return Err(MeshError::StateLengthMismatch {
            expected: connectivity.n_vertex(),
            found: state.len(),
        });
    }
    let segments = connectivity.segment_set();
    let mut areas = lumped_vertex_areas(connectivity);
    let n_triangle = connectivity.n_triangle();
    let max_flips = 16 * n_triangle + 64;

    let mut stack: Vec<usize> = (0..n_triangle).rev().collect();
    let mut queued = vec![true; n_triangle];
    let mut flips = 0;

    while let Some(t) = stack.pop() {
        queued[t] = false;
        for i in 0..3 {
            let Some(n) = connectivity.triangle_neighbors[t][i] else {
                continue;
            };
            let tv = connectivity.triangle_vertices[t];
            let (p, q, r) = (tv[i], tv[next(i)], tv[prev(i)]);
            if segments.contains(&edge_key(p, q)) {
                continue;
            }
            let nv = connectivity.triangle_vertices[n];
            let j = (0..3)
                .find(|&j| nv[j] == q && nv[next(j)] == p)
                .ok_or(MeshError::AsymmetricAdjacency {
                    triangle: t,
                    edge: i,
                    neighbor: n,
                })?;
            let s = nv[prev(j)];
            let x = &connectivity.vertex_coordinates;
            if predicates.incircle(x[p], x[q], x[r], x[s]) <= 0.0 {
                continue;
            }
            if predicates.orient2d(x[p], x[s], x[r]) <= 0.0
                || predicates.orient2d(x[s], x[q], x[r]) <= 0.0
            {
                continue;
            }
            let quad = Quad { p, q, r, s, j };
            if creates_encroachment(connectivity, &segments, predicates, &quad) {
                continue;
            }

            flip(connectivity, state, &mut areas, t, i, n, &quad);
            on_flip(t, n);
            flips += 1;
            for u in [t, n] {
                if !queued[u] {
                    queued[u] = true;
                    stack.push(u);
                }
            }
            if flips >= max_flips {
                log::warn!("restore_delaunay: stopping after {flips} flips");
                return Ok(flips);
            }
            break;
        }
    }
    Ok(flips)
}

/// Flips edge `i` of `t`, shared with `n`, and redistributes the state of the
/// four quad corners.
fn flip<S: StateVector>(
    connectivity: &mut Connectivity,
    state: &mut [S],
    areas: &mut [f64],
    t: usize,
    i: usize,
    n: usize,
    quad: &Quad,
) {
    let Quad { p, q, r, s, j } = *quad;
    let x = &connectivity.vertex_coordinates;
    let old_t = signed_area(x[p], x[q], x[r]);
    let old_n = signed_area(x[q], x[p], x[s]);
    let new_t = signed_area(x[p], x[s], x[r]);
    let new_n = signed_area(x[s], x[q], x[r]);
    let total = old_t + old_n;
    let corners = [p, q, r, s];
    let delta = [
        (new_t - total) / 3.0,
        (new_n - total) / 3.0,
        (total - old_t) / 3.0,
        (total - old_n) / 3.0,
    ];

    let weight: f64 = corners.iter().map(|&v| areas[v]).sum();
    let mut mean = S::zero();
    for &v in &corners {
        mean.add_scaled(areas[v] / weight, &state[v]);
    }
    for (&v, &d) in corners.iter().zip(&delta) {
        let a_new = areas[v] + d;
        let mut s_new = state[v];
        s_new.scale(areas[v]);
        s_new.add_scaled(d, &mean);
        s_new.scale(1.0 / a_new);
        state[v] = s_new;
        areas[v] = a_new;
    }

    let tn = connectivity.triangle_neighbors[t];
    let nn = connectivity.triangle_neighbors[n];
    let (n_qr, n_rp) = (tn[next(i)], tn[prev(i)]);
    let (n_ps, n_sq) = (nn[next(j)], nn[prev(j)]);

    connectivity.triangle_vertices[t] = [p, s, r];
    connectivity.triangle_neighbors[t] = [n_ps, Some(n), n_rp];
    connectivity.triangle_vertices[n] = [s, q, r];
    connectivity.triangle_neighbors[n] = [n_sq, n_qr, Some(t)];

    if let Some(o) = n_ps {
        replace_neighbor(connectivity, o, n, Some(t));
    }
    if let Some(o) = n_qr {
        replace_neighbor(connectivity, o, t, Some(n));
    }
}

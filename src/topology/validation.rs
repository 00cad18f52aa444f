//! Geometric validation of a triangulation.
//!
//! Structural checks (index ranges, symmetric adjacency) live on
//! [`Connectivity`] through
//! [`DebugInvariants`](crate::debug_invariants::DebugInvariants). The helpers
//! here check the geometry: orientation of every triangle and the
//! constrained-triangulation requirement that no segment is encroached.

use crate::geometry::predicates::Predicates;
use crate::mesh_error::MeshError;
use crate::topology::connectivity::{Connectivity, edge_key, next};
use hashbrown::HashMap;

/// Behaviour when a check finds a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViolationHandling {
    /// Skip the check.
    Ignore,
    /// Log a warning per violation.
    Warn,
    /// Return an error on the first violation.
    #[default]
    Error,
}

/// Fails on the first triangle that is not strictly counter-clockwise.
pub fn validate_orientation<P: Predicates>(
    connectivity: &Connectivity,
    predicates: &P,
) -> Result<(), MeshError> {
    for t in 0..connectivity.n_triangle() {
        let [a, b, c] = connectivity.triangle_coordinates(t);
        if predicates.orient2d(a, b, c) <= 0.0 {
            return Err(MeshError::InvalidGeometry(format!(
                "triangle {t} {:?} is not counter-clockwise",
                connectivity.triangle_vertices[t]
            )));
        }
    }
    Ok(())
}

/// Indices of segments whose diametral circle strictly contains the apex of
/// an adjacent triangle, in ascending order.
pub fn encroached_segments<P: Predicates>(
    connectivity: &Connectivity,
    predicates: &P,
) -> Vec<usize> {
    let by_edge: HashMap<[usize; 2], usize> = connectivity
        .segments
        .iter()
        .enumerate()
        .map(|(s, seg)| (edge_key(seg[0], seg[1]), s))
        .collect();
    let mut out = Vec::new();
    for tv in &connectivity.triangle_vertices {
        for i in 0..3 {
            let (a, b, apex) = (tv[i], tv[next(i)], tv[(i + 2) % 3]);
            let Some(&s) = by_edge.get(&edge_key(a, b)) else {
                continue;
            };
            let p = &connectivity.vertex_coordinates;
            if predicates.encroaches(p[a], p[b], p[apex]) {
                out.push(s);
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Runs the orientation check and the encroachment check with the given
/// handling.
pub fn validate_geometry<P: Predicates>(
    connectivity: &Connectivity,
    predicates: &P,
    encroachment: ViolationHandling,
) -> Result<(), MeshError> {
    validate_orientation(connectivity, predicates)?;
    if encroachment == ViolationHandling::Ignore {
        return Ok(());
    }
    let encroached = encroached_segments(connectivity, predicates);
    match (encroachment, encroached.first()) {
        (_, None) => Ok(()),
        (ViolationHandling::Error, Some(&s)) => Err(MeshError::InvalidGeometry(format!(
            "segment {s} {:?} is encroached",
            connectivity.segments[s]
        ))),
        _ => {
            for s in encroached {
                log::warn!("segment {s} {:?} is encroached", connectivity.segments[s]);
            }
            Ok(())
        }
    }
}

//! Encroachment guard.
//!
//! A collapse must not leave a vertex strictly inside the diametral circle of
//! a segment. Vertices of the deletion set failing the test are dropped for
//! this cycle; they become candidates again once their neighbourhood changes.

use crate::coarsen::CycleView;
use crate::coarsen::target::Target;
use crate::geometry::predicates::Predicates;
use crate::mesh_error::MeshError;

/// Keeps the vertices of `set` whose collapse leaves every segment
/// unencroached.
pub fn check_encroach<P: Predicates>(
    view: &CycleView<'_, P>,
    set: &[usize],
    targets: &[Option<Target>],
) -> Result<Vec<usize>, MeshError> {
    let ctx = view.context();
    let clean = view.options.execution.try_map_indices(set.len(), |k| {
        let v = set[k];
        let Some(target) = targets[v] else {
            return Ok(false);
        };
        let star = view
            .connectivity
            .star(v, target.triangle, view.index.max_tri_per_vert)?;
        let on_boundary = view.boundary.is_boundary(view.connectivity, &star);
        let link = star.link(view.connectivity);
        Ok(match ctx.collapse(&star, &link, target, on_boundary)? {
            Ok(collapse) => !ctx.encroaches(&collapse),
            Err(_) => false,
        })
    })?;
    Ok(set
        .iter()
        .zip(clean)
        .filter_map(|(&v, ok)| {
            if !ok {
                log::trace!("vertex {v}: collapse would encroach a segment");
            }
            ok.then_some(v)
        })
        .collect())
}

//! Parallel independent deletion sets.
//!
//! Candidates whose footprints overlap cannot be removed in the same pass.
//! Instead of building the conflict graph, every candidate gets a random
//! priority and competes for its footprint triangles through a per-triangle
//! owner slot updated with an atomic `fetch_max`. A candidate owning its whole
//! footprint once all writes have settled is accepted; candidates touching an
//! accepted footprint drop out; the rest release their slots and retry with
//! the same priority. The highest remaining priority always wins, so every
//! round accepts at least one candidate.

use crate::parallel::ExecutionMode;
use crate::topology::connectivity::{Connectivity, Star};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Triangles touched when removing the star centre: the star itself plus
/// every triangle sharing an edge with it. Sorted, without duplicates.
pub fn footprint(connectivity: &Connectivity, star: &Star) -> Vec<usize> {
    let mut fp = Vec::with_capacity(4 * star.len());
    for &t in &star.triangles {
        fp.push(t);
        fp.extend(connectivity.triangle_neighbors[t].iter().flatten());
    }
    fp.sort_unstable();
    fp.dedup();
    fp
}

/// Result of [`find_parallel_deletion_set`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletionSet {
    /// Accepted candidates (indices into the candidate list), ascending.
    pub accepted: Vec<usize>,
    /// Lock rounds performed.
    pub rounds: usize,
    /// Candidates still competing when the round budget ran out.
    pub unresolved: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Pending,
    Accepted,
    Blocked,
}

/// Unique lock keys: random high half, candidate index plus one in the low
/// half. Zero means "free".
fn priority_keys<R: Rng>(n: usize, rng: &mut R) -> Vec<u64> {
    (0..n)
        .map(|c| (u64::from(rng.r#gen::<u32>()) << 32) | (c as u64 + 1))
        .collect()
}

#[inline]
fn owner(key: u64) -> Option<usize> {
    (key != 0).then(|| (key & 0xFFFF_FFFF) as usize - 1)
}

/// Writes the key of every pending candidate into its footprint slots,
/// keeping the highest key per slot.
pub fn lock_triangles(
    mode: ExecutionMode,
    slots: &[AtomicU64],
    footprints: &[Vec<usize>],
    keys: &[u64],
    pending: &[usize],
) {
    mode.for_each_index(pending.len(), |k| {
        let c = pending[k];
        for &t in &footprints[c] {
            slots[t].fetch_max(keys[c], Ordering::Relaxed);
        }
    });
}

/// Pending candidates that own every slot of their footprint.
pub fn find_independent(
    mode: ExecutionMode,
    slots: &[AtomicU64],
    footprints: &[Vec<usize>],
    keys: &[u64],
    pending: &[usize],
) -> Vec<usize> {
    let owns_all = mode.map_indices(pending.len(), |k| {
        let c = pending[k];
        footprints[c]
            .iter()
            .all(|&t| slots[t].load(Ordering::Relaxed) == keys[c])
    });
    pending
        .iter()
        .zip(owns_all)
        .filter_map(|(&c, owns)| owns.then_some(c))
        .collect()
}

/// Selects a maximal set of candidates with pairwise disjoint footprints.
///
/// `footprints[c]` lists the triangles of candidate `c`; `n_triangle` bounds
/// the triangle indices. At most `max_rounds` lock rounds are run; if
/// candidates are still undecided afterwards the set is valid but may not be
/// maximal.
pub fn find_parallel_deletion_set<R: Rng>(
    mode: ExecutionMode,
    n_triangle: usize,
    footprints: &[Vec<usize>],
    rng: &mut R,
    max_rounds: usize,
) -> DeletionSet {
    let n = footprints.len();
    let keys = priority_keys(n, rng);
    let slots: Vec<AtomicU64> = (0..n_triangle).map(|_| AtomicU64::new(0)).collect();
    let mut status = vec![Status::Pending; n];
    let mut pending: Vec<usize> = (0..n).collect();
    let mut rounds = 0;

    while !pending.is_empty() && rounds < max_rounds {
        rounds += 1;

        // Release slots held by candidates that were not accepted.
        let current = &status;
        mode.for_each_index(pending.len(), |k| {
            for &t in &footprints[pending[k]] {
                let held = slots[t].load(Ordering::Relaxed);
                if owner(held).is_some_and(|o| current[o] != Status::Accepted) {
                    slots[t].store(0, Ordering::Relaxed);
                }
            }
        });

        lock_triangles(mode, &slots, footprints, &keys, &pending);
        let winners = find_independent(mode, &slots, footprints, &keys, &pending);
        if winners.is_empty() {
            break;
        }
        for &c in &winners {
            status[c] = Status::Accepted;
        }

        let current = &status;
        let blocked = mode.map_indices(pending.len(), |k| {
            let c = pending[k];
            current[c] == Status::Pending
                && footprints[c].iter().any(|&t| {
                    owner(slots[t].load(Ordering::Relaxed))
                        .is_some_and(|o| current[o] == Status::Accepted)
                })
        });
        for (k, b) in blocked.into_iter().enumerate() {
            if b {
                status[pending[k]] = Status::Blocked;
            }
        }
        pending.retain(|&c| status[c] == Status::Pending);
    }

    if !pending.is_empty() {
        log::warn!(
            "deletion set: {} candidates unresolved after {rounds} lock rounds",
            pending.len()
        );
    }
    let accepted = (0..n).filter(|&c| status[c] == Status::Accepted).collect();
    DeletionSet {
        accepted,
        rounds,
        unresolved: pending.len(),
    }
}

//! Execution-mode switch for the data-parallel phases of coarsening.
//!
//! Candidate selection, target search, triangle locking and the encroachment
//! guard are all independent per vertex. [`ExecutionMode`] picks the engine
//! that runs them; both engines run the same closures, so there is exactly one
//! code path per phase.

use crate::mesh_error::MeshError;
use serde::{Deserialize, Serialize};

/// Which engine runs the per-vertex phases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Plain iterators on the calling thread.
    #[default]
    Serial,
    /// Rayon work-stealing pool (requires the `rayon` feature; serial otherwise).
    Parallel,
}

impl ExecutionMode {
    /// Whether this mode actually runs on the Rayon pool in this build.
    pub fn is_parallel(self) -> bool {
        cfg!(feature = "rayon") && self == ExecutionMode::Parallel
    }

    /// Evaluates `f(i)` for `i in 0..n` and collects the results in index order.
    pub fn map_indices<T, F>(self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        #[cfg(feature = "rayon")]
        if self == ExecutionMode::Parallel {
            use rayon::prelude::*;
            return (0..n).into_par_iter().map(f).collect();
        }
        (0..n).map(f).collect()
    }

    /// Calls `f(i)` for `i in 0..n`; side effects must go through atomics.
    pub fn for_each_index<F>(self, n: usize, f: F)
    where
        F: Fn(usize) + Send + Sync,
    {
        #[cfg(feature = "rayon")]
        if self == ExecutionMode::Parallel {
            use rayon::prelude::*;
            (0..n).into_par_iter().for_each(f);
            return;
        }
        (0..n).for_each(f);
    }

    /// Fallible variant of [`map_indices`](Self::map_indices); returns the
    /// error of the lowest failing index.
    pub fn try_map_indices<T, F>(self, n: usize, f: F) -> Result<Vec<T>, MeshError>
    where
        T: Send,
        F: Fn(usize) -> Result<T, MeshError> + Send + Sync,
    {
        self.map_indices(n, f).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn both_modes_preserve_index_order() {
        for mode in [ExecutionMode::Serial, ExecutionMode::Parallel] {
            let squares = mode.map_indices(100, |i| i * i);
            assert_eq!(squares.len(), 100);
            assert!(squares.iter().enumerate().all(|(i, &s)| s == i * i));
        }
    }

    #[test]
    fn for_each_visits_every_index_once() {
        for mode in [ExecutionMode::Serial, ExecutionMode::Parallel] {
            let sum = AtomicUsize::new(0);
            mode.for_each_index(10, |i| {
                sum.fetch_add(i, Ordering::Relaxed);
            });
            assert_eq!(sum.into_inner(), 45);
        }
    }

    #[test]
    fn try_map_reports_first_error() {
        let out = ExecutionMode::Serial.try_map_indices(10, |i| {
            if i % 4 == 3 {
                Err(MeshError::CorruptStar { vertex: i, steps: 0 })
            } else {
                Ok(i)
            }
        });
        assert_eq!(out, Err(MeshError::CorruptStar { vertex: 3, steps: 0 }));
    }

    #[test]
    fn json_roundtrip() {
        let s = serde_json::to_string(&ExecutionMode::Parallel).unwrap();
        let m: ExecutionMode = serde_json::from_str(&s).unwrap();
        assert_eq!(m, ExecutionMode::Parallel);
    }
}

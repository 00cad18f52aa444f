//! Geometry for the coarsening engine.
//!
//! [`predicates`] supplies sign-exact orientation, in-circle and
//! encroachment tests; [`metrics`] supplies areas and conserved totals.

pub mod metrics;
pub mod predicates;

pub use predicates::{ExactPredicates, FastPredicates, Predicates};

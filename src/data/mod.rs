//! Data module: physical state carried on mesh vertices
#![warn(missing_docs)]

pub mod state;

pub use state::StateVector;

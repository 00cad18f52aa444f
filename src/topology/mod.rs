//! Triangle mesh topology: the connectivity arena, validation and
//! Delaunay restoration.

pub mod connectivity;
pub mod delaunay;
pub mod validation;

pub use connectivity::{CompactionMap, Connectivity, Star};
pub use delaunay::{restore_delaunay, restore_delaunay_with};
pub use validation::{ViolationHandling, encroached_segments, validate_geometry, validate_orientation};

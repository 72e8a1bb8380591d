pub mod bounds;
pub mod error;
pub mod geometry;
pub mod math;
pub mod spatial_ref;

// Foundation crate: small, well-tested geometry primitives only.
pub use bounds::*;
pub use error::*;
pub use geometry::*;
pub use spatial_ref::*;

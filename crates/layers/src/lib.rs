pub mod composition;
pub mod feature;
pub mod layer;
pub mod mask;

pub use composition::*;
pub use feature::*;
pub use layer::*;
pub use mask::*;

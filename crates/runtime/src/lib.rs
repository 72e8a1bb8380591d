pub mod cancel;
pub mod event_bus;
pub mod viewport;

pub use cancel::*;
pub use event_bus::*;
pub use viewport::*;

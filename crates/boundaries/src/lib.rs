pub mod config;
pub mod controller;
pub mod cyan;
pub mod engine;
pub mod scheduler;
pub mod sync;

pub use config::*;
pub use cyan::*;
pub use engine::*;
pub use scheduler::*;
pub use sync::*;

pub mod cache;
pub mod dataset;
pub mod filter;
pub mod mapper;
pub mod pipeline;
pub mod protocol;
pub mod query;
pub mod record;
pub mod request;
pub mod source;

pub use cache::*;
pub use dataset::*;
pub use filter::*;
pub use mapper::*;
pub use pipeline::*;
pub use query::*;
pub use record::*;
pub use request::*;
pub use source::*;

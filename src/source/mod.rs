pub mod mock;
pub mod registry;
pub mod traits;
pub mod types;

pub use registry::{available_kinds, ResolverFactory, SourceRegistry};
pub use traits::{StreamInlet, StreamResolver};
pub use types::{Pulled, Selector, StreamInfo};

pub mod policy;

pub use policy::{RetryStrategy, MAX_RETRY_DELAY};

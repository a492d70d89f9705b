pub mod artifacts;
pub mod buffers;
pub mod clock;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod record;
pub mod resilience;
pub mod source;

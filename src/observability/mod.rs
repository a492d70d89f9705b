pub mod logging;
pub mod report;
pub mod resources;
pub mod stats;

pub use report::RunReport;
pub use resources::{ResourceMonitor, ResourceProbe, ResourceSample, ResourceUsage, SysinfoProbe};
pub use stats::{InletStats, InletStatsSnapshot};

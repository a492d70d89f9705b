pub mod settings;

pub use settings::{FileSettings, MeasureArgs, MeasureSettings};

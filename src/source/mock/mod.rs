pub mod scripted;
pub mod synthetic;

pub use scripted::{ScriptStep, ScriptedInlet, ScriptedResolver};
pub use synthetic::{SyntheticConfig, SyntheticInlet, SyntheticResolver, SYNTHETIC_KIND};

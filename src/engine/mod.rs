//! Lifecycle engine: phases, completion markers and the sequential runner

pub mod error;
pub mod markers;
pub mod phase;
pub mod runner;

pub use error::{EngineError, PhaseError};
pub use markers::{input_hash, MarkerStore, MARKER_FORMAT_VERSION};
pub use phase::{Phase, PhaseSelection, PhaseStatus};
pub use runner::{LifecycleEngine, PhaseContext, RunReport, TargetReport, TargetStatus};

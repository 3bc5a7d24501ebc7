//! buildforge - meta build orchestrator
//!
//! This crate describes a catalog of software components (toolchains,
//! emulators, libraries, OS images) as declarative target definitions,
//! resolves their dependency graph into a deterministic execution plan, and
//! drives each target through a uniform checkout, configure, compile,
//! install and test lifecycle with persisted completion markers.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod exec;
pub mod registry;
pub mod source;
pub mod target;

pub use config::{ConfigSnapshot, OptionRegistry};
pub use engine::{LifecycleEngine, Phase, PhaseSelection, RunReport};
pub use registry::{ExecutionPlan, TargetClass, TargetRegistry};
pub use target::{Architecture, TargetInstance, TargetSpec};

use thiserror::Error;

use crate::config::ConfigError;
use crate::target::Architecture;

/// Errors raised while registering target classes or resolving a plan.
/// All of these surface before any lifecycle phase runs.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("target '{name}' is already registered")]
    DuplicateTarget { name: String },

    #[error("unknown target '{name}'{}", referenced_by.as_ref().map(|r| format!(" (dependency of '{r}')")).unwrap_or_default())]
    UnknownTarget {
        name: String,
        referenced_by: Option<String>,
    },

    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error(
        "target '{target}' does not support architecture {arch}{}; drop the dependency or request a supported architecture",
        required_by.as_ref().map(|r| format!(" (required by '{r}')")).unwrap_or_default()
    )]
    UnsupportedArchitecture {
        target: String,
        arch: Architecture,
        required_by: Option<String>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ResolveError>;

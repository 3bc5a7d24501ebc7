use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::phase::Phase;
use crate::exec::InvokeError;
use crate::source::SourceError;

/// Failure of one lifecycle phase of one target instance. Always fatal to
/// the owning instance's remaining phases.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("{program} exited with status {status} during {phase} of {target}")]
    ToolFailed {
        target: String,
        phase: Phase,
        program: String,
        status: i32,
    },

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to render {what}: {source}")]
    Template {
        what: &'static str,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PhaseError {
    pub fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        PhaseError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn template(what: &'static str, source: handlebars::RenderError) -> Self {
        PhaseError::Template {
            what,
            source: Box::new(source),
        }
    }
}

/// Run-level failures detected before or outside any phase.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("preflight failed:\n{}", errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Preflight { errors: Vec<ConfigError> },
}

pub type Result<T> = std::result::Result<T, PhaseError>;

use std::path::PathBuf;
use thiserror::Error;

use crate::target::Architecture;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("option '{name}' is already registered")]
    DuplicateOption { name: String },

    #[error("unknown option '{name}' (see --list-options for the full set)")]
    UnknownOption { name: String },

    #[error("option '{name}' expects a {expected} value, got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: String,
    },

    #[error("invalid value '{value}' for option '{name}' (choices: {})", choices.join(", "))]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("cannot parse value '{value}' for option '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("malformed override '{raw}': expected <option>=<value>")]
    MalformedOverride { raw: String },

    #[error("required tool '{tool}' not found in PATH ({hint})")]
    MissingTool { tool: String, hint: String },

    #[error("target '{target}' does not support architecture {arch}")]
    UnsupportedArchitecture {
        target: String,
        arch: Architecture,
    },

    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is not valid JSON: {source}")]
    FileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

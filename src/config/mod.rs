//! Option registry, persisted configuration and the resolved global snapshot

pub mod error;
pub mod file;
pub mod options;
pub mod snapshot;

pub use error::ConfigError;
pub use file::{default_config_path, load_config_file};
pub use options::{
    ComputedFn, OptionContributor, OptionDecl, OptionDefault, OptionHandle, OptionKind,
    OptionRegistry, OptionSource, OptionValue, TargetContext, TargetOptions,
};
pub use snapshot::{register_global_options, ConfigSnapshot, FailureMode};

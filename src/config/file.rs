//! Persisted configuration file
//!
//! A flat JSON object mapping fully-qualified option names to values,
//! read once at startup to seed the option registry's file layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::error::{ConfigError, Result};

/// Default location: `<config dir>/buildforge/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("buildforge").join("config.json"))
}

pub fn load_config_file(path: &Path) -> Result<HashMap<String, serde_json::Value>> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::FileParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_flat_mapping() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"zlib/build-type": "Debug", "jobs": "4", "emulator/gui": true}}"#
        )
        .unwrap();
        let map = load_config_file(file.path()).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["emulator/gui"], serde_json::json!(true));
    }

    #[test]
    fn invalid_json_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::FileParse { .. }));
        assert!(err.to_string().contains("not valid JSON"));
    }
}

//! Persisted completion markers
//!
//! One JSON file per (target instance, phase) under the build root records
//! that the phase succeeded for a specific input hash. A phase with a
//! valid marker whose hash still matches is skipped on re-runs unless the
//! user forces it. Markers are written strictly after success, so an
//! interrupted or failed phase never leaves one behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::engine::phase::Phase;
use crate::target::TargetInstance;

/// Bumped on incompatible layout changes; markers outside the accepted
/// range are treated as absent.
pub const MARKER_FORMAT_VERSION: &str = "1.0.0";
const ACCEPTED_VERSIONS: &str = ">=1.0.0, <2.0.0";

#[derive(Debug, Serialize, Deserialize)]
struct PhaseMarker {
    version: String,
    target: String,
    phase: Phase,
    input_hash: String,
    created_at: DateTime<Utc>,
}

/// Hash of everything that influences an instance's build outputs.
pub fn input_hash(instance: &TargetInstance) -> String {
    let mut hasher = Sha256::new();
    hasher.update(instance.input_fingerprint().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct MarkerStore {
    root: PathBuf,
}

impl MarkerStore {
    pub fn new(build_root: &Path) -> Self {
        Self {
            root: build_root.join(".forge-state"),
        }
    }

    fn marker_path(&self, instance_id: &str, phase: Phase) -> PathBuf {
        self.root
            .join(instance_id.replace('@', "-"))
            .join(format!("{phase}.json"))
    }

    /// Whether `phase` is already satisfied for the given input hash.
    pub fn is_satisfied(&self, instance_id: &str, phase: Phase, current_hash: &str) -> bool {
        let path = self.marker_path(instance_id, phase);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return false,
        };
        let marker: PhaseMarker = match serde_json::from_str(&content) {
            Ok(marker) => marker,
            Err(e) => {
                warn!("ignoring unreadable marker {}: {e}", path.display());
                return false;
            }
        };
        let accepted = VersionReq::parse(ACCEPTED_VERSIONS).expect("static version req");
        match Version::parse(&marker.version) {
            Ok(v) if accepted.matches(&v) => {}
            _ => {
                debug!(
                    "marker {} has incompatible format version {}",
                    path.display(),
                    marker.version
                );
                return false;
            }
        }
        marker.input_hash == current_hash
    }

    /// Record that `phase` succeeded for the given input hash.
    pub fn record(
        &self,
        instance_id: &str,
        phase: Phase,
        current_hash: &str,
    ) -> std::io::Result<()> {
        let path = self.marker_path(instance_id, phase);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let marker = PhaseMarker {
            version: MARKER_FORMAT_VERSION.to_string(),
            target: instance_id.to_string(),
            phase,
            input_hash: current_hash.to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&marker)?;
        std::fs::write(&path, json)
    }

    /// Drop every marker of one instance (used by `--clean`).
    pub fn clear(&self, instance_id: &str) {
        let dir = self.root.join(instance_id.replace('@', "-"));
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!("could not clear markers under {}: {e}", dir.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_marker_is_satisfied() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path());
        assert!(!store.is_satisfied("zlib@riscv64", Phase::Configure, "abc"));
        store.record("zlib@riscv64", Phase::Configure, "abc").unwrap();
        assert!(store.is_satisfied("zlib@riscv64", Phase::Configure, "abc"));
    }

    #[test]
    fn changed_inputs_invalidate_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path());
        store.record("zlib@riscv64", Phase::Compile, "abc").unwrap();
        assert!(!store.is_satisfied("zlib@riscv64", Phase::Compile, "def"));
    }

    #[test]
    fn markers_are_scoped_per_phase() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path());
        store.record("zlib@riscv64", Phase::Configure, "abc").unwrap();
        assert!(!store.is_satisfied("zlib@riscv64", Phase::Compile, "abc"));
    }

    #[test]
    fn clear_removes_all_phases() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path());
        store.record("zlib@riscv64", Phase::Configure, "abc").unwrap();
        store.record("zlib@riscv64", Phase::Compile, "abc").unwrap();
        store.clear("zlib@riscv64");
        assert!(!store.is_satisfied("zlib@riscv64", Phase::Configure, "abc"));
        assert!(!store.is_satisfied("zlib@riscv64", Phase::Compile, "abc"));
    }

    #[test]
    fn incompatible_format_version_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path());
        store.record("zlib@riscv64", Phase::Install, "abc").unwrap();
        let path = store.marker_path("zlib@riscv64", Phase::Install);
        let content = std::fs::read_to_string(&path)
            .unwrap()
            .replace(MARKER_FORMAT_VERSION, "9.0.0");
        std::fs::write(&path, content).unwrap();
        assert!(!store.is_satisfied("zlib@riscv64", Phase::Install, "abc"));
    }
}

//! Resolved global configuration for one run

use std::path::{Path, PathBuf};

use crate::config::error::{ConfigError, Result};
use crate::config::options::{OptionDefault, OptionKind, OptionRegistry, OptionValue};
use crate::target::Architecture;

/// How a phase failure propagates to targets later in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Stop scheduling anything after the first failure (default).
    StopOnFirstError,
    /// Keep going; only dependents of a failed target are skipped.
    BestEffort,
}

/// Immutable snapshot of the global configuration, built once from the
/// option registry after every override source has been seeded.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub output_root: PathBuf,
    pub source_root: PathBuf,
    pub build_root: PathBuf,
    pub sdk_dir: PathBuf,
    rootfs_root: PathBuf,
    pub architecture: Architecture,
    pub jobs: usize,
    pub skip_update: bool,
    pub force: bool,
    pub clean: bool,
    pub run_tests: bool,
    pub failure_mode: FailureMode,
}

impl ConfigSnapshot {
    /// Resolve the global option scope into a snapshot. Derived paths
    /// (sources, build, sdk, rootfs) default to subdirectories of the
    /// output root when not overridden.
    pub fn from_registry(registry: &OptionRegistry, architecture: Architecture) -> Result<Self> {
        let output_root = resolve_path(registry, "output-root")?;
        let output_root = if output_root.as_os_str().is_empty() {
            default_output_root()
        } else {
            output_root
        };
        let derive = |name: &str, fallback: PathBuf| -> Result<PathBuf> {
            let value = resolve_path(registry, name)?;
            Ok(if value.as_os_str().is_empty() {
                fallback
            } else {
                value
            })
        };

        Ok(Self {
            source_root: derive("source-root", output_root.join("sources"))?,
            build_root: derive("build-root", output_root.join("build"))?,
            sdk_dir: derive("sdk-root", output_root.join("sdk"))?,
            rootfs_root: derive("rootfs-root", output_root.clone())?,
            output_root,
            architecture,
            jobs: resolve_jobs(registry)?,
            skip_update: resolve_bool(registry, "skip-update")?,
            force: resolve_bool(registry, "force")?,
            clean: resolve_bool(registry, "clean")?,
            run_tests: resolve_bool(registry, "test")?,
            failure_mode: if resolve_bool(registry, "keep-going")? {
                FailureMode::BestEffort
            } else {
                FailureMode::StopOnFirstError
            },
        })
    }

    /// Shared rootfs-style install tree for one architecture. Accumulates
    /// contributions from many targets and is never truncated by any one
    /// target's install step.
    pub fn rootfs_dir(&self, arch: Architecture) -> PathBuf {
        self.rootfs_root.join(format!("rootfs-{arch}"))
    }

    pub fn sdk_bin_dir(&self) -> PathBuf {
        self.sdk_dir.join("bin")
    }

    /// Sysroot presenting headers and libraries for a compilation target.
    pub fn sysroot_for(&self, arch: Architecture, baremetal: bool) -> PathBuf {
        if baremetal {
            self.sdk_dir.join("baremetal").join(arch.triple(true))
        } else {
            self.sdk_dir.join("sysroot").join(arch.as_str())
        }
    }

    /// Minimal snapshot rooted at an arbitrary directory, for tests.
    pub fn for_testing(root: &Path) -> Self {
        Self {
            output_root: root.to_path_buf(),
            source_root: root.join("sources"),
            build_root: root.join("build"),
            sdk_dir: root.join("sdk"),
            rootfs_root: root.to_path_buf(),
            architecture: Architecture::Native,
            jobs: 1,
            skip_update: false,
            force: false,
            clean: false,
            run_tests: false,
            failure_mode: FailureMode::StopOnFirstError,
        }
    }
}

fn default_output_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("buildforge")
}

fn resolve_path(registry: &OptionRegistry, name: &str) -> Result<PathBuf> {
    match registry.resolve_global(name)?.0 {
        OptionValue::Path(p) => Ok(p),
        other => Err(ConfigError::TypeMismatch {
            name: name.to_string(),
            expected: "path",
            actual: other.kind_str().to_string(),
        }),
    }
}

fn resolve_bool(registry: &OptionRegistry, name: &str) -> Result<bool> {
    match registry.resolve_global(name)?.0 {
        OptionValue::Bool(b) => Ok(b),
        other => Err(ConfigError::TypeMismatch {
            name: name.to_string(),
            expected: "bool",
            actual: other.kind_str().to_string(),
        }),
    }
}

fn resolve_jobs(registry: &OptionRegistry) -> Result<usize> {
    match registry.resolve_global("jobs")?.0 {
        OptionValue::Str(s) => s.parse::<usize>().map_err(|e| ConfigError::InvalidValue {
            name: "jobs".to_string(),
            value: s.clone(),
            reason: e.to_string(),
        }),
        other => Err(ConfigError::TypeMismatch {
            name: "jobs".to_string(),
            expected: "string",
            actual: other.kind_str().to_string(),
        }),
    }
}

/// Declare the global option scope. Runs once, before target option setup.
pub fn register_global_options(registry: &mut OptionRegistry) -> Result<()> {
    let path = |reg: &mut OptionRegistry, name, help| {
        reg.register(
            None,
            name,
            OptionKind::Path,
            OptionDefault::Literal(OptionValue::Path(PathBuf::new())),
            help,
        )
        .map(|_| ())
    };
    path(registry, "output-root", "Root directory for everything buildforge produces (default: ~/buildforge)")?;
    path(registry, "source-root", "Directory holding source checkouts (default: <output-root>/sources)")?;
    path(registry, "build-root", "Directory holding build trees (default: <output-root>/build)")?;
    path(registry, "sdk-root", "SDK install directory (default: <output-root>/sdk)")?;
    path(registry, "rootfs-root", "Parent directory of per-architecture rootfs trees (default: <output-root>)")?;

    registry.register(
        None,
        "jobs",
        OptionKind::Str,
        OptionDefault::Literal(OptionValue::Str(num_cpus::get().to_string())),
        "Job count passed to invoked build tools",
    )?;

    let flag = |reg: &mut OptionRegistry, name, help| {
        reg.register(
            None,
            name,
            OptionKind::Bool,
            OptionDefault::Literal(OptionValue::Bool(false)),
            help,
        )
        .map(|_| ())
    };
    flag(registry, "skip-update", "Do not update existing source checkouts")?;
    flag(registry, "force", "Re-run phases of requested targets even when their completion markers are valid")?;
    flag(registry, "clean", "Delete the build trees of requested targets before building")?;
    flag(registry, "test", "Run each target's test phase after install")?;
    flag(registry, "keep-going", "Continue past failures; only dependents of a failed target are skipped")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_follow_output_root() {
        let mut reg = OptionRegistry::new();
        register_global_options(&mut reg).unwrap();
        reg.set_cli_override("output-root", "/srv/forge").unwrap();
        let snap = ConfigSnapshot::from_registry(&reg, Architecture::Riscv64).unwrap();
        assert_eq!(snap.build_root, PathBuf::from("/srv/forge/build"));
        assert_eq!(snap.sdk_dir, PathBuf::from("/srv/forge/sdk"));
        assert_eq!(
            snap.rootfs_dir(Architecture::Riscv64),
            PathBuf::from("/srv/forge/rootfs-riscv64")
        );
    }

    #[test]
    fn explicit_build_root_wins_over_derivation() {
        let mut reg = OptionRegistry::new();
        register_global_options(&mut reg).unwrap();
        reg.set_cli_override("output-root", "/srv/forge").unwrap();
        reg.set_cli_override("build-root", "/scratch/builds").unwrap();
        let snap = ConfigSnapshot::from_registry(&reg, Architecture::Native).unwrap();
        assert_eq!(snap.build_root, PathBuf::from("/scratch/builds"));
    }

    #[test]
    fn keep_going_selects_best_effort() {
        let mut reg = OptionRegistry::new();
        register_global_options(&mut reg).unwrap();
        reg.set_cli_override("keep-going", "true").unwrap();
        let snap = ConfigSnapshot::from_registry(&reg, Architecture::Native).unwrap();
        assert_eq!(snap.failure_mode, FailureMode::BestEffort);
    }
}

//! Target instances
//!
//! A `TargetInstance` is a target specification bound to a concrete
//! architecture and a resolved configuration: directories, flag lists and
//! per-phase completion state. Instances are constructed once per
//! (target, architecture) pair by the registry and never rebuilt within a
//! run.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::error::Result as ConfigResult;
use crate::config::{ConfigSnapshot, TargetOptions};
use crate::engine::phase::{Phase, PhaseStatus};
use crate::target::arch::Architecture;
use crate::target::buildsystem::{strategy_for, BuildSystem};
use crate::target::cross::CrossPolicy;
use crate::target::hooks::ProjectHooks;
use crate::target::spec::{InstallPolicy, TargetSpec};

/// A system tool a target needs on PATH, with an actionable hint for the
/// preflight error when it is missing.
#[derive(Debug, Clone)]
pub struct RequiredTool {
    pub name: String,
    pub install_hint: String,
}

impl RequiredTool {
    pub fn new(name: impl Into<String>, install_hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            install_hint: install_hint.into(),
        }
    }
}

/// Mutable build configuration assembled during the setup hook, frozen
/// into the instance afterwards. Built fresh per instance; never shared.
#[derive(Debug, Clone, Default)]
pub struct BuildSettings {
    pub configure_args: Vec<String>,
    pub configure_env: Vec<(String, String)>,
    pub make_args: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub asmflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub required_tools: Vec<RequiredTool>,
}

impl BuildSettings {
    pub fn add_configure_arg(&mut self, arg: impl Into<String>) {
        self.configure_args.push(arg.into());
    }

    pub fn add_configure_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.configure_env.push((key.into(), value.into()));
    }

    pub fn require_tool(&mut self, name: impl Into<String>, hint: impl Into<String>) {
        self.required_tools.push(RequiredTool::new(name, hint));
    }
}

#[derive(Debug)]
pub struct TargetInstance {
    pub spec: TargetSpec,
    pub arch: Architecture,
    pub options: TargetOptions,
    pub cross: Option<CrossPolicy>,
    pub settings: BuildSettings,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub install_dir: Option<PathBuf>,
    /// Logical prefix the build system configures for; paths inside the
    /// installed tree are relative to this.
    pub install_prefix: Option<PathBuf>,
    /// Staging root prepended at install time (`DESTDIR` semantics).
    pub destdir: Option<PathBuf>,
    hooks: Arc<dyn ProjectHooks>,
    state: Mutex<Vec<(Phase, PhaseStatus)>>,
}

impl TargetInstance {
    pub fn new(
        spec: TargetSpec,
        arch: Architecture,
        options: TargetOptions,
        config: &ConfigSnapshot,
        hooks: Arc<dyn ProjectHooks>,
    ) -> ConfigResult<Self> {
        let cross = if spec.cross_compiled {
            let baremetal = options.bool_or("baremetal", false);
            let linker = options.str("linker").unwrap_or_else(|_| "lld".to_string());
            Some(CrossPolicy::new(arch, baremetal, linker, config))
        } else {
            None
        };

        let source_dir = config.source_root.join(&spec.name);
        let build_dir = config
            .build_root
            .join(format!("{}-{}-build", spec.name, arch));

        let (install_dir, install_prefix, destdir) =
            resolve_install_dirs(&spec, arch, &options, config, &build_dir);

        let mut instance = Self {
            spec,
            arch,
            options,
            cross,
            settings: BuildSettings::default(),
            source_dir,
            build_dir,
            install_dir,
            install_prefix,
            destdir,
            hooks,
            state: Mutex::new(Vec::new()),
        };

        let mut settings = BuildSettings::default();
        for (tool, hint) in implied_tools(instance.spec.build_system) {
            settings.require_tool(*tool, *hint);
        }
        instance
            .hooks
            .clone()
            .setup(&mut settings, &instance, config)?;
        instance.settings = settings;
        Ok(instance)
    }

    /// Stable identity within a run.
    pub fn id(&self) -> String {
        format!("{}@{}", self.spec.name, self.arch)
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn hooks(&self) -> Arc<dyn ProjectHooks> {
        self.hooks.clone()
    }

    pub fn strategy(&self) -> &'static dyn BuildSystem {
        strategy_for(self.spec.build_system)
    }

    /// Configure arguments: the setup hook's additions followed by the
    /// user's `extra-configure-args`.
    pub fn configure_args(&self) -> Vec<String> {
        let mut args = self.settings.configure_args.clone();
        args.extend(self.options.list_or_empty("extra-configure-args"));
        args
    }

    pub fn build_type(&self) -> String {
        self.options
            .str("build-type")
            .unwrap_or_else(|_| "RelWithDebInfo".to_string())
    }

    /// Composed C compiler flags: architecture flags, optimization level,
    /// debug info, then per-target additions.
    pub fn effective_cflags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(cross) = &self.cross {
            flags.extend(cross.common_flags());
        }
        flags.extend(self.options.list_or_empty("optimization-flags"));
        if self.options.bool_or("debug-info", true) {
            flags.push("-g".to_string());
        }
        flags.extend(self.settings.cflags.iter().cloned());
        flags
    }

    pub fn effective_cxxflags(&self) -> Vec<String> {
        let mut flags = self.effective_cflags();
        flags.extend(self.settings.cxxflags.iter().cloned());
        flags
    }

    pub fn effective_ldflags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(cross) = &self.cross {
            flags.extend(cross.default_ldflags());
        }
        flags.extend(self.settings.ldflags.iter().cloned());
        flags
    }

    /// Canonical description of everything that influences this instance's
    /// build outputs. Hashed into completion markers; any change here
    /// invalidates previously recorded phases.
    pub fn input_fingerprint(&self) -> String {
        let mut parts = vec![
            format!("target={}", self.id()),
            format!("build-system={}", self.spec.build_system),
            format!("build-type={}", self.build_type()),
        ];
        if let Some(repo) = &self.spec.repository {
            parts.push(format!(
                "repo={} branch={} rev={}",
                repo.url,
                repo.default_branch.as_deref().unwrap_or("-"),
                repo.revision.as_deref().unwrap_or("-"),
            ));
        }
        parts.push(format!("configure-args={}", self.settings.configure_args.join(" ")));
        let env: Vec<String> = self
            .settings
            .configure_env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        parts.push(format!("configure-env={}", env.join(" ")));
        parts.push(format!("cflags={}", self.effective_cflags().join(" ")));
        parts.push(format!("ldflags={}", self.effective_ldflags().join(" ")));
        parts.push(format!("make-args={}", self.settings.make_args.join(" ")));
        parts.join("\n")
    }

    pub fn phase_status(&self, phase: Phase) -> PhaseStatus {
        let state = self.state.lock().expect("phase state poisoned");
        state
            .iter()
            .rev()
            .find(|(p, _)| *p == phase)
            .map(|(_, s)| s.clone())
            .unwrap_or(PhaseStatus::Pending)
    }

    pub fn set_phase_status(&self, phase: Phase, status: PhaseStatus) {
        let mut state = self.state.lock().expect("phase state poisoned");
        state.push((phase, status));
    }
}

/// System tools a build-system kind always needs, checked at preflight.
fn implied_tools(kind: crate::target::spec::BuildSystemKind) -> &'static [(&'static str, &'static str)] {
    use crate::target::spec::BuildSystemKind as K;
    match kind {
        K::Make => &[("make", "install make (or build-essential)")],
        K::Cmake => &[
            ("cmake", "install cmake"),
            ("ninja", "install ninja-build"),
        ],
        K::Meson => &[
            ("meson", "install meson"),
            ("ninja", "install ninja-build"),
        ],
        K::Autotools => &[("make", "install make (or build-essential)")],
        K::None => &[],
    }
}

fn resolve_install_dirs(
    spec: &TargetSpec,
    arch: Architecture,
    options: &TargetOptions,
    config: &ConfigSnapshot,
    build_dir: &std::path::Path,
) -> (Option<PathBuf>, Option<PathBuf>, Option<PathBuf>) {
    // An install-directory option, when the class registered one, overrides
    // the policy-derived location.
    let override_dir = options.path("install-directory").ok();

    match &spec.install_policy {
        InstallPolicy::DoNotInstall => (None, None, None),
        InstallPolicy::Explicit(path) => (Some(path.clone()), Some(path.clone()), None),
        InstallPolicy::BuildDir => {
            let dir = build_dir.join("install-root");
            (Some(dir.clone()), Some(dir), None)
        }
        InstallPolicy::Sdk => {
            let dir = override_dir.unwrap_or_else(|| config.sdk_dir.clone());
            (Some(dir.clone()), Some(dir), None)
        }
        InstallPolicy::Rootfs => {
            if arch.is_native() {
                // Host builds of rootfs targets stage into the build tree
                // rather than polluting a rootfs meant for a real image.
                let dir = build_dir.join("test-install-prefix");
                return (Some(dir.clone()), Some(dir), None);
            }
            let rootfs = config.rootfs_dir(arch);
            let dir = override_dir
                .unwrap_or_else(|| rootfs.join("opt").join(spec.name.to_lowercase()));
            match dir.strip_prefix(&rootfs) {
                Ok(rel) => (
                    Some(dir.clone()),
                    Some(PathBuf::from("/").join(rel)),
                    Some(rootfs),
                ),
                // Overridden outside the rootfs: install straight there.
                Err(_) => (Some(dir.clone()), Some(dir), None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::hooks::DefaultHooks;
    use crate::target::spec::{BuildSystemKind, InstallPolicy};
    use std::path::Path;

    fn instance(policy: InstallPolicy, arch: Architecture) -> TargetInstance {
        let spec = TargetSpec::new("demo", BuildSystemKind::Make).with_install_policy(policy);
        let config = ConfigSnapshot::for_testing(Path::new("/forge"));
        TargetInstance::new(
            spec,
            arch,
            TargetOptions::default(),
            &config,
            Arc::new(DefaultHooks),
        )
        .unwrap()
    }

    #[test]
    fn rootfs_install_splits_prefix_and_destdir() {
        let inst = instance(InstallPolicy::Rootfs, Architecture::Riscv64);
        assert_eq!(
            inst.destdir.as_deref(),
            Some(Path::new("/forge/rootfs-riscv64"))
        );
        assert_eq!(inst.install_prefix.as_deref(), Some(Path::new("/opt/demo")));
    }

    #[test]
    fn native_rootfs_build_stages_into_build_dir() {
        let inst = instance(InstallPolicy::Rootfs, Architecture::Native);
        assert!(inst
            .install_dir
            .as_ref()
            .unwrap()
            .ends_with("test-install-prefix"));
        assert!(inst.destdir.is_none());
    }

    #[test]
    fn fingerprint_changes_with_configure_args() {
        let mut a = instance(InstallPolicy::DoNotInstall, Architecture::Native);
        let before = a.input_fingerprint();
        a.settings.add_configure_arg("--enable-widgets");
        assert_ne!(before, a.input_fingerprint());
    }

    #[test]
    fn phase_state_records_latest_status() {
        let inst = instance(InstallPolicy::DoNotInstall, Architecture::Native);
        assert_eq!(inst.phase_status(Phase::Compile), PhaseStatus::Pending);
        inst.set_phase_status(Phase::Compile, PhaseStatus::Completed);
        assert_eq!(inst.phase_status(Phase::Compile), PhaseStatus::Completed);
    }
}

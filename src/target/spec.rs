//! Declarative target specifications
//!
//! A `TargetSpec` describes one buildable unit: where its source lives,
//! where it installs, what it depends on, which architectures it supports
//! and which build system drives it. Behaviour is layered on separately via
//! [`crate::target::hooks::ProjectHooks`] and the build-system strategies.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::Result as ConfigResult;
use crate::config::{
    ConfigSnapshot, OptionDefault, OptionKind, OptionRegistry, OptionValue, TargetContext,
    TargetOptions,
};
use crate::target::arch::Architecture;

/// Source repository descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSpec {
    pub url: String,
    pub default_branch: Option<String>,
    /// Pinned revision; takes precedence over the branch when set.
    pub revision: Option<String>,
    /// Historical remote URLs treated as equivalent to `url`. A local
    /// clone still pointing at one of these is migrated, not rejected.
    pub old_urls: Vec<String>,
    /// Subdirectories checked for local modifications before an update.
    /// Empty means the whole working tree.
    pub watch_paths: Vec<String>,
}

impl RepoSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            default_branch: None,
            revision: None,
            old_urls: Vec::new(),
            watch_paths: Vec::new(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_old_urls(mut self, urls: &[&str]) -> Self {
        self.old_urls = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn with_watch_paths(mut self, paths: &[&str]) -> Self {
        self.watch_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// Where a target installs. A small closed set; anything more exotic is an
/// explicit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallPolicy {
    /// Into the shared SDK tree (toolchains, host tools).
    Sdk,
    /// Into the per-architecture rootfs tree, under `opt/<target>`.
    Rootfs,
    /// Into an `install-root` subdirectory of the build tree.
    BuildDir,
    DoNotInstall,
    Explicit(PathBuf),
}

/// Which external build system drives configure/compile/install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystemKind {
    Make,
    Cmake,
    Meson,
    Autotools,
    None,
}

impl std::fmt::Display for BuildSystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BuildSystemKind::Make => "make",
            BuildSystemKind::Cmake => "cmake",
            BuildSystemKind::Meson => "meson",
            BuildSystemKind::Autotools => "autotools",
            BuildSystemKind::None => "none",
        };
        f.write_str(s)
    }
}

/// Dependency computation for conditional edges (e.g. a baremetal build
/// depending on the freestanding SDK instead of the full one).
pub type DependencyFn = fn(&ConfigSnapshot, &TargetOptions, Architecture) -> Vec<String>;

#[derive(Clone)]
pub enum Dependencies {
    Static(Vec<String>),
    Computed(DependencyFn),
}

impl Dependencies {
    pub fn named(names: &[&str]) -> Self {
        Dependencies::Static(names.iter().map(|n| n.to_string()).collect())
    }

    /// Evaluated lazily, after the owning target's options are resolved.
    pub fn resolve(
        &self,
        config: &ConfigSnapshot,
        options: &TargetOptions,
        arch: Architecture,
    ) -> Vec<String> {
        match self {
            Dependencies::Static(names) => names.clone(),
            Dependencies::Computed(f) => f(config, options, arch),
        }
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependencies::Static(names) => write!(f, "Static({names:?})"),
            Dependencies::Computed(_) => write!(f, "Computed(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub name: String,
    pub repository: Option<RepoSpec>,
    pub install_policy: InstallPolicy,
    pub dependencies: Dependencies,
    /// `None` means every architecture is supported.
    pub supported_architectures: Option<Vec<Architecture>>,
    pub build_system: BuildSystemKind,
    /// Whether the target is compiled with the cross toolchain when the
    /// requested architecture is not native.
    pub cross_compiled: bool,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, build_system: BuildSystemKind) -> Self {
        Self {
            name: name.into(),
            repository: None,
            install_policy: InstallPolicy::DoNotInstall,
            dependencies: Dependencies::Static(Vec::new()),
            supported_architectures: None,
            build_system,
            cross_compiled: false,
        }
    }

    pub fn with_repository(mut self, repo: RepoSpec) -> Self {
        self.repository = Some(repo);
        self
    }

    pub fn with_install_policy(mut self, policy: InstallPolicy) -> Self {
        self.install_policy = policy;
        self
    }

    pub fn with_dependencies(mut self, deps: Dependencies) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_architectures(mut self, archs: &[Architecture]) -> Self {
        self.supported_architectures = Some(archs.to_vec());
        self
    }

    pub fn cross_compiled(mut self) -> Self {
        self.cross_compiled = true;
        self
    }

    pub fn is_supported(&self, arch: Architecture) -> bool {
        match &self.supported_architectures {
            None => true,
            Some(archs) => archs.contains(&arch),
        }
    }
}

/// Rootfs-relative install prefix of a target, derivable without an
/// instance so other targets can reference their dependencies' layout.
pub fn rootfs_install_prefix(arch: Architecture, target: &str) -> PathBuf {
    let _ = arch;
    PathBuf::from("/opt").join(target.to_lowercase())
}

fn rootfs_install_dir_default(config: &ConfigSnapshot, ctx: &TargetContext) -> OptionValue {
    OptionValue::Path(
        config
            .rootfs_dir(ctx.arch)
            .join("opt")
            .join(ctx.name.to_lowercase()),
    )
}

fn sdk_install_dir_default(config: &ConfigSnapshot, _ctx: &TargetContext) -> OptionValue {
    OptionValue::Path(config.sdk_dir.clone())
}

fn baremetal_sysroot_dir_default(config: &ConfigSnapshot, ctx: &TargetContext) -> OptionValue {
    OptionValue::Path(config.sysroot_for(ctx.arch, true))
}

/// Options every buildable target carries.
pub fn base_target_options(reg: &mut OptionRegistry, target: &str) -> ConfigResult<()> {
    reg.register(
        Some(target),
        "build-type",
        OptionKind::Choice(&["Debug", "Release", "RelWithDebInfo", "MinSizeRel"]),
        OptionDefault::Literal(OptionValue::Str("RelWithDebInfo".to_string())),
        "Build type forwarded to the build system",
    )?;
    reg.register(
        Some(target),
        "optimization-flags",
        OptionKind::List,
        OptionDefault::Literal(OptionValue::List(vec!["-O2".to_string()])),
        "Optimization flags added to every compiler invocation",
    )?;
    reg.register(
        Some(target),
        "debug-info",
        OptionKind::Bool,
        OptionDefault::Literal(OptionValue::Bool(true)),
        "Build with debug info",
    )?;
    reg.register(
        Some(target),
        "extra-configure-args",
        OptionKind::List,
        OptionDefault::Literal(OptionValue::List(Vec::new())),
        "Additional arguments appended to the configure step",
    )?;
    Ok(())
}

/// Options for targets built with the cross toolchain.
pub fn cross_target_options(reg: &mut OptionRegistry, target: &str) -> ConfigResult<()> {
    reg.register(
        Some(target),
        "baremetal",
        OptionKind::Bool,
        OptionDefault::Literal(OptionValue::Bool(false)),
        "Build against the freestanding sysroot instead of the full OS sysroot",
    )?;
    reg.register(
        Some(target),
        "linker",
        OptionKind::Choice(&["lld", "bfd"]),
        OptionDefault::Literal(OptionValue::Str("lld".to_string())),
        "Linker used for cross links",
    )?;
    Ok(())
}

/// Install-directory option for rootfs-installed targets.
pub fn rootfs_install_options(reg: &mut OptionRegistry, target: &str) -> ConfigResult<()> {
    reg.register(
        Some(target),
        "install-directory",
        OptionKind::Path,
        OptionDefault::Computed {
            compute: rootfs_install_dir_default,
            as_string: "$ROOTFS/opt/<target>",
        },
        "Where this target installs",
    )?;
    Ok(())
}

/// Install-directory option for SDK-installed targets.
pub fn sdk_install_options(reg: &mut OptionRegistry, target: &str) -> ConfigResult<()> {
    reg.register(
        Some(target),
        "install-directory",
        OptionKind::Path,
        OptionDefault::Computed {
            compute: sdk_install_dir_default,
            as_string: "$SDK",
        },
        "Where this target installs",
    )?;
    Ok(())
}

/// Install-directory option for baremetal sysroot providers.
pub fn baremetal_sysroot_install_options(reg: &mut OptionRegistry, target: &str) -> ConfigResult<()> {
    reg.register(
        Some(target),
        "install-directory",
        OptionKind::Path,
        OptionDefault::Computed {
            compute: baremetal_sysroot_dir_default,
            as_string: "$SDK/baremetal/<triple>",
        },
        "Where this target installs",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults_support_every_architecture() {
        let spec = TargetSpec::new("demo", BuildSystemKind::Make);
        for arch in Architecture::ALL {
            assert!(spec.is_supported(arch));
        }
    }

    #[test]
    fn restricted_spec_rejects_other_architectures() {
        let spec = TargetSpec::new("emulator", BuildSystemKind::Autotools)
            .with_architectures(&[Architecture::Native]);
        assert!(spec.is_supported(Architecture::Native));
        assert!(!spec.is_supported(Architecture::Riscv64));
    }

    #[test]
    fn computed_dependencies_observe_options() {
        fn deps(_c: &ConfigSnapshot, opts: &TargetOptions, _a: Architecture) -> Vec<String> {
            if opts.bool_or("baremetal", false) {
                vec!["freestanding-sdk".to_string()]
            } else {
                vec!["sdk".to_string()]
            }
        }
        let spec = TargetSpec::new("lib", BuildSystemKind::Autotools)
            .with_dependencies(Dependencies::Computed(deps));
        let config = ConfigSnapshot::for_testing(std::path::Path::new("/tmp/x"));
        let resolved =
            spec.dependencies
                .resolve(&config, &TargetOptions::default(), Architecture::Riscv64);
        assert_eq!(resolved, vec!["sdk".to_string()]);
    }
}

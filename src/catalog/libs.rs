//! Cross-compiled libraries and services installed into the rootfs

use async_trait::async_trait;

use crate::config::error::Result as ConfigResult;
use crate::config::{ConfigSnapshot, TargetOptions};
use crate::registry::TargetClass;
use crate::target::{
    base_target_options, cross_target_options, rootfs_install_options, rootfs_install_prefix,
    Architecture, BuildSettings, BuildSystemKind, Dependencies, InstallPolicy, ProjectHooks,
    RepoSpec, TargetInstance, TargetSpec,
};

/// Baremetal builds link against the freestanding sysroot instead of the
/// full one, so the toolchain dependency is conditional on resolved
/// options rather than static.
fn toolchain_dep(
    _config: &ConfigSnapshot,
    options: &TargetOptions,
    _arch: Architecture,
) -> Vec<String> {
    if options.bool_or("baremetal", false) {
        vec!["freestanding-sdk".to_string()]
    } else {
        vec!["sdk".to_string()]
    }
}

fn openssh_deps(
    config: &ConfigSnapshot,
    options: &TargetOptions,
    arch: Architecture,
) -> Vec<String> {
    let mut deps = toolchain_dep(config, options, arch);
    deps.push("zlib".to_string());
    deps
}

pub fn zlib() -> TargetClass {
    TargetClass::new(
        TargetSpec::new("zlib", BuildSystemKind::Autotools)
            .with_repository(RepoSpec::new("https://github.com/madler/zlib.git"))
            .with_install_policy(InstallPolicy::Rootfs)
            .with_dependencies(Dependencies::Computed(toolchain_dep))
            .cross_compiled(),
    )
    .with_contributors(vec![
        base_target_options,
        cross_target_options,
        rootfs_install_options,
    ])
}

#[derive(Debug)]
struct OpensshHooks;

#[async_trait]
impl ProjectHooks for OpensshHooks {
    fn setup(
        &self,
        settings: &mut BuildSettings,
        inst: &TargetInstance,
        config: &ConfigSnapshot,
    ) -> ConfigResult<()> {
        settings.require_tool("autoreconf", "install autoconf");
        // The configure probe for control messages cannot run under cross
        // compilation; the answer is known for every supported libc.
        settings.add_configure_env("ac_cv_have_control_in_msghdr", "yes");

        if !inst.arch.is_native() {
            let rootfs = config.rootfs_dir(inst.arch);
            let zlib_prefix = rootfs_install_prefix(inst.arch, "zlib");
            let zlib_root = rootfs.join(
                zlib_prefix
                    .strip_prefix("/")
                    .unwrap_or(&zlib_prefix),
            );
            settings.add_configure_arg(format!("--with-zlib={}", zlib_root.display()));
            settings
                .ldflags
                .push(format!("-Wl,-rpath,{}/lib", zlib_prefix.display()));
        }
        Ok(())
    }
}

pub fn openssh() -> TargetClass {
    TargetClass::new(
        TargetSpec::new("openssh", BuildSystemKind::Autotools)
            .with_repository(RepoSpec::new(
                "https://github.com/openssh/openssh-portable.git",
            ))
            .with_install_policy(InstallPolicy::Rootfs)
            .with_dependencies(Dependencies::Computed(openssh_deps))
            .cross_compiled(),
    )
    .with_contributors(vec![
        base_target_options,
        cross_target_options,
        rootfs_install_options,
    ])
    .with_hooks(std::sync::Arc::new(OpensshHooks))
}

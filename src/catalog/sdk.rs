//! Toolchain and sysroot providers

use async_trait::async_trait;

use crate::config::error::Result as ConfigResult;
use crate::config::ConfigSnapshot;
use crate::registry::TargetClass;
use crate::target::{
    base_target_options, baremetal_sysroot_install_options, cross_target_options,
    sdk_install_options, Architecture, BuildSettings, BuildSystemKind, Dependencies,
    InstallPolicy, ProjectHooks, RepoSpec, TargetInstance, TargetSpec,
};

/// The host toolchain: compiler, linker and the hosted sysroots. Installs
/// into the SDK tree; every cross target depends on it (directly or via
/// the freestanding variant).
#[derive(Debug)]
struct SdkHooks;

#[async_trait]
impl ProjectHooks for SdkHooks {
    fn setup(
        &self,
        settings: &mut BuildSettings,
        inst: &TargetInstance,
        _config: &ConfigSnapshot,
    ) -> ConfigResult<()> {
        settings.add_configure_arg("-DLLVM_ENABLE_PROJECTS=clang;lld");
        settings.add_configure_arg("-DLLVM_INCLUDE_BENCHMARKS=OFF");
        let backend = match inst.arch {
            Architecture::Native => "X86",
            Architecture::Aarch64 => "X86;AArch64",
            Architecture::Riscv64 => "X86;RISCV",
            Architecture::Mips64 => "X86;Mips",
        };
        settings.add_configure_arg(format!("-DLLVM_TARGETS_TO_BUILD={backend}"));
        Ok(())
    }
}

pub fn sdk() -> TargetClass {
    TargetClass::new(
        TargetSpec::new("sdk", BuildSystemKind::Cmake)
            .with_repository(RepoSpec::new("https://github.com/llvm/llvm-project.git"))
            .with_install_policy(InstallPolicy::Sdk),
    )
    .with_contributors(vec![base_target_options, sdk_install_options])
    .with_hooks(std::sync::Arc::new(SdkHooks))
}

#[derive(Debug)]
struct FreestandingSdkHooks;

#[async_trait]
impl ProjectHooks for FreestandingSdkHooks {
    fn setup(
        &self,
        settings: &mut BuildSettings,
        _inst: &TargetInstance,
        _config: &ConfigSnapshot,
    ) -> ConfigResult<()> {
        settings.add_configure_arg("--disable-multilib");
        settings.add_configure_arg("--enable-newlib-io-long-long");
        Ok(())
    }
}

/// Baremetal sysroot built on top of the SDK toolchain; what baremetal
/// library builds link against instead of the full OS sysroot.
pub fn freestanding_sdk() -> TargetClass {
    TargetClass::new(
        TargetSpec::new("freestanding-sdk", BuildSystemKind::Autotools)
            .with_repository(RepoSpec::new("https://sourceware.org/git/newlib-cygwin.git"))
            .with_install_policy(InstallPolicy::Sdk)
            .with_dependencies(Dependencies::named(&["sdk"]))
            .with_architectures(&[
                Architecture::Aarch64,
                Architecture::Riscv64,
                Architecture::Mips64,
            ])
            .cross_compiled(),
    )
    .with_contributors(vec![
        base_target_options,
        cross_target_options,
        baremetal_sysroot_install_options,
    ])
    .with_hooks(std::sync::Arc::new(FreestandingSdkHooks))
}

//! Full-system emulator (native-only host tool)

use async_trait::async_trait;

use crate::config::error::Result as ConfigResult;
use crate::config::{
    ConfigSnapshot, OptionDefault, OptionKind, OptionRegistry, OptionValue,
};
use crate::engine::phase::Phase;
use crate::engine::runner::PhaseContext;
use crate::exec::Invocation;
use crate::registry::TargetClass;
use crate::target::{
    base_target_options, sdk_install_options, Architecture, BuildSettings, BuildSystemKind,
    InstallPolicy, ProjectHooks, RepoSpec, TargetInstance, TargetSpec,
};

fn emulator_options(reg: &mut OptionRegistry, target: &str) -> ConfigResult<()> {
    reg.register(
        Some(target),
        "targets",
        OptionKind::List,
        OptionDefault::Literal(OptionValue::List(vec![
            "x86_64-softmmu".to_string(),
            "aarch64-softmmu".to_string(),
            "riscv64-softmmu".to_string(),
            "mips64-softmmu".to_string(),
        ])),
        "Emulated machine targets to build",
    )?;
    reg.register(
        Some(target),
        "gui",
        OptionKind::Bool,
        OptionDefault::Literal(OptionValue::Bool(false)),
        "Build the graphical frontends (SDL, GTK)",
    )?;
    reg.register(
        Some(target),
        "smbd-path",
        OptionKind::Path,
        OptionDefault::Literal(OptionValue::Path("/usr/sbin/smbd".into())),
        "smbd binary used for user-mode network shares",
    )?;
    reg.register(
        Some(target),
        "profiler",
        OptionKind::Bool,
        OptionDefault::Literal(OptionValue::Bool(false)),
        "Enable the emulator's internal profiler",
    )?;
    Ok(())
}

#[derive(Debug)]
struct EmulatorHooks;

#[async_trait]
impl ProjectHooks for EmulatorHooks {
    fn setup(
        &self,
        settings: &mut BuildSettings,
        inst: &TargetInstance,
        _config: &ConfigSnapshot,
    ) -> ConfigResult<()> {
        settings.require_tool("autoreconf", "install autoconf");
        settings.require_tool("libtoolize", "install libtool");
        settings.require_tool("pkg-config", "install pkg-config");

        let machine_targets = inst.options.list_or_empty("targets");
        settings.add_configure_arg(format!("--target-list={}", machine_targets.join(",")));
        settings.add_configure_arg("--disable-werror");
        settings.add_configure_arg("--disable-docs");
        // Symbol information stays useful for debugging and profiling.
        settings.add_configure_arg("--disable-strip");
        if !inst.options.bool_or("gui", false) {
            settings.add_configure_arg("--disable-sdl");
            settings.add_configure_arg("--disable-gtk");
            settings.add_configure_arg("--disable-opengl");
        }
        if inst.options.bool_or("profiler", false) {
            settings.add_configure_arg("--enable-profiler");
        }
        if let Ok(smbd) = inst.options.path("smbd-path") {
            settings.add_configure_arg(format!("--smbd={}", smbd.display()));
        }
        Ok(())
    }

    async fn run_tests(
        &self,
        inst: &TargetInstance,
        ctx: &PhaseContext<'_>,
    ) -> crate::engine::error::Result<()> {
        let invocation = Invocation::new("make", &inst.build_dir).arg("check");
        ctx.run_tool(&inst.id(), Phase::Test, invocation).await
    }
}

/// The emulator is a host tool: building it for a cross architecture is a
/// resolution error, not a silent skip.
pub fn emulator() -> TargetClass {
    TargetClass::new(
        TargetSpec::new("emulator", BuildSystemKind::Autotools)
            .with_repository(
                RepoSpec::new("https://github.com/qemu/qemu.git")
                    .with_old_urls(&[
                        "git@github.com:qemu/qemu.git",
                        "https://git.qemu.org/git/qemu.git",
                    ])
                    .with_watch_paths(&["po/"]),
            )
            .with_install_policy(InstallPolicy::Sdk)
            .with_architectures(&[Architecture::Native]),
    )
    .with_contributors(vec![
        base_target_options,
        sdk_install_options,
        emulator_options,
    ])
    .with_hooks(std::sync::Arc::new(EmulatorHooks))
}

//! Build-system strategies
//!
//! One strategy object per build-system kind, polymorphic behind the
//! [`BuildSystem`] trait. A target instance composes exactly one of these
//! with an optional cross-compilation policy; the strategy turns the
//! instance's resolved configuration into concrete tool invocations.

use async_trait::async_trait;
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde_json::json;
use std::path::Path;

use crate::engine::error::{PhaseError, Result};
use crate::engine::phase::Phase;
use crate::engine::runner::PhaseContext;
use crate::exec::Invocation;
use crate::target::arch::Architecture;
use crate::target::instance::TargetInstance;
use crate::target::spec::BuildSystemKind;

#[async_trait]
pub trait BuildSystem: Send + Sync {
    fn kind(&self) -> BuildSystemKind;

    async fn configure(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()>;

    async fn compile(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()>;

    async fn install(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()>;
}

static MAKE: MakeBuild = MakeBuild;
static CMAKE: CmakeBuild = CmakeBuild;
static MESON: MesonBuild = MesonBuild;
static AUTOTOOLS: AutotoolsBuild = AutotoolsBuild;
static NO_BUILD: NoBuild = NoBuild;

pub fn strategy_for(kind: BuildSystemKind) -> &'static dyn BuildSystem {
    match kind {
        BuildSystemKind::Make => &MAKE,
        BuildSystemKind::Cmake => &CMAKE,
        BuildSystemKind::Meson => &MESON,
        BuildSystemKind::Autotools => &AUTOTOOLS,
        BuildSystemKind::None => &NO_BUILD,
    }
}

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hb = Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_template_string("cmake-toolchain", CMAKE_TOOLCHAIN_TEMPLATE)
        .expect("static template");
    hb.register_template_string("meson-cross", MESON_CROSS_TEMPLATE)
        .expect("static template");
    hb
});

const CMAKE_TOOLCHAIN_TEMPLATE: &str = r#"# Generated; do not edit.
set(CMAKE_SYSTEM_NAME {{system_name}})
set(CMAKE_SYSTEM_PROCESSOR {{processor}})
set(CMAKE_C_COMPILER "{{cc}}")
set(CMAKE_CXX_COMPILER "{{cxx}}")
set(CMAKE_C_COMPILER_TARGET {{triple}})
set(CMAKE_CXX_COMPILER_TARGET {{triple}})
{{#if sysroot}}
set(CMAKE_SYSROOT "{{sysroot}}")
set(CMAKE_FIND_ROOT_PATH "{{sysroot}}")
set(CMAKE_FIND_ROOT_PATH_MODE_PROGRAM NEVER)
set(CMAKE_FIND_ROOT_PATH_MODE_LIBRARY ONLY)
set(CMAKE_FIND_ROOT_PATH_MODE_INCLUDE ONLY)
{{/if}}
set(CMAKE_C_FLAGS_INIT "{{c_flags}}")
set(CMAKE_CXX_FLAGS_INIT "{{cxx_flags}}")
set(CMAKE_ASM_FLAGS_INIT "{{asm_flags}}")
set(CMAKE_EXE_LINKER_FLAGS_INIT "{{linker_flags}}")
set(CMAKE_SHARED_LINKER_FLAGS_INIT "{{linker_flags}}")
"#;

const MESON_CROSS_TEMPLATE: &str = r#"# Generated; do not edit.
[binaries]
c = '{{cc}}'
cpp = '{{cxx}}'

[built-in options]
c_args = [{{c_args}}]
cpp_args = [{{cpp_args}}]
c_link_args = [{{link_args}}]
cpp_link_args = [{{link_args}}]

[host_machine]
system = '{{system}}'
cpu_family = '{{cpu_family}}'
cpu = '{{cpu_family}}'
endian = 'little'

{{#if sysroot}}
[properties]
sys_root = '{{sysroot}}'
{{/if}}
"#;

fn cpu_family(arch: Architecture) -> &'static str {
    match arch {
        Architecture::Native => "x86_64",
        Architecture::Aarch64 => "aarch64",
        Architecture::Riscv64 => "riscv64",
        Architecture::Mips64 => "mips64",
    }
}

async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| PhaseError::io(path, e))
}

async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| PhaseError::io(path, e))
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("'{i}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plain-make targets build in their source tree; no configure step.
pub struct MakeBuild;

#[async_trait]
impl BuildSystem for MakeBuild {
    fn kind(&self) -> BuildSystemKind {
        BuildSystemKind::Make
    }

    async fn configure(&self, inst: &TargetInstance, _ctx: &PhaseContext<'_>) -> Result<()> {
        tracing::debug!("{}: make targets have no configure step", inst.id());
        Ok(())
    }

    async fn compile(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        let invocation = Invocation::new("make", &inst.source_dir)
            .arg(format!("-j{}", ctx.jobs()))
            .args(inst.settings.make_args.clone());
        ctx.run_tool(&inst.id(), Phase::Compile, invocation).await
    }

    async fn install(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        let Some(prefix) = &inst.install_prefix else {
            tracing::debug!("{}: nothing to install", inst.id());
            return Ok(());
        };
        let mut invocation = Invocation::new("make", &inst.source_dir)
            .arg("install")
            .arg(format!("PREFIX={}", prefix.display()))
            .args(inst.settings.make_args.clone());
        if let Some(destdir) = &inst.destdir {
            invocation = invocation.arg(format!("DESTDIR={}", destdir.display()));
        }
        ctx.run_tool(&inst.id(), Phase::Install, invocation).await
    }
}

/// CMake targets configure through a generated toolchain file when cross
/// compiling, then drive `cmake --build` / `cmake --install`.
pub struct CmakeBuild;

impl CmakeBuild {
    async fn write_toolchain_file(&self, inst: &TargetInstance) -> Result<Option<std::path::PathBuf>> {
        let Some(cross) = &inst.cross else {
            return Ok(None);
        };
        if !cross.is_cross() {
            return Ok(None);
        }
        let contents = TEMPLATES
            .render(
                "cmake-toolchain",
                &json!({
                    "system_name": if cross.baremetal { "Generic" } else { "Linux" },
                    "processor": cpu_family(cross.arch),
                    "cc": cross.cc().display().to_string(),
                    "cxx": cross.cxx().display().to_string(),
                    "triple": cross.triple,
                    "sysroot": cross.sysroot().map(|s| s.display().to_string()),
                    "c_flags": inst.effective_cflags().join(" "),
                    "cxx_flags": inst.effective_cxxflags().join(" "),
                    "asm_flags": inst.settings.asmflags.join(" "),
                    "linker_flags": inst.effective_ldflags().join(" "),
                }),
            )
            .map_err(|e| PhaseError::template("cmake toolchain file", e))?;
        let path = inst.build_dir.join("toolchain.cmake");
        write_file(&path, &contents).await?;
        Ok(Some(path))
    }
}

#[async_trait]
impl BuildSystem for CmakeBuild {
    fn kind(&self) -> BuildSystemKind {
        BuildSystemKind::Cmake
    }

    async fn configure(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        ensure_dir(&inst.build_dir).await?;
        let toolchain_file = self.write_toolchain_file(inst).await?;

        let mut invocation = Invocation::new("cmake", &inst.build_dir)
            .arg("-G")
            .arg("Ninja")
            .arg("-S")
            .arg(inst.source_dir.display().to_string())
            .arg("-B")
            .arg(inst.build_dir.display().to_string())
            .arg(format!("-DCMAKE_BUILD_TYPE={}", inst.build_type()));
        if let Some(path) = toolchain_file {
            invocation = invocation.arg(format!("-DCMAKE_TOOLCHAIN_FILE={}", path.display()));
        }
        if let Some(prefix) = &inst.install_prefix {
            invocation = invocation.arg(format!("-DCMAKE_INSTALL_PREFIX={}", prefix.display()));
        }
        invocation = invocation.args(inst.configure_args());
        ctx.run_tool(&inst.id(), Phase::Configure, invocation).await
    }

    async fn compile(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        let invocation = Invocation::new("cmake", &inst.build_dir)
            .arg("--build")
            .arg(inst.build_dir.display().to_string())
            .arg("--parallel")
            .arg(ctx.jobs().to_string());
        ctx.run_tool(&inst.id(), Phase::Compile, invocation).await
    }

    async fn install(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        if inst.install_prefix.is_none() {
            tracing::debug!("{}: nothing to install", inst.id());
            return Ok(());
        }
        let mut invocation = Invocation::new("cmake", &inst.build_dir)
            .arg("--install")
            .arg(inst.build_dir.display().to_string());
        if let Some(destdir) = &inst.destdir {
            invocation = invocation.env("DESTDIR", destdir.display().to_string());
        }
        ctx.run_tool(&inst.id(), Phase::Install, invocation).await
    }
}

/// Meson targets get a generated cross file instead of a toolchain file.
pub struct MesonBuild;

impl MesonBuild {
    fn buildtype(inst: &TargetInstance) -> &'static str {
        match inst.build_type().as_str() {
            "Debug" => "debug",
            "Release" => "release",
            "MinSizeRel" => "minsize",
            _ => "debugoptimized",
        }
    }

    async fn write_cross_file(&self, inst: &TargetInstance) -> Result<Option<std::path::PathBuf>> {
        let Some(cross) = &inst.cross else {
            return Ok(None);
        };
        if !cross.is_cross() {
            return Ok(None);
        }
        let contents = TEMPLATES
            .render(
                "meson-cross",
                &json!({
                    "cc": cross.cc().display().to_string(),
                    "cxx": cross.cxx().display().to_string(),
                    "c_args": quote_list(&inst.effective_cflags()),
                    "cpp_args": quote_list(&inst.effective_cxxflags()),
                    "link_args": quote_list(&inst.effective_ldflags()),
                    "system": if cross.baremetal { "bare metal" } else { "linux" },
                    "cpu_family": cpu_family(cross.arch),
                    "sysroot": cross.sysroot().map(|s| s.display().to_string()),
                }),
            )
            .map_err(|e| PhaseError::template("meson cross file", e))?;
        let path = inst.build_dir.join("cross-file.ini");
        write_file(&path, &contents).await?;
        Ok(Some(path))
    }
}

#[async_trait]
impl BuildSystem for MesonBuild {
    fn kind(&self) -> BuildSystemKind {
        BuildSystemKind::Meson
    }

    async fn configure(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        ensure_dir(&inst.build_dir).await?;
        let cross_file = self.write_cross_file(inst).await?;

        let mut invocation = Invocation::new("meson", &inst.build_dir)
            .arg("setup")
            .arg(inst.build_dir.display().to_string())
            .arg(inst.source_dir.display().to_string())
            .arg(format!("--buildtype={}", Self::buildtype(inst)));
        if let Some(prefix) = &inst.install_prefix {
            invocation = invocation.arg(format!("--prefix={}", prefix.display()));
        }
        if let Some(path) = cross_file {
            invocation = invocation.arg(format!("--cross-file={}", path.display()));
        }
        invocation = invocation.args(inst.configure_args());
        ctx.run_tool(&inst.id(), Phase::Configure, invocation).await
    }

    async fn compile(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        let invocation = Invocation::new("meson", &inst.build_dir)
            .arg("compile")
            .arg("-C")
            .arg(inst.build_dir.display().to_string())
            .arg(format!("-j{}", ctx.jobs()));
        ctx.run_tool(&inst.id(), Phase::Compile, invocation).await
    }

    async fn install(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        if inst.install_prefix.is_none() {
            tracing::debug!("{}: nothing to install", inst.id());
            return Ok(());
        }
        let mut invocation = Invocation::new("meson", &inst.build_dir)
            .arg("install")
            .arg("-C")
            .arg(inst.build_dir.display().to_string());
        if let Some(destdir) = &inst.destdir {
            invocation = invocation.arg(format!("--destdir={}", destdir.display()));
        }
        ctx.run_tool(&inst.id(), Phase::Install, invocation).await
    }
}

/// Autotools targets assemble CC/CXX/LDFLAGS from the composed flag lists
/// and pass host/target/build triples when cross compiling. The configure
/// script overrides CFLAGS internally, so flags ride on the compiler
/// variables instead.
pub struct AutotoolsBuild;

impl AutotoolsBuild {
    fn prog_with_args(path: &Path, flags: &[String]) -> String {
        let mut parts = vec![path.display().to_string()];
        parts.extend(flags.iter().cloned());
        parts.join(" ")
    }
}

#[async_trait]
impl BuildSystem for AutotoolsBuild {
    fn kind(&self) -> BuildSystemKind {
        BuildSystemKind::Autotools
    }

    async fn configure(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        ensure_dir(&inst.build_dir).await?;
        let configure_script = inst.source_dir.join("configure");
        let mut invocation = Invocation::new(configure_script, &inst.build_dir);
        if let Some(prefix) = &inst.install_prefix {
            invocation = invocation.arg(format!("--prefix={}", prefix.display()));
        }
        if let Some(cross) = inst.cross.as_ref().filter(|c| c.is_cross()) {
            let host_triple = Architecture::Native.triple(false);
            invocation = invocation
                .arg(format!("--host={}", cross.triple))
                .arg(format!("--target={}", cross.triple))
                .arg(format!("--build={host_triple}"))
                .env(
                    "CC",
                    Self::prog_with_args(&cross.cc(), &inst.effective_cflags()),
                )
                .env(
                    "CXX",
                    Self::prog_with_args(&cross.cxx(), &inst.effective_cxxflags()),
                );
            if let Some(pkg_dirs) = cross.pkg_config_dirs() {
                invocation = invocation.env("PKG_CONFIG_LIBDIR", pkg_dirs);
            }
            if let Some(sysroot) = cross.sysroot() {
                invocation = invocation.env("PKG_CONFIG_SYSROOT_DIR", sysroot.display().to_string());
            }
        }
        let ldflags = inst.effective_ldflags();
        if !ldflags.is_empty() {
            invocation = invocation.env("LDFLAGS", ldflags.join(" "));
        }
        for (key, value) in &inst.settings.configure_env {
            invocation = invocation.env(key.clone(), value.clone());
        }
        invocation = invocation.args(inst.configure_args());
        ctx.run_tool(&inst.id(), Phase::Configure, invocation).await
    }

    async fn compile(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        let invocation = Invocation::new("make", &inst.build_dir)
            .arg(format!("-j{}", ctx.jobs()))
            .args(inst.settings.make_args.clone());
        ctx.run_tool(&inst.id(), Phase::Compile, invocation).await
    }

    async fn install(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        if inst.install_prefix.is_none() {
            tracing::debug!("{}: nothing to install", inst.id());
            return Ok(());
        }
        let mut invocation = Invocation::new("make", &inst.build_dir)
            .arg("install")
            .args(inst.settings.make_args.clone());
        if let Some(destdir) = &inst.destdir {
            invocation = invocation.arg(format!("DESTDIR={}", destdir.display()));
        }
        ctx.run_tool(&inst.id(), Phase::Install, invocation).await
    }
}

/// Metadata-only targets: every build-system phase is a no-op; such
/// targets do their work in overridden hooks.
pub struct NoBuild;

#[async_trait]
impl BuildSystem for NoBuild {
    fn kind(&self) -> BuildSystemKind {
        BuildSystemKind::None
    }

    async fn configure(&self, inst: &TargetInstance, _ctx: &PhaseContext<'_>) -> Result<()> {
        tracing::debug!("{}: no build system", inst.id());
        Ok(())
    }

    async fn compile(&self, inst: &TargetInstance, _ctx: &PhaseContext<'_>) -> Result<()> {
        tracing::debug!("{}: nothing to compile", inst.id());
        Ok(())
    }

    async fn install(&self, inst: &TargetInstance, _ctx: &PhaseContext<'_>) -> Result<()> {
        tracing::debug!("{}: nothing to install", inst.id());
        Ok(())
    }
}

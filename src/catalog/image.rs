//! Disk-image assembly target
//!
//! Builds nothing itself: its install step appends image metadata to the
//! shared rootfs manifest. The manifest is only ever appended to, since
//! earlier targets' rootfs contributions must survive.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::error::Result as ConfigResult;
use crate::config::{
    ConfigSnapshot, OptionDefault, OptionKind, OptionRegistry, OptionValue, TargetContext,
};
use crate::engine::error::{PhaseError, Result};
use crate::engine::runner::PhaseContext;
use crate::registry::TargetClass;
use crate::target::{
    base_target_options, rootfs_install_prefix, Architecture, BuildSystemKind, Dependencies,
    ProjectHooks, TargetInstance, TargetSpec,
};

fn image_path_default(config: &ConfigSnapshot, ctx: &TargetContext) -> OptionValue {
    OptionValue::Path(config.output_root.join(format!("disk-image-{}.img", ctx.arch)))
}

fn image_options(reg: &mut OptionRegistry, target: &str) -> ConfigResult<()> {
    reg.register(
        Some(target),
        "image-path",
        OptionKind::Path,
        OptionDefault::Computed {
            compute: image_path_default,
            as_string: "$OUTPUT_ROOT/disk-image-<architecture>.img",
        },
        "Where the assembled disk image is written",
    )?;
    Ok(())
}

const MANIFEST_ENTRIES: &[&str] = &["zlib", "openssh"];

#[derive(Debug)]
struct DiskImageHooks;

#[async_trait]
impl ProjectHooks for DiskImageHooks {
    async fn compile(&self, inst: &TargetInstance, _ctx: &PhaseContext<'_>) -> Result<()> {
        info!("{}: nothing to build", inst.id());
        Ok(())
    }

    async fn install(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        let rootfs = ctx.config.rootfs_dir(inst.arch);
        let manifest = rootfs.join("MANIFEST");
        tokio::fs::create_dir_all(&rootfs)
            .await
            .map_err(|e| PhaseError::io(&rootfs, e))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&manifest)
            .await
            .map_err(|e| PhaseError::io(&manifest, e))?;
        for entry in MANIFEST_ENTRIES {
            let prefix = rootfs_install_prefix(inst.arch, entry);
            let line = format!(
                ".{} type=dir uname=root gname=wheel mode=0755\n",
                prefix.display()
            );
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| PhaseError::io(&manifest, e))?;
        }
        file.flush().await.map_err(|e| PhaseError::io(&manifest, e))?;

        let image = inst
            .options
            .path("image-path")
            .unwrap_or_else(|_| ctx.config.output_root.join("disk-image.img"));
        info!("{}: manifest updated, image will land at {}", inst.id(), image.display());
        Ok(())
    }
}

pub fn disk_image() -> TargetClass {
    TargetClass::new(
        TargetSpec::new("disk-image", BuildSystemKind::None)
            .with_dependencies(Dependencies::named(&["openssh", "zlib"]))
            .with_architectures(&[
                Architecture::Aarch64,
                Architecture::Riscv64,
                Architecture::Mips64,
            ]),
    )
    .with_contributors(vec![base_target_options, image_options])
    .with_hooks(std::sync::Arc::new(DiskImageHooks))
}

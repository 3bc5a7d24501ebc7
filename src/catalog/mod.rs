//! Built-in target catalog

mod emulator;
mod image;
mod libs;
mod sdk;

use crate::registry::error::Result;
use crate::registry::TargetRegistry;

/// Register every built-in target class. Runs before option setup, so the
/// full option set is declarable without constructing instances.
pub fn register_builtin_targets(registry: &mut TargetRegistry) -> Result<()> {
    registry.register_class(sdk::sdk())?;
    registry.register_class(sdk::freestanding_sdk())?;
    registry.register_class(emulator::emulator())?;
    registry.register_class(libs::zlib())?;
    registry.register_class(libs::openssh())?;
    registry.register_class(image::disk_image())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{register_global_options, ConfigSnapshot, OptionRegistry};
    use crate::target::Architecture;

    #[test]
    fn builtin_catalog_registers_cleanly() {
        let mut registry = TargetRegistry::new();
        register_builtin_targets(&mut registry).unwrap();
        assert!(registry.contains("sdk"));
        assert!(registry.contains("disk-image"));

        let mut options = OptionRegistry::new();
        register_global_options(&mut options).unwrap();
        registry.setup_options(&mut options).unwrap();
        assert!(options.is_registered("emulator/targets"));
        assert!(options.is_registered("zlib/baremetal"));
        assert!(options.is_registered("disk-image/image-path"));
    }

    #[test]
    fn disk_image_plan_orders_toolchain_first() {
        let mut registry = TargetRegistry::new();
        register_builtin_targets(&mut registry).unwrap();
        let mut options = OptionRegistry::new();
        register_global_options(&mut options).unwrap();
        registry.setup_options(&mut options).unwrap();
        let config = ConfigSnapshot::for_testing(std::path::Path::new("/tmp/forge-test"));

        let plan = registry
            .resolve_plan(
                &["disk-image".to_string()],
                Architecture::Riscv64,
                &options,
                &config,
            )
            .unwrap();
        let names = plan.target_names();
        assert_eq!(names, vec!["sdk", "zlib", "openssh", "disk-image"]);
    }

    #[test]
    fn baremetal_option_flips_toolchain_dependency() {
        let mut registry = TargetRegistry::new();
        register_builtin_targets(&mut registry).unwrap();
        let mut options = OptionRegistry::new();
        register_global_options(&mut options).unwrap();
        registry.setup_options(&mut options).unwrap();
        options
            .set_cli_override("zlib/baremetal", "true")
            .unwrap();
        let config = ConfigSnapshot::for_testing(std::path::Path::new("/tmp/forge-test"));

        let plan = registry
            .resolve_plan(
                &["zlib".to_string()],
                Architecture::Riscv64,
                &options,
                &config,
            )
            .unwrap();
        assert_eq!(plan.target_names(), vec!["sdk", "freestanding-sdk", "zlib"]);
    }

    #[test]
    fn emulator_is_native_only() {
        let mut registry = TargetRegistry::new();
        register_builtin_targets(&mut registry).unwrap();
        let mut options = OptionRegistry::new();
        register_global_options(&mut options).unwrap();
        registry.setup_options(&mut options).unwrap();
        let config = ConfigSnapshot::for_testing(std::path::Path::new("/tmp/forge-test"));

        let err = registry
            .resolve_plan(
                &["emulator".to_string()],
                Architecture::Riscv64,
                &options,
                &config,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            crate::registry::ResolveError::UnsupportedArchitecture { .. }
        ));
    }
}

//! Target class model: specifications, composition and instances

pub mod arch;
pub mod buildsystem;
pub mod cross;
pub mod hooks;
pub mod instance;
pub mod spec;

pub use arch::Architecture;
pub use buildsystem::{strategy_for, BuildSystem};
pub use cross::CrossPolicy;
pub use hooks::{default_checkout, DefaultHooks, ProjectHooks};
pub use instance::{BuildSettings, RequiredTool, TargetInstance};
pub use spec::{
    base_target_options, baremetal_sysroot_install_options, cross_target_options,
    rootfs_install_options, rootfs_install_prefix, sdk_install_options, BuildSystemKind,
    Dependencies, DependencyFn, InstallPolicy, RepoSpec, TargetSpec,
};

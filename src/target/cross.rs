//! Cross-compilation policy
//!
//! Bundles everything the build-system strategies need to target a foreign
//! architecture: the triple, the sysroot, compiler paths inside the SDK and
//! the per-architecture flag sets.

use std::path::PathBuf;

use crate::config::ConfigSnapshot;
use crate::target::arch::Architecture;

#[derive(Debug, Clone)]
pub struct CrossPolicy {
    pub arch: Architecture,
    pub baremetal: bool,
    pub triple: String,
    pub linker: String,
    compiler_dir: PathBuf,
    sdk_bin_dir: PathBuf,
    sysroot: PathBuf,
}

impl CrossPolicy {
    pub fn new(arch: Architecture, baremetal: bool, linker: String, config: &ConfigSnapshot) -> Self {
        Self {
            arch,
            baremetal,
            triple: arch.triple(baremetal).to_string(),
            linker,
            compiler_dir: config.sdk_bin_dir(),
            sdk_bin_dir: config.sdk_bin_dir(),
            sysroot: config.sysroot_for(arch, baremetal),
        }
    }

    pub fn is_cross(&self) -> bool {
        !self.arch.is_native()
    }

    pub fn sysroot(&self) -> Option<&PathBuf> {
        if self.is_cross() {
            Some(&self.sysroot)
        } else {
            None
        }
    }

    /// C compiler path. Cross builds use the triple-prefixed driver from
    /// the SDK so the right default search paths apply.
    pub fn cc(&self) -> PathBuf {
        if self.is_cross() && !self.baremetal {
            self.compiler_dir.join(format!("{}-clang", self.triple))
        } else if self.is_cross() {
            self.compiler_dir.join("clang")
        } else {
            PathBuf::from("cc")
        }
    }

    pub fn cxx(&self) -> PathBuf {
        if self.is_cross() && !self.baremetal {
            self.compiler_dir.join(format!("{}-clang++", self.triple))
        } else if self.is_cross() {
            self.compiler_dir.join("clang++")
        } else {
            PathBuf::from("c++")
        }
    }

    /// Flags shared by every compiler invocation for this destination.
    pub fn common_flags(&self) -> Vec<String> {
        if !self.is_cross() {
            return Vec::new();
        }
        let mut flags = vec!["-pipe".to_string(), format!("--target={}", self.triple)];
        match self.arch {
            Architecture::Native => {}
            Architecture::Aarch64 => flags.push("-march=armv8-a".to_string()),
            Architecture::Riscv64 => {
                flags.push("-march=rv64gc".to_string());
                flags.push("-mabi=lp64d".to_string());
            }
            Architecture::Mips64 => {
                flags.push("-mabi=64".to_string());
                flags.push("-mcpu=mips64r2".to_string());
            }
        }
        if self.baremetal {
            flags.push("-ffreestanding".to_string());
            flags.push("-fno-pic".to_string());
        }
        flags
    }

    /// Linker flags for cross links: linker selection, sysroot and the SDK
    /// bin directory so triple-prefixed tools are found.
    pub fn default_ldflags(&self) -> Vec<String> {
        if !self.is_cross() {
            return Vec::new();
        }
        let mut flags = vec![
            format!("-fuse-ld={}", self.linker),
            format!("-B{}", self.sdk_bin_dir.display()),
        ];
        if !self.baremetal {
            flags.push(format!("--sysroot={}", self.sysroot.display()));
        }
        flags
    }

    /// pkg-config search path inside the sysroot, hosted targets only.
    pub fn pkg_config_dirs(&self) -> Option<String> {
        if !self.is_cross() || self.baremetal {
            return None;
        }
        Some(format!(
            "{0}/usr/lib/pkgconfig:{0}/usr/local/lib/pkgconfig",
            self.sysroot.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn policy(arch: Architecture, baremetal: bool) -> CrossPolicy {
        let config = ConfigSnapshot::for_testing(Path::new("/forge"));
        CrossPolicy::new(arch, baremetal, "lld".to_string(), &config)
    }

    #[test]
    fn native_policy_uses_host_tools() {
        let p = policy(Architecture::Native, false);
        assert!(!p.is_cross());
        assert_eq!(p.cc(), PathBuf::from("cc"));
        assert!(p.common_flags().is_empty());
        assert!(p.default_ldflags().is_empty());
    }

    #[test]
    fn cross_policy_targets_triple_and_sysroot() {
        let p = policy(Architecture::Riscv64, false);
        assert!(p.cc().ends_with("riscv64-unknown-linux-gnu-clang"));
        assert!(p
            .common_flags()
            .contains(&"--target=riscv64-unknown-linux-gnu".to_string()));
        assert!(p
            .default_ldflags()
            .iter()
            .any(|f| f.starts_with("--sysroot=")));
        assert!(p.pkg_config_dirs().is_some());
    }

    #[test]
    fn baremetal_policy_is_freestanding() {
        let p = policy(Architecture::Aarch64, true);
        assert!(p.common_flags().contains(&"-ffreestanding".to_string()));
        assert!(p.default_ldflags().iter().all(|f| !f.starts_with("--sysroot=")));
        assert!(p.pkg_config_dirs().is_none());
    }
}

//! Cross-compilation architectures

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A cross-compilation destination a target may or may not support.
///
/// `Native` means "build for the machine running buildforge"; the other
/// variants select a prefixed toolchain and a sysroot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    Native,
    Aarch64,
    Riscv64,
    Mips64,
}

impl Architecture {
    pub const ALL: [Architecture; 4] = [
        Architecture::Native,
        Architecture::Aarch64,
        Architecture::Riscv64,
        Architecture::Mips64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Native => "native",
            Architecture::Aarch64 => "aarch64",
            Architecture::Riscv64 => "riscv64",
            Architecture::Mips64 => "mips64",
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Architecture::Native)
    }

    /// Target triple used for compiler selection and toolchain files.
    ///
    /// Baremetal builds use freestanding ELF triples instead of the hosted
    /// OS triples.
    pub fn triple(&self, baremetal: bool) -> &'static str {
        match (self, baremetal) {
            (Architecture::Native, _) => "x86_64-unknown-linux-gnu",
            (Architecture::Aarch64, false) => "aarch64-unknown-linux-gnu",
            (Architecture::Aarch64, true) => "aarch64-unknown-elf",
            (Architecture::Riscv64, false) => "riscv64-unknown-linux-gnu",
            (Architecture::Riscv64, true) => "riscv64-unknown-elf",
            (Architecture::Mips64, false) => "mips64-unknown-linux-gnuabi64",
            (Architecture::Mips64, true) => "mips64-unknown-elf",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triples_are_distinct_per_arch() {
        let hosted: Vec<&str> = Architecture::ALL.iter().map(|a| a.triple(false)).collect();
        let mut deduped = hosted.clone();
        deduped.dedup();
        assert_eq!(hosted, deduped);
    }

    #[test]
    fn baremetal_triples_are_freestanding() {
        assert!(Architecture::Riscv64.triple(true).ends_with("-elf"));
        assert!(Architecture::Aarch64.triple(true).ends_with("-elf"));
    }
}

//! Lifecycle phases and per-phase status

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One stage of a target's lifecycle, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Checkout,
    Configure,
    Compile,
    Install,
    Test,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Checkout,
        Phase::Configure,
        Phase::Compile,
        Phase::Install,
        Phase::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Checkout => "checkout",
            Phase::Configure => "configure",
            Phase::Compile => "compile",
            Phase::Install => "install",
            Phase::Test => "test",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion state of one phase of one target instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseStatus {
    Pending,
    Completed,
    /// Satisfied by a valid completion marker; nothing ran.
    SkippedUpToDate,
    Failed,
    /// Never attempted because a dependency (or, in stop-on-first-error
    /// mode, any earlier target) failed.
    Skipped,
    NotRequested,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Completed => "done",
            PhaseStatus::SkippedUpToDate => "up-to-date",
            PhaseStatus::Failed => "FAILED",
            PhaseStatus::Skipped => "skipped",
            PhaseStatus::NotRequested => "not requested",
        };
        f.write_str(s)
    }
}

/// Which subset of the lifecycle a run executes.
#[derive(Debug, Clone)]
pub struct PhaseSelection {
    phases: BTreeSet<Phase>,
}

impl PhaseSelection {
    /// Checkout through install; tests are opt-in.
    pub fn standard() -> Self {
        Self {
            phases: [Phase::Checkout, Phase::Configure, Phase::Compile, Phase::Install]
                .into_iter()
                .collect(),
        }
    }

    /// Everything up to and including `last`.
    pub fn through(last: Phase) -> Self {
        Self {
            phases: Phase::ALL.into_iter().filter(|p| *p <= last).collect(),
        }
    }

    pub fn with_tests(mut self) -> Self {
        self.phases.insert(Phase::Test);
        self
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn iter(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases.iter().copied()
    }
}

impl Default for PhaseSelection {
    fn default() -> Self {
        Self::standard()
    }
}

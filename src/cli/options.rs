use clap::Parser;
use std::path::PathBuf;

use crate::engine::phase::{Phase, PhaseSelection};
use crate::target::Architecture;

/// Main buildforge CLI interface
#[derive(Parser)]
#[command(name = "buildforge")]
#[command(about = "Meta build orchestrator: dependency-resolved lifecycles for cross-compiled software stacks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct BuildForgeCli {
    /// Targets to process, in request order
    pub targets: Vec<String>,

    /// Architecture to build the requested targets for
    #[arg(long, value_enum, default_value = "native")]
    pub arch: Architecture,

    /// Option override (repeatable), e.g. -o zlib/build-type=Debug
    #[arg(short = 'o', long = "option", value_name = "OPTION=VALUE")]
    pub options: Vec<String>,

    /// Config file (default: <config dir>/buildforge/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Job count passed to invoked build tools
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Do not update existing source checkouts
    #[arg(long)]
    pub skip_update: bool,

    /// Re-run phases of requested targets even when up to date
    #[arg(long)]
    pub force: bool,

    /// Delete the build trees of requested targets before building
    #[arg(long)]
    pub clean: bool,

    /// Continue past failures; only dependents of a failed target are skipped
    #[arg(long)]
    pub keep_going: bool,

    /// Run each target's test phase after install
    #[arg(long)]
    pub test: bool,

    /// Stop after the configure phase
    #[arg(long, conflicts_with = "compile_only")]
    pub configure_only: bool,

    /// Stop after the compile phase (skip install)
    #[arg(long)]
    pub compile_only: bool,

    /// Print the resolved execution plan without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// List every known target and exit
    #[arg(long)]
    pub list_targets: bool,

    /// List every configurable option and exit
    #[arg(long)]
    pub list_options: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl BuildForgeCli {
    pub fn phase_selection(&self) -> PhaseSelection {
        let selection = if self.configure_only {
            PhaseSelection::through(Phase::Configure)
        } else if self.compile_only {
            PhaseSelection::through(Phase::Compile)
        } else {
            PhaseSelection::standard()
        };
        if self.test {
            selection.with_tests()
        } else {
            selection
        }
    }
}

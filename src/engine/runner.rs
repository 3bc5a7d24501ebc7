//! Lifecycle engine
//!
//! Drives every instance of an execution plan through its requested
//! phases, strictly in plan order: later targets may depend on filesystem
//! state (installed headers, libraries, rootfs contents) produced by
//! earlier ones. Parallelism lives inside the invoked build tools, not
//! here.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, ConfigSnapshot, FailureMode};
use crate::engine::error::{EngineError, PhaseError, Result};
use crate::engine::markers::{input_hash, MarkerStore};
use crate::engine::phase::{Phase, PhaseSelection, PhaseStatus};
use crate::exec::{Invocation, ProcessInvoker, ToolInvoker};
use crate::registry::ExecutionPlan;
use crate::source::{GitSource, SourceControl};
use crate::target::TargetInstance;

/// Collaborators handed to every lifecycle hook.
pub struct PhaseContext<'a> {
    pub config: &'a ConfigSnapshot,
    pub invoker: &'a dyn ToolInvoker,
    pub source: &'a dyn SourceControl,
}

impl PhaseContext<'_> {
    pub fn jobs(&self) -> usize {
        self.config.jobs
    }

    /// Invoke an external tool; any non-zero exit is fatal for the phase.
    pub async fn run_tool(&self, target: &str, phase: Phase, invocation: Invocation) -> Result<()> {
        info!("[{target}] {phase}: {}", invocation.command_line());
        let status = self.invoker.invoke(&invocation).await?;
        if status != 0 {
            return Err(PhaseError::ToolFailed {
                target: target.to_string(),
                phase,
                program: invocation.program.display().to_string(),
                status,
            });
        }
        Ok(())
    }
}

/// Final disposition of one target in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Succeeded,
    Failed,
    /// Not attempted: an earlier target failed in stop-on-first-error mode.
    Skipped,
    /// Not attempted: a (transitive) dependency failed in best-effort mode.
    DependencyFailed,
}

#[derive(Debug)]
pub struct TargetReport {
    pub id: String,
    pub status: TargetStatus,
    pub phases: Vec<(Phase, PhaseStatus)>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.targets
            .iter()
            .any(|t| t.status == TargetStatus::Failed)
    }

    pub fn status_of(&self, id: &str) -> Option<&TargetStatus> {
        self.targets.iter().find(|t| t.id == id).map(|t| &t.status)
    }

    pub fn summary(&self) -> String {
        let count = |status: TargetStatus| {
            self.targets.iter().filter(|t| t.status == status).count()
        };
        format!(
            "{} succeeded, {} failed, {} skipped",
            count(TargetStatus::Succeeded),
            count(TargetStatus::Failed),
            count(TargetStatus::Skipped) + count(TargetStatus::DependencyFailed),
        )
    }
}

pub struct LifecycleEngine {
    invoker: Arc<dyn ToolInvoker>,
    source: Arc<dyn SourceControl>,
    markers: MarkerStore,
}

impl LifecycleEngine {
    pub fn new(build_root: &Path) -> Self {
        Self {
            invoker: Arc::new(ProcessInvoker),
            source: Arc::new(GitSource),
            markers: MarkerStore::new(build_root),
        }
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn ToolInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn with_source(mut self, source: Arc<dyn SourceControl>) -> Self {
        self.source = source;
        self
    }

    /// Check every instance's required system tools before any phase runs,
    /// reporting all misses at once.
    pub fn preflight(&self, plan: &ExecutionPlan) -> std::result::Result<(), EngineError> {
        let mut errors = Vec::new();
        let mut reported = HashSet::new();
        for entry in plan.iter() {
            for tool in &entry.instance.settings.required_tools {
                if !reported.insert(tool.name.clone()) {
                    continue;
                }
                if which::which(&tool.name).is_err() {
                    errors.push(ConfigError::MissingTool {
                        tool: tool.name.clone(),
                        hint: tool.install_hint.clone(),
                    });
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Preflight { errors })
        }
    }

    /// Execute the plan. The report records one entry per target; the
    /// caller decides the process exit code from it.
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        config: &ConfigSnapshot,
        phases: &PhaseSelection,
        requested: &[String],
    ) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        info!(
            "run {run_id}: {} targets for {}",
            plan.len(),
            plan.architecture
        );

        let ctx = PhaseContext {
            config,
            invoker: self.invoker.as_ref(),
            source: self.source.as_ref(),
        };

        let mut reports = Vec::with_capacity(plan.len());
        // Ids of targets that failed or were skipped because of a failure;
        // dependents of anything in here must not start.
        let mut contaminated: HashSet<String> = HashSet::new();
        let mut stopped = false;

        for entry in plan.iter() {
            let instance = &entry.instance;
            let id = instance.id();

            if stopped {
                reports.push(skip_report(instance, phases, TargetStatus::Skipped));
                continue;
            }
            if entry.dependencies.iter().any(|d| contaminated.contains(d)) {
                warn!("[{id}] skipped: a dependency failed");
                contaminated.insert(id);
                reports.push(skip_report(instance, phases, TargetStatus::DependencyFailed));
                continue;
            }

            let forced = (config.force || config.clean)
                && requested.iter().any(|r| r.as_str() == instance.name());
            if config.clean && forced {
                self.clean_instance(instance);
            }

            match self.run_instance(instance, &ctx, phases, forced).await {
                Ok(()) => {
                    reports.push(TargetReport {
                        id,
                        status: TargetStatus::Succeeded,
                        phases: phase_states(instance, phases),
                        error: None,
                    });
                }
                Err(error) => {
                    warn!("[{id}] failed: {error}");
                    contaminated.insert(id.clone());
                    if config.failure_mode == FailureMode::StopOnFirstError {
                        stopped = true;
                    }
                    reports.push(TargetReport {
                        id,
                        status: TargetStatus::Failed,
                        phases: phase_states(instance, phases),
                        error: Some(error.to_string()),
                    });
                }
            }
        }

        let report = RunReport {
            run_id,
            targets: reports,
        };
        info!("run complete: {}", report.summary());
        report
    }

    /// Run the requested phases of one instance, in lifecycle order. A
    /// failure aborts the instance's remaining phases immediately.
    async fn run_instance(
        &self,
        instance: &TargetInstance,
        ctx: &PhaseContext<'_>,
        phases: &PhaseSelection,
        forced: bool,
    ) -> Result<()> {
        let id = instance.id();
        let hash = input_hash(instance);

        for phase in Phase::ALL {
            if !phases.contains(phase) {
                instance.set_phase_status(phase, PhaseStatus::NotRequested);
                continue;
            }

            // Checkout reconciles against a moving branch tip, so it is
            // never considered satisfied by a stale marker.
            let markable = phase != Phase::Checkout;
            if markable && !forced && self.markers.is_satisfied(&id, phase, &hash) {
                info!("[{id}] {phase}: up to date");
                instance.set_phase_status(phase, PhaseStatus::SkippedUpToDate);
                continue;
            }

            let result = match phase {
                Phase::Checkout => instance.hooks().checkout(instance, ctx).await,
                Phase::Configure => instance.hooks().configure(instance, ctx).await,
                Phase::Compile => instance.hooks().compile(instance, ctx).await,
                Phase::Install => instance.hooks().install(instance, ctx).await,
                Phase::Test => instance.hooks().run_tests(instance, ctx).await,
            };

            match result {
                Ok(()) => {
                    // The marker is written only after success; a failed or
                    // interrupted phase is retried on the next run.
                    if markable {
                        if let Err(e) = self.markers.record(&id, phase, &hash) {
                            warn!("[{id}] could not record {phase} marker: {e}");
                        }
                    }
                    instance.set_phase_status(phase, PhaseStatus::Completed);
                }
                Err(error) => {
                    instance.set_phase_status(phase, PhaseStatus::Failed);
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    fn clean_instance(&self, instance: &TargetInstance) {
        let id = instance.id();
        info!("[{id}] cleaning build directory");
        if instance.build_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&instance.build_dir) {
                warn!("[{id}] could not remove {}: {e}", instance.build_dir.display());
            }
        }
        self.markers.clear(&id);
    }
}

fn skip_report(
    instance: &TargetInstance,
    phases: &PhaseSelection,
    status: TargetStatus,
) -> TargetReport {
    for phase in phases.iter() {
        instance.set_phase_status(phase, PhaseStatus::Skipped);
    }
    TargetReport {
        id: instance.id(),
        status,
        phases: phase_states(instance, phases),
        error: None,
    }
}

fn phase_states(
    instance: &TargetInstance,
    phases: &PhaseSelection,
) -> Vec<(Phase, PhaseStatus)> {
    phases
        .iter()
        .map(|phase| (phase, instance.phase_status(phase)))
        .collect()
}

//! Lifecycle hooks
//!
//! Leaf targets customise behaviour by implementing [`ProjectHooks`] and
//! overriding selectively; every method has a default that delegates to
//! the source-control collaborator or the instance's build-system
//! strategy. Overrides call the `default_*` helpers when they extend
//! rather than replace the stock behaviour.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::error::Result as ConfigResult;
use crate::config::ConfigSnapshot;
use crate::engine::error::Result;
use crate::engine::runner::PhaseContext;
use crate::target::instance::{BuildSettings, TargetInstance};

#[async_trait]
pub trait ProjectHooks: Send + Sync + std::fmt::Debug {
    /// Contribute configure arguments, environment, flags and required
    /// tools. Runs once at instance construction.
    fn setup(
        &self,
        settings: &mut BuildSettings,
        inst: &TargetInstance,
        config: &ConfigSnapshot,
    ) -> ConfigResult<()> {
        let _ = (settings, inst, config);
        Ok(())
    }

    async fn checkout(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        default_checkout(inst, ctx).await
    }

    async fn configure(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        inst.strategy().configure(inst, ctx).await
    }

    async fn compile(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        inst.strategy().compile(inst, ctx).await
    }

    async fn install(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        inst.strategy().install(inst, ctx).await
    }

    async fn run_tests(&self, inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
        let _ = ctx;
        debug!("{}: no test suite wired up", inst.id());
        Ok(())
    }
}

/// Stock behaviour for targets that need no customisation.
#[derive(Debug)]
pub struct DefaultHooks;

#[async_trait]
impl ProjectHooks for DefaultHooks {}

/// Reconcile the working copy against the declared repository: clone when
/// absent, otherwise update towards the pinned revision or branch. Local
/// modifications are surfaced, never discarded.
pub async fn default_checkout(inst: &TargetInstance, ctx: &PhaseContext<'_>) -> Result<()> {
    let Some(repo) = &inst.spec.repository else {
        debug!("{}: no source repository", inst.id());
        return Ok(());
    };

    if !inst.source_dir.join(".git").exists() {
        ctx.source
            .clone_repo(
                &repo.url,
                &inst.source_dir,
                repo.default_branch.as_deref(),
                repo.revision.as_deref(),
            )
            .await?;
        return Ok(());
    }

    if ctx.config.skip_update {
        debug!("{}: skipping source update", inst.id());
        return Ok(());
    }

    let outcome = ctx.source.update(&inst.source_dir, repo).await?;
    if outcome.remote_migrated {
        info!("{}: remote URL migrated to {}", inst.id(), repo.url);
    }
    if outcome.changed {
        info!("{}: source updated", inst.id());
    }
    Ok(())
}

//! Command driver: wires the registry, option resolution and the engine
//! together for one invocation.

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::catalog;
use crate::cli::options::BuildForgeCli;
use crate::config::{
    default_config_path, load_config_file, register_global_options, ConfigSnapshot,
    OptionDefault, OptionRegistry,
};
use crate::engine::{LifecycleEngine, TargetStatus};
use crate::registry::TargetRegistry;

/// Run one CLI invocation and return the process exit code.
pub async fn execute(cli: BuildForgeCli) -> Result<i32> {
    let mut registry = TargetRegistry::new();
    catalog::register_builtin_targets(&mut registry).context("registering built-in targets")?;

    let mut options = OptionRegistry::new();
    register_global_options(&mut options)?;
    registry.setup_options(&mut options)?;

    seed_overrides(&mut options, &cli)?;

    if cli.list_targets {
        for name in registry.target_names() {
            println!("{name}");
        }
        return Ok(0);
    }
    if cli.list_options {
        print_options(&options);
        return Ok(0);
    }

    let config = ConfigSnapshot::from_registry(&options, cli.arch)?;

    if cli.targets.is_empty() {
        bail!("no targets requested; try --list-targets");
    }

    let plan = registry.resolve_plan(&cli.targets, cli.arch, &options, &config)?;
    info!(
        "resolved {} targets for {}: {}",
        plan.len(),
        plan.architecture,
        plan.target_names().join(", ")
    );

    if cli.dry_run {
        print!("{}", plan.render());
        return Ok(0);
    }

    let engine = LifecycleEngine::new(&config.build_root);
    engine.preflight(&plan)?;

    let report = engine.run(&plan, &config, &cli.phase_selection(), &cli.targets).await;

    for target in &report.targets {
        match &target.status {
            TargetStatus::Failed => {
                eprintln!(
                    "FAILED  {}: {}",
                    target.id,
                    target.error.as_deref().unwrap_or("unknown error")
                );
            }
            TargetStatus::Skipped => eprintln!("skipped {}", target.id),
            TargetStatus::DependencyFailed => {
                eprintln!("skipped {} (dependency failed)", target.id)
            }
            TargetStatus::Succeeded => {}
        }
    }
    println!("{}", report.summary());

    Ok(if report.has_failures() { 1 } else { 0 })
}

/// Seed every override layer: config file, environment, then the command
/// line (repeatable -o pairs plus the dedicated flags).
fn seed_overrides(options: &mut OptionRegistry, cli: &BuildForgeCli) -> Result<()> {
    match &cli.config {
        Some(path) => {
            let values = load_config_file(path)?;
            options.seed_file_layer(values)?;
        }
        None => {
            if let Some(path) = default_config_path() {
                if path.exists() {
                    let values = load_config_file(&path)?;
                    options.seed_file_layer(values)?;
                }
            }
        }
    }

    options.seed_env_layer();
    options.seed_cli_overrides(&cli.options)?;

    if let Some(jobs) = cli.jobs {
        options.set_cli_override("jobs", jobs.to_string())?;
    }
    for (flag, set) in [
        ("skip-update", cli.skip_update),
        ("force", cli.force),
        ("clean", cli.clean),
        ("keep-going", cli.keep_going),
        ("test", cli.test),
    ] {
        if set {
            options.set_cli_override(flag, "true")?;
        }
    }
    Ok(())
}

fn print_options(options: &OptionRegistry) {
    for decl in options.decls() {
        let default = match &decl.default {
            OptionDefault::Literal(value) => value.to_string(),
            OptionDefault::Computed { as_string, .. } => as_string.to_string(),
        };
        println!("{:<40} (default: {default})", decl.name);
        if !decl.help.is_empty() {
            println!("    {}", decl.help);
        }
    }
}

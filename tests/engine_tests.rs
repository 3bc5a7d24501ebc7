//! Lifecycle engine integration tests: phase ordering, marker-based
//! skipping, force semantics and both failure-propagation modes.

mod common;

use std::sync::Arc;

use buildforge::config::{ConfigSnapshot, FailureMode};
use buildforge::engine::{LifecycleEngine, Phase, PhaseSelection, PhaseStatus, TargetStatus};

use common::{make_target, plan_for, registry_of, MockInvoker, MockSource};

fn engine_with(
    config: &ConfigSnapshot,
    invoker: Arc<MockInvoker>,
) -> LifecycleEngine {
    LifecycleEngine::new(&config.build_root)
        .with_invoker(invoker)
        .with_source(Arc::new(MockSource::default()))
}

fn requested(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn targets_build_in_plan_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigSnapshot::for_testing(dir.path());
    let registry = registry_of(vec![make_target("a", &[]), make_target("b", &["a"])]);
    let plan = plan_for(&registry, &["b"], &config);

    let invoker = Arc::new(MockInvoker::new());
    let engine = engine_with(&config, invoker.clone());
    let report = engine
        .run(&plan, &config, &PhaseSelection::standard(), &requested(&["b"]))
        .await;

    assert!(!report.has_failures());
    let lines = invoker.call_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("sources/a"));
    assert!(lines[1].contains("sources/b"));
}

#[tokio::test]
async fn valid_markers_skip_phases_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigSnapshot::for_testing(dir.path());
    let registry = registry_of(vec![make_target("a", &[])]);
    let plan = plan_for(&registry, &["a"], &config);

    let invoker = Arc::new(MockInvoker::new());
    let engine = engine_with(&config, invoker.clone());
    engine
        .run(&plan, &config, &PhaseSelection::standard(), &requested(&["a"]))
        .await;
    assert_eq!(invoker.call_count(), 1);

    // Same instance, same inputs: everything is marker-satisfied now.
    let report = engine
        .run(&plan, &config, &PhaseSelection::standard(), &requested(&["a"]))
        .await;
    assert_eq!(invoker.call_count(), 1);
    let entry = &report.targets[0];
    assert_eq!(entry.status, TargetStatus::Succeeded);
    assert!(entry
        .phases
        .iter()
        .any(|(p, s)| *p == Phase::Compile && *s == PhaseStatus::SkippedUpToDate));
}

#[tokio::test]
async fn force_reruns_satisfied_phases_of_requested_targets() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ConfigSnapshot::for_testing(dir.path());
    let registry = registry_of(vec![make_target("a", &[])]);
    let plan = plan_for(&registry, &["a"], &config);

    let invoker = Arc::new(MockInvoker::new());
    let engine = engine_with(&config, invoker.clone());
    engine
        .run(&plan, &config, &PhaseSelection::standard(), &requested(&["a"]))
        .await;
    assert_eq!(invoker.call_count(), 1);

    config.force = true;
    engine
        .run(&plan, &config, &PhaseSelection::standard(), &requested(&["a"]))
        .await;
    assert_eq!(invoker.call_count(), 2);
}

#[tokio::test]
async fn stop_on_first_error_skips_everything_after_the_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigSnapshot::for_testing(dir.path());
    let registry = registry_of(vec![
        make_target("a", &[]),
        make_target("b", &["a"]),
        make_target("c", &["b"]),
    ]);
    let plan = plan_for(&registry, &["c"], &config);

    let invoker = Arc::new(MockInvoker::new());
    invoker.fail_matching("sources/b");
    let engine = engine_with(&config, invoker.clone());
    let report = engine
        .run(&plan, &config, &PhaseSelection::standard(), &requested(&["c"]))
        .await;

    assert!(report.has_failures());
    assert_eq!(report.status_of("a@native"), Some(&TargetStatus::Succeeded));
    assert_eq!(report.status_of("b@native"), Some(&TargetStatus::Failed));
    assert_eq!(report.status_of("c@native"), Some(&TargetStatus::Skipped));
    // c's make never ran.
    assert!(invoker.call_lines().iter().all(|l| !l.contains("sources/c")));
}

#[tokio::test]
async fn best_effort_attempts_independent_targets() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ConfigSnapshot::for_testing(dir.path());
    config.failure_mode = FailureMode::BestEffort;
    let registry = registry_of(vec![
        make_target("a", &[]),
        make_target("b", &["a"]),
        make_target("c", &["b"]),
        make_target("d", &[]),
    ]);
    let plan = plan_for(&registry, &["c", "d"], &config);

    let invoker = Arc::new(MockInvoker::new());
    invoker.fail_matching("sources/b");
    let engine = engine_with(&config, invoker.clone());
    let report = engine
        .run(
            &plan,
            &config,
            &PhaseSelection::standard(),
            &requested(&["c", "d"]),
        )
        .await;

    assert_eq!(report.status_of("b@native"), Some(&TargetStatus::Failed));
    assert_eq!(
        report.status_of("c@native"),
        Some(&TargetStatus::DependencyFailed)
    );
    assert_eq!(report.status_of("d@native"), Some(&TargetStatus::Succeeded));
    assert!(invoker.call_lines().iter().any(|l| l.contains("sources/d")));
}

#[tokio::test]
async fn failed_phase_leaves_no_marker() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigSnapshot::for_testing(dir.path());
    let registry = registry_of(vec![make_target("a", &[])]);
    let plan = plan_for(&registry, &["a"], &config);

    let invoker = Arc::new(MockInvoker::new());
    invoker.fail_matching("sources/a");
    let engine = engine_with(&config, invoker.clone());
    let report = engine
        .run(&plan, &config, &PhaseSelection::standard(), &requested(&["a"]))
        .await;
    assert!(report.has_failures());
    assert_eq!(invoker.call_count(), 1);

    // A clean invoker on the next run: the failed compile is retried
    // rather than considered satisfied.
    let retry_invoker = Arc::new(MockInvoker::new());
    let engine = engine_with(&config, retry_invoker.clone());
    let report = engine
        .run(&plan, &config, &PhaseSelection::standard(), &requested(&["a"]))
        .await;
    assert!(!report.has_failures());
    assert_eq!(retry_invoker.call_count(), 1);
}

#[tokio::test]
async fn phase_selection_limits_execution() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigSnapshot::for_testing(dir.path());
    let registry = registry_of(vec![make_target("a", &[])]);
    let plan = plan_for(&registry, &["a"], &config);

    let invoker = Arc::new(MockInvoker::new());
    let engine = engine_with(&config, invoker.clone());
    let report = engine
        .run(
            &plan,
            &config,
            &PhaseSelection::through(Phase::Configure),
            &requested(&["a"]),
        )
        .await;

    // Make-kind targets have a no-op configure, so nothing was invoked.
    assert_eq!(invoker.call_count(), 0);
    let entry = &report.targets[0];
    assert!(entry
        .phases
        .iter()
        .all(|(p, _)| *p <= Phase::Configure));
}

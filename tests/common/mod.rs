//! Shared test doubles and fixtures
#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use buildforge::config::{ConfigSnapshot, OptionRegistry};
use buildforge::exec::{Invocation, InvokeError, ToolInvoker};
use buildforge::registry::{ExecutionPlan, TargetClass, TargetRegistry};
use buildforge::source::{SourceControl, SourceError, UpdateOutcome};
use buildforge::target::{Architecture, BuildSystemKind, Dependencies, RepoSpec, TargetSpec};

/// Records every invocation; fails (exit 1) any whose command line or
/// working directory contains a configured substring.
#[derive(Default)]
pub struct MockInvoker {
    pub calls: Mutex<Vec<Invocation>>,
    fail_matching: Mutex<Vec<String>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_matching(&self, needle: &str) {
        self.fail_matching
            .lock()
            .unwrap()
            .push(needle.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|i| format!("{} @ {}", i.command_line(), i.cwd.display()))
            .collect()
    }
}

#[async_trait]
impl ToolInvoker for MockInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<i32, InvokeError> {
        let line = format!(
            "{} @ {}",
            invocation.command_line(),
            invocation.cwd.display()
        );
        self.calls.lock().unwrap().push(invocation.clone());
        let fail = self
            .fail_matching
            .lock()
            .unwrap()
            .iter()
            .any(|needle| line.contains(needle.as_str()));
        Ok(if fail { 1 } else { 0 })
    }
}

/// Pretends every clone and update succeeds, recording the operations.
#[derive(Default)]
pub struct MockSource {
    pub operations: Mutex<Vec<String>>,
}

#[async_trait]
impl SourceControl for MockSource {
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        _branch: Option<&str>,
        _revision: Option<&str>,
    ) -> Result<(), SourceError> {
        self.operations
            .lock()
            .unwrap()
            .push(format!("clone {url} -> {}", dest.display()));
        std::fs::create_dir_all(dest.join(".git")).expect("create fake checkout");
        Ok(())
    }

    async fn update(&self, dest: &Path, _spec: &RepoSpec) -> Result<UpdateOutcome, SourceError> {
        self.operations
            .lock()
            .unwrap()
            .push(format!("update {}", dest.display()));
        Ok(UpdateOutcome::default())
    }

    async fn has_local_changes(&self, _dest: &Path, _subpath: &str) -> Result<bool, SourceError> {
        Ok(false)
    }
}

/// A make-based target with no repository: configure is a no-op and the
/// only external invocation is the compile-phase make.
pub fn make_target(name: &str, deps: &[&str]) -> TargetClass {
    TargetClass::new(
        TargetSpec::new(name, BuildSystemKind::Make).with_dependencies(Dependencies::named(deps)),
    )
}

pub fn registry_of(classes: Vec<TargetClass>) -> TargetRegistry {
    let mut registry = TargetRegistry::new();
    for class in classes {
        registry.register_class(class).expect("register test class");
    }
    registry
}

pub fn plan_for(
    registry: &TargetRegistry,
    requested: &[&str],
    config: &ConfigSnapshot,
) -> ExecutionPlan {
    let options = OptionRegistry::new();
    let names: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
    registry
        .resolve_plan(&names, Architecture::Native, &options, config)
        .expect("resolve test plan")
}

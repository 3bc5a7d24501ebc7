//! Target registry and dependency resolver
//!
//! Maps target names to registered classes, memoizes instantiation per
//! (name, architecture), and expands a requested target list into a
//! deterministic dependency-ordered execution plan.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::config::{ConfigSnapshot, OptionContributor, OptionRegistry, TargetContext};
use crate::registry::error::{ResolveError, Result};
use crate::registry::plan::{ExecutionPlan, PlanEntry};
use crate::target::{Architecture, DefaultHooks, ProjectHooks, TargetInstance, TargetSpec};

/// A registered target class: specification, option contributors (ordered,
/// one per composition level) and behaviour hooks.
pub struct TargetClass {
    pub spec: TargetSpec,
    pub contributors: Vec<OptionContributor>,
    pub hooks: Arc<dyn ProjectHooks>,
}

impl TargetClass {
    pub fn new(spec: TargetSpec) -> Self {
        Self {
            spec,
            contributors: Vec::new(),
            hooks: Arc::new(DefaultHooks),
        }
    }

    pub fn with_contributors(mut self, contributors: Vec<OptionContributor>) -> Self {
        self.contributors = contributors;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProjectHooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

#[derive(Default)]
pub struct TargetRegistry {
    classes: BTreeMap<String, TargetClass>,
    instances: Mutex<HashMap<(String, Architecture), Arc<TargetInstance>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_class(&mut self, class: TargetClass) -> Result<()> {
        let name = class.spec.name.clone();
        if self.classes.contains_key(&name) {
            return Err(ResolveError::DuplicateTarget { name });
        }
        self.classes.insert(name, class);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.classes.keys().map(String::as_str).collect()
    }

    /// The declare-all-options pass: every class's contributors run, in
    /// registration order, before any instance exists.
    pub fn setup_options(&self, options: &mut OptionRegistry) -> Result<()> {
        for class in self.classes.values() {
            for contributor in &class.contributors {
                contributor(options, &class.spec.name)?;
            }
        }
        Ok(())
    }

    /// Construct (or return the memoized) instance of `name` bound to
    /// `arch`. Within one run this always yields the same instance.
    pub fn instantiate(
        &self,
        name: &str,
        arch: Architecture,
        options: &OptionRegistry,
        config: &ConfigSnapshot,
    ) -> Result<Arc<TargetInstance>> {
        let key = (name.to_string(), arch);
        {
            let instances = self.instances.lock().expect("instance memo poisoned");
            if let Some(existing) = instances.get(&key) {
                return Ok(existing.clone());
            }
        }

        let class = self
            .classes
            .get(name)
            .ok_or_else(|| ResolveError::UnknownTarget {
                name: name.to_string(),
                referenced_by: None,
            })?;
        if !class.spec.is_supported(arch) {
            return Err(ResolveError::UnsupportedArchitecture {
                target: name.to_string(),
                arch,
                required_by: None,
            });
        }

        let ctx = TargetContext::new(name, arch);
        let resolved = options.resolve_target_options(name, config, &ctx)?;
        let instance = Arc::new(TargetInstance::new(
            class.spec.clone(),
            arch,
            resolved,
            config,
            class.hooks.clone(),
        )?);

        let mut instances = self.instances.lock().expect("instance memo poisoned");
        Ok(instances.entry(key).or_insert(instance).clone())
    }

    /// Expand the requested targets into a dependency-ordered plan.
    ///
    /// Depth-first post-order: dependencies land before dependents, the
    /// first occurrence of a shared dependency wins, cycles and unknown
    /// names fail before anything executes.
    pub fn resolve_plan(
        &self,
        requested: &[String],
        arch: Architecture,
        options: &OptionRegistry,
        config: &ConfigSnapshot,
    ) -> Result<ExecutionPlan> {
        let mut builder = PlanBuilder {
            registry: self,
            options,
            config,
            arch,
            done: HashSet::new(),
            stack: Vec::new(),
            entries: Vec::new(),
        };
        for name in requested {
            builder.visit(name, None)?;
        }
        Ok(ExecutionPlan {
            architecture: arch,
            entries: builder.entries,
        })
    }
}

struct PlanBuilder<'a> {
    registry: &'a TargetRegistry,
    options: &'a OptionRegistry,
    config: &'a ConfigSnapshot,
    arch: Architecture,
    done: HashSet<String>,
    stack: Vec<String>,
    entries: Vec<PlanEntry>,
}

impl PlanBuilder<'_> {
    fn visit(&mut self, name: &str, required_by: Option<&str>) -> Result<()> {
        if self.done.contains(name) {
            return Ok(());
        }
        if let Some(position) = self.stack.iter().position(|n| n == name) {
            let mut cycle: Vec<String> = self.stack[position..].to_vec();
            cycle.push(name.to_string());
            return Err(ResolveError::CyclicDependency { cycle });
        }

        let class =
            self.registry
                .classes
                .get(name)
                .ok_or_else(|| ResolveError::UnknownTarget {
                    name: name.to_string(),
                    referenced_by: required_by.map(str::to_string),
                })?;
        if !class.spec.is_supported(self.arch) {
            // An unsupported dependency edge is fatal, never silently
            // dropped; optional edges belong in the dependency function.
            return Err(ResolveError::UnsupportedArchitecture {
                target: name.to_string(),
                arch: self.arch,
                required_by: required_by.map(str::to_string),
            });
        }

        let instance = self
            .registry
            .instantiate(name, self.arch, self.options, self.config)?;
        let dependencies =
            instance
                .spec
                .dependencies
                .resolve(self.config, &instance.options, self.arch);

        self.stack.push(name.to_string());
        for dep in &dependencies {
            self.visit(dep, Some(name))?;
        }
        self.stack.pop();

        self.done.insert(name.to_string());
        let dep_ids = dependencies
            .iter()
            .map(|d| format!("{d}@{}", self.arch))
            .collect();
        self.entries.push(PlanEntry {
            instance,
            dependencies: dep_ids,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{BuildSystemKind, Dependencies};

    fn simple_class(name: &str, deps: &[&str]) -> TargetClass {
        TargetClass::new(
            TargetSpec::new(name, BuildSystemKind::Make)
                .with_dependencies(Dependencies::named(deps)),
        )
    }

    fn registry(classes: Vec<TargetClass>) -> TargetRegistry {
        let mut reg = TargetRegistry::new();
        for class in classes {
            reg.register_class(class).unwrap();
        }
        reg
    }

    fn resolve(reg: &TargetRegistry, requested: &[&str]) -> Result<ExecutionPlan> {
        let options = OptionRegistry::new();
        let config = ConfigSnapshot::for_testing(std::path::Path::new("/tmp/forge-test"));
        let names: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
        reg.resolve_plan(&names, Architecture::Native, &options, &config)
    }

    #[test]
    fn dependencies_come_before_dependents() {
        let reg = registry(vec![
            simple_class("a", &[]),
            simple_class("b", &["a"]),
            simple_class("c", &["a", "b"]),
        ]);
        let plan = resolve(&reg, &["c"]).unwrap();
        assert_eq!(plan.target_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn shared_dependencies_are_not_duplicated() {
        let reg = registry(vec![
            simple_class("base", &[]),
            simple_class("left", &["base"]),
            simple_class("right", &["base"]),
            simple_class("top", &["left", "right"]),
        ]);
        let plan = resolve(&reg, &["top"]).unwrap();
        assert_eq!(plan.target_names(), vec!["base", "left", "right", "top"]);
    }

    #[test]
    fn cycle_is_fatal_and_names_participants() {
        let reg = registry(vec![simple_class("x", &["y"]), simple_class("y", &["x"])]);
        let err = resolve(&reg, &["x"]).unwrap_err();
        match err {
            ResolveError::CyclicDependency { cycle } => {
                assert!(cycle.contains(&"x".to_string()));
                assert!(cycle.contains(&"y".to_string()));
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn unknown_dependency_names_referrer() {
        let reg = registry(vec![simple_class("app", &["ghost"])]);
        let err = resolve(&reg, &["app"]).unwrap_err();
        match err {
            ResolveError::UnknownTarget {
                name,
                referenced_by,
            } => {
                assert_eq!(name, "ghost");
                assert_eq!(referenced_by.as_deref(), Some("app"));
            }
            other => panic!("expected unknown-target error, got {other}"),
        }
    }

    #[test]
    fn unsupported_dependency_edge_is_fatal() {
        let mut reg = TargetRegistry::new();
        reg.register_class(TargetClass::new(
            TargetSpec::new("native-tool", BuildSystemKind::Make)
                .with_architectures(&[Architecture::Native]),
        ))
        .unwrap();
        reg.register_class(simple_class("lib", &["native-tool"]))
            .unwrap();

        let options = OptionRegistry::new();
        let config = ConfigSnapshot::for_testing(std::path::Path::new("/tmp/forge-test"));
        let err = reg
            .resolve_plan(
                &["lib".to_string()],
                Architecture::Riscv64,
                &options,
                &config,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnsupportedArchitecture {
                ref target,
                arch: Architecture::Riscv64,
                ..
            } if target == "native-tool"
        ));
    }

    #[test]
    fn resolution_is_deterministic() {
        let reg = registry(vec![
            simple_class("a", &[]),
            simple_class("b", &["a"]),
            simple_class("c", &["a", "b"]),
            simple_class("d", &["c", "a"]),
        ]);
        let first = resolve(&reg, &["d", "b"]).unwrap();
        let second = resolve(&reg, &["d", "b"]).unwrap();
        assert_eq!(first.target_names(), second.target_names());
    }

    #[test]
    fn instantiation_is_memoized() {
        let reg = registry(vec![simple_class("a", &[])]);
        let options = OptionRegistry::new();
        let config = ConfigSnapshot::for_testing(std::path::Path::new("/tmp/forge-test"));
        let one = reg
            .instantiate("a", Architecture::Native, &options, &config)
            .unwrap();
        let two = reg
            .instantiate("a", Architecture::Native, &options, &config)
            .unwrap();
        assert!(Arc::ptr_eq(&one, &two));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = registry(vec![simple_class("a", &[])]);
        let err = reg.register_class(simple_class("a", &[])).unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateTarget { .. }));
    }
}

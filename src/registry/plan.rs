//! Execution plans

use std::sync::Arc;

use crate::target::{Architecture, TargetInstance};

/// One scheduled target with the instance ids of its direct dependencies,
/// kept so the engine can trace failure contamination in best-effort mode.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub instance: Arc<TargetInstance>,
    pub dependencies: Vec<String>,
}

/// An ordered, deduplicated sequence of target instances such that every
/// dependency precedes its dependents.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub architecture: Architecture,
    pub entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.instance.name())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter()
    }

    /// Human-readable rendering for `--dry-run`.
    pub fn render(&self) -> String {
        let mut out = format!(
            "execution plan for {} ({} targets):\n",
            self.architecture,
            self.len()
        );
        for (index, entry) in self.entries.iter().enumerate() {
            let deps = if entry.dependencies.is_empty() {
                String::new()
            } else {
                format!("  (needs {})", entry.dependencies.join(", "))
            };
            out.push_str(&format!(
                "  {:>2}. {}{}\n",
                index + 1,
                entry.instance.id(),
                deps
            ));
        }
        out
    }
}

// src/dag/graph.rs

use std::collections::BTreeMap;

use crate::config::model::{GraphConfig, TargetDefinition};

/// Parsed set of target definitions for a project.
///
/// Definitions keep their declaration order and IDs are not unique: every
/// definition whose ID matches a lookup takes part in a run. Needs/Next
/// references are resolved by name at run time, not stored as edges.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    config: GraphConfig,
    variables: BTreeMap<String, String>,
    targets: Vec<TargetDefinition>,
}

impl TaskGraph {
    /// Build a graph without validation.
    ///
    /// `config::validate` is the checked path; this exists for callers that
    /// assemble targets in code (and for tests).
    pub fn new_unchecked(
        config: GraphConfig,
        variables: BTreeMap<String, String>,
        targets: Vec<TargetDefinition>,
    ) -> Self {
        Self {
            config,
            variables,
            targets,
        }
    }

    /// Shorthand for a graph with default config and no variables.
    pub fn from_targets(targets: Vec<TargetDefinition>) -> Self {
        Self::new_unchecked(GraphConfig::default(), BTreeMap::new(), targets)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn targets(&self) -> &[TargetDefinition] {
        &self.targets
    }

    /// All definitions whose ID equals `id` under case folding.
    pub fn find<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a TargetDefinition> + 'a {
        let wanted = id.to_lowercase();
        self.targets
            .iter()
            .filter(move |t| t.id.to_lowercase() == wanted)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).next().is_some()
    }

    /// Distinct IDs in declaration order.
    pub fn ids(&self) -> Vec<&str> {
        let mut folded: Vec<String> = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        for t in &self.targets {
            let key = t.id.to_lowercase();
            if !folded.contains(&key) {
                folded.push(key);
                seen.push(t.id.as_str());
            }
        }
        seen
    }
}

/// Split a selector like `"build, test"` into trimmed, non-empty names.
pub fn split_selector(selector: &str) -> Vec<String> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

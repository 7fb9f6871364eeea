use std::collections::BTreeMap;

use ctxrun::config::{GraphConfig, RawTaskFile, TargetDefinition};
use ctxrun::dag::TaskGraph;

/// Builder for a validated [`TaskGraph`].
pub struct TaskGraphBuilder {
    raw: RawTaskFile,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawTaskFile {
                config: GraphConfig::default(),
                variables: BTreeMap::new(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_target(mut self, target: TargetDefinition) -> Self {
        self.raw.task.push(target);
        self
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.raw.variables.insert(key.to_string(), value.to_string());
        self
    }

    pub fn sequential(mut self, val: bool) -> Self {
        self.raw.config.sequential = val;
        self
    }

    pub fn raw(self) -> RawTaskFile {
        self.raw
    }

    pub fn build(self) -> TaskGraph {
        TaskGraph::try_from(self.raw).expect("Failed to build valid graph from builder")
    }

    /// Skip validation, e.g. to exercise the executor's own cycle guard.
    pub fn build_unchecked(self) -> TaskGraph {
        TaskGraph::new_unchecked(self.raw.config, self.raw.variables, self.raw.task)
    }
}

impl Default for TaskGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a [`TargetDefinition`]. Uses `sh` so tests don't need bash.
pub struct TargetBuilder {
    target: TargetDefinition,
}

impl TargetBuilder {
    pub fn new(id: &str) -> Self {
        let mut target = TargetDefinition {
            id: id.to_string(),
            ..TargetDefinition::default()
        };
        target.options.maincmd = "sh".to_string();
        Self { target }
    }

    pub fn script(mut self, line: &str) -> Self {
        self.target.script.push(line.to_string());
        self
    }

    pub fn needs(mut self, id: &str) -> Self {
        self.target.needs.push(id.to_string());
        self
    }

    pub fn next(mut self, id: &str) -> Self {
        self.target.next.push(id.to_string());
        self
    }

    pub fn requires_file(mut self, path: &str) -> Self {
        self.target.requires.fileexists.push(path.to_string());
        self
    }

    pub fn requires_no_file(mut self, path: &str) -> Self {
        self.target.requires.filenotexists.push(path.to_string());
        self
    }

    pub fn stop_on_contains(mut self, needle: &str) -> Self {
        self.target
            .stopreasons
            .on_output_contains
            .push(needle.to_string());
        self
    }

    pub fn stop_on_less(mut self, limit: usize) -> Self {
        self.target.stopreasons.on_output_count_less = limit;
        self
    }

    pub fn stop_on_more(mut self, limit: usize) -> Self {
        self.target.stopreasons.on_output_count_more = limit;
        self
    }

    pub fn stop_on_error(mut self, val: bool) -> Self {
        self.target.stopreasons.onerror = val;
        self
    }

    pub fn variable(mut self, key: &str, value: &str) -> Self {
        self.target
            .variables
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn maincmd(mut self, shell: &str) -> Self {
        self.target.options.maincmd = shell.to_string();
        self
    }

    pub fn displaycmd(mut self, val: bool) -> Self {
        self.target.options.displaycmd = val;
        self
    }

    pub fn hideout(mut self, val: bool) -> Self {
        self.target.options.hideout = val;
        self
    }

    pub fn format(mut self, fmt: &str) -> Self {
        self.target.options.format = fmt.to_string();
        self
    }

    pub fn build(self) -> TargetDefinition {
        self.target
    }
}

// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::RawTaskFile;
use crate::dag::TaskGraph;
use crate::errors::{CtxError, Result};

impl TryFrom<RawTaskFile> for TaskGraph {
    type Error = CtxError;

    fn try_from(raw: RawTaskFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_task_file(&raw)?;
        Ok(TaskGraph::new_unchecked(raw.config, raw.variables, raw.task))
    }
}

/// Run every check a task file must pass before it becomes a [`TaskGraph`].
pub fn validate_raw_task_file(raw: &RawTaskFile) -> Result<()> {
    ensure_has_targets(raw)?;
    ensure_ids_present(raw)?;
    validate_references(raw)?;
    validate_invocation_graph(raw)?;
    Ok(())
}

fn ensure_has_targets(raw: &RawTaskFile) -> Result<()> {
    if raw.task.is_empty() {
        return Err(CtxError::ConfigError(
            "task file must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn ensure_ids_present(raw: &RawTaskFile) -> Result<()> {
    if let Some(pos) = raw.task.iter().position(|t| t.id.trim().is_empty()) {
        return Err(CtxError::ConfigError(format!(
            "task entry #{} has an empty `id`",
            pos + 1
        )));
    }
    Ok(())
}

fn validate_references(raw: &RawTaskFile) -> Result<()> {
    let known: HashSet<String> = raw.task.iter().map(|t| t.id.to_lowercase()).collect();

    for target in &raw.task {
        for (field, refs) in [("needs", &target.needs), ("next", &target.next)] {
            for name in refs {
                if !known.contains(&name.to_lowercase()) {
                    return Err(CtxError::ConfigError(format!(
                        "task '{}' has unknown target '{}' in `{}`",
                        target.id, name, field
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Reject Needs/Next references that would recurse forever.
///
/// Edge direction: target -> referenced target, for both `needs` and `next`.
/// IDs are folded to lower case so duplicate definitions share one node.
fn validate_invocation_graph(raw: &RawTaskFile) -> Result<()> {
    let folded: Vec<(String, Vec<String>)> = raw
        .task
        .iter()
        .map(|t| {
            let refs = t
                .needs
                .iter()
                .chain(t.next.iter())
                .map(|r| r.to_lowercase())
                .collect();
            (t.id.to_lowercase(), refs)
        })
        .collect();

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for (id, _) in &folded {
        graph.add_node(id.as_str());
    }

    for (id, refs) in &folded {
        for r in refs {
            if r == id {
                return Err(CtxError::DagCycle(format!(
                    "task '{}' references itself in `needs`/`next`",
                    id
                )));
            }
            graph.add_edge(id.as_str(), r.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(CtxError::DagCycle(format!(
            "cycle detected through `needs`/`next` involving task '{}'",
            cycle.node_id()
        ))),
    }
}

// src/exec/stop_reason.rs

//! Per-line stop rule evaluation.

use tracing::debug;

use crate::config::model::StopReasons;

/// A single rule that matched an output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopRule {
    /// Line shorter than `onoutcountLess`.
    CountLess { limit: usize, len: usize },
    /// Line longer than `onoutcountMore`.
    CountMore { limit: usize, len: usize },
    /// Line contains the given `onoutContains` entry.
    Contains(String),
}

/// Every rule of `reasons` that `line` triggers. All categories are checked.
pub fn matching_rules(reasons: &StopReasons, line: &str) -> Vec<StopRule> {
    let mut hits = Vec::new();
    let len = line.len();

    if reasons.on_output_count_less > 0 && len < reasons.on_output_count_less {
        hits.push(StopRule::CountLess {
            limit: reasons.on_output_count_less,
            len,
        });
    }

    if reasons.on_output_count_more > 0 && len > reasons.on_output_count_more {
        hits.push(StopRule::CountMore {
            limit: reasons.on_output_count_more,
            len,
        });
    }

    for needle in &reasons.on_output_contains {
        if !needle.is_empty() && line.contains(needle.as_str()) {
            hits.push(StopRule::Contains(needle.clone()));
        }
    }

    for rule in &hits {
        debug!(?rule, %line, "stop reason matched");
    }

    hits
}

/// Whether `line` should abort the running subprocess.
pub fn should_stop(reasons: &StopReasons, line: &str) -> bool {
    !matching_rules(reasons, line).is_empty()
}

// src/engine/report.rs

/// Summary of one executor run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Target IDs in the order their scripts started.
    pub executed: Vec<String>,
    pub skipped: Vec<SkippedTarget>,
    pub stops: Vec<StopRecord>,
    /// Targets whose script was cut short by `onerror`.
    pub aborted: Vec<String>,
    /// Names that matched no definition.
    pub not_found: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTarget {
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRecord {
    pub target: String,
    pub command: String,
    /// Output line that fired the stop.
    pub line: String,
}

impl RunReport {
    pub fn was_executed(&self, target: &str) -> bool {
        self.executed.iter().any(|t| t.eq_ignore_ascii_case(target))
    }

    pub fn was_skipped(&self, target: &str) -> bool {
        self.skipped
            .iter()
            .any(|s| s.target.eq_ignore_ascii_case(target))
    }

    /// Append another report, keeping its internal order.
    pub fn merge(&mut self, other: RunReport) {
        self.executed.extend(other.executed);
        self.skipped.extend(other.skipped);
        self.stops.extend(other.stops);
        self.aborted.extend(other.aborted);
        self.not_found.extend(other.not_found);
    }
}

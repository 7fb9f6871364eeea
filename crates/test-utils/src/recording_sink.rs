use std::sync::{Arc, Mutex};

use ctxrun::engine::{EventSink, ExecutionEvent};

/// Sink that keeps every event for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ExecutionEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Targets in the order their scripts started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ExecutionEvent::TargetStarted { target } => Some(target),
                _ => None,
            })
            .collect()
    }

    /// Rendered output lines of `target`.
    pub fn output_of(&self, target: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ExecutionEvent::OutputLine { target: t, line } if t == target => Some(line),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ExecutionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::DEFAULT_MAIN_CMD;

/// Task file as read from disk, before validation.
///
/// ```toml
/// [config]
/// sequential = true
///
/// [variables]
/// greeting = "hello"
///
/// [[task]]
/// id = "build"
/// needs = ["prepare"]
/// script = ["echo ${greeting}", "make"]
///
/// [task.stopreasons]
/// onoutContains = ["error:"]
/// ```
///
/// The same structure is accepted as YAML (`task:` is then a sequence).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTaskFile {
    #[serde(default)]
    pub config: GraphConfig,

    /// Graph-wide placeholder values.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Target definitions in declaration order. IDs may repeat.
    #[serde(default)]
    pub task: Vec<TargetDefinition>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// If false, a comma-separated selector runs each selected ID as a
    /// parallel worker instead of one after the other.
    #[serde(default = "default_sequential")]
    pub sequential: bool,
}

fn default_sequential() -> bool {
    true
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            sequential: default_sequential(),
        }
    }
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TargetDefinition {
    pub id: String,

    /// Shell command lines, run one subprocess per line.
    #[serde(default)]
    pub script: Vec<String>,

    #[serde(default)]
    pub options: TargetOptions,

    #[serde(default)]
    pub stopreasons: StopReasons,

    #[serde(default)]
    pub requires: Requires,

    /// Targets run before this one's script.
    #[serde(default)]
    pub needs: Vec<String>,

    /// Targets run after this one's script.
    #[serde(default)]
    pub next: Vec<String>,

    /// Placeholder values published before this target runs.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Accepted for compatibility; listeners are not executed.
    #[serde(default)]
    pub listener: Vec<Listener>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetOptions {
    /// Shell binary invoked as `<maincmd> -c <line>`.
    #[serde(default = "default_main_cmd")]
    pub maincmd: String,

    /// Echo each command line before running it.
    #[serde(default)]
    pub displaycmd: bool,

    /// Do not forward stdout lines to the output sink.
    #[serde(default)]
    pub hideout: bool,

    /// Output line template; the first `%s` is replaced by the line.
    #[serde(default)]
    pub format: String,
}

fn default_main_cmd() -> String {
    DEFAULT_MAIN_CMD.to_string()
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            maincmd: default_main_cmd(),
            displaycmd: false,
            hideout: false,
            format: String::new(),
        }
    }
}

impl TargetOptions {
    /// Render an output line through `format`.
    pub fn render(&self, line: &str) -> String {
        if self.format.is_empty() {
            line.to_string()
        } else if self.format.contains("%s") {
            self.format.replacen("%s", line, 1)
        } else {
            format!("{}{}", self.format, line)
        }
    }
}

/// Per-line rules that abort the current subprocess.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct StopReasons {
    /// Abort the rest of the script when a line exits non-zero.
    #[serde(default)]
    pub onerror: bool,

    #[serde(default, rename = "onoutcountLess")]
    pub on_output_count_less: usize,

    #[serde(default, rename = "onoutcountMore")]
    pub on_output_count_more: usize,

    #[serde(default, rename = "onoutContains")]
    pub on_output_contains: Vec<String>,
}

/// Gate evaluated before anything else of a target runs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Requires {
    #[serde(default)]
    pub fileexists: Vec<String>,

    #[serde(default)]
    pub filenotexists: Vec<String>,
}

impl Requires {
    pub fn is_empty(&self) -> bool {
        self.fileexists.is_empty() && self.filenotexists.is_empty()
    }
}

/// Trigger/action pair. Parsed and kept on the definition only.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Listener {
    #[serde(default)]
    pub trigger: ListenerTrigger,
    #[serde(default)]
    pub action: ListenerAction,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListenerTrigger {
    #[serde(default)]
    pub onerror: bool,
    #[serde(default, rename = "onoutcountLess")]
    pub on_output_count_less: usize,
    #[serde(default, rename = "onoutcountMore")]
    pub on_output_count_more: usize,
    #[serde(default, rename = "onoutContains")]
    pub on_output_contains: Vec<String>,
    #[serde(default)]
    pub now: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListenerAction {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub stopall: bool,
    #[serde(default)]
    pub script: Vec<String>,
}

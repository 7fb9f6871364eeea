// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Skips (unmet `requires`), stop-reason kills and advisory timeouts are not
//! errors; they surface as [`crate::engine::ExecutionEvent`]s and in the
//! [`crate::engine::RunReport`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CtxError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in target graph: {0}")]
    DagCycle(String),

    /// Needs/Next recursion reached a target that is already on the
    /// current call path.
    #[error("Target cycle at runtime: {0}")]
    TargetCycle(String),

    #[error("failed to start process `{cmd}` with `{shell}`: {source}")]
    ProcessStart {
        shell: String,
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("task '{0}' is already running")]
    AlreadyRunning(String),

    #[error("task '{0}' has no body to run")]
    BodyUndefined(String),

    #[error("awaiting '{0}' was cancelled after its deadline elapsed")]
    Cancelled(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CtxError>;

// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::RawTaskFile;
use crate::dag::TaskGraph;
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

/// Syntax of a task file, picked from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Toml,
    /// YAML, which also covers JSON documents.
    Yaml,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yml") | Some("yaml") | Some("json") => SourceFormat::Yaml,
            _ => SourceFormat::Toml,
        }
    }
}

/// Deserialize a task file from a string. No semantic validation.
pub fn parse_str(contents: &str, format: SourceFormat) -> Result<RawTaskFile> {
    let raw = match format {
        SourceFormat::Toml => toml::from_str(contents)?,
        SourceFormat::Yaml => serde_yaml::from_str(contents)?,
    };
    Ok(raw)
}

/// Load a task file from disk without semantic validation.
///
/// Use [`load_and_validate`] to get a [`TaskGraph`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawTaskFile> {
    load_with_fs(&RealFileSystem, path.as_ref())
}

/// Same as [`load_from_path`], reading through the given [`FileSystem`].
pub fn load_with_fs(fs: &dyn FileSystem, path: &Path) -> Result<RawTaskFile> {
    let format = SourceFormat::from_path(path);
    debug!(path = %path.display(), ?format, "loading task file");

    let contents = fs.read_to_string(path)?;
    parse_str(&contents, format)
}

/// Load a task file and validate it into a [`TaskGraph`].
///
/// Checks for:
/// - at least one target, and no empty IDs,
/// - unknown `needs` / `next` references,
/// - cycles through `needs` / `next`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<TaskGraph> {
    let raw = load_from_path(&path)?;
    TaskGraph::try_from(raw)
}

/// Task file looked up when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(".contxt.toml")
}

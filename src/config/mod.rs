// src/config/mod.rs

//! Task file loading and validation.
//!
//! - [`model`]: the serde-backed data model (`[[task]]` entries).
//! - [`loader`]: read TOML or YAML from disk.
//! - [`validate`]: turn a [`RawTaskFile`] into a checked [`crate::dag::TaskGraph`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    SourceFormat, default_config_path, load_and_validate, load_from_path, load_with_fs, parse_str,
};
pub use model::{
    GraphConfig, Listener, RawTaskFile, Requires, StopReasons, TargetDefinition, TargetOptions,
};

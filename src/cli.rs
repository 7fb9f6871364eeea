// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `ctxrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ctxrun",
    version,
    about = "Run project-local targets with needs/next dependencies and stop reasons.",
    long_about = None
)]
pub struct CliArgs {
    /// Targets to run. Each argument may itself be a comma-separated list.
    #[arg(value_name = "TARGET", required_unless_present = "dry_run")]
    pub targets: Vec<String>,

    /// Path to the task file (TOML, or YAML for `.yml`/`.yaml`/`.json`).
    #[arg(long, short = 'c', value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Set a placeholder value, overriding the task file's `variables`.
    ///
    /// May be given multiple times: `--var env=prod --var region=eu`.
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CTXRUN_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the target graph, but run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    if key.trim().is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

impl CliArgs {
    /// All requested targets joined into one comma-separated selector.
    pub fn selector(&self) -> String {
        self.targets.join(",")
    }
}

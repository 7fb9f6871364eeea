// src/placeholders.rs

//! `${name}` substitution registry.
//!
//! One store belongs to one executor. Graph and target `variables` are
//! published into it, and the executor writes the runtime keys below after
//! each script line.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, RwLock};

use regex::{Captures, Regex};
use tracing::trace;

/// Key holding the script line currently being executed.
pub const SCRIPT_LINE_KEY: &str = "RUN.SCRIPT_LINE";

/// `RUN.<id>.LOG.LAST`: last stdout line of the most recent command of `id`.
pub fn log_last_key(id: &str) -> String {
    format!("RUN.{id}.LOG.LAST")
}

/// `RUN.<id>.LOG.HIT`: the output line that fired a stop reason in `id`.
pub fn log_hit_key(id: &str) -> String {
    format!("RUN.{id}.LOG.HIT")
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder regex is valid"))
}

/// Shared string-to-string map. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl PlaceholderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        trace!(%key, %value, "placeholder set");
        self.write().insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn extend(&self, values: &BTreeMap<String, String>) {
        let mut map = self.write();
        for (k, v) in values {
            map.insert(k.clone(), v.clone());
        }
    }

    /// Replace every `${name}` whose `name` is known. Matching is
    /// case-sensitive; unknown placeholders are left as written.
    pub fn substitute(&self, input: &str) -> String {
        if !input.contains("${") {
            return input.to_string();
        }
        let map = self.read();
        placeholder_regex()
            .replace_all(input, |caps: &Captures| match map.get(&caps[1]) {
                Some(v) => v.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Copy of the current contents, sorted by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // Poisoning is ignored: every write is a single insert.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.values.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }
}

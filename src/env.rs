use dirs::home_dir;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

pub const PRODUCT: &str = "zerobrew";
pub const SYSTEM_ROOT: &str = "/opt/zerobrew";

/// Point-in-time copy of the process environment plus the platform facts the
/// path resolver depends on. Everything downstream reads from this, never from
/// `std::env`, so two front-ends given the same snapshot agree on every path.
#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
    os: String,
    system_root: PathBuf,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        let mut vars: BTreeMap<String, String> = env::vars_os()
            .map(|(key, value)| {
                (
                    key.to_string_lossy().to_string(),
                    value.to_string_lossy().to_string(),
                )
            })
            .collect();
        if vars.get("HOME").map_or(true, |v| v.trim().is_empty()) {
            if let Some(home) = home_dir() {
                vars.insert("HOME".to_string(), home.to_string_lossy().to_string());
            }
        }
        Self {
            vars,
            os: env::consts::OS.to_string(),
            system_root: PathBuf::from(SYSTEM_ROOT),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            os: env::consts::OS.to_string(),
            system_root: PathBuf::from(SYSTEM_ROOT),
        }
    }

    pub fn with_os(mut self, os: &str) -> Self {
        self.os = os.to_string();
        self
    }

    pub fn with_system_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_root = path.into();
        self
    }

    pub fn with_var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Non-empty value of `key`; blank values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn system_root(&self) -> &Path {
        &self.system_root
    }

    pub fn home(&self) -> Option<PathBuf> {
        self.get("HOME").map(PathBuf::from)
    }

    pub fn search_path(&self) -> &str {
        self.get("PATH").unwrap_or("")
    }

    /// Looks `name` up on the snapshot's `PATH`, not the live environment.
    pub fn which(&self, name: &str) -> Option<PathBuf> {
        find_in(name, self.search_path())
    }
}

pub fn find_in(name: &str, search_path: &str) -> Option<PathBuf> {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    which::which_in(name, Some(search_path), cwd).ok()
}

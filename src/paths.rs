use crate::env::{EnvSnapshot, PRODUCT};
use crate::error::InstallerError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ROOT_ENV: &str = "ZEROBREW_ROOT";
pub const PREFIX_ENV: &str = "ZEROBREW_PREFIX";
pub const WORKDIR_ENV: &str = "ZEROBREW_DIR";
pub const BIN_ENV: &str = "ZEROBREW_BIN";

/// Directories a run operates on. Resolved once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSet {
    pub root: PathBuf,
    pub prefix: PathBuf,
    pub work_dir: PathBuf,
    pub bin_dir: PathBuf,
}

impl PathSet {
    /// Precedence per field: explicit override, then platform/existence rules,
    /// then defaults under `$HOME`. Only reads `env` and directory existence.
    pub fn resolve(env: &EnvSnapshot) -> Result<Self, InstallerError> {
        let home = env.home();
        let require_home = |field: &str| {
            home.clone().ok_or_else(|| {
                InstallerError::Config(format!(
                    "unable to resolve $HOME for the default {field}; set HOME or {field} explicitly"
                ))
            })
        };

        let root = match env.get(ROOT_ENV) {
            Some(root) => PathBuf::from(root),
            None if env.system_root().is_dir() || env.os() == "macos" => {
                env.system_root().to_path_buf()
            }
            None => match env.get("XDG_DATA_HOME") {
                Some(data_home) => PathBuf::from(data_home).join(PRODUCT),
                None => require_home(ROOT_ENV)?
                    .join(".local")
                    .join("share")
                    .join(PRODUCT),
            },
        };
        let prefix = match env.get(PREFIX_ENV) {
            Some(prefix) => PathBuf::from(prefix),
            None => root.join("prefix"),
        };
        let work_dir = match env.get(WORKDIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => require_home(WORKDIR_ENV)?.join(".zerobrew"),
        };
        let bin_dir = match env.get(BIN_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => require_home(BIN_ENV)?.join(".local").join("bin"),
        };

        Ok(Self {
            root,
            prefix,
            work_dir,
            bin_dir,
        })
    }

    pub fn binary(&self, name: &str) -> PathBuf {
        self.bin_dir.join(name)
    }

    /// Environment handed to the companion binary so it agrees on root/prefix.
    pub fn companion_env(&self) -> Vec<(String, String)> {
        vec![
            (
                ROOT_ENV.to_string(),
                self.root.to_string_lossy().to_string(),
            ),
            (
                PREFIX_ENV.to_string(),
                self.prefix.to_string_lossy().to_string(),
            ),
        ]
    }
}

/// Filesystem presence is the only record of an installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationState {
    pub binaries: Vec<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub prefix: Option<PathBuf>,
}

impl InstallationState {
    pub fn probe(paths: &PathSet, binary_names: &[String]) -> Self {
        let binaries = binary_names
            .iter()
            .map(|name| paths.binary(name))
            .filter(|path| path_exists(path))
            .collect();
        let present = |path: &Path| path.is_dir().then(|| path.to_path_buf());
        let root = present(&paths.root);
        // A prefix nested in root goes away with it; only track one that lives elsewhere.
        let prefix = if paths.prefix.starts_with(&paths.root) {
            None
        } else {
            present(&paths.prefix)
        };
        Self {
            binaries,
            work_dir: present(&paths.work_dir),
            root,
            prefix,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
            && self.work_dir.is_none()
            && self.root.is_none()
            && self.prefix.is_none()
    }

    pub fn has_binary(&self, path: &Path) -> bool {
        self.binaries.iter().any(|candidate| candidate == path)
    }
}

pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// `${CARGO_HOME:-$HOME/.cargo}/bin`, where rustup places the toolchain shims.
pub fn cargo_bin_dir(env: &EnvSnapshot) -> Option<PathBuf> {
    if let Some(cargo_home) = env.get("CARGO_HOME") {
        return Some(PathBuf::from(cargo_home).join("bin"));
    }
    env.home().map(|home| home.join(".cargo").join("bin"))
}

/// `PATH` extended with the cargo bin dir so a freshly bootstrapped toolchain is
/// callable without the user re-sourcing their shell.
pub fn toolchain_search_path(env: &EnvSnapshot) -> String {
    let base = env.search_path();
    match cargo_bin_dir(env) {
        Some(dir) => {
            let dir = dir.to_string_lossy().to_string();
            if base.split(':').any(|entry| entry == dir) {
                base.to_string()
            } else if base.is_empty() {
                dir
            } else {
                format!("{base}:{dir}")
            }
        }
        None => base.to_string(),
    }
}

fn homebrew_pkgconfig_dir(os: &str) -> Option<PathBuf> {
    match os {
        "macos" => Some(PathBuf::from("/opt/homebrew/lib/pkgconfig")),
        "linux" => Some(PathBuf::from("/home/linuxbrew/.linuxbrew/lib/pkgconfig")),
        _ => None,
    }
}

/// Appends existing pkg-config directories to the inherited `PKG_CONFIG_PATH`.
/// Returns `None` when nothing needs to change.
pub fn pkg_config_path(env: &EnvSnapshot, paths: &PathSet) -> Option<String> {
    let mut candidates = vec![paths.prefix.join("lib").join("pkgconfig")];
    candidates.extend(homebrew_pkgconfig_dir(env.os()));

    let mut entries: Vec<String> = env
        .get("PKG_CONFIG_PATH")
        .map(|existing| existing.split(':').map(str::to_string).collect())
        .unwrap_or_default();
    let before = entries.len();
    for dir in candidates {
        if !dir.is_dir() {
            continue;
        }
        let dir = dir.to_string_lossy().to_string();
        if !entries.contains(&dir) {
            entries.push(dir);
        }
    }
    if entries.len() == before {
        return None;
    }
    Some(entries.join(":"))
}

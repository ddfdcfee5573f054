use crate::env::EnvSnapshot;
use crate::error::InstallerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_YAML: &str = include_str!("../config/default.yaml");
pub const CONFIG_ENV: &str = "ZEROBREW_INSTALLER_CONFIG";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    pub version: u32,
    pub source: Source,
    pub build: Build,
    pub toolchain: Toolchain,
    pub preflight: Preflight,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Source {
    pub repo_url: String,
    pub branch: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Build {
    pub primary: String,
    pub binaries: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Toolchain {
    pub command: String,
    pub bootstrap_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Preflight {
    pub commands: Vec<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            source: Source::default(),
            build: Build::default(),
            toolchain: Toolchain::default(),
            preflight: Preflight::default(),
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/lucasgelfond/zerobrew.git".to_string(),
            branch: "main".to_string(),
        }
    }
}

impl Default for Build {
    fn default() -> Self {
        Self {
            primary: "zb".to_string(),
            binaries: vec!["zb".to_string(), "zbx".to_string()],
        }
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            command: "cargo".to_string(),
            bootstrap_url: "https://sh.rustup.rs".to_string(),
        }
    }
}

impl Default for Preflight {
    fn default() -> Self {
        Self {
            commands: vec!["git".to_string()],
        }
    }
}

impl InstallerConfig {
    /// Loads the config named by `ZEROBREW_INSTALLER_CONFIG`, falling back to
    /// `~/.config/zerobrew/installer.yaml`. A missing default file yields the
    /// built-in defaults; a missing explicit file is an error.
    pub fn load(env: &EnvSnapshot) -> Result<Self, InstallerError> {
        if let Some(path) = env.get(CONFIG_ENV) {
            return read_config(Path::new(path));
        }
        let Some(path) = default_config_path(env) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        read_config(&path)
    }
}

fn default_config_path(env: &EnvSnapshot) -> Option<PathBuf> {
    env.home()
        .map(|home| home.join(".config").join("zerobrew").join("installer.yaml"))
}

pub fn read_config_from_str(content: &str) -> Result<InstallerConfig, InstallerError> {
    let cfg: InstallerConfig = serde_yaml::from_str(content)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn read_config(path: &Path) -> Result<InstallerConfig, InstallerError> {
    let content = fs::read_to_string(path).map_err(|err| {
        InstallerError::Config(format!("failed to read {}: {}", path.display(), err))
    })?;
    read_config_from_str(&content)
}

fn validate_config(cfg: &InstallerConfig) -> Result<(), InstallerError> {
    if cfg.version != 1 {
        return Err(InstallerError::Config(format!(
            "unsupported config version {}",
            cfg.version
        )));
    }
    if cfg.source.repo_url.trim().is_empty() {
        return Err(InstallerError::Config(
            "source.repo_url must be non-empty".to_string(),
        ));
    }
    if cfg.source.branch.trim().is_empty() {
        return Err(InstallerError::Config(
            "source.branch must be non-empty".to_string(),
        ));
    }
    if cfg.build.binaries.is_empty() {
        return Err(InstallerError::Config(
            "build.binaries must list at least one binary".to_string(),
        ));
    }
    if !cfg.build.binaries.iter().any(|name| name == &cfg.build.primary) {
        return Err(InstallerError::Config(format!(
            "build.primary `{}` is not listed in build.binaries",
            cfg.build.primary
        )));
    }
    if cfg.toolchain.command.trim().is_empty() {
        return Err(InstallerError::Config(
            "toolchain.command must be non-empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn shipped_template_matches_defaults() {
        let cfg = read_config_from_str(DEFAULT_CONFIG_YAML).expect("template parses");
        assert_eq!(cfg, InstallerConfig::default());
    }

    #[test]
    fn config_unknown_field_errors() {
        let yaml = "version: 1\nsource:\n  repo_url: x\n  mirror: y\n";
        assert!(read_config_from_str(yaml).is_err());
    }

    #[test]
    fn config_defaults_apply() {
        let cfg = read_config_from_str("version: 1").expect("config");
        assert_eq!(cfg.build.binaries, vec!["zb", "zbx"]);
        assert_eq!(cfg.source.branch, "main");
    }

    #[test]
    fn config_rejects_primary_outside_binaries() {
        let yaml = "version: 1\nbuild:\n  primary: zq\n";
        let err = read_config_from_str(yaml).expect_err("primary must be built");
        assert!(err.to_string().contains("build.primary"));
    }

    #[test]
    fn config_rejects_unknown_version() {
        let err = read_config_from_str("version: 3").expect_err("version");
        assert!(err.to_string().contains("unsupported config version 3"));
    }

    #[test]
    fn load_falls_back_to_defaults_without_file() {
        let dir = tempdir().unwrap();
        let env = EnvSnapshot::from_pairs([("HOME", dir.path().to_str().unwrap())]);
        assert_eq!(InstallerConfig::load(&env).unwrap(), InstallerConfig::default());
    }

    #[test]
    fn load_reads_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("installer.yaml");
        fs::write(&path, "version: 1\nsource:\n  branch: next\n").unwrap();
        let env = EnvSnapshot::from_pairs([(CONFIG_ENV, path.to_str().unwrap())]);
        let cfg = InstallerConfig::load(&env).unwrap();
        assert_eq!(cfg.source.branch, "next");
    }

    #[test]
    fn load_explicit_missing_file_is_error() {
        let env = EnvSnapshot::from_pairs([(CONFIG_ENV, "/nonexistent/installer.yaml")]);
        assert!(InstallerConfig::load(&env).is_err());
    }
}

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("{command} is required but was not found on PATH")]
    PreflightMissing { command: String, hint: String },
    #[error("{operation} failed: {message}")]
    NetworkOrPermission {
        operation: String,
        message: String,
        hint: Option<String>,
    },
    #[error("rust toolchain unavailable: {message}")]
    Toolchain { message: String, hint: String },
    #[error("build failed: {message}")]
    BuildFailure { message: String, hint: String },
    #[error("could not locate built binary `{binary}` in the build output")]
    ArtifactNotFound { binary: String },
    #[error("Binary not found: {}", path.display())]
    BinaryNotFound { path: PathBuf },
    #[error("the supplied binaries must include `{name}`")]
    MissingPrimary { name: String },
    #[error("failed to install {}: {message}", path.display())]
    InstallFailure { path: PathBuf, message: String },
    #[error("installation succeeded but {} does not execute: {message}", path.display())]
    VerificationFailure { path: PathBuf, message: String },
    #[error("`{} init` failed: {message}", path.display())]
    InitFailure { path: PathBuf, message: String },
    #[error("no privilege escalation command found (tried {tried})")]
    NoPrivilegeEscalation { tried: String },
    #[error("interrupted")]
    Interrupted,
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl InstallerError {
    pub fn hint(&self) -> Option<&str> {
        match self {
            InstallerError::PreflightMissing { hint, .. }
            | InstallerError::Toolchain { hint, .. }
            | InstallerError::BuildFailure { hint, .. } => Some(hint),
            InstallerError::NetworkOrPermission { hint, .. } => hint.as_deref(),
            InstallerError::ArtifactNotFound { .. } => {
                Some("check that the build configuration still produces this binary")
            }
            InstallerError::VerificationFailure { .. } => {
                Some("the binary was copied but cannot run on this system; rebuild from a clean clone")
            }
            InstallerError::NoPrivilegeEscalation { .. } => {
                Some("install sudo or doas, or remove the directory manually")
            }
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            InstallerError::Interrupted => 130,
            _ => 1,
        }
    }
}

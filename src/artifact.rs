use crate::error::InstallerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const ARTIFACT_REASON: &str = "compiler-artifact";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifact {
    pub binary_name: String,
    pub executable_path: PathBuf,
}

/// The subset of a cargo JSON message the locator cares about.
#[derive(Debug, Deserialize)]
struct BuildMessage {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    executable: Option<String>,
    #[serde(default)]
    target: Option<BuildTarget>,
}

#[derive(Debug, Deserialize)]
struct BuildTarget {
    #[serde(default)]
    name: Option<String>,
}

fn artifact_path(line: &str, binary_name: &str) -> Option<PathBuf> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let message: BuildMessage = serde_json::from_str(line).ok()?;
    if message.reason.as_deref() != Some(ARTIFACT_REASON) {
        return None;
    }
    let name = message.target.and_then(|target| target.name)?;
    if name != binary_name {
        return None;
    }
    message
        .executable
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Finds the executable cargo produced for `binary_name` in a
/// `--message-format=json` log. The log is read one line at a time and the
/// last matching artifact wins, since a later entry reflects a rebuild.
pub fn locate(build_log: &str, binary_name: &str) -> Result<BuildArtifact, InstallerError> {
    let executable_path = build_log
        .lines()
        .filter_map(|line| artifact_path(line, binary_name))
        .last()
        .filter(|path| path.is_file())
        .ok_or_else(|| InstallerError::ArtifactNotFound {
            binary: binary_name.to_string(),
        })?;
    Ok(BuildArtifact {
        binary_name: binary_name.to_string(),
        executable_path,
    })
}

use crate::env::EnvSnapshot;
use crate::error::InstallerError;
use crate::runner::CommandSpec;
use std::path::{Path, PathBuf};

/// Escalation commands in priority order.
pub const CANDIDATES: [&str; 2] = ["sudo", "doas"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeCommand {
    pub name: String,
    pub path: PathBuf,
}

impl PrivilegeCommand {
    /// `<cmd> rm -rf <target>`; no elevation flags are added, any password
    /// prompt is left to the escalation tool.
    pub fn remove_all(&self, target: &Path) -> CommandSpec {
        CommandSpec::new(self.path.to_string_lossy())
            .args(["rm", "-rf"])
            .arg(target.to_string_lossy())
    }
}

pub fn select(env: &EnvSnapshot) -> Result<PrivilegeCommand, InstallerError> {
    CANDIDATES
        .iter()
        .find_map(|name| {
            env.which(name).map(|path| PrivilegeCommand {
                name: name.to_string(),
                path,
            })
        })
        .ok_or_else(|| InstallerError::NoPrivilegeEscalation {
            tried: CANDIDATES.join(", "),
        })
}

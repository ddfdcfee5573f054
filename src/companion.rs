use crate::error::InstallerError;
use crate::paths::PathSet;
use crate::runner::{CommandRunner, CommandSpec};
use std::path::PathBuf;

/// The installed `zb` binary, invoked with root/prefix exported so it agrees
/// with the paths this run resolved.
pub struct Companion<'a> {
    runner: &'a dyn CommandRunner,
    binary: PathBuf,
    env: Vec<(String, String)>,
}

impl<'a> Companion<'a> {
    pub fn new(runner: &'a dyn CommandRunner, paths: &PathSet, name: &str) -> Self {
        Self {
            runner,
            binary: paths.binary(name),
            env: paths.companion_env(),
        }
    }

    fn command(&self) -> CommandSpec {
        self.env.iter().fold(
            CommandSpec::new(self.binary.to_string_lossy()),
            |spec, (key, value)| spec.env(key.as_str(), value.as_str()),
        )
    }

    /// Runs `--version` and returns the trimmed first line of its output.
    pub fn version(&self) -> Result<String, InstallerError> {
        let spec = self.command().arg("--version");
        let output = self
            .runner
            .run(&spec)
            .map_err(|err| InstallerError::VerificationFailure {
                path: self.binary.clone(),
                message: err.to_string(),
            })?;
        if !output.success() {
            return Err(InstallerError::VerificationFailure {
                path: self.binary.clone(),
                message: exit_message(&spec, output.status_code, &output.stderr_tail(3)),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    /// `zb init [--no-modify-path]` with output discarded.
    pub fn init(&self, no_modify_path: bool) -> Result<(), InstallerError> {
        let mut spec = self.command().arg("init").quiet();
        if no_modify_path {
            spec = spec.arg("--no-modify-path");
        }
        let output = self
            .runner
            .run(&spec)
            .map_err(|err| InstallerError::InitFailure {
                path: self.binary.clone(),
                message: err.to_string(),
            })?;
        if !output.success() {
            return Err(InstallerError::InitFailure {
                path: self.binary.clone(),
                message: format!("exited with status {}", output.status_code),
            });
        }
        Ok(())
    }
}

pub(crate) fn exit_message(spec: &CommandSpec, status_code: i32, stderr_tail: &str) -> String {
    if stderr_tail.is_empty() {
        format!("`{}` exited with status {}", spec.render(), status_code)
    } else {
        format!(
            "`{}` exited with status {}:\n{}",
            spec.render(),
            status_code,
            stderr_tail
        )
    }
}

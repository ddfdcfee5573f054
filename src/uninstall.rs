use crate::companion::Companion;
use crate::config_block::{self, CleanOutcome};
use crate::context::Context;
use crate::error::InstallerError;
use crate::paths::{path_exists, InstallationState};
use crate::privilege::{self, PrivilegeCommand};
use crate::prompt::Confirm;
use crate::runner::Capture;
use crate::shell_config::{ManagedConfigFile, ShellConfigRegistry};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Remove binaries, working clone, shared root and managed config blocks.
    Uninstall,
    /// Wipe the shared root and let `zb init` recreate it; binaries stay.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NothingToDo,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigCleanup {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CleanOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UninstallReport {
    pub mode: Mode,
    pub outcome: Outcome,
    pub planned: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub configs: Vec<ConfigCleanup>,
    pub warnings: Vec<String>,
    pub reinitialized: bool,
}

impl UninstallReport {
    fn new(mode: Mode, outcome: Outcome) -> Self {
        Self {
            mode,
            outcome,
            planned: Vec::new(),
            removed: Vec::new(),
            configs: Vec::new(),
            warnings: Vec::new(),
            reinitialized: false,
        }
    }
}

pub struct Uninstaller<'a> {
    ctx: &'a Context,
    confirm: &'a dyn Confirm,
}

impl<'a> Uninstaller<'a> {
    pub fn new(ctx: &'a Context, confirm: &'a dyn Confirm) -> Self {
        Self { ctx, confirm }
    }

    pub fn run(&self, mode: Mode) -> Result<UninstallReport, InstallerError> {
        let paths = &self.ctx.paths;
        let ui = &self.ctx.ui;
        let state = InstallationState::probe(paths, &self.ctx.config.build.binaries);
        let managed = ShellConfigRegistry::from_env(&self.ctx.env).scan();

        let shared: Vec<PathBuf> = state.root.iter().chain(state.prefix.iter()).cloned().collect();
        let planned: Vec<PathBuf> = match mode {
            Mode::Uninstall => {
                if state.is_empty() && managed.is_empty() {
                    ui.info("Nothing to uninstall");
                    return Ok(UninstallReport::new(mode, Outcome::NothingToDo));
                }
                state
                    .binaries
                    .iter()
                    .chain(state.work_dir.iter())
                    .chain(shared.iter())
                    .cloned()
                    .collect()
            }
            Mode::Reset => {
                if shared.is_empty() {
                    ui.info("Nothing to reset");
                    return Ok(UninstallReport::new(mode, Outcome::NothingToDo));
                }
                let companion = paths.binary(self.ctx.primary_binary());
                if !state.has_binary(&companion) {
                    return Err(InstallerError::BinaryNotFound { path: companion });
                }
                shared.clone()
            }
        };

        // A missing escalation tool is fatal before anything is asked or touched.
        let escalation = if shared.is_empty() {
            None
        } else {
            Some(privilege::select(&self.ctx.env)?)
        };

        self.print_manifest(mode, &planned, &managed);
        let mut report = UninstallReport::new(mode, Outcome::Completed);
        report.planned = planned.clone();
        if !self.confirm.confirm("Continue?")? {
            ui.info("Aborted.");
            report.outcome = Outcome::Cancelled;
            return Ok(report);
        }
        self.ctx.tasks.checkpoint()?;

        for file in &managed {
            report.configs.push(self.clean_config(file, &mut report.warnings));
        }
        self.ctx.tasks.checkpoint()?;

        if mode == Mode::Uninstall {
            let local = planned.iter().filter(|path| !shared.contains(*path));
            for path in local {
                match remove_path(path) {
                    Ok(true) => report.removed.push(path.clone()),
                    Ok(false) => {}
                    Err(err) => self.warn(
                        &mut report.warnings,
                        format!("failed to remove {}: {err}", path.display()),
                    ),
                }
            }
            self.ctx.tasks.checkpoint()?;
        }

        if let Some(command) = &escalation {
            for dir in &shared {
                let removed = match mode {
                    Mode::Uninstall => {
                        ui.step(&format!("Removing {}", dir.display()));
                        self.remove_privileged(command, dir, &mut report.warnings)
                    }
                    Mode::Reset => {
                        ui.step(&format!("Clearing {}", dir.display()));
                        match clear_contents(dir) {
                            Ok(()) => true,
                            Err(err) => {
                                tracing::debug!(path = %dir.display(), error = %err, "escalating");
                                self.remove_privileged(command, dir, &mut report.warnings)
                            }
                        }
                    }
                };
                if removed {
                    report.removed.push(dir.clone());
                }
                self.ctx.tasks.checkpoint()?;
            }
        }

        match mode {
            Mode::Uninstall => ui.success("zerobrew uninstalled"),
            Mode::Reset => {
                ui.step("Re-initializing zerobrew");
                Companion::new(
                    self.ctx.runner.as_ref(),
                    paths,
                    self.ctx.primary_binary(),
                )
                .init(false)?;
                self.ctx.tasks.checkpoint()?;
                report.reinitialized = true;
                ui.success("Reset complete. Ready for cold install.");
            }
        }
        Ok(report)
    }

    fn print_manifest(&self, mode: Mode, planned: &[PathBuf], managed: &[ManagedConfigFile]) {
        let ui = &self.ctx.ui;
        let verb = match mode {
            Mode::Uninstall => "This will remove",
            Mode::Reset => "This will delete all zerobrew data at",
        };
        if !planned.is_empty() {
            ui.warn(&format!("{verb}:"));
            planned.iter().for_each(|path| ui.item(path));
        }
        if !managed.is_empty() {
            ui.info("The zerobrew block will be removed from:");
            managed.iter().for_each(|file| ui.item(&file.path));
        }
    }

    fn warn(&self, warnings: &mut Vec<String>, message: String) {
        tracing::debug!(warning = %message, "recorded");
        self.ctx.ui.warn(&message);
        warnings.push(message);
    }

    fn clean_config(&self, file: &ManagedConfigFile, warnings: &mut Vec<String>) -> ConfigCleanup {
        let mut cleanup = ConfigCleanup {
            path: file.path.clone(),
            outcome: None,
            error: None,
        };
        match config_block::clean(&file.path) {
            Ok(outcome) => {
                match &outcome {
                    CleanOutcome::Cleaned { .. } => {
                        self.ctx.ui.detail(&format!("cleaned {}", file.path.display()))
                    }
                    CleanOutcome::Malformed { marker_line } => self.warn(
                        warnings,
                        format!(
                            "{}: zerobrew block at line {marker_line} has no closing `}}`; edit it by hand",
                            file.path.display()
                        ),
                    ),
                    CleanOutcome::Unreadable { reason } => self.warn(
                        warnings,
                        format!("could not read {}: {reason}", file.path.display()),
                    ),
                    CleanOutcome::Unchanged => {}
                }
                cleanup.outcome = Some(outcome);
            }
            Err(err) => {
                self.warn(warnings, format!("failed to update {}: {err}", file.path.display()));
                cleanup.error = Some(err.to_string());
            }
        }
        cleanup
    }

    /// `<escalation> rm -rf <dir>`; a non-zero exit is recorded as a warning.
    fn remove_privileged(
        &self,
        command: &PrivilegeCommand,
        dir: &Path,
        warnings: &mut Vec<String>,
    ) -> bool {
        let spec = command
            .remove_all(dir)
            .stdout(Capture::Inherit)
            .stderr(Capture::Inherit);
        match self.ctx.runner.run(&spec) {
            Ok(output) if output.success() => true,
            Ok(output) => {
                self.warn(
                    warnings,
                    format!("`{}` exited with status {}", spec.render(), output.status_code),
                );
                false
            }
            Err(err) => {
                self.warn(warnings, format!("failed to run `{}`: {err}", spec.render()));
                false
            }
        }
    }
}

fn remove_path(path: &Path) -> io::Result<bool> {
    if !path_exists(path) {
        return Ok(false);
    }
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

/// Empties `dir` but keeps it, so re-initialization can reuse a directory
/// that only an escalated command could create.
fn clear_contents(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        remove_path(&entry?.path())?;
    }
    Ok(())
}

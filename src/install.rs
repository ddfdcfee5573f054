//! Fetch, build and install the companion binaries.
//!
//! The happy path is preflight, toolchain, source, build, locate, install,
//! verify, init. Every step either succeeds or aborts the run with a single
//! [`InstallerError`]; there is no partial-success state.

use crate::artifact::{self, BuildArtifact};
use crate::companion::{exit_message, Companion};
use crate::context::Context;
use crate::env::find_in;
use crate::error::InstallerError;
use crate::fetch::Download;
use crate::paths::{self, InstallationState, PathSet};
use crate::runner::{Capture, CommandOutput, CommandSpec};
use crate::task::ScratchFile;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TOOLCHAIN_HINT: &str = "install Rust manually from https://rustup.rs and re-run the installer";

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    pub no_modify_path: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAction {
    Cloned,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledBinary {
    pub name: String,
    pub path: PathBuf,
    pub source: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub toolchain: PathBuf,
    pub toolchain_bootstrapped: bool,
    pub source: SourceAction,
    pub artifacts: Vec<BuildArtifact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub paths: PathSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildReport>,
    pub installed: Vec<InstalledBinary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub modify_path: bool,
}

pub struct Installer<'a> {
    ctx: &'a Context,
    downloader: Arc<dyn Download>,
}

impl<'a> Installer<'a> {
    pub fn new(ctx: &'a Context, downloader: Arc<dyn Download>) -> Self {
        Self { ctx, downloader }
    }

    pub fn run(&self, options: InstallOptions) -> Result<InstallReport, InstallerError> {
        let build = self.build()?;
        let sources: Vec<(String, PathBuf)> = build
            .artifacts
            .iter()
            .map(|artifact| (artifact.binary_name.clone(), artifact.executable_path.clone()))
            .collect();
        let installed = self.install_binaries(&sources)?;
        self.ctx.tasks.checkpoint()?;
        let version = self.verify()?;
        self.ctx.tasks.checkpoint()?;
        self.initialize(options)?;
        self.ctx.tasks.checkpoint()?;
        self.finish();
        Ok(InstallReport {
            paths: self.ctx.paths.clone(),
            build: Some(build),
            installed,
            version: Some(version),
            modify_path: !options.no_modify_path,
        })
    }

    /// Installs caller-supplied executables, skipping build and verification.
    /// Every path is checked before anything is created.
    pub fn run_with_binaries(
        &self,
        binaries: &[PathBuf],
        options: InstallOptions,
    ) -> Result<InstallReport, InstallerError> {
        let mut sources = Vec::with_capacity(binaries.len());
        for path in binaries {
            let name = path
                .file_name()
                .filter(|_| path.is_file())
                .map(|name| name.to_string_lossy().to_string())
                .ok_or_else(|| InstallerError::BinaryNotFound { path: path.clone() })?;
            sources.push((name, path.clone()));
        }
        let primary = self.ctx.primary_binary();
        if !sources.iter().any(|(name, _)| name == primary) {
            return Err(InstallerError::MissingPrimary {
                name: primary.to_string(),
            });
        }

        let installed = self.install_binaries(&sources)?;
        self.ctx.tasks.checkpoint()?;
        self.initialize(options)?;
        self.ctx.tasks.checkpoint()?;
        self.finish();
        Ok(InstallReport {
            paths: self.ctx.paths.clone(),
            build: None,
            installed,
            version: None,
            modify_path: !options.no_modify_path,
        })
    }

    /// Everything up to and including artifact location; nothing is installed.
    pub fn build(&self) -> Result<BuildReport, InstallerError> {
        let tasks = &self.ctx.tasks;
        self.preflight()?;
        let (toolchain, toolchain_bootstrapped) = self.ensure_toolchain()?;
        tasks.checkpoint()?;
        let source = self.acquire_source()?;
        tasks.checkpoint()?;
        let log = self.compile(&toolchain)?;
        tasks.checkpoint()?;
        let artifacts = self.resolve_artifacts(&log)?;
        Ok(BuildReport {
            toolchain,
            toolchain_bootstrapped,
            source,
            artifacts,
        })
    }

    fn preflight(&self) -> Result<(), InstallerError> {
        for command in &self.ctx.config.preflight.commands {
            match self.ctx.env.which(command) {
                Some(path) => tracing::debug!(command = %command, path = %path.display(), "preflight ok"),
                None => {
                    return Err(InstallerError::PreflightMissing {
                        command: command.clone(),
                        hint: format!("install {command} with your system package manager and re-run"),
                    })
                }
            }
        }
        Ok(())
    }

    fn locate_toolchain(&self) -> Option<PathBuf> {
        find_in(
            &self.ctx.config.toolchain.command,
            &paths::toolchain_search_path(&self.ctx.env),
        )
    }

    fn ensure_toolchain(&self) -> Result<(PathBuf, bool), InstallerError> {
        if let Some(found) = self.locate_toolchain() {
            tracing::debug!(toolchain = %found.display(), "toolchain found");
            return Ok((found, false));
        }

        self.ctx.ui.step("Installing the Rust toolchain");
        let scratch = ScratchFile::new("rustup-init-")?;
        let script = scratch.path_buf();
        let url = self.ctx.config.toolchain.bootstrap_url.clone();
        let spec = CommandSpec::new("sh")
            .arg(script.to_string_lossy())
            .args(["-y", "--no-modify-path"]);

        let runner = Arc::clone(&self.ctx.runner);
        let downloader = Arc::clone(&self.downloader);
        let task_spec = spec.clone();
        let output = self
            .ctx
            .tasks
            .run(
                "Downloading and running rustup",
                move || -> Result<CommandOutput, InstallerError> {
                    downloader.download(&url, &script)?;
                    Ok(runner.run(&task_spec)?)
                },
            )?
            .map_err(|err| match err {
                InstallerError::Http(err) => InstallerError::NetworkOrPermission {
                    operation: "downloading the Rust toolchain installer".to_string(),
                    message: err.to_string(),
                    hint: Some("check your network connection and retry".to_string()),
                },
                err @ InstallerError::NetworkOrPermission { .. } => err,
                other => InstallerError::Toolchain {
                    message: other.to_string(),
                    hint: TOOLCHAIN_HINT.to_string(),
                },
            })?;
        drop(scratch);
        if !output.success() {
            return Err(InstallerError::Toolchain {
                message: exit_message(&spec, output.status_code, &output.stderr_tail(5)),
                hint: TOOLCHAIN_HINT.to_string(),
            });
        }

        let found = self.locate_toolchain().ok_or_else(|| {
            let location = paths::cargo_bin_dir(&self.ctx.env)
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "$CARGO_HOME/bin".to_string());
            InstallerError::Toolchain {
                message: format!(
                    "`{}` is still not available after bootstrapping",
                    self.ctx.config.toolchain.command
                ),
                hint: format!("make sure {location} is on PATH and re-run"),
            }
        })?;
        self.ctx.ui.success("Rust toolchain installed");
        Ok((found, true))
    }

    fn background(&self, message: &str, spec: CommandSpec) -> Result<io::Result<CommandOutput>, InstallerError> {
        let runner = Arc::clone(&self.ctx.runner);
        self.ctx.tasks.run(message, move || runner.run(&spec))
    }

    fn run_git(&self, message: &str, spec: CommandSpec, operation: &str, hint: &str) -> Result<(), InstallerError> {
        let failure = |message: String| InstallerError::NetworkOrPermission {
            operation: operation.to_string(),
            message,
            hint: Some(hint.to_string()),
        };
        let output = self
            .background(message, spec.clone())?
            .map_err(|err| failure(format!("failed to start `{}`: {err}", spec.render())))?;
        if !output.success() {
            return Err(failure(exit_message(
                &spec,
                output.status_code,
                &output.stderr_tail(5),
            )));
        }
        Ok(())
    }

    fn acquire_source(&self) -> Result<SourceAction, InstallerError> {
        let source = &self.ctx.config.source;
        let work_dir = &self.ctx.paths.work_dir;
        let state = InstallationState::probe(&self.ctx.paths, &self.ctx.config.build.binaries);

        if state.work_dir.is_some() {
            self.ctx.ui.step("Updating zerobrew source");
            let hint = format!("remove {} to start from a fresh clone", work_dir.display());
            let fetch = CommandSpec::new("git")
                .cwd(work_dir)
                .args(["fetch", "--depth", "1", "origin"])
                .arg(&source.branch);
            self.run_git("Fetching latest changes", fetch, "fetching updates", &hint)?;
            let reset = CommandSpec::new("git")
                .cwd(work_dir)
                .args(["reset", "--hard"])
                .arg(format!("origin/{}", source.branch));
            self.run_git("Resetting working tree", reset, "resetting the source checkout", &hint)?;
            return Ok(SourceAction::Updated);
        }

        self.ctx.ui.step("Cloning zerobrew source");
        if let Some(parent) = work_dir.parent() {
            fs::create_dir_all(parent).map_err(|err| InstallerError::NetworkOrPermission {
                operation: format!("creating {}", parent.display()),
                message: err.to_string(),
                hint: None,
            })?;
        }
        let clone = CommandSpec::new("git")
            .args(["clone", "--depth", "1", "--branch"])
            .arg(&source.branch)
            .arg(&source.repo_url)
            .arg(work_dir.to_string_lossy());
        self.run_git(
            "Cloning repository",
            clone,
            &format!("cloning {}", source.repo_url),
            "check your network connection and that the repository is reachable",
        )?;
        Ok(SourceAction::Cloned)
    }

    fn compile(&self, toolchain: &Path) -> Result<String, InstallerError> {
        let paths = &self.ctx.paths;
        let hint = format!(
            "run `cargo build --release` in {} to see the full build output",
            paths.work_dir.display()
        );
        self.ctx.ui.step("Building zerobrew (this can take a few minutes)");

        let scratch = ScratchFile::new("zerobrew-build-")?;
        let mut spec = CommandSpec::new(toolchain.to_string_lossy()).args(["build", "--release"]);
        for name in &self.ctx.config.build.binaries {
            spec = spec.arg("--bin").arg(name);
        }
        spec = spec
            .arg("--message-format=json-render-diagnostics")
            .cwd(&paths.work_dir)
            .env("PATH", paths::toolchain_search_path(&self.ctx.env))
            .stdout(Capture::File(scratch.path_buf()));
        if let Some(pkg_config_path) = paths::pkg_config_path(&self.ctx.env, paths) {
            spec = spec.env("PKG_CONFIG_PATH", pkg_config_path);
        }

        let output = self
            .background("Compiling", spec.clone())?
            .map_err(|err| InstallerError::BuildFailure {
                message: format!("failed to start `{}`: {err}", spec.render()),
                hint: hint.clone(),
            })?;
        if !output.success() {
            return Err(InstallerError::BuildFailure {
                message: exit_message(&spec, output.status_code, &output.stderr_tail(10)),
                hint,
            });
        }
        let log = fs::read_to_string(scratch.path())?;
        tracing::debug!(bytes = log.len(), "build log captured");
        Ok(log)
    }

    fn resolve_artifacts(&self, log: &str) -> Result<Vec<BuildArtifact>, InstallerError> {
        self.ctx
            .config
            .build
            .binaries
            .iter()
            .map(|name| artifact::locate(log, name))
            .collect()
    }

    fn install_binaries(&self, sources: &[(String, PathBuf)]) -> Result<Vec<InstalledBinary>, InstallerError> {
        let paths = &self.ctx.paths;
        self.ctx.ui.step(&format!("Installing to {}", paths.bin_dir.display()));
        fs::create_dir_all(&paths.bin_dir).map_err(|err| InstallerError::InstallFailure {
            path: paths.bin_dir.clone(),
            message: err.to_string(),
        })?;

        let mut installed = Vec::with_capacity(sources.len());
        for (name, source) in sources {
            if !source.is_file() {
                return Err(InstallerError::BinaryNotFound {
                    path: source.clone(),
                });
            }
            let dest = paths.binary(name);
            install_executable(source, &dest).map_err(|err| InstallerError::InstallFailure {
                path: dest.clone(),
                message: err.to_string(),
            })?;
            self.ctx.ui.detail(&format!("{name} -> {}", dest.display()));
            tracing::debug!(binary = %name, dest = %dest.display(), "installed");
            installed.push(InstalledBinary {
                name: name.clone(),
                path: dest,
                source: source.clone(),
            });
        }
        Ok(installed)
    }

    fn companion(&self) -> Companion<'_> {
        Companion::new(
            self.ctx.runner.as_ref(),
            &self.ctx.paths,
            self.ctx.primary_binary(),
        )
    }

    fn verify(&self) -> Result<String, InstallerError> {
        self.ctx.ui.step("Verifying installation");
        let version = self.companion().version()?;
        if !version.is_empty() {
            self.ctx.ui.detail(&version);
        }
        Ok(version)
    }

    fn initialize(&self, options: InstallOptions) -> Result<(), InstallerError> {
        self.ctx.ui.step("Initializing zerobrew");
        self.companion().init(options.no_modify_path)
    }

    fn finish(&self) {
        let ui = &self.ctx.ui;
        ui.success("zerobrew installed successfully");
        let bin_dir = &self.ctx.paths.bin_dir;
        let on_path = self
            .ctx
            .env
            .search_path()
            .split(':')
            .any(|entry| Path::new(entry) == bin_dir.as_path());
        if !on_path {
            ui.detail(&format!(
                "{} is not on PATH; open a new shell or add it manually",
                bin_dir.display()
            ));
        }
    }
}

/// Copies through a sibling temp file so a running binary is replaced, not
/// rewritten in place.
fn install_executable(source: &Path, dest: &Path) -> io::Result<()> {
    let file_name = dest
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = dest.with_file_name(format!(".{file_name}.zerobrew-tmp"));
    let result = fs::copy(source, &tmp)
        .and_then(|_| set_executable(&tmp))
        .and_then(|_| fs::rename(&tmp, dest));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

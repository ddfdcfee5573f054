use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Where a child stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Inherit,
    Null,
    Piped,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub stdout: Capture,
    pub stderr: Capture,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            stdout: Capture::Piped,
            stderr: Capture::Piped,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stdout(mut self, capture: Capture) -> Self {
        self.stdout = capture;
        self
    }

    pub fn stderr(mut self, capture: Capture) -> Self {
        self.stderr = capture;
        self
    }

    pub fn quiet(self) -> Self {
        self.stdout(Capture::Null).stderr(Capture::Null)
    }

    /// Shell-like rendering for error messages and hints.
    pub fn render(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| {
                if part.is_empty() || part.chars().any(char::is_whitespace) {
                    format!("{part:?}")
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    pub fn stderr_tail(&self, lines: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Seam between the orchestrators and the operating system's process table.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, io::Error>;
}

pub struct SystemRunner;

fn stdio_for(capture: &Capture) -> Result<Stdio, io::Error> {
    Ok(match capture {
        Capture::Inherit => Stdio::inherit(),
        Capture::Null => Stdio::null(),
        Capture::Piped => Stdio::piped(),
        Capture::File(path) => Stdio::from(File::create(path)?),
    })
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, io::Error> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.stdout(stdio_for(&spec.stdout)?);
        cmd.stderr(stdio_for(&spec.stderr)?);
        tracing::debug!(command = %spec.render(), "spawning");
        let output = cmd.output()?;
        let status_code = output
            .status
            .code()
            .unwrap_or(if output.status.success() { 0 } else { 1 });
        Ok(CommandOutput {
            status_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_quotes_whitespace() {
        let spec = CommandSpec::new("git").args(["clone", "/tmp/my repo"]);
        assert_eq!(spec.render(), "git clone \"/tmp/my repo\"");
    }

    #[test]
    fn stderr_tail_keeps_last_non_blank_lines() {
        let out = CommandOutput {
            status_code: 1,
            stdout: Vec::new(),
            stderr: b"one\n\ntwo\nthree\n".to_vec(),
        };
        assert_eq!(out.stderr_tail(2), "two\nthree");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_redirects_stdout_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo hello; echo oops >&2; exit 3"])
            .stdout(Capture::File(log.clone()));
        let out = SystemRunner.run(&spec).unwrap();
        assert_eq!(out.status_code, 3);
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "hello\n");
        assert_eq!(out.stderr_tail(1), "oops");
    }
}

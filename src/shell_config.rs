use crate::env::EnvSnapshot;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Opening line of the block the companion binary writes into shell startup files.
pub const MARKER: &str = "# zerobrew";
/// Helper function the companion injects; calls to it may appear outside the block.
pub const FUNCTION_TOKEN: &str = "_zb_path_append";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedConfigFile {
    pub path: PathBuf,
    pub has_marker: bool,
}

/// Fixed, ordered list of shell startup files that may carry a managed block.
#[derive(Debug, Clone)]
pub struct ShellConfigRegistry {
    candidates: Vec<PathBuf>,
}

impl ShellConfigRegistry {
    pub fn from_env(env: &EnvSnapshot) -> Self {
        let Some(home) = env.home() else {
            return Self {
                candidates: Vec::new(),
            };
        };
        let zdotdir = env.get("ZDOTDIR").map(PathBuf::from).unwrap_or_else(|| home.clone());
        Self {
            candidates: vec![
                zdotdir.join(".zshenv"),
                zdotdir.join(".zshrc"),
                home.join(".bashrc"),
                home.join(".bash_profile"),
                home.join(".profile"),
            ],
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Every existing candidate, flagged by whether it carries the marker.
    pub fn inspect(&self) -> Vec<ManagedConfigFile> {
        self.candidates
            .iter()
            .filter_map(|path| {
                let body = fs::read(path).ok()?;
                Some(ManagedConfigFile {
                    path: path.clone(),
                    has_marker: contains_marker(&body),
                })
            })
            .collect()
    }

    /// Existing candidates that carry the marker. Missing or unreadable files
    /// are skipped.
    pub fn scan(&self) -> Vec<ManagedConfigFile> {
        self.inspect()
            .into_iter()
            .filter(|file| file.has_marker)
            .collect()
    }
}

pub fn is_marker_line(line: &str) -> bool {
    strip_terminator(line) == MARKER
}

/// Line content without its `\n` / `\r\n` terminator.
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn contains_marker(body: &[u8]) -> bool {
    String::from_utf8_lossy(body)
        .split_inclusive('\n')
        .any(is_marker_line)
}

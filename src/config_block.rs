use crate::error::InstallerError;
use crate::shell_config::{is_marker_line, strip_terminator, FUNCTION_TOKEN};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const CLOSING_LINE: &str = "}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CleanOutcome {
    Unchanged,
    Cleaned { removed_lines: usize },
    /// A marker without a closing `}`; the file was left alone.
    Malformed { marker_line: usize },
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEdit {
    Unchanged,
    Edited { text: String, removed_lines: usize },
    Malformed { marker_line: usize },
}

fn is_blank(line: &str) -> bool {
    strip_terminator(line).is_empty()
}

/// Removes every managed block and injected helper call from `content`.
///
/// Lines keep their original terminators, so everything outside the removed
/// regions survives byte-for-byte apart from blank-line runs, which are
/// squeezed to a single blank line. Content without a marker is never touched.
pub fn clean_text(content: &str) -> TextEdit {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    if !lines.iter().any(|line| is_marker_line(line)) {
        return TextEdit::Unchanged;
    }

    let mut keep = vec![true; lines.len()];
    let mut idx = 0;
    while idx < lines.len() {
        if !is_marker_line(lines[idx]) {
            idx += 1;
            continue;
        }
        let Some(close) = (idx + 1..lines.len())
            .find(|&candidate| strip_terminator(lines[candidate]) == CLOSING_LINE)
        else {
            return TextEdit::Malformed {
                marker_line: idx + 1,
            };
        };
        keep[idx..=close].iter_mut().for_each(|slot| *slot = false);
        idx = close + 1;
    }
    for (slot, line) in keep.iter_mut().zip(&lines) {
        if *slot && line.contains(FUNCTION_TOKEN) {
            *slot = false;
        }
    }

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for (line, _) in lines.iter().zip(&keep).filter(|(_, kept)| **kept) {
        if is_blank(line) && out.last().map_or(false, |prev| is_blank(prev)) {
            continue;
        }
        out.push(*line);
    }

    let removed_lines = lines.len() - out.len();
    let text = out.concat();
    if text == content {
        return TextEdit::Unchanged;
    }
    TextEdit::Edited {
        text,
        removed_lines,
    }
}

/// Strips the managed block from the shell config at `path` in place.
///
/// Read and decode problems degrade to [`CleanOutcome::Unreadable`]; only a
/// failed write is an error.
pub fn clean(path: &Path) -> Result<CleanOutcome, InstallerError> {
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let bytes = match fs::read(&target) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "config file unreadable; leaving it alone");
            return Ok(CleanOutcome::Unreadable {
                reason: err.to_string(),
            });
        }
    };
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(path = %path.display(), "config file is not valid UTF-8; leaving it alone");
            return Ok(CleanOutcome::Unreadable {
                reason: err.to_string(),
            });
        }
    };

    match clean_text(&content) {
        TextEdit::Unchanged => Ok(CleanOutcome::Unchanged),
        TextEdit::Malformed { marker_line } => {
            tracing::warn!(
                path = %path.display(),
                marker_line,
                "managed block has no closing `}}` line; refusing to edit"
            );
            Ok(CleanOutcome::Malformed { marker_line })
        }
        TextEdit::Edited {
            text,
            removed_lines,
        } => {
            write_atomic_text_file_preserving_mode(&target, &text)?;
            tracing::debug!(path = %path.display(), removed_lines, "removed managed block");
            Ok(CleanOutcome::Cleaned { removed_lines })
        }
    }
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    parent.join(format!(
        ".{}.zerobrew.{}.{}",
        path.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "config".to_string()),
        std::process::id(),
        nanos
    ))
}

fn write_atomic_text_file_preserving_mode(path: &Path, content: &str) -> Result<(), InstallerError> {
    let permissions = fs::metadata(path)?.permissions();
    let tmp_path = sibling_temp_path(path);
    fs::write(&tmp_path, content)?;
    let result = fs::set_permissions(&tmp_path, permissions).and_then(|_| fs::rename(&tmp_path, path));
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(InstallerError::Io(err));
    }
    Ok(())
}

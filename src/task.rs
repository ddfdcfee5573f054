//! Background execution with an indeterminate spinner.
//!
//! One background unit runs at a time. The foreground thread owns the
//! terminal: it ticks the spinner, polls the unit for completion and watches
//! the interrupt flag. Terminal state is restored by [`SpinnerGuard`] on every
//! exit path.

use crate::error::InstallerError;
use dialoguer::console::Term;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Set by SIGINT/SIGTERM; a second signal terminates the process outright.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn install() -> Result<Self, InstallerError> {
        use signal_hook::consts::signal::{SIGINT, SIGTERM};
        use signal_hook::flag;
        let raised = Arc::new(AtomicBool::new(false));
        for signal in [SIGINT, SIGTERM] {
            flag::register_conditional_shutdown(signal, 130, Arc::clone(&raised))?;
            flag::register(signal, Arc::clone(&raised))?;
        }
        Ok(Self(raised))
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Clears the spinner line and shows the cursor again when dropped.
pub struct SpinnerGuard {
    bar: ProgressBar,
}

impl SpinnerGuard {
    fn start(message: &str, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr())
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.tick();
        Self { bar }
    }

    fn tick(&self) {
        self.bar.tick();
    }
}

impl Drop for SpinnerGuard {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
        let _ = Term::stderr().show_cursor();
    }
}

#[derive(Debug, Clone)]
pub struct TaskRunner {
    interrupt: InterruptFlag,
    poll_interval: Duration,
    visible: bool,
}

impl TaskRunner {
    pub fn new(interrupt: InterruptFlag) -> Self {
        Self {
            interrupt,
            poll_interval: POLL_INTERVAL,
            visible: Term::stderr().is_term(),
        }
    }

    pub fn hidden(interrupt: InterruptFlag) -> Self {
        Self {
            visible: false,
            ..Self::new(interrupt)
        }
    }

    /// Fails with [`InstallerError::Interrupted`] if a signal arrived while
    /// the foreground was busy outside [`TaskRunner::run`], e.g. blocked on a
    /// prompt or a foreground child process.
    pub fn checkpoint(&self) -> Result<(), InstallerError> {
        if self.interrupt.is_raised() {
            tracing::debug!("interrupt observed between steps");
            return Err(InstallerError::Interrupted);
        }
        Ok(())
    }

    /// Runs `operation` on a background thread and returns its result.
    ///
    /// An interrupt stops the wait with [`InstallerError::Interrupted`]; the
    /// background thread is detached and any child process it spawned receives
    /// the same signal from the terminal.
    pub fn run<T, F>(&self, message: &str, operation: F) -> Result<T, InstallerError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let spinner = SpinnerGuard::start(message, self.visible);
        tracing::debug!(task = message, "background task started");
        let handle = thread::Builder::new()
            .name("zerobrew-task".to_string())
            .spawn(operation)?;
        while !handle.is_finished() {
            if self.interrupt.is_raised() {
                tracing::debug!(task = message, "interrupted while waiting");
                return Err(InstallerError::Interrupted);
            }
            spinner.tick();
            thread::sleep(self.poll_interval);
        }
        drop(spinner);
        handle.join().map_err(|_| {
            InstallerError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("background task `{message}` panicked"),
            ))
        })
    }
}

/// Temporary file removed when dropped, whichever way the run ends.
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    pub fn new(prefix: &str) -> Result<Self, InstallerError> {
        let file = tempfile::Builder::new().prefix(prefix).tempfile()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn run_returns_operation_result() {
        let runner = TaskRunner::hidden(InterruptFlag::default());
        let value = runner.run("adding", || 40 + 2).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn run_propagates_failure_values() {
        let runner = TaskRunner::hidden(InterruptFlag::default());
        let result: Result<(), String> = runner
            .run("failing", || Err("exit status 128".to_string()))
            .unwrap();
        assert_eq!(result, Err("exit status 128".to_string()));
    }

    #[test]
    fn raised_interrupt_stops_waiting() {
        let flag = InterruptFlag::default();
        flag.raise();
        let runner = TaskRunner::hidden(flag);
        let started = Instant::now();
        let err = runner
            .run("sleeping", || thread::sleep(Duration::from_secs(5)))
            .expect_err("interrupt should win");
        assert!(matches!(err, InstallerError::Interrupted));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn checkpoint_reports_a_pending_interrupt() {
        let flag = InterruptFlag::default();
        let runner = TaskRunner::hidden(flag.clone());
        assert!(runner.checkpoint().is_ok());
        flag.raise();
        assert!(matches!(runner.checkpoint(), Err(InstallerError::Interrupted)));
    }

    #[test]
    fn panicking_operation_is_an_error() {
        let runner = TaskRunner::hidden(InterruptFlag::default());
        let err = runner
            .run("boom", || -> u8 { panic!("boom") })
            .expect_err("panic surfaces");
        assert!(err.to_string().contains("panicked"));
    }

    #[test]
    fn scratch_file_is_removed_on_drop() {
        let scratch = ScratchFile::new("zb-test-").unwrap();
        let path = scratch.path_buf();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }
}

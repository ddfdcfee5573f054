use crate::config::InstallerConfig;
use crate::env::EnvSnapshot;
use crate::error::InstallerError;
use crate::paths::PathSet;
use crate::runner::{CommandRunner, SystemRunner};
use crate::task::{InterruptFlag, TaskRunner};
use crate::ui::Ui;
use std::sync::Arc;

/// Everything a front-end resolves once at startup and hands to the
/// orchestrators.
pub struct Context {
    pub config: InstallerConfig,
    pub env: EnvSnapshot,
    pub paths: PathSet,
    pub runner: Arc<dyn CommandRunner>,
    pub tasks: TaskRunner,
    pub ui: Ui,
}

impl Context {
    pub fn load(
        env: EnvSnapshot,
        runner: Arc<dyn CommandRunner>,
        tasks: TaskRunner,
        ui: Ui,
    ) -> Result<Self, InstallerError> {
        let config = InstallerConfig::load(&env)?;
        let paths = PathSet::resolve(&env)?;
        tracing::debug!(
            root = %paths.root.display(),
            prefix = %paths.prefix.display(),
            work_dir = %paths.work_dir.display(),
            bin_dir = %paths.bin_dir.display(),
            "resolved paths"
        );
        Ok(Self {
            config,
            env,
            paths,
            runner,
            tasks,
            ui,
        })
    }

    /// Live environment, real processes and signal handlers; what both
    /// front-ends run with.
    pub fn from_process(ui: Ui) -> Result<Self, InstallerError> {
        let interrupt = InterruptFlag::install()?;
        Self::load(
            EnvSnapshot::capture(),
            Arc::new(SystemRunner),
            TaskRunner::new(interrupt),
            ui,
        )
    }

    pub fn primary_binary(&self) -> &str {
        &self.config.build.primary
    }
}

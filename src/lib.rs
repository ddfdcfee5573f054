//! Bootstrapper for the zerobrew package manager: fetch, build and install the
//! `zb`/`zbx` pair, and undo it again without disturbing hand-edited shell
//! configuration.

pub mod artifact;
pub mod companion;
pub mod config;
pub mod config_block;
pub mod context;
pub mod env;
pub mod error;
pub mod fetch;
pub mod install;
pub mod logging;
pub mod paths;
pub mod privilege;
pub mod prompt;
pub mod runner;
pub mod shell_config;
pub mod task;
pub mod ui;
pub mod uninstall;

pub use error::InstallerError;

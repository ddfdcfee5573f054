use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use zerobrew_installer::context::Context;
use zerobrew_installer::fetch::HttpDownloader;
use zerobrew_installer::install::{InstallOptions, Installer};
use zerobrew_installer::logging;
use zerobrew_installer::ui::Ui;
use zerobrew_installer::InstallerError;

#[derive(Parser, Debug)]
#[command(
    name = "zb-install",
    version,
    about = "Build and install zerobrew from source, or from prebuilt binaries"
)]
struct Cli {
    /// Do not let `zb init` touch shell startup files.
    #[arg(long, default_value_t = false)]
    no_modify_path: bool,
    /// Install these executables instead of building from source.
    #[arg(short = 'b', long = "binary", value_name = "PATH", num_args = 1..)]
    binaries: Vec<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            process::exit(code);
        }
    };
    logging::init();
    let ui = Ui::new();
    if let Err(err) = run(cli, ui) {
        ui.error(&err);
        process::exit(err.exit_code());
    }
}

fn run(cli: Cli, ui: Ui) -> Result<(), InstallerError> {
    let ctx = Context::from_process(ui)?;
    let installer = Installer::new(&ctx, Arc::new(HttpDownloader));
    let options = InstallOptions {
        no_modify_path: cli.no_modify_path,
    };
    if cli.binaries.is_empty() {
        installer.run(options)?;
    } else {
        installer.run_with_binaries(&cli.binaries, options)?;
    }
    Ok(())
}

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use zerobrew_installer::context::Context;
use zerobrew_installer::fetch::HttpDownloader;
use zerobrew_installer::install::{InstallOptions, Installer};
use zerobrew_installer::logging;
use zerobrew_installer::paths::InstallationState;
use zerobrew_installer::prompt::{AssumeYes, Confirm, TerminalConfirm};
use zerobrew_installer::shell_config::ShellConfigRegistry;
use zerobrew_installer::ui::Ui;
use zerobrew_installer::uninstall::{Mode, Uninstaller};
use zerobrew_installer::InstallerError;

#[derive(Parser, Debug)]
#[command(name = "zb-tasks", version, about = "zerobrew development and maintenance recipes")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build from source and install into the user bin directory.
    Install {
        #[arg(long, default_value_t = false)]
        no_modify_path: bool,
        #[arg(short = 'b', long = "binary", value_name = "PATH", num_args = 1..)]
        binaries: Vec<PathBuf>,
    },
    /// Fetch and build without installing.
    Build,
    /// Remove binaries, the working clone, the shared root and shell config blocks.
    Uninstall {
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Wipe the shared root and re-run `zb init`.
    Reset {
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Show resolved paths and what is currently installed.
    Paths,
}

#[derive(Debug, Serialize)]
struct JsonResult<T: Serialize> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
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
    let json = cli.json;
    let ui = if json { Ui::quiet() } else { Ui::new() };

    if let Err(err) = run(cli, ui) {
        if json {
            let payload = JsonResult::<serde_json::Value> {
                ok: false,
                result: None,
                error: Some(err.to_string()),
                hint: err.hint().map(str::to_string),
            };
            if print_json(&payload).is_err() {
                ui.error(&err);
            }
        } else {
            ui.error(&err);
        }
        process::exit(err.exit_code());
    }
}

fn run(cli: Cli, ui: Ui) -> Result<(), InstallerError> {
    let ctx = Context::from_process(ui)?;
    match cli.command {
        Commands::Install {
            no_modify_path,
            binaries,
        } => {
            let installer = Installer::new(&ctx, Arc::new(HttpDownloader));
            let options = InstallOptions { no_modify_path };
            let report = if binaries.is_empty() {
                installer.run(options)?
            } else {
                installer.run_with_binaries(&binaries, options)?
            };
            output(cli.json, serde_json::to_value(report)?)
        }
        Commands::Build => {
            let report = Installer::new(&ctx, Arc::new(HttpDownloader)).build()?;
            if !cli.json {
                for artifact in &report.artifacts {
                    println!("{}", artifact.executable_path.display());
                }
                return Ok(());
            }
            output(cli.json, serde_json::to_value(report)?)
        }
        Commands::Uninstall { yes } => uninstall(&ctx, Mode::Uninstall, yes, cli.json),
        Commands::Reset { yes } => uninstall(&ctx, Mode::Reset, yes, cli.json),
        Commands::Paths => handle_paths(&ctx, cli.json),
    }
}

fn uninstall(ctx: &Context, mode: Mode, yes: bool, json: bool) -> Result<(), InstallerError> {
    let confirm: &dyn Confirm = if yes { &AssumeYes } else { &TerminalConfirm };
    let report = Uninstaller::new(ctx, confirm).run(mode)?;
    output(json, serde_json::to_value(report)?)
}

fn handle_paths(ctx: &Context, json: bool) -> Result<(), InstallerError> {
    let state = InstallationState::probe(&ctx.paths, &ctx.config.build.binaries);
    let configs = ShellConfigRegistry::from_env(&ctx.env).inspect();
    if json {
        return output(
            json,
            json!({
                "paths": ctx.paths,
                "installed": state,
                "shell_configs": configs,
            }),
        );
    }
    let paths = &ctx.paths;
    println!("root:     {}", paths.root.display());
    println!("prefix:   {}", paths.prefix.display());
    println!("work_dir: {}", paths.work_dir.display());
    println!("bin_dir:  {}", paths.bin_dir.display());
    for file in configs.iter().filter(|file| file.has_marker) {
        println!("managed:  {}", file.path.display());
    }
    Ok(())
}

/// Human mode relies on the progress lines already printed.
fn output(json: bool, payload: serde_json::Value) -> Result<(), InstallerError> {
    if json {
        let wrapper = JsonResult {
            ok: true,
            result: Some(payload),
            error: None,
            hint: None,
        };
        print_json(&wrapper)?;
    }
    Ok(())
}

fn print_json<T: Serialize>(payload: &T) -> Result<(), InstallerError> {
    let text = serde_json::to_string_pretty(payload)?;
    println!("{}", text);
    Ok(())
}

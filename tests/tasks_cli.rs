#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{self, Stdio};
use std::thread;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const ZSHRC: &str = "export EDITOR=vim\n\n# zerobrew\n_zb_path_append() {\n  PATH=\"$PATH:$1\"\n}\n_zb_path_append /opt/zerobrew/prefix/bin\n\nalias ll='ls -l'\n";

const FAKE_ZB: &str = r#"#!/bin/sh
if [ "$1" = "init" ]; then
  mkdir -p "$ZEROBREW_PREFIX"
  echo "init $*" > "$ZEROBREW_ROOT/initialized"
fi
exit 0
"#;

fn write_script(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn parse_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("json output")
}

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn empty() -> Self {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("home")).unwrap();
        let sandbox = Self { dir };
        write_script(&sandbox.path("tools/sudo"), "#!/bin/sh\nexec \"$@\"\n");
        sandbox
    }

    /// A complete install: binaries, working clone, root and a managed `.zshrc`.
    fn installed() -> Self {
        let sandbox = Self::empty();
        write_script(&sandbox.path("bin/zb"), FAKE_ZB);
        write_script(&sandbox.path("bin/zbx"), FAKE_ZB);
        fs::create_dir_all(sandbox.path("work/.git")).unwrap();
        fs::create_dir_all(sandbox.path("root/prefix/Cellar")).unwrap();
        fs::write(sandbox.path("root/prefix/Cellar/marker"), "x").unwrap();
        fs::write(sandbox.path("home/.zshrc"), ZSHRC).unwrap();
        fs::write(sandbox.path("home/.bashrc"), "alias g=git\n").unwrap();
        sandbox
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn std_cmd(&self) -> process::Command {
        let mut cmd = process::Command::new(assert_cmd::cargo::cargo_bin!("zb-tasks"));
        cmd.env_clear()
            .env("PATH", format!("{}:/usr/bin:/bin", self.path("tools").display()))
            .env("HOME", self.path("home"))
            .env("ZEROBREW_ROOT", self.path("root"))
            .env("ZEROBREW_DIR", self.path("work"))
            .env("ZEROBREW_BIN", self.path("bin"));
        cmd
    }

    fn cmd(&self) -> Command {
        Command::from_std(self.std_cmd())
    }

    fn assert_untouched(&self) {
        assert!(self.path("bin/zb").is_file());
        assert!(self.path("bin/zbx").is_file());
        assert!(self.path("work/.git").is_dir());
        assert!(self.path("root/prefix/Cellar/marker").is_file());
        assert_eq!(fs::read_to_string(self.path("home/.zshrc")).unwrap(), ZSHRC);
    }
}

#[test]
fn paths_json_reflects_overrides() {
    let sandbox = Sandbox::empty();
    let out = sandbox
        .cmd()
        .env("ZEROBREW_PREFIX", sandbox.path("elsewhere"))
        .args(["paths", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let json = parse_json(&out.stdout);
    assert_eq!(json["ok"], true);
    let paths = &json["result"]["paths"];
    assert_eq!(paths["root"], sandbox.path("root").to_str().unwrap());
    assert_eq!(paths["prefix"], sandbox.path("elsewhere").to_str().unwrap());
    assert_eq!(paths["work_dir"], sandbox.path("work").to_str().unwrap());
    assert_eq!(paths["bin_dir"], sandbox.path("bin").to_str().unwrap());
}

#[test]
fn paths_lists_managed_config_files() {
    let sandbox = Sandbox::installed();
    sandbox
        .cmd()
        .arg("paths")
        .assert()
        .success()
        .stdout(contains(format!("managed:  {}", sandbox.path("home/.zshrc").display())))
        .stdout(contains(".bashrc").not());
}

#[test]
fn uninstall_with_nothing_installed_is_a_no_op() {
    let sandbox = Sandbox::empty();
    sandbox
        .cmd()
        .arg("uninstall")
        .assert()
        .success()
        .stderr(contains("Nothing to uninstall"));
}

#[test]
fn declined_uninstall_changes_nothing() {
    let sandbox = Sandbox::installed();
    sandbox
        .cmd()
        .arg("uninstall")
        .write_stdin("n\n")
        .assert()
        .success()
        .stderr(contains("Aborted."));
    sandbox.assert_untouched();
}

#[test]
fn closed_stdin_counts_as_no() {
    let sandbox = Sandbox::installed();
    sandbox.cmd().arg("uninstall").write_stdin("").assert().success();
    sandbox.assert_untouched();
}

#[test]
fn confirmed_uninstall_removes_everything_and_cleans_shell_config() {
    let sandbox = Sandbox::installed();
    let out = sandbox
        .cmd()
        .args(["uninstall", "--json"])
        .write_stdin("yes\n")
        .output()
        .unwrap();
    assert!(out.status.success());

    let json = parse_json(&out.stdout);
    assert_eq!(json["result"]["outcome"], "completed");
    assert!(!sandbox.path("bin/zb").exists());
    assert!(!sandbox.path("bin/zbx").exists());
    assert!(!sandbox.path("work").exists());
    assert!(!sandbox.path("root").exists());
    assert_eq!(
        fs::read_to_string(sandbox.path("home/.zshrc")).unwrap(),
        "export EDITOR=vim\n\nalias ll='ls -l'\n"
    );
    assert_eq!(
        fs::read_to_string(sandbox.path("home/.bashrc")).unwrap(),
        "alias g=git\n"
    );
}

#[test]
fn reset_wipes_root_and_reinitializes() {
    let sandbox = Sandbox::installed();
    sandbox
        .cmd()
        .args(["reset", "-y"])
        .assert()
        .success()
        .stderr(contains("Reset complete"));

    assert!(sandbox.path("bin/zb").is_file());
    assert!(sandbox.path("work/.git").is_dir());
    assert!(!sandbox.path("root/prefix/Cellar").exists());
    assert_eq!(
        fs::read_to_string(sandbox.path("root/initialized")).unwrap(),
        "init init\n"
    );
}

#[test]
fn reset_without_companion_fails() {
    let sandbox = Sandbox::installed();
    fs::remove_file(sandbox.path("bin/zb")).unwrap();
    let out = sandbox
        .cmd()
        .args(["reset", "--yes", "--json"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let json = parse_json(&out.stdout);
    assert_eq!(json["ok"], false);
    assert!(json["error"].as_str().unwrap().contains("Binary not found"));
    assert!(sandbox.path("root/prefix/Cellar/marker").is_file());
}

#[test]
fn uninstall_without_sudo_or_doas_is_fatal() {
    let sandbox = Sandbox::installed();
    fs::remove_file(sandbox.path("tools/sudo")).unwrap();
    sandbox
        .cmd()
        .env("PATH", sandbox.path("tools"))
        .args(["uninstall", "-y"])
        .assert()
        .code(1)
        .stderr(contains("tried sudo, doas"))
        .stderr(contains("hint:"));
    sandbox.assert_untouched();
}

#[test]
fn interrupt_at_the_prompt_exits_130_without_changes() {
    let sandbox = Sandbox::installed();
    let mut child = sandbox
        .std_cmd()
        .arg("uninstall")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    thread::sleep(Duration::from_millis(800));
    let kill = process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(kill.success());

    // The blocked read resumes after the signal; a late "y" must not proceed.
    let mut stdin = child.stdin.take().unwrap();
    let _ = stdin.write_all(b"y\n");
    drop(stdin);
    let out = child.wait_with_output().unwrap();

    assert_eq!(out.status.code(), Some(130));
    assert!(String::from_utf8_lossy(&out.stderr).contains("interrupted"));
    sandbox.assert_untouched();
}

#[test]
fn unknown_recipe_exits_one() {
    let sandbox = Sandbox::empty();
    sandbox.cmd().arg("frobnicate").assert().code(1);
}

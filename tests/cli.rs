// tests/cli.rs

//! Exit codes and output of the `formulary` binary.

mod common;

use common::{SYNTH, Workspace, write_manifest};
use std::process::{Command, Output};

fn formulary(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_formulary"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_check_valid_manifest() {
    let ws = Workspace::new();
    let path = write_manifest(ws.path(), "synth", SYNTH);

    let output = formulary(&["check", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("[OK] Manifest is valid"));
}

#[test]
fn test_check_malformed_manifest() {
    let ws = Workspace::new();
    let path = write_manifest(ws.path(), "broken", &SYNTH.replace("name = \"synth\"", "name = \"\""));

    let output = formulary(&["check", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("MalformedManifest"));
}

#[test]
fn test_deps_json_follows_flags() {
    let ws = Workspace::new();
    let path = write_manifest(ws.path(), "synth", SYNTH);

    let output = formulary(&["deps", "--json", path.to_str().unwrap(), "--with-python"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = value["dependencies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["scons", "boost", "python"]);
}

#[test]
fn test_invalid_option_flag() {
    let ws = Workspace::new();
    let path = write_manifest(ws.path(), "synth", SYNTH);

    let output = formulary(&["deps", path.to_str().unwrap(), "--with-"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_option_flag_with_value_rejected() {
    let ws = Workspace::new();
    let path = write_manifest(ws.path(), "synth", SYNTH);

    let output = formulary(&["deps", path.to_str().unwrap(), "--with-python=true"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_undeclared_option_warns() {
    let ws = Workspace::new();
    let path = write_manifest(ws.path(), "synth", SYNTH);

    let output = formulary(&["deps", path.to_str().unwrap(), "--with-ruby"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("does not declare option 'with-ruby'"));
}

#[test]
fn test_option_flags_rejected_by_check() {
    let ws = Workspace::new();
    let path = write_manifest(ws.path(), "synth", SYNTH);

    let output = formulary(&["check", path.to_str().unwrap(), "--with-python"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unknown_option_exit_code() {
    let ws = Workspace::new();
    let text = SYNTH.replace(
        "[[dependencies]]\nname = \"boost\"\nphase = \"runtime\"",
        "[[dependencies]]\nname = \"boost\"\nphase = \"runtime\"\ncondition = \"with-docs\"",
    );
    let path = write_manifest(ws.path(), "synth", &text);

    let output = formulary(&["deps", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("with-docs"));
}

#[cfg(unix)]
#[test]
fn test_install_step_failure_exit_code() {
    let ws = Workspace::new();
    let text = r#"
[package]
name = "broken"
version = "1.0.0"

[[install]]
tool = "false"

[test]
tool = "true"
"#;
    let path = write_manifest(ws.path(), "broken", text);

    let output = formulary(&[
        "install",
        path.to_str().unwrap(),
        "--prefix",
        ws.prefix.to_str().unwrap(),
        "--source-dir",
        ws.source_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("StepFailed"));
}

#[cfg(unix)]
#[test]
fn test_install_post_install_failure_exit_code() {
    let ws = Workspace::new();
    let text = r#"
[package]
name = "broken"
version = "1.0.0"

[[install]]
tool = "true"

[test]
tool = "false"
"#;
    let path = write_manifest(ws.path(), "broken", text);

    let output = formulary(&[
        "install",
        path.to_str().unwrap(),
        "--prefix",
        ws.prefix.to_str().unwrap(),
        "--source-dir",
        ws.source_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(6), "stderr: {}", stderr(&output));
}

#[test]
fn test_dry_run_install() {
    let ws = Workspace::new();
    let path = write_manifest(ws.path(), "synth", SYNTH);

    let output = formulary(&[
        "install",
        path.to_str().unwrap(),
        "--dry-run",
        "--prefix",
        ws.prefix.to_str().unwrap(),
        "--source-cache",
        ws.path().join("cache").to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("[DRY RUN] Would install synth 0.52.0"));
    assert!(!ws.prefix.exists());
}

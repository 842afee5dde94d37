use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn wsr_binary() -> PathBuf {
	let mut path = std::env::current_exe().unwrap();
	path.pop();
	path.pop();
	path.push("wsr");
	path
}

fn run_wsr(app_dir: &Path, args: &[&str], stdin: &str) -> (bool, String, String) {
	let mut child = Command::new(wsr_binary())
		.arg("--app-dir")
		.arg(app_dir)
		.arg("--no-log-file")
		.args(args)
		.env_remove("RUST_LOG")
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.expect("failed to start wsr");

	{
		let mut input = child.stdin.take().expect("stdin unavailable");
		input.write_all(stdin.as_bytes()).expect("failed to write stdin");
	}

	let Output { status, stdout, stderr } = child.wait_with_output().expect("failed waiting for wsr");
	(
		status.success(),
		String::from_utf8_lossy(&stdout).to_string(),
		String::from_utf8_lossy(&stderr).to_string(),
	)
}

#[test]
fn check_prepares_app_dir() {
	let tmp = TempDir::new().unwrap();
	let app_dir = tmp.path().join("relay");

	let (success, stdout, stderr) = run_wsr(&app_dir, &["--no-launch", "--cdp-port", "1", "check"], "");
	assert!(success, "check failed: {stderr}");
	assert!(stdout.contains("writable"), "{stdout}");
	assert!(stdout.contains("identity     not stored"), "{stdout}");
	assert!(app_dir.join("qr_codes").is_dir());
	assert_eq!(std::fs::read_to_string(app_dir.join(".gitignore")).unwrap(), "credentials.yaml\n");
}

#[test]
fn identity_set_show_reset() {
	let tmp = TempDir::new().unwrap();
	let app_dir = tmp.path();

	let (success, _, stderr) = run_wsr(app_dir, &["identity", "set"], "12345\n+31612345678\n");
	assert!(success, "set failed: {stderr}");
	assert!(stderr.contains("not a phone number"), "{stderr}");
	assert!(std::fs::read_to_string(app_dir.join("credentials.yaml")).unwrap().contains("+31612345678"));

	let (success, stdout, _) = run_wsr(app_dir, &["identity", "show"], "");
	assert!(success);
	assert_eq!(stdout.trim(), "+31*******78");

	let (success, stdout, _) = run_wsr(app_dir, &["identity", "reset"], "");
	assert!(success);
	assert!(stdout.starts_with("removed"), "{stdout}");
	assert!(!app_dir.join("credentials.yaml").exists());
}

#[test]
fn exit_sentinel_ends_with_failure_status() {
	let tmp = TempDir::new().unwrap();

	let (success, _, stderr) = run_wsr(tmp.path(), &["identity", "set"], "exit\n");
	assert!(!success);
	assert!(stderr.contains("aborted"), "{stderr}");
	assert!(!tmp.path().join("credentials.yaml").exists());
}

#[test]
fn malformed_config_is_reported() {
	let tmp = TempDir::new().unwrap();
	std::fs::write(tmp.path().join("config.json"), "{ not json").unwrap();

	let (success, _, stderr) = run_wsr(tmp.path(), &["check"], "");
	assert!(!success);
	assert!(stderr.contains("config.json"), "{stderr}");
}

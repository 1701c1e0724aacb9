//! End-to-end tests for the `stow` binary against a local backend
//!
//! Each test gets its own configuration directory and storage root.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

struct TestEnv {
    config_dir: TempDir,
    root: TempDir,
}

impl TestEnv {
    /// Fresh config with a local backend named `default`
    fn new() -> Self {
        let env = Self {
            config_dir: TempDir::new().expect("Failed to create config dir"),
            root: TempDir::new().expect("Failed to create storage root"),
        };
        let root = env.root.path().to_str().unwrap().to_string();
        let output = env.run(&["backend", "set-local", "default", &root]);
        assert!(output.status.success(), "set-local failed: {output:?}");
        env
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_stow"));
        cmd.args(args)
            .env("STOW_CONFIG_DIR", self.config_dir.path())
            .env_remove("STOW_BACKEND")
            .env("NO_COLOR", "1");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("Failed to execute stow")
    }

    fn run_json(&self, args: &[&str]) -> serde_json::Value {
        let mut args = args.to_vec();
        args.push("--json");
        let output = self.run(&args);
        assert!(output.status.success(), "stow {args:?} failed: {output:?}");
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON")
    }

    fn put(&self, path: &str, content: &str) {
        let mut child = self
            .command(&["put", "-", path, "--quiet"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .expect("Failed to spawn stow");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        let status = child.wait().unwrap();
        assert!(status.success(), "put {path} failed");
    }

    fn file(&self, relative: &str) -> std::path::PathBuf {
        self.root.path().join(relative)
    }
}

fn paths(value: &serde_json::Value, key: &str) -> Vec<String> {
    let mut paths: Vec<String> = value[key]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["path"].as_str().unwrap().to_string())
        .collect();
    paths.sort();
    paths
}

#[test]
fn test_backend_list_json() {
    let env = TestEnv::new();
    let json = env.run_json(&["backend", "list"]);

    let backends = json["backends"].as_array().unwrap();
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0]["name"], "default");
    assert_eq!(backends[0]["type"], "local");
}

#[test]
fn test_backend_remove_unknown() {
    let env = TestEnv::new();
    let output = env.run(&["backend", "remove", "nope"]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_unknown_backend_is_not_found() {
    let env = TestEnv::new();
    let output = env.run(&["ls", "-b", "missing"]);
    assert_eq!(output.status.code(), Some(5));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing"));
}

#[test]
fn test_put_and_cat() {
    let env = TestEnv::new();
    env.put("charts/index.yaml", "apiVersion: v1\n");

    assert!(env.file("charts/index.yaml").is_file());

    let output = env.run(&["cat", "charts/index.yaml"]);
    assert!(output.status.success());
    assert_eq!(output.stdout, b"apiVersion: v1\n");
}

#[test]
fn test_put_from_file() {
    let env = TestEnv::new();
    let source = env.config_dir.path().join("local.tgz");
    std::fs::write(&source, b"archive").unwrap();

    let json = env.run_json(&["put", source.to_str().unwrap(), "a-0.1.0.tgz"]);
    assert_eq!(json["success"], true);
    assert_eq!(std::fs::read(env.file("a-0.1.0.tgz")).unwrap(), b"archive");
}

#[test]
fn test_ls_paged_and_flat() {
    let env = TestEnv::new();
    env.put("index.yaml", "x");
    env.put("a-0.1.0.tgz", "a");
    env.put("stable/b-1.0.0.tgz", "b");

    for limit in ["0", "1", "2"] {
        let json = env.run_json(&["ls", "--limit", limit]);
        assert_eq!(paths(&json, "directories"), vec!["stable"]);
        assert_eq!(paths(&json, "files"), vec!["a-0.1.0.tgz", "index.yaml"]);
    }

    let nested = env.run_json(&["ls", "stable"]);
    assert_eq!(paths(&nested, "files"), vec!["stable/b-1.0.0.tgz"]);

    let flat = env.run_json(&["ls", "--flat"]);
    assert!(paths(&flat, "directories").is_empty());
    assert_eq!(paths(&flat, "files"), vec!["a-0.1.0.tgz", "index.yaml"]);
}

#[test]
fn test_ls_on_object_is_usage_error() {
    let env = TestEnv::new();
    env.put("index.yaml", "x");

    let output = env.run(&["ls", "index.yaml"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cat_missing_object() {
    let env = TestEnv::new();
    let output = env.run(&["cat", "nope.txt", "--json"]);

    assert_eq!(output.status.code(), Some(5));
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(err["error"].as_str().unwrap().contains("nope.txt"));
}

#[test]
fn test_rm() {
    let env = TestEnv::new();
    env.put("old.tgz", "x");

    let json = env.run_json(&["rm", "old.tgz"]);
    assert_eq!(json["path"], "old.tgz");
    assert!(!env.file("old.tgz").exists());

    let output = env.run(&["rm", "old.tgz"]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_mv_directory() {
    let env = TestEnv::new();
    env.put("charts/a.tgz", "a");
    env.put("charts/nested/b.tgz", "b");

    let json = env.run_json(&["mv", "charts", "archive"]);
    assert_eq!(json["to"], "archive");

    assert!(env.file("archive/a.tgz").is_file());
    assert!(env.file("archive/nested/b.tgz").is_file());
    assert!(!env.file("charts/a.tgz").exists());
}

#[test]
fn test_mv_onto_existing_is_conflict() {
    let env = TestEnv::new();
    env.put("a.tgz", "a");
    env.put("b.tgz", "b");

    let output = env.run(&["mv", "a.tgz", "b.tgz"]);
    assert_eq!(output.status.code(), Some(6));
    assert_eq!(std::fs::read(env.file("a.tgz")).unwrap(), b"a");
    assert_eq!(std::fs::read(env.file("b.tgz")).unwrap(), b"b");
}

#[test]
fn test_watch_reports_no_changes() {
    let env = TestEnv::new();
    env.put("index.yaml", "x");

    let output = env.run(&["watch", "--interval", "0", "--count", "1", "--json"]);
    assert!(output.status.success(), "{output:?}");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["changed"], false);
    assert!(report["added"].as_array().unwrap().is_empty());
}

#[test]
fn test_config_file_is_toml() {
    let env = TestEnv::new();
    let config = std::fs::read_to_string(env.config_dir.path().join("config.toml")).unwrap();
    assert!(config.contains("[backends.default]"));
    assert!(config.contains(Path::new(env.root.path()).to_str().unwrap()));
}

//! End-to-end tests of the `itemsync` binary.
//!
//! Stdout is not a terminal here, so every command answers in JSON.

use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn itemsync(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("itemsync").unwrap();
    cmd.arg("--config-dir").arg(config_dir).env_remove("RUST_LOG");
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn set_tab(config_dir: &Path, tab: &str, dir: &Path) {
    itemsync(config_dir)
        .args(["tab", "set", tab])
        .arg(dir)
        .assert()
        .success();
}

#[test]
fn test_version() {
    let temp_dir = TempDir::new().unwrap();
    let output = json_output(itemsync(temp_dir.path()).arg("version"));
    assert_eq!(output["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(output["marker_version"], 1);
}

#[test]
fn test_tab_set_and_list() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    let notes = temp_dir.path().join("notes");
    set_tab(&config_dir, "notes", &notes);

    let output = json_output(itemsync(&config_dir).args(["tab", "list"]));
    assert_eq!(output["count"], 1);
    assert_eq!(output["tabs"][0]["tab"], "notes");
    assert!(config_dir.join("settings.json").exists());
}

#[test]
fn test_unconfigured_tab_fails_with_code() {
    let temp_dir = TempDir::new().unwrap();
    let assert = itemsync(temp_dir.path())
        .args(["list", "missing"])
        .assert()
        .failure()
        .code(3);

    let stderr: Value = serde_json::from_slice(&assert.get_output().stderr).unwrap();
    assert_eq!(stderr["error"]["code"], "TAB_NOT_CONFIGURED");
}

#[test]
fn test_list_scans_directory() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    let notes = temp_dir.path().join("notes");
    fs::create_dir(&notes).unwrap();
    fs::write(notes.join("todo.txt"), "buy milk").unwrap();
    fs::write(notes.join("todo.html"), "<b>buy milk</b>").unwrap();
    fs::write(notes.join("photo.png"), b"\x89PNG").unwrap();
    set_tab(&config_dir, "notes", &notes);

    let output = json_output(itemsync(&config_dir).args(["list", "notes"]));
    assert_eq!(output["count"], 2);

    let names: Vec<&str> = output["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["base_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["photo", "todo"]);
    assert_eq!(output["items"][0]["icon"], "image");
    assert!(config_dir.join("tabs").join("notes.dat").exists());
}

#[test]
fn test_add_rename_remove() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    let notes = temp_dir.path().join("notes");
    set_tab(&config_dir, "notes", &notes);

    let output = json_output(
        itemsync(&config_dir).args(["add", "notes", "--text", "hello", "--name", "greeting"]),
    );
    assert_eq!(output["name"], "greeting");
    assert_eq!(fs::read_to_string(notes.join("greeting.txt")).unwrap(), "hello");

    let output = json_output(itemsync(&config_dir).args(["rename", "notes", "greeting", "hi"]));
    assert_eq!(output["name"], "hi");
    assert!(!notes.join("greeting.txt").exists());
    assert_eq!(fs::read_to_string(notes.join("hi.txt")).unwrap(), "hello");

    // Files are only deleted after confirmation.
    itemsync(&config_dir)
        .args(["remove", "notes", "hi"])
        .assert()
        .failure()
        .code(4);
    assert!(notes.join("hi.txt").exists());

    let output = json_output(itemsync(&config_dir).args(["remove", "notes", "hi", "--yes"]));
    assert_eq!(output["files_deleted"], 1);
    assert!(!notes.join("hi.txt").exists());
}

#[test]
fn test_add_duplicate_name_gets_suffix() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    let notes = temp_dir.path().join("notes");
    set_tab(&config_dir, "notes", &notes);

    for _ in 0..2 {
        itemsync(&config_dir)
            .args(["add", "notes", "--text", "x", "--name", "dup"])
            .assert()
            .success();
    }

    assert!(notes.join("dup.txt").exists());
    assert!(notes.join("dup-1.txt").exists());
}

#[test]
fn test_copy_between_tabs() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    let source = temp_dir.path().join("source");
    let target = temp_dir.path().join("target");
    fs::create_dir(&source).unwrap();
    fs::write(source.join("photo.png"), b"\x89PNG").unwrap();
    set_tab(&config_dir, "source", &source);
    set_tab(&config_dir, "target", &target);

    let output = json_output(itemsync(&config_dir).args(["copy", "source", "target", "photo"]));
    assert_eq!(output["name"], "photo");
    assert_eq!(fs::read(target.join("photo.png")).unwrap(), b"\x89PNG");
    assert!(source.join("photo.png").exists());
    // Synthesized path text is not written out.
    assert!(!target.join("photo.txt").exists());
}

#[test]
fn test_user_format() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    let notes = temp_dir.path().join("notes");
    fs::create_dir(&notes).unwrap();
    fs::write(notes.join("readme.md"), "# hi").unwrap();
    set_tab(&config_dir, "notes", &notes);

    let output = json_output(itemsync(&config_dir).args(["list", "notes"]));
    assert_eq!(output["count"], 0);

    itemsync(&config_dir)
        .args(["format", "add", "md", "text/markdown"])
        .assert()
        .success();

    let output = json_output(itemsync(&config_dir).args(["list", "notes"]));
    assert_eq!(output["count"], 1);
    assert_eq!(output["items"][0]["extensions"]["text/markdown"], ".md");

    itemsync(&config_dir)
        .args(["format", "remove", ".md"])
        .assert()
        .success();
    itemsync(&config_dir)
        .args(["format", "remove", ".md"])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn test_hash() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.txt");
    fs::write(&path, "abc").unwrap();

    let output = json_output(itemsync(temp_dir.path()).arg("hash").arg(&path));
    assert_eq!(
        output["hash"],
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(output["size"], 3);
}

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn webpub_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("webpub"));
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Job directory with `site/`, an empty `store/$web`, and `job.json`.
fn job_dir(extra: &str) -> TempDir {
    let dir = TempDir::new().expect("job dir");
    fs::create_dir_all(dir.path().join("site/blog")).expect("site");
    fs::create_dir_all(dir.path().join("store/$web")).expect("web container");
    fs::write(dir.path().join("site/index.html"), "<h1>home</h1>").expect("index");
    fs::write(dir.path().join("site/blog/post.html"), "<p>post</p>").expect("post");
    let job = format!(
        r#"{{
  "storageConnection": "LocalFolder=store",
  "folderName": "site",
  "removeExtensions": [".html"],
  "retryWaitMilliseconds": 0{extra}
}}"#
    );
    fs::write(dir.path().join("job.json"), job).expect("job");
    dir
}

fn job_path(dir: &TempDir) -> String {
    dir.path().join("job.json").display().to_string()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read")
}

#[test]
fn publish_uploads_and_reports_success() {
    let dir = job_dir("");

    webpub_cmd()
        .args(["publish", &job_path(&dir)])
        .assert()
        .success()
        .stdout(contains("2 operation(s) to perform"))
        .stdout(contains("All 3 operations completed successfully"));

    assert_eq!(read(&dir.path().join("store/$web/index.html")), "<h1>home</h1>");
    assert_eq!(read(&dir.path().join("store/$web/blog/post")), "<p>post</p>");
    let index: serde_json::Value =
        serde_json::from_str(&read(&dir.path().join("store/xml4web/storage-index.json")))
            .expect("index json");
    assert!(index.get("blog/post").is_some());
    assert!(index.get("index.html").is_some());
}

#[test]
fn second_publish_counts_unchanged_files_as_successes() {
    let dir = job_dir("");
    webpub_cmd()
        .args(["publish", &job_path(&dir)])
        .assert()
        .success();

    webpub_cmd()
        .args(["publish", &job_path(&dir)])
        .assert()
        .success()
        .stdout(contains("0 operation(s) to perform"))
        .stdout(contains("All 3 operations completed successfully"));
}

#[test]
fn bare_job_path_publishes() {
    let dir = job_dir("");

    webpub_cmd()
        .arg(job_path(&dir))
        .assert()
        .success()
        .stdout(contains("2 operation(s) to perform"))
        .stdout(contains("All 3 operations completed successfully"));

    assert_eq!(read(&dir.path().join("store/$web/blog/post")), "<p>post</p>");
}

#[test]
fn bare_job_path_honors_dry_run() {
    let dir = job_dir("");

    webpub_cmd()
        .args([job_path(&dir).as_str(), "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run] 2 operation(s) would run"));

    assert!(!dir.path().join("store/$web/index.html").exists());
}

#[test]
fn no_job_and_no_subcommand_is_an_error() {
    webpub_cmd()
        .assert()
        .failure()
        .stderr(contains("no job file given"));
}

#[test]
fn dry_run_writes_nothing() {
    let dir = job_dir("");

    webpub_cmd()
        .args(["publish", &job_path(&dir), "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run] 2 operation(s) would run"));

    assert!(!dir.path().join("store/$web/index.html").exists());
    assert!(!dir.path().join("store/xml4web").exists());
}

#[test]
fn failed_file_sets_exit_code_but_others_publish() {
    let dir = job_dir(r#", "retryCount": 1"#);
    // A directory where the object should go makes every write to it fail.
    fs::create_dir_all(dir.path().join("store/$web/blog/post/blocked")).expect("blocker");

    webpub_cmd()
        .args(["publish", &job_path(&dir)])
        .assert()
        .failure()
        .stdout(contains("Failed operations:"))
        .stdout(contains("blog/post"))
        .stdout(contains("Successfully completed 2 operations, 1 failed"));

    assert!(dir.path().join("store/$web/index.html").exists());
    let index = read(&dir.path().join("store/xml4web/storage-index.json"));
    assert!(!index.contains("blog/post"));
}

#[test]
fn missing_web_container_is_fatal() {
    let dir = job_dir("");
    fs::remove_dir(dir.path().join("store/$web")).expect("remove container");

    webpub_cmd()
        .args(["publish", &job_path(&dir)])
        .assert()
        .failure()
        .stderr(contains("$web"));
}

#[test]
fn malformed_job_file_is_reported() {
    let dir = TempDir::new().expect("dir");
    fs::write(dir.path().join("job.json"), "{ not json").expect("job");

    webpub_cmd()
        .args(["publish", &job_path(&dir)])
        .assert()
        .failure()
        .stderr(contains("failed to load job file"));
}

#[test]
fn index_command_prints_json_after_publish() {
    let dir = job_dir("");
    webpub_cmd()
        .args(["publish", &job_path(&dir)])
        .assert()
        .success();

    let assert = webpub_cmd()
        .args(["index", &job_path(&dir), "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let payload: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(payload["name"], "storage-index.json");
    assert!(payload["entries"].get("blog/post").is_some());
}

#[test]
fn index_command_before_first_publish() {
    let dir = job_dir("");

    webpub_cmd()
        .args(["index", &job_path(&dir)])
        .assert()
        .success()
        .stdout(contains("No index recorded yet"));
}

use std::path::Path;
use std::sync::Arc;

use action_flow::{DefaultFlowExecutor, FlowExecutor, RunOptions, ScriptedAction, ScriptedModel};
use action_primitives::fake::FakePage;
use action_primitives::ElementAttributes;
use assert_cmd::Command;
use stepreplay_core_types::TestCase;
use stepreplay_snapshot_store::{SnapPolicyView, SnapshotStoreBuilder};

const LOGIN: &str = "navigate to /login\nclick Submit\n";

fn stepreplay(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stepreplay").unwrap();
    cmd.env("STEPREPLAY_SNAPSHOT_DIR", dir.join("snapshots"))
        .env_remove("STEPREPLAY_MAX_ACTIONS")
        .env_remove("STEPREPLAY_TROUBLESHOOT")
        .arg("--config")
        .arg(dir.join("absent.yaml"));
    cmd
}

fn write_test(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("login.txt");
    std::fs::write(&path, LOGIN).unwrap();
    path
}

fn inspect_json(dir: &Path, file: &Path) -> serde_json::Value {
    let output = stepreplay(dir)
        .arg("inspect")
        .arg(file)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

async fn record_snapshot(dir: &Path) {
    let store =
        SnapshotStoreBuilder::new(SnapPolicyView::with_root(dir.join("snapshots"))).build();
    let page = FakePage::new("https://app.test/");
    page.add(
        ElementAttributes::new("button")
            .with_role("button", Some("Submit"))
            .with_fallback_id("1"),
    );
    let model = Arc::new(
        ScriptedModel::new()
            .on_step("navigate to /login", vec![ScriptedAction::navigate("/login")])
            .on_step("click Submit", vec![ScriptedAction::click("1")]),
    );
    DefaultFlowExecutor::new(store, model)
        .execute(&TestCase::new(LOGIN), &page, &RunOptions::default())
        .await
        .unwrap();
}

#[test]
fn fingerprint_prints_key_and_steps() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_test(dir.path());
    let test = TestCase::new(LOGIN);

    let output = stepreplay(dir.path())
        .arg("fingerprint")
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(&format!("key: {}", test.snapshot_key())));
    for step in test.steps() {
        assert!(stdout.contains(step.fingerprint.as_str()));
    }
}

#[test]
fn fingerprint_with_id_uses_stable_key() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_test(dir.path());
    let output = stepreplay(dir.path())
        .args(["fingerprint", "--id", "login"])
        .arg(&file)
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let key = TestCase::new("anything").with_id("login").snapshot_key();
    assert!(stdout.contains(key.as_str()));
}

#[test]
fn inspect_without_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_test(dir.path());
    let json = inspect_json(dir.path(), &file);
    assert_eq!(json["exists"], false);
    assert_eq!(json["wouldReplay"], false);
    assert_eq!(json["steps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invalidate_flags_existing_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_test(dir.path());
    record_snapshot(dir.path()).await;

    let json = inspect_json(dir.path(), &file);
    assert_eq!(json["exists"], true);
    assert_eq!(json["wouldReplay"], true);
    assert_eq!(json["steps"][1]["cached"], true);

    stepreplay(dir.path())
        .arg("invalidate")
        .arg(&file)
        .assert()
        .success();

    let json = inspect_json(dir.path(), &file);
    assert_eq!(json["forceRegenerate"], true);
    assert_eq!(json["wouldReplay"], false);
}

#[test]
fn invalidate_without_snapshot_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_test(dir.path());
    stepreplay(dir.path())
        .arg("invalidate")
        .arg(&file)
        .assert()
        .failure();
}

#[test]
fn empty_test_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("empty.txt");
    std::fs::write(&file, "\n  \n").unwrap();
    stepreplay(dir.path())
        .arg("fingerprint")
        .arg(&file)
        .assert()
        .failure();
}

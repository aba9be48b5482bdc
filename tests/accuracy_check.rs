use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const MODEL: &str = r#"{
  "feature_names": ["Pclass", "Sex", "Age"],
  "encodings": { "Sex": { "male": 0, "female": 1 } },
  "fill_values": [3.0, 0.0, 28.0],
  "model": {
    "type": "tree_ensemble",
    "trees": [
      { "nodes": [
        { "feature": 1, "threshold": 0.5, "left": 1, "right": 2 },
        { "value": 0 },
        { "value": 1 }
      ] },
      { "nodes": [
        { "feature": 1, "threshold": 0.5, "left": 1, "right": 2 },
        { "value": 0 },
        { "value": 1 }
      ] },
      { "nodes": [
        { "feature": 0, "threshold": 2.5, "left": 1, "right": 2 },
        { "value": 1 },
        { "value": 0 }
      ] }
    ]
  }
}"#;

fn check_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_accuracy-check"))
}

/// Writes `rows` rows where the first `correct` follow the model and the
/// rest contradict it.
fn write_test_set(root: &Path, rows: usize, correct: usize) {
    let mut csv = String::from("PassengerId,Survived,Pclass,Name,Sex,Age\n");
    for i in 0..rows {
        let female = i % 2 == 0;
        let predicted = i32::from(female);
        let label = if i < correct { predicted } else { 1 - predicted };
        let age = if i % 5 == 0 { String::new() } else { (20 + i).to_string() };
        csv.push_str(&format!(
            "{},{},{},\"Passenger, No. {}\",{},{}\n",
            i + 1,
            label,
            if i % 3 == 0 { 1 } else { 3 },
            i,
            if female { "female" } else { "male" },
            age
        ));
    }
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("data/test.csv"), csv).unwrap();
}

fn write_model(root: &Path) {
    fs::create_dir_all(root.join("models")).unwrap();
    fs::write(root.join("models/titanic_model.json"), MODEL).unwrap();
}

fn run_check(dir: &Path) -> (String, String, bool) {
    let binary = check_binary();
    let output = Command::new(&binary)
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run accuracy-check at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_passes_above_threshold() {
    let tmp = TempDir::new().unwrap();
    write_model(tmp.path());
    write_test_set(tmp.path(), 20, 17);

    let (stdout, stderr, success) = run_check(tmp.path());
    assert!(success, "check failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("accuracy 0.85"), "stdout: {}", stdout);
}

#[test]
fn test_fails_below_threshold() {
    let tmp = TempDir::new().unwrap();
    write_model(tmp.path());
    write_test_set(tmp.path(), 20, 15);

    let (_, stderr, success) = run_check(tmp.path());
    assert!(!success, "check should fail at 0.75 accuracy");
    assert!(stderr.contains("Accuracy too low: 0.75"), "stderr: {}", stderr);
}

#[test]
fn test_exactly_at_threshold_fails() {
    let tmp = TempDir::new().unwrap();
    write_model(tmp.path());
    write_test_set(tmp.path(), 20, 16);

    let (_, stderr, success) = run_check(tmp.path());
    assert!(!success);
    assert!(stderr.contains("Accuracy too low: 0.8"), "stderr: {}", stderr);
}

#[test]
fn test_missing_artifact_fails() {
    let tmp = TempDir::new().unwrap();
    write_test_set(tmp.path(), 20, 20);

    let (_, stderr, success) = run_check(tmp.path());
    assert!(!success);
    assert!(stderr.contains("titanic_model.json"), "stderr: {}", stderr);
}

#[test]
fn test_missing_feature_column_fails() {
    let tmp = TempDir::new().unwrap();
    write_model(tmp.path());
    fs::create_dir_all(tmp.path().join("data")).unwrap();
    fs::write(
        tmp.path().join("data/test.csv"),
        "Survived,Pclass,Age\n1,1,30\n0,3,40\n",
    )
    .unwrap();

    let (_, stderr, success) = run_check(tmp.path());
    assert!(!success);
    assert!(stderr.contains("missing column 'Sex'"), "stderr: {}", stderr);
}

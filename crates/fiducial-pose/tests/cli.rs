#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn bin() -> Command {
    Command::cargo_bin("fiducial-pose").expect("binary")
}

#[test]
fn board_prints_corner_layout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("tracker.json");
    fs::write(
        &config,
        r#"{
            "marker_size": 0.05,
            "dictionary": "dict_6x6_50",
            "board": {
                "marker_edge_length": 0.04,
                "anchors": [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]]
            }
        }"#,
    )
    .expect("write config");

    let out = bin()
        .args(["board", "--config"])
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(value["ids"], serde_json::json!([0, 1]));
    assert_eq!(value["corners"][1][2], serde_json::json!([0.14, -0.04, 0.0]));
}

#[test]
fn board_rejects_bad_edge_length() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("tracker.json");
    fs::write(
        &config,
        r#"{"marker_size": 0.05, "board": {"marker_edge_length": 0.0, "anchors": [[0, 0, 0]]}}"#,
    )
    .expect("write config");

    bin()
        .args(["board", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("edge length"));
}

#[test]
fn align_writes_report_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("pairs.json");
    let output = dir.path().join("report.json");
    fs::write(
        &input,
        r#"{
            "camera_points": [[0, 0, 1], [1, 0, 1], [0, 1, 1], [1, 1, 2]],
            "marker_points": [[0, 0, 3], [1, 0, 3], [0, 1, 3], [1, 1, 4]]
        }"#,
    )
    .expect("write input");

    bin()
        .args(["align", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).expect("report")).expect("json");
    assert_eq!(report["correspondences"], 4);
    let tz = report["transform"][2][3].as_f64().expect("number");
    assert!((tz - 2.0).abs() < 1e-9, "tz = {tz}");
    assert_eq!(report["transform"][3], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
}

#[test]
fn align_reports_degenerate_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("pairs.json");
    fs::write(
        &input,
        r#"{
            "camera_points": [[0, 0, 1], [0, 0, 2], [0, 0, 3]],
            "marker_points": [[1, 0, 1], [1, 0, 2], [1, 0, 3]]
        }"#,
    )
    .expect("write input");

    bin()
        .args(["align", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("rank"));
}

#[test]
fn align_rejects_unequal_point_lists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("pairs.json");
    fs::write(
        &input,
        r#"{
            "camera_points": [[0, 0, 1], [1, 0, 1], [0, 1, 1]],
            "marker_points": [[0, 0, 3], [1, 0, 3], [0, 1, 3], [1, 1, 4]]
        }"#,
    )
    .expect("write input");

    bin()
        .args(["align", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("differ in length (a=3, b=4)"));
}

#[test]
fn intrinsics_prints_camera_matrix() {
    let dir = tempfile::tempdir().expect("tempdir");
    let calibration = dir.path().join("calibration.json");
    fs::write(
        &calibration,
        r#"{
            "focal_length": [500.0, 510.0],
            "principal_point": [320.0, 240.0],
            "radial_distortion": [0.1, -0.2, 0.3],
            "tangential_distortion": [0.01, -0.02],
            "image_width": 640,
            "image_height": 480
        }"#,
    )
    .expect("write calibration");

    bin()
        .args(["--verbose", "intrinsics", "--calibration"])
        .arg(&calibration)
        .assert()
        .success()
        .stdout(predicate::str::contains("510.0"))
        .stdout(predicate::str::contains("dist_coeffs"));
}

#[test]
fn missing_input_fails_cleanly() {
    bin()
        .args(["align", "--input", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));
}

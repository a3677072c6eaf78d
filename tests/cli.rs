use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

mod common;
use common::{fixture, write_bmp};

fn annox() -> Command {
    let mut cmd = Command::cargo_bin("annox").unwrap();
    cmd.env_remove("ANNOX_LOG").env_remove("ANNOX_WORKERS");
    cmd
}

#[test]
fn runs() {
    annox().assert().success();
}

#[test]
fn outputs_tool_name() {
    annox()
        .arg("-V")
        .assert()
        .success()
        .stdout(format!("annox {}\n", env!("CARGO_PKG_VERSION")));
}

// Validate subcommand tests

#[test]
fn validate_valid_dataset_succeeds() {
    annox()
        .args(["validate"])
        .arg(fixture("sample_valid.ir.json"))
        .assert()
        .success()
        .stdout("OK: 2 items, 5 annotations\n");
}

#[test]
fn validate_invalid_dataset_lists_every_error() {
    annox()
        .arg("validate")
        .arg(fixture("sample_invalid.ir.json"))
        .assert()
        .code(2)
        .stdout(predicate::str::starts_with("Validation failed:\n"))
        .stdout(predicate::str::contains("- bbox has negative coords (-4, 10) in item a"))
        .stdout(predicate::str::contains("- Duplicate annotation id 1 in item a"))
        .stdout(predicate::str::contains("- keypoints length 3 != expected 6"))
        .stdout(predicate::str::contains("- Duplicate item id: a"));
}

#[test]
fn validate_with_workers_gives_same_output() {
    let sequential = annox()
        .arg("validate")
        .arg(fixture("sample_invalid.ir.json"))
        .output()
        .unwrap();
    let parallel = annox()
        .arg("validate")
        .arg(fixture("sample_invalid.ir.json"))
        .env("ANNOX_WORKERS", "3")
        .output()
        .unwrap();
    assert_eq!(sequential.stdout, parallel.stdout);
    assert_eq!(parallel.status.code(), Some(2));
}

#[test]
fn validate_jsonl_stream() {
    annox()
        .arg("validate")
        .arg(fixture("items.jsonl"))
        .assert()
        .success()
        .stdout("OK: 2 items, 3 annotations\n");
}

#[test]
fn validate_json_output_format() {
    annox()
        .arg("validate")
        .arg(fixture("sample_invalid.ir.json"))
        .args(["--output", "json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"ok\": false"))
        .stdout(predicate::str::contains("\"error_count\": 4"))
        .stdout(predicate::str::contains("\"code\": \"duplicate_item_id\""));
}

#[test]
fn validate_nonexistent_file_fails() {
    annox()
        .args(["validate", "nonexistent_file.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn validate_malformed_file_fails() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("bad.json");
    fs::write(
        &path,
        r#"{"items": [{"id": "a", "image": {"file_name": "a.jpg", "width": 1, "height": 1},
            "annotations": [{"id": 1, "type": "bbox", "bbox": {"x": 0, "y": 0, "w": -1, "h": 1}}]}]}"#,
    )
    .unwrap();

    annox()
        .arg("validate")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("w must be non-negative"));
}

// list-formats

#[test]
fn list_formats_shows_capabilities() {
    annox()
        .arg("list-formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("annox: {attributes: true, det: true"))
        .stdout(predicate::str::contains("coco: {attributes: true, det: true, keypoints: true, panoptic: false"))
        .stdout(predicate::str::contains("yolo: {attributes: false, det: true, keypoints: false"));
}

// convert

#[test]
fn convert_coco_to_canonical_and_back() {
    let temp = tempfile::tempdir().unwrap();
    let ir = temp.path().join("dataset.json");
    let coco = temp.path().join("nested/out.json");

    annox()
        .args(["convert", "--from", "coco", "--to", "ir-json", "--src"])
        .arg(fixture("sample_valid.coco.json"))
        .arg("--dst")
        .arg(&ir)
        .assert()
        .success()
        .stdout(format!("Wrote: {}\n", ir.display()));

    annox()
        .arg("validate")
        .arg(&ir)
        .assert()
        .success()
        .stdout("OK: 2 items, 6 annotations\n");

    annox()
        .args(["convert", "--from", "annox", "--to", "coco-json", "--src"])
        .arg(&ir)
        .arg("--dst")
        .arg(&coco)
        .assert()
        .success();

    let out: serde_json::Value = serde_json::from_str(&fs::read_to_string(&coco).unwrap()).unwrap();
    assert_eq!(out["images"].as_array().unwrap().len(), 2);
    assert_eq!(out["annotations"].as_array().unwrap().len(), 6);
    assert_eq!(out["categories"][0]["skeleton"], serde_json::json!([[1, 2]]));
}

#[test]
fn convert_yolo_to_coco() {
    let temp = tempfile::tempdir().unwrap();
    let yolo = temp.path().join("yolo");
    write_bmp(&yolo.join("img.bmp"), 40, 20);
    fs::write(yolo.join("img.txt"), "0 0.5 0.5 0.5 0.5\n").unwrap();
    let dst = temp.path().join("coco.json");

    annox()
        .args(["convert", "--from", "yolo", "--to", "coco", "--src"])
        .arg(&yolo)
        .arg("--dst")
        .arg(&dst)
        .assert()
        .success();

    let out: serde_json::Value = serde_json::from_str(&fs::read_to_string(&dst).unwrap()).unwrap();
    assert_eq!(out["annotations"][0]["bbox"], serde_json::json!([10.0, 5.0, 20.0, 10.0]));
    assert_eq!(out["categories"][0]["name"], "class_0");
}

#[test]
fn convert_unknown_format_fails() {
    let temp = tempfile::tempdir().unwrap();
    annox()
        .args(["convert", "--from", "pascal-voc", "--to", "coco", "--src"])
        .arg(fixture("sample_valid.coco.json"))
        .arg("--dst")
        .arg(temp.path().join("out.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown format 'pascal-voc'"))
        .stderr(predicate::str::contains("annox, coco, yolo"));
}

#[test]
fn convert_missing_source_fails() {
    let temp = tempfile::tempdir().unwrap();
    let dst = temp.path().join("out.json");
    annox()
        .args(["convert", "--from", "coco", "--to", "annox", "--src"])
        .arg(temp.path().join("missing.json"))
        .arg("--dst")
        .arg(&dst)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
    assert!(!dst.exists());
}

use assert_cmd::Command;
use predicates::prelude::*;

mod common;
use common::{create_coco_dataset, create_voc_dataset, create_yolo_dataset};

fn analyzer() -> Command {
    Command::cargo_bin("dataset-analyzer").unwrap()
}

#[test]
fn runs() {
    analyzer()
        .assert()
        .success()
        .stdout(predicate::str::contains("dataset-analyzer"));
}

#[test]
fn outputs_tool_name() {
    let mut cmd = analyzer();
    cmd.arg("-V");
    cmd.assert()
        .success()
        .stdout(format!("dataset-analyzer {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn detect_prints_format() {
    let temp = tempfile::tempdir().unwrap();
    create_yolo_dataset(temp.path());

    analyzer()
        .arg("detect")
        .arg(temp.path())
        .assert()
        .success()
        .stdout("YOLO\n");
}

#[test]
fn detect_fails_on_unknown_layout() {
    let temp = tempfile::tempdir().unwrap();

    analyzer()
        .arg("detect")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: Could not detect dataset format"));
}

#[test]
fn missing_path_fails() {
    analyzer()
        .args(["info", "definitely/not/here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path does not exist"));
}

#[test]
fn info_text_and_json() {
    let temp = tempfile::tempdir().unwrap();
    create_coco_dataset(temp.path());

    analyzer()
        .arg("info")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Format:       COCO"))
        .stdout(predicate::str::contains("person, car"));

    let output = analyzer()
        .arg("info")
        .arg(temp.path())
        .args(["--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["format"], "coco");
    assert_eq!(json["total_images"], 3);
    assert_eq!(json["splits"], serde_json::json!(["train", "val"]));
}

#[test]
fn stats_all_renders_every_section() {
    let temp = tempfile::tempdir().unwrap();
    create_voc_dataset(temp.path());

    analyzer()
        .arg("stats")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Overview"))
        .stdout(predicate::str::contains("Bounding Boxes"))
        .stdout(predicate::str::contains("Images"))
        .stdout(predicate::str::contains("Spatial"));
}

#[test]
fn stats_spatial_json_respects_grid_size() {
    let temp = tempfile::tempdir().unwrap();
    create_coco_dataset(temp.path());

    let output = analyzer()
        .arg("stats")
        .arg(temp.path())
        .args(["--report", "spatial", "--output", "json", "--grid-size", "4"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["heatmap"].as_array().unwrap().len(), 4);
    assert!(json["per_class_heatmaps"]["person"].is_array());
    assert!(json["edge_proximity"]["center"].is_number());
}

#[test]
fn stats_rejects_zero_grid() {
    let temp = tempfile::tempdir().unwrap();
    create_coco_dataset(temp.path());

    analyzer()
        .arg("stats")
        .arg(temp.path())
        .args(["--grid-size", "0"])
        .assert()
        .failure();
}

#[test]
fn images_lists_filtered_page() {
    let temp = tempfile::tempdir().unwrap();
    create_yolo_dataset(temp.path());

    let output = analyzer()
        .arg("images")
        .arg(temp.path())
        .args(["--split", "train", "--limit", "1", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["pages"], 2);
    assert_eq!(json["images"].as_array().unwrap().len(), 1);
    assert_eq!(json["images"][0]["id"], "t2");

    analyzer()
        .arg("images")
        .arg(temp.path())
        .args(["--class", "dog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t1.png"))
        .stdout(predicate::str::contains("Page 1 of 1 (1 matching image(s))"));
}

#[test]
fn images_rejects_zero_limit() {
    let temp = tempfile::tempdir().unwrap();
    create_yolo_dataset(temp.path());

    analyzer()
        .arg("images")
        .arg(temp.path())
        .args(["--limit", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid query"));
}

#[test]
fn image_shows_record_or_fails() {
    let temp = tempfile::tempdir().unwrap();
    create_voc_dataset(temp.path());

    analyzer()
        .arg("image")
        .arg(temp.path())
        .arg("img1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Size:      100x100"))
        .stdout(predicate::str::contains("person"));

    analyzer()
        .arg("image")
        .arg(temp.path())
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Image not found: nope"));
}

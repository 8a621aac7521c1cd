use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const SQUARE: &str = r#"{
  "points": [
    {"x": 0.0, "y": 0.0, "z": 1.0},
    {"x": 10.0, "y": 0.0, "z": 2.0},
    {"x": 10.0, "y": 10.0, "z": 3.0},
    {"x": 0.0, "y": 10.0, "z": 4.0},
    {"x": 5.0, "y": 5.0, "z": 5.0}
  ],
  "triangles": [[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]],
  "features": [
    {"kind": "Breakline", "user_tag": 7, "feature_id": 70, "indices": [0, 4, 2]}
  ]
}"#;

const INNER_FENCE: &str = r#"{
  "points": [
    {"x": 2.0, "y": 2.0, "z": 0.0},
    {"x": 8.0, "y": 2.0, "z": 0.0},
    {"x": 8.0, "y": 8.0, "z": 0.0},
    {"x": 2.0, "y": 8.0, "z": 0.0},
    {"x": 2.0, "y": 2.0, "z": 0.0}
  ],
  "fence_type": "Shape",
  "option": "Inside"
}"#;

#[test]
fn extract_spots_in_batches() {
    let file = assert_fs::NamedTempFile::new("square.json").unwrap();
    file.write_str(SQUARE).unwrap();

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args([
            "extract",
            file.path().to_str().unwrap(),
            "spots",
            "--max-spots",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Spots - - 2"))
        .stdout(predicate::str::contains("Spots - - 1"))
        .stdout(predicate::str::contains("5.000,5.000,5.000"));
}

#[test]
fn extract_hull_of_a_triangulated_surface() {
    let file = assert_fs::NamedTempFile::new("square.json").unwrap();
    file.write_str(SQUARE).unwrap();

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args(["extract", file.path().to_str().unwrap(), "tin-hull"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TinHull - - 5"));
}

#[test]
fn fenced_extraction_keeps_the_inside() {
    let dir = assert_fs::TempDir::new().unwrap();
    let surface = dir.child("square.json");
    surface.write_str(SQUARE).unwrap();
    let fence = dir.child("fence.json");
    fence.write_str(INNER_FENCE).unwrap();

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args([
            "extract",
            surface.path().to_str().unwrap(),
            "spots",
            "--fence",
            fence.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Spots - - 1"))
        .stdout(predicate::str::contains("0.000,0.000,1.000").not());

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args([
            "extract",
            surface.path().to_str().unwrap(),
            "spots",
            "--fence",
            fence.path().to_str().unwrap(),
            "--fence-option",
            "3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Spots - - 4"))
        .stdout(predicate::str::contains("5.000,5.000,5.000").not());
    dir.close().unwrap();
}

#[test]
fn scan_stops_at_limit() {
    let file = assert_fs::NamedTempFile::new("square.json").unwrap();
    file.write_str(SQUARE).unwrap();

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args([
            "scan",
            file.path().to_str().unwrap(),
            "triangle",
            "--limit",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Triangle - - 4").count(2));
}

#[test]
fn by_tag_finds_the_breakline() {
    let file = assert_fs::NamedTempFile::new("square.json").unwrap();
    file.write_str(SQUARE).unwrap();

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args(["by-tag", file.path().to_str().unwrap(), "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Breakline 7 70 3"));
}

#[test]
fn lattice_points_from_a_sampled_surface() {
    let file = assert_fs::NamedTempFile::new("square.json").unwrap();
    file.write_str(SQUARE).unwrap();

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args([
            "lattice",
            file.path().to_str().unwrap(),
            "lattice-point",
            "--spacing",
            "5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("LatticePoint - - 1").count(9));
}

#[test]
fn convert_to_landxml() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("square.json");
    input.write_str(SQUARE).unwrap();
    let output = dir.child("square.xml");

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args([
            "convert",
            input.path().to_str().unwrap(),
            output.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    output.assert(predicate::str::contains("<Faces>"));
    output.assert(predicate::str::contains("<Breakline>"));
    dir.close().unwrap();
}

#[test]
fn unknown_kind_is_rejected() {
    let file = assert_fs::NamedTempFile::new("square.json").unwrap();
    file.write_str(SQUARE).unwrap();

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args(["extract", file.path().to_str().unwrap(), "contours"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown feature kind"));
}

#[test]
fn lattice_kind_on_a_surface_fails() {
    let file = assert_fs::NamedTempFile::new("square.json").unwrap();
    file.write_str(SQUARE).unwrap();

    Command::cargo_bin("tin_extract_cli")
        .unwrap()
        .args(["extract", file.path().to_str().unwrap(), "lattice-edge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be extracted"));
}

//! CLI integration tests for argument handling and `--inspect`

mod common;

use common::sample_jpeg;
use listing_harvester::{ImageMetadata, MetadataEmbedder, VehicleRecord};
use std::process::Command;
use tempfile::TempDir;

fn harvester() -> Command {
    Command::new(env!("CARGO_BIN_EXE_listing-harvester"))
}

#[test]
fn test_inspect_prints_embedded_vehicle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("corolla.jpg");
    std::fs::write(&path, sample_jpeg(1)).unwrap();
    MetadataEmbedder::embed(
        &path,
        &ImageMetadata {
            vehicle: VehicleRecord::new("Toyota", "Corolla"),
        },
    )
    .unwrap();

    let output = harvester()
        .arg("--inspect")
        .arg(&path)
        .output()
        .expect("Failed to run listing-harvester");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Toyota"), "stdout: {}", stdout);
    assert!(stdout.contains("Corolla"), "stdout: {}", stdout);
}

#[test]
fn test_inspect_untagged_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("plain.jpg");
    std::fs::write(&path, sample_jpeg(2)).unwrap();

    let output = harvester().arg("--inspect").arg(&path).output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No embedded metadata"));
}

#[test]
fn test_invalid_count_fails_with_usage() {
    let output = harvester().args(["-n", "lots"]).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_output_path_that_is_a_file_fails_fast() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let file = temp_dir.path().join("images");
    std::fs::write(&file, b"x").unwrap();

    // The endpoint is unroutable, so success would require skipping validation
    let output = harvester()
        .arg("-d")
        .arg(&file)
        .args(["--endpoint", "http://127.0.0.1:9/lst.json"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a directory"));
}

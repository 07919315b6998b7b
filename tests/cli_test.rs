//! Integration test for the cvio CLI binary.
//!
//! Generates small image fixtures, runs them through the binary, and
//! verifies output files and exit codes.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

#[test]
fn test_cli_help() {
    let binary_path = get_binary_path();

    let output = Command::new(&binary_path)
        .arg("--help")
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cvio"));
    assert!(stdout.contains("--mode"));
}

#[test]
fn test_cli_missing_file() {
    let binary_path = get_binary_path();

    let output = Command::new(&binary_path)
        .arg("nonexistent-file.jpg")
        .output()
        .expect("Failed to run binary");

    // Should fail with exit code 1
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("File not found") || stderr.contains("nonexistent-file.jpg"));
}

#[test]
fn test_cli_info_prints_dimensions() {
    let binary_path = get_binary_path();
    let temp_dir = TempDir::new().unwrap();
    let fixture = write_fixture(temp_dir.path(), "test.jpg", 64, 48);

    let output = Command::new(&binary_path)
        .arg(&fixture)
        .arg("--info")
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("64x48"));
}

#[test]
fn test_cli_info_legacy_form_matches() {
    let binary_path = get_binary_path();
    let temp_dir = TempDir::new().unwrap();
    let fixture = write_fixture(temp_dir.path(), "test.jpg", 32, 20);

    let output = Command::new(&binary_path)
        .arg(&fixture)
        .arg("--info")
        .arg("--legacy")
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("32x20"));
}

#[test]
fn test_cli_convert_writes_output() {
    let binary_path = get_binary_path();
    let temp_dir = TempDir::new().unwrap();
    let fixture = write_fixture(temp_dir.path(), "input.jpg", 16, 16);
    let out_path = temp_dir.path().join("converted.png");

    let output = Command::new(&binary_path)
        .arg(&fixture)
        .arg("--output-filename")
        .arg(&out_path)
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    assert!(out_path.exists());
}

#[test]
fn test_cli_output_filename_multiple_files() {
    let binary_path = get_binary_path();
    let temp_dir = TempDir::new().unwrap();

    let file1 = write_fixture(temp_dir.path(), "test1.jpg", 8, 8);
    let file2 = write_fixture(temp_dir.path(), "test2.jpg", 8, 8);

    let output = Command::new(&binary_path)
        .arg(&file1)
        .arg(&file2)
        .arg("--output-filename")
        .arg("output.png")
        .output()
        .expect("Failed to run binary");

    // Should fail when using --output-filename with multiple files
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--output-filename can only be used with one input file"));
}

/// Write a small color JPEG fixture into `dir`.
fn write_fixture(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    img.save(&path).expect("failed to write fixture");
    path
}

/// Get the path to the compiled binary
fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cvio"))
}

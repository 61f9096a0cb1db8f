//! CLI integration tests for the two-argument contract
//!
//! Every run gets an empty model cache with downloads disabled, so nothing
//! here touches the network unless the test is explicitly `#[ignore]`d.

#![cfg(feature = "cli")]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn remove_bg(cache_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_remove-bg"));
    cmd.env("U2NET_HOME", cache_dir)
        .env("REMOVE_BG_OFFLINE", "1")
        .env_remove("REMOVE_BG_MODEL")
        .env_remove("REMOVE_BG_BACKEND")
        .env_remove("REMOVE_BG_EXECUTION_PROVIDER")
        .env_remove("REMOVE_BG_THREADS")
        .env_remove("REMOVE_BG_MODEL_SHA256")
        .env_remove("REMOVE_BG_LOG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let image = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([220, 40, 40])
        } else {
            Rgb([30, 30, 200])
        }
    });
    DynamicImage::ImageRgb8(image)
        .save_with_format(&path, ImageFormat::Png)
        .expect("Failed to write test image");
    path
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_usage_failure(output: &Output) {
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty(), "stdout should be empty");
    let stderr = stderr_of(output);
    assert!(
        stderr.contains("Usage: remove-bg <INPUT_PATH> <OUTPUT_PATH>"),
        "unexpected stderr: {stderr}"
    );
    assert!(!stderr.contains("ERROR:"));
}

#[test]
fn test_no_arguments_prints_usage() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let output = remove_bg(temp_dir.path())
        .output()
        .expect("Failed to execute CLI");

    assert_usage_failure(&output);
}

#[test]
fn test_single_argument_prints_usage_without_file_io() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cache_dir = temp_dir.path().join("cache");
    let output_path = temp_dir.path().join("out.png");

    let output = remove_bg(&cache_dir)
        .arg(&output_path)
        .output()
        .expect("Failed to execute CLI");

    assert_usage_failure(&output);
    assert!(!output_path.exists());
    assert!(!cache_dir.exists(), "usage errors must not create the model cache");
}

#[test]
fn test_three_arguments_print_usage_without_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = write_test_image(temp_dir.path(), "in.png", 16, 16);
    let output_path = temp_dir.path().join("out.png");

    let output = remove_bg(temp_dir.path())
        .arg(&input)
        .arg(&output_path)
        .arg("extra")
        .output()
        .expect("Failed to execute CLI");

    assert_usage_failure(&output);
    assert!(!output_path.exists());
}

#[test]
fn test_options_are_not_recognised() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let output = remove_bg(temp_dir.path())
        .arg("--help")
        .output()
        .expect("Failed to execute CLI");

    assert_usage_failure(&output);
}

#[test]
fn test_double_dash_is_counted_as_an_argument() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = write_test_image(temp_dir.path(), "in.png", 16, 16);
    let output_path = temp_dir.path().join("out.png");

    let output = remove_bg(temp_dir.path())
        .arg("--")
        .arg(&input)
        .arg(&output_path)
        .output()
        .expect("Failed to execute CLI");

    assert_usage_failure(&output);
    assert!(!output_path.exists());
}

#[test]
fn test_hyphen_prefixed_input_is_a_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    write_test_image(temp_dir.path(), "-in.png", 16, 16);

    let output = remove_bg(temp_dir.path())
        .current_dir(temp_dir.path())
        .arg("-in.png")
        .arg("out.png")
        .output()
        .expect("Failed to execute CLI");

    // The image is read and decoded; only the missing model stops the run
    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.starts_with("ERROR: "), "unexpected stderr: {stderr}");
    assert!(stderr.contains("u2net.onnx"), "unexpected stderr: {stderr}");
    assert!(!temp_dir.path().join("out.png").exists());
}

#[test]
fn test_missing_input_reports_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let missing = temp_dir.path().join("missing.jpg");
    let output_path = temp_dir.path().join("out.png");

    let output = remove_bg(temp_dir.path())
        .arg(&missing)
        .arg(&output_path)
        .output()
        .expect("Failed to execute CLI");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = stderr_of(&output);
    assert!(stderr.starts_with("ERROR: "), "unexpected stderr: {stderr}");
    assert!(stderr.contains("missing.jpg"));
    assert!(!output_path.exists());
}

#[test]
fn test_non_image_input_leaves_no_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("notes.txt");
    fs::write(&input, "this is not an image").expect("Failed to write input");
    let output_path = temp_dir.path().join("out.png");

    let output = remove_bg(temp_dir.path())
        .arg(&input)
        .arg(&output_path)
        .output()
        .expect("Failed to execute CLI");

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.starts_with("ERROR: "), "unexpected stderr: {stderr}");
    assert!(stderr.contains("Background removal failed"));
    assert!(!output_path.exists());
}

#[test]
fn test_missing_model_while_offline_reports_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = write_test_image(temp_dir.path(), "in.png", 24, 12);
    let output_path = temp_dir.path().join("out.png");

    let output = remove_bg(temp_dir.path())
        .env("REMOVE_BG_MODEL", "u2netp")
        .arg(&input)
        .arg(&output_path)
        .output()
        .expect("Failed to execute CLI");

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("ERROR: "), "unexpected stderr: {stderr}");
    assert!(stderr.contains("u2netp.onnx"));
    assert!(!output_path.exists());
}

#[test]
fn test_invalid_environment_reports_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = write_test_image(temp_dir.path(), "in.png", 8, 8);
    let output_path = temp_dir.path().join("out.png");

    let output = remove_bg(temp_dir.path())
        .env("REMOVE_BG_MODEL", "birefnet")
        .arg(&input)
        .arg(&output_path)
        .output()
        .expect("Failed to execute CLI");

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.starts_with("ERROR: "), "unexpected stderr: {stderr}");
    assert!(stderr.contains("birefnet"));
}

#[test]
fn test_logs_never_reach_stdout() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = write_test_image(temp_dir.path(), "in.png", 8, 8);

    let output = remove_bg(temp_dir.path())
        .env("REMOVE_BG_LOG", "trace")
        .arg(&input)
        .arg(temp_dir.path().join("out.png"))
        .output()
        .expect("Failed to execute CLI");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

/// Downloads the real u2netp model on first run
#[test]
#[ignore = "requires network access and the ONNX model"]
fn test_end_to_end_background_removal() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cache_dir = temp_dir.path().join("models");
    let input = write_test_image(temp_dir.path(), "in.png", 96, 64);
    let output_path = temp_dir.path().join("out.png");

    let run = || {
        remove_bg(&cache_dir)
            .env("REMOVE_BG_OFFLINE", "0")
            .env("REMOVE_BG_MODEL", "u2netp")
            .arg(&input)
            .arg(&output_path)
            .output()
            .expect("Failed to execute CLI")
    };

    let first = run();
    assert_eq!(first.status.code(), Some(0), "stderr: {}", stderr_of(&first));
    assert_eq!(
        String::from_utf8_lossy(&first.stdout).trim_end(),
        format!("OK: {}", output_path.display())
    );

    let first_bytes = fs::read(&output_path).expect("Failed to read output");
    assert!(!first_bytes.is_empty());
    let result = image::load_from_memory(&first_bytes).expect("Output is not an image");
    assert_eq!((result.width(), result.height()), (96, 64));
    assert!(result.color().has_alpha());

    let second = run();
    assert_eq!(second.status.code(), Some(0));
    assert_eq!(fs::read(&output_path).expect("Failed to read output"), first_bytes);
}

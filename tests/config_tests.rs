// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use camtex::texture::TextureBackendType;
use camtex::{AppError, CameraPosition, CameraSelection, CapturePreset, Config};
use std::path::PathBuf;

fn temp_config_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("camtex-test-{}", uuid::Uuid::new_v4()))
        .join("config.json")
}

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.capture_preset, CapturePreset::Medium);
    assert_eq!(
        config.camera,
        CameraSelection::Position(CameraPosition::Back)
    );
    assert_eq!(config.texture_backend, TextureBackendType::Cpu);
    assert!(!config.log_filter.is_empty());
}

#[test]
fn test_missing_file_gives_defaults() {
    let path = temp_config_path();
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_save_and_load() {
    let path = temp_config_path();
    let config = Config {
        capture_preset: CapturePreset::High,
        camera: CameraSelection::Device("/dev/video2".to_string()),
        snapshot_dir: Some(PathBuf::from("/tmp/shots")),
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), config);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_partial_file_fills_defaults() {
    let path = temp_config_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "capture_preset": "Low" }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.capture_preset, CapturePreset::Low);
    assert_eq!(config.camera, CameraSelection::default());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_malformed_file_is_config_error() {
    let path = temp_config_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_capture_configuration_from_config() {
    let config = Config {
        capture_preset: CapturePreset::FullHd,
        camera: CameraSelection::Position(CameraPosition::Front),
        ..Config::default()
    };
    let capture = config.capture_configuration();
    assert_eq!(capture.preset, CapturePreset::FullHd);
    assert_eq!(capture.camera, CameraSelection::Position(CameraPosition::Front));
}

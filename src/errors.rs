// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera texture pipeline

use crate::backends::camera::types::{BackendError, CameraSelection, PixelFormat};
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error type used by the command line front-end
#[derive(Debug, Clone)]
pub enum AppError {
    /// Pipeline errors (construction, start, stop)
    Pipeline(PipelineError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Synchronous pipeline errors returned from `create`, `start_capture` and
/// `stop_capture`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The requested camera does not exist on this system
    DeviceUnavailable(CameraSelection),
    /// The camera exists but the capture session could not be opened
    SessionConfiguration(BackendError),
    /// The provider reported an error while releasing the session
    Teardown(BackendError),
}

/// Per-frame errors, reported through the event channel only
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Pixel format has no converter (MJPEG, raw Bayer, unknown)
    UnsupportedFormat(PixelFormat),
    /// Zero width/height or stride smaller than a row
    InvalidDimensions { width: u32, height: u32, stride: u32 },
    /// Buffer is shorter than the layout requires
    Truncated { expected: usize, actual: usize },
    /// Texture engine refused the converted image
    Texture(TextureError),
}

/// Texture engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// Image is larger than the engine allows
    TooLarge { width: u32, height: u32, max: u32 },
    /// Image has a zero dimension
    Empty,
    /// GPU device could not be created or used
    Gpu(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::DeviceUnavailable(selection) => {
                write!(f, "Requested {} is not available", selection)
            }
            PipelineError::SessionConfiguration(e) => {
                write!(f, "Failed to configure capture session: {}", e)
            }
            PipelineError::Teardown(e) => write!(f, "Failed to release capture session: {}", e),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::UnsupportedFormat(format) => {
                write!(f, "Unsupported frame format: {}", format)
            }
            FrameError::InvalidDimensions {
                width,
                height,
                stride,
            } => write!(
                f,
                "Invalid frame dimensions: {}x{} (stride {})",
                width, height, stride
            ),
            FrameError::Truncated { expected, actual } => write!(
                f,
                "Frame buffer too small: expected {} bytes, got {}",
                expected, actual
            ),
            FrameError::Texture(e) => write!(f, "Texture creation failed: {}", e),
        }
    }
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::TooLarge { width, height, max } => write!(
                f,
                "Texture {}x{} exceeds maximum dimension {}",
                width, height, max
            ),
            TextureError::Empty => write!(f, "Texture has zero size"),
            TextureError::Gpu(msg) => write!(f, "GPU error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for PipelineError {}
impl std::error::Error for FrameError {}
impl std::error::Error for TextureError {}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<TextureError> for FrameError {
    fn from(err: TextureError) -> Self {
        FrameError::Texture(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<TextureError> for AppError {
    fn from(err: TextureError) -> Self {
        AppError::Other(err.to_string())
    }
}

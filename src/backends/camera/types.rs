// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture providers

//! Shared types for capture providers

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Capture backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureBackendType {
    /// GStreamer device capture (requires the `gstreamer` feature)
    GStreamer,
    /// Built-in test pattern generator
    Synthetic,
}

impl Default for CaptureBackendType {
    fn default() -> Self {
        if cfg!(feature = "gstreamer") {
            CaptureBackendType::GStreamer
        } else {
            CaptureBackendType::Synthetic
        }
    }
}

impl std::fmt::Display for CaptureBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureBackendType::GStreamer => write!(f, "GStreamer"),
            CaptureBackendType::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Physical placement of a camera relative to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraPosition {
    /// Facing the user
    Front,
    /// Facing away from the user
    Back,
    /// Detachable or unknown placement (USB webcams, capture cards)
    External,
}

impl CameraPosition {
    /// Parse a location string as reported by device properties
    /// ("front", "back", "external")
    pub fn from_location(location: &str) -> Option<Self> {
        match location.trim().to_ascii_lowercase().as_str() {
            "front" => Some(CameraPosition::Front),
            "back" | "rear" => Some(CameraPosition::Back),
            "external" => Some(CameraPosition::External),
            _ => None,
        }
    }
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::External => write!(f, "external"),
        }
    }
}

/// Which camera a pipeline should capture from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraSelection {
    /// First camera at the given position
    Position(CameraPosition),
    /// Exact device path as reported by enumeration
    Device(String),
}

impl Default for CameraSelection {
    fn default() -> Self {
        CameraSelection::Position(CameraPosition::Back)
    }
}

impl CameraSelection {
    /// Check whether a device satisfies this selection
    pub fn matches(&self, device: &CameraDevice) -> bool {
        match self {
            CameraSelection::Position(position) => device.position == *position,
            CameraSelection::Device(path) => device.path == *path,
        }
    }

    /// Parse a CLI argument: a position name or anything else as a device path
    pub fn parse(value: &str) -> Self {
        match CameraPosition::from_location(value) {
            Some(position) => CameraSelection::Position(position),
            None => CameraSelection::Device(value.to_string()),
        }
    }
}

impl std::fmt::Display for CameraSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraSelection::Position(position) => write!(f, "{} camera", position),
            CameraSelection::Device(path) => write!(f, "device {}", path),
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String, // Provider-specific identifier (device node, synthetic id, ...)
    pub position: CameraPosition,
}

impl CameraDevice {
    pub fn new(name: impl Into<String>, path: impl Into<String>, position: CameraPosition) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            position,
        }
    }
}

/// Identifier of one opened capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixel format of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGBx - 32-bit, padding byte instead of alpha
    RGBx,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    BGRA,
    /// BGRx - 32-bit, padding byte instead of alpha
    BGRx,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale
    Gray8,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// NV21 - Like NV12 with V and U swapped
    NV21,
    /// I420 - Planar 4:2:0 (separate Y, U, V planes)
    I420,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V)
    YUYV,
    /// YVYU - Packed 4:2:2 (Y0 V Y1 U)
    YVYU,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1)
    UYVY,
    /// VYUY - Packed 4:2:2 (V Y0 U Y1)
    VYUY,
    /// Compressed MJPEG, must be decoded by the provider
    MJPEG,
    /// Raw RGGB Bayer mosaic
    BayerRGGB,
    /// Anything the provider could not classify
    Unknown,
}

impl PixelFormat {
    /// Check if this format is a YUV format
    pub fn is_yuv(&self) -> bool {
        matches!(
            self,
            Self::NV12
                | Self::NV21
                | Self::I420
                | Self::YUYV
                | Self::YVYU
                | Self::UYVY
                | Self::VYUY
        )
    }

    /// Check if this format can be turned into a texture by the CPU converters
    pub fn is_convertible(&self) -> bool {
        !matches!(self, Self::MJPEG | Self::BayerRGGB | Self::Unknown)
    }

    /// Bytes per pixel of the first (or only) plane
    pub fn packed_bytes_per_pixel(&self) -> Option<u32> {
        match self {
            Self::RGBA | Self::RGBx | Self::BGRA | Self::BGRx => Some(4),
            Self::RGB24 => Some(3),
            Self::YUYV | Self::YVYU | Self::UYVY | Self::VYUY => Some(2),
            Self::Gray8 | Self::NV12 | Self::NV21 | Self::I420 | Self::BayerRGGB => Some(1),
            Self::MJPEG | Self::Unknown => None,
        }
    }

    /// Minimum bytes one row of the first plane occupies at `width`
    ///
    /// Packed 4:2:2 rows are whole macropixels, so odd widths round up.
    /// `None` for compressed formats or when the row does not fit in a `u32`.
    pub fn row_bytes(&self, width: u32) -> Option<u32> {
        match self {
            Self::YUYV | Self::YVYU | Self::UYVY | Self::VYUY => width.div_ceil(2).checked_mul(4),
            other => other.packed_bytes_per_pixel()?.checked_mul(width),
        }
    }

    /// Convert to a GStreamer video/x-raw format string
    pub fn to_gst_format_string(&self) -> &'static str {
        match self {
            Self::RGBA => "RGBA",
            Self::RGBx => "RGBx",
            Self::BGRA => "BGRA",
            Self::BGRx => "BGRx",
            Self::RGB24 => "RGB",
            Self::Gray8 => "GRAY8",
            Self::NV12 => "NV12",
            Self::NV21 => "NV21",
            Self::I420 => "I420",
            Self::YUYV => "YUY2",
            Self::YVYU => "YVYU",
            Self::UYVY => "UYVY",
            Self::VYUY => "VYUY",
            Self::MJPEG => "MJPG",
            Self::BayerRGGB => "rggb",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse format from a GStreamer format string
    pub fn from_gst_format(format: &str) -> Self {
        match format {
            "RGBA" => Self::RGBA,
            "RGBx" => Self::RGBx,
            "BGRA" => Self::BGRA,
            "BGRx" => Self::BGRx,
            "RGB" => Self::RGB24,
            "GRAY8" | "GREY" | "Y8" => Self::Gray8,
            "NV12" => Self::NV12,
            "NV21" => Self::NV21,
            "I420" => Self::I420,
            "YUY2" | "YUYV" => Self::YUYV,
            "YVYU" => Self::YVYU,
            "UYVY" => Self::UYVY,
            "VYUY" => Self::VYUY,
            "MJPG" | "MJPEG" | "image/jpeg" => Self::MJPEG,
            "rggb" | "RGGB" => Self::BayerRGGB,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_gst_format_string())
    }
}

/// Chroma plane offsets for semi-planar and planar YUV formats
///
/// All planes live in the same buffer. When absent, converters assume the
/// tightly packed default layout following the luma plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// UV plane (NV12/NV21) or U plane (I420) offset in bytes
    pub uv_offset: usize,
    /// UV/U plane stride in bytes
    pub uv_stride: u32,
    /// V plane offset in bytes (I420 only)
    pub v_offset: usize,
    /// V plane stride in bytes (I420 only)
    pub v_stride: u32,
}

/// One camera image, borrowed from the provider for the duration of a
/// delivery callback
///
/// The provider owns `data` and reuses it once the callback returns, so the
/// lifetime ties every use of the frame to the callback scope.
#[derive(Debug, Clone, Copy)]
pub struct CapturedFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row stride of the first plane in bytes (may include padding)
    pub stride: u32,
    pub planes: Option<PlaneLayout>,
    /// Presentation timestamp relative to the start of the session
    pub timestamp: Duration,
    pub data: &'a [u8],
}

impl<'a> CapturedFrame<'a> {
    /// Frame with a tightly packed first plane
    pub fn packed(
        data: &'a [u8],
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp: Duration,
    ) -> Self {
        let stride = format.row_bytes(width).unwrap_or(0);
        Self {
            width,
            height,
            format,
            stride,
            planes: None,
            timestamp,
            data,
        }
    }
}

/// Reason a running session ended without being asked to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInterruption {
    /// Camera unplugged or handed to another client
    DeviceDisconnected,
    /// Provider reported an unrecoverable runtime error
    SessionInterrupted(String),
}

impl std::fmt::Display for SessionInterruption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionInterruption::DeviceDisconnected => write!(f, "Camera disconnected"),
            SessionInterruption::SessionInterrupted(msg) => {
                write!(f, "Capture session interrupted: {}", msg)
            }
        }
    }
}

/// Result type for provider operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for provider operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Provider is not available on this system
    NotAvailable(String),
    /// Failed to open or configure a session
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Camera is in use by another session or client
    DeviceBusy(String),
    /// Access to the camera was refused
    PermissionDenied(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::DeviceBusy(msg) => write!(f, "Device busy: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

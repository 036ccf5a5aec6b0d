// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture quality presets
///
/// Each preset maps to a target capture resolution and frame rate. Providers
/// scale or pick the closest mode they support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CapturePreset {
    /// CIF (352x288), cheapest to convert
    Low,
    /// VGA (640x480), balanced (default)
    #[default]
    Medium,
    /// HD (1280x720)
    High,
    /// Full HD (1920x1080)
    FullHd,
}

impl CapturePreset {
    /// All presets, ordered from lowest to highest quality
    pub const ALL: [CapturePreset; 4] = [
        CapturePreset::Low,
        CapturePreset::Medium,
        CapturePreset::High,
        CapturePreset::FullHd,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            CapturePreset::Low => "Low",
            CapturePreset::Medium => "Medium",
            CapturePreset::High => "High",
            CapturePreset::FullHd => "Full HD",
        }
    }

    /// Target capture resolution (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            CapturePreset::Low => (352, 288),
            CapturePreset::Medium => (640, 480),
            CapturePreset::High => (1280, 720),
            CapturePreset::FullHd => (1920, 1080),
        }
    }

    /// Target frame rate in frames per second
    pub fn framerate(&self) -> u32 {
        match self {
            CapturePreset::Low => 15,
            CapturePreset::Medium | CapturePreset::High | CapturePreset::FullHd => 30,
        }
    }

    /// Interval between two frames at the target frame rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.framerate() as u64)
    }

    /// Parse a preset from its lowercase CLI/config name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" => Some(CapturePreset::Low),
            "medium" => Some(CapturePreset::Medium),
            "high" => Some(CapturePreset::High),
            "fullhd" | "full-hd" | "1080p" => Some(CapturePreset::FullHd),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapturePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (w, h) = self.resolution();
        write!(f, "{} ({}x{} @ {}fps)", self.display_name(), w, h, self.framerate())
    }
}

/// Timing constants
pub mod timing {
    /// Log frame statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 60;

    /// Timeout for a provider session to reach the playing state
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Timeout for a provider session to tear down
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Bus/notification polling interval for provider watch loops
    pub const BUS_POLL_INTERVAL_MS: u64 = 100;

    /// Consumer tick used by the headless stream command (~60 Hz)
    pub const CONSUMER_TICK_MS: u64 = 16;
}

/// Pipeline constants
pub mod pipeline {
    /// Provider-side buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Capacity of the pipeline event broadcast channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}

/// Texture engine limits
pub mod texture {
    /// Largest texture edge accepted by the CPU texture engine
    pub const MAX_TEXTURE_DIMENSION: u32 = 8192;
}

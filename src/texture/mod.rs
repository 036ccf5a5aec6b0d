// SPDX-License-Identifier: GPL-3.0-only

//! Texture engines
//!
//! A texture engine wraps a converted RGBA image into whatever object the
//! renderer consumes. The pipeline only ever constructs textures through
//! [`TextureFactory`]; it never renders.
//!
//! - [`cpu`]: RGBA images kept in memory (terminal preview, snapshots, tests)
//! - [`gpu`]: `wgpu` textures uploaded through a device queue (feature `gpu`)

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

pub use cpu::{CpuTexture, CpuTextureFactory};
#[cfg(feature = "gpu")]
pub use gpu::{GpuTexture, GpuTextureFactory};

use crate::errors::TextureError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Builds renderer-owned textures from converted frames
pub trait TextureFactory: Send + Sync + 'static {
    /// Texture object handed to consumers
    type Texture: Send + Sync + 'static;

    /// Wrap a tightly packed RGBA image into a texture
    ///
    /// Called on the capture delivery thread, one call at a time.
    fn create_texture(&self, image: RgbaImage) -> Result<Self::Texture, TextureError>;

    /// Short engine name for logs
    fn name(&self) -> &'static str;
}

/// A complete texture together with the frame it was derived from
///
/// Published as a whole; consumers never see one being filled in.
#[derive(Debug)]
pub struct PublishedTexture<T> {
    texture: T,
    timestamp: Duration,
    sequence: u64,
    width: u32,
    height: u32,
}

impl<T> PublishedTexture<T> {
    pub(crate) fn new(texture: T, timestamp: Duration, sequence: u64, width: u32, height: u32) -> Self {
        Self {
            texture,
            timestamp,
            sequence,
            width,
            height,
        }
    }

    /// The renderer-owned texture object
    pub fn texture(&self) -> &T {
        &self.texture
    }

    /// Timestamp of the camera frame this texture was converted from
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Publication counter, strictly increasing over the pipeline's lifetime
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Which texture engine the front-end should build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextureBackendType {
    /// In-memory RGBA textures
    #[default]
    Cpu,
    /// wgpu textures on a headless device
    Gpu,
}

impl std::fmt::Display for TextureBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureBackendType::Cpu => write!(f, "cpu"),
            TextureBackendType::Gpu => write!(f, "gpu"),
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! camtex - camera frames as renderer textures
//!
//! Captures frames from a device camera and keeps the most recent one
//! available as a texture that a scene-graph renderer can read on every tick.
//!
//! # Architecture
//!
//! - [`backends`]: capture providers (GStreamer devices, synthetic cameras)
//! - [`media`]: pixel format conversion to RGBA
//! - [`texture`]: texture engines (in-memory RGBA, wgpu)
//! - [`pipeline`]: [`CameraTexturePipeline`], lifecycle and latest-frame publication
//! - [`config`]: user configuration
//!
//! # Example
//!
//! ```no_run
//! use camtex::backends::camera::SyntheticProvider;
//! use camtex::{CameraTexturePipeline, CaptureConfiguration, CpuTextureFactory};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(SyntheticProvider::with_default_cameras());
//! let pipeline = CameraTexturePipeline::create(
//!     provider,
//!     CaptureConfiguration::default(),
//!     CpuTextureFactory::new(),
//! )?;
//! pipeline.start_capture()?;
//! // Once per render tick:
//! if let Some(current) = pipeline.current_texture() {
//!     println!("{}x{} at {:?}", current.width(), current.height(), current.timestamp());
//! }
//! # Ok::<(), camtex::PipelineError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipeline;
pub mod snapshot;
pub mod terminal;
pub mod texture;

// Re-export commonly used types
pub use backends::camera::types::{
    CameraDevice, CameraPosition, CameraSelection, CaptureBackendType, CapturedFrame, PixelFormat,
};
pub use config::Config;
pub use constants::CapturePreset;
pub use errors::{AppError, AppResult, FrameError, PipelineError, TextureError};
pub use pipeline::{CameraTexturePipeline, CaptureConfiguration, CaptureState, PipelineEvent};
pub use texture::{CpuTexture, CpuTextureFactory, PublishedTexture, TextureFactory};

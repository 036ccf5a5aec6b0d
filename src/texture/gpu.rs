// SPDX-License-Identifier: GPL-3.0-only

//! wgpu texture engine
//!
//! Uploads converted frames into sampled `Rgba8UnormSrgb` textures. Each
//! frame gets a fresh texture object, so a renderer holding the previous one
//! keeps a complete image while the next upload is in flight.

use super::TextureFactory;
use crate::errors::TextureError;
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, info};

/// Texture living on a wgpu device
#[derive(Debug)]
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: wgpu::Extent3d,
}

impl GpuTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Default view for binding as a sampled texture
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }
}

/// Texture factory uploading through a wgpu queue
pub struct GpuTextureFactory {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    max_dimension: u32,
}

impl GpuTextureFactory {
    /// Use a device/queue pair owned by the renderer
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let max_dimension = device.limits().max_texture_dimension_2d;
        Self {
            device,
            queue,
            max_dimension,
        }
    }

    /// Create a private headless device for uploads
    pub fn headless(label: &str) -> Result<Self, TextureError> {
        info!(label = label, "Creating headless GPU device for camera textures");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| TextureError::Gpu(format!("Failed to find suitable GPU adapter: {}", e)))?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU adapter selected for camera textures"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            ..Default::default()
        }))
        .map_err(|e| TextureError::Gpu(format!("Failed to create GPU device: {}", e)))?;

        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }
}

impl TextureFactory for GpuTextureFactory {
    type Texture = GpuTexture;

    fn create_texture(&self, image: RgbaImage) -> Result<GpuTexture, TextureError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(TextureError::Empty);
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(TextureError::TooLarge {
                width,
                height,
                max: self.max_dimension,
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Camera Frame Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        // Flush the staged upload so the texture is complete before publication
        self.queue.submit(std::iter::empty());

        debug!(width, height, "Uploaded camera frame texture");

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(GpuTexture {
            texture,
            view,
            size,
        })
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! In-memory RGBA texture engine

use super::TextureFactory;
use crate::constants::texture::MAX_TEXTURE_DIMENSION;
use crate::errors::TextureError;
use image::RgbaImage;
use std::path::Path;

/// RGBA texture held in system memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTexture {
    image: RgbaImage,
}

impl CpuTexture {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// RGBA value at (x, y), clamped to the texture bounds
    pub fn sample(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width().saturating_sub(1));
        let y = y.min(self.height().saturating_sub(1));
        self.image.get_pixel(x, y).0
    }

    /// Raw RGBA bytes, rows tightly packed
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Encode the texture to an image file (format from the extension)
    pub fn save(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.save(path)
    }
}

/// Texture factory producing [`CpuTexture`]s
#[derive(Debug, Clone)]
pub struct CpuTextureFactory {
    max_dimension: u32,
}

impl CpuTextureFactory {
    pub fn new() -> Self {
        Self {
            max_dimension: MAX_TEXTURE_DIMENSION,
        }
    }

    /// Factory refusing images with an edge longer than `max_dimension`
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl Default for CpuTextureFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureFactory for CpuTextureFactory {
    type Texture = CpuTexture;

    fn create_texture(&self, image: RgbaImage) -> Result<CpuTexture, TextureError> {
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
        Ok(CpuTexture { image })
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_image_without_changes() {
        let image = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let texture = CpuTextureFactory::new().create_texture(image).unwrap();
        assert_eq!((texture.width(), texture.height()), (3, 2));
        assert_eq!(texture.sample(2, 1), [1, 2, 3, 4]);
        // Out of range samples clamp to the edge
        assert_eq!(texture.sample(10, 10), [1, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_oversized_and_empty() {
        let factory = CpuTextureFactory::with_max_dimension(4);
        let result = factory.create_texture(RgbaImage::new(5, 1));
        assert_eq!(
            result,
            Err(TextureError::TooLarge {
                width: 5,
                height: 1,
                max: 4
            })
        );
        assert_eq!(
            factory.create_texture(RgbaImage::new(0, 0)),
            Err(TextureError::Empty)
        );
    }
}

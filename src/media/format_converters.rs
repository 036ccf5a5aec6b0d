// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion from provider frames to RGBA texture images
//!
//! Every converter reads straight from the borrowed provider buffer, honours
//! row stride and plane layout, and writes a tightly packed RGBA image owned
//! by the caller. Chroma is upsampled by nearest neighbour, YUV uses BT.601.

use crate::backends::camera::types::{CapturedFrame, PixelFormat, PlaneLayout};
use crate::errors::FrameError;
use image::RgbaImage;

/// Convert a captured frame into an owned RGBA image
///
/// Fails without touching any output for unsupported formats, impossible
/// dimensions, or buffers shorter than the advertised layout. The layout is
/// checked against the buffer before the output is allocated.
pub fn convert_to_rgba(frame: &CapturedFrame<'_>) -> Result<RgbaImage, FrameError> {
    if !frame.format.is_convertible() {
        return Err(FrameError::UnsupportedFormat(frame.format));
    }

    let layout = FrameLayout::validate(frame)?;
    let len = (frame.width as usize)
        .checked_mul(frame.height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| invalid_dimensions(frame))?;

    let mut rgba = vec![0u8; len];
    {
        let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut rgba);
        match (frame.format, layout.chroma) {
            (PixelFormat::YUYV | PixelFormat::YVYU | PixelFormat::UYVY | PixelFormat::VYUY, _) => {
                convert_packed_422(frame, layout.row_bytes, pixels)
            }
            (PixelFormat::NV12 | PixelFormat::NV21, Some(planes)) => {
                convert_semi_planar(frame, &planes, pixels)
            }
            (PixelFormat::I420, Some(planes)) => convert_planar(frame, &planes, pixels),
            _ => convert_packed(frame, layout.row_bytes, pixels)?,
        }
    }

    RgbaImage::from_raw(frame.width, frame.height, rgba).ok_or_else(|| invalid_dimensions(frame))
}

fn invalid_dimensions(frame: &CapturedFrame<'_>) -> FrameError {
    FrameError::InvalidDimensions {
        width: frame.width,
        height: frame.height,
        stride: frame.stride,
    }
}

/// Byte layout of a frame, already checked against its buffer
struct FrameLayout {
    /// Bytes of one row of the first plane
    row_bytes: usize,
    /// Chroma planes of NV12/NV21/I420
    chroma: Option<PlaneLayout>,
}

impl FrameLayout {
    fn validate(frame: &CapturedFrame<'_>) -> Result<Self, FrameError> {
        let height = frame.height as usize;
        let stride = frame.stride as usize;
        let row_bytes = frame
            .format
            .row_bytes(frame.width)
            .ok_or_else(|| invalid_dimensions(frame))? as usize;
        if frame.width == 0 || height == 0 || stride < row_bytes {
            return Err(invalid_dimensions(frame));
        }
        require_plane(frame, 0, stride, height, row_bytes)?;

        let chroma = match frame.format {
            PixelFormat::NV12 | PixelFormat::NV21 => Some(semi_planar_layout(frame)?),
            PixelFormat::I420 => Some(planar_layout(frame)?),
            _ => None,
        };
        Ok(Self { row_bytes, chroma })
    }
}

fn semi_planar_layout(frame: &CapturedFrame<'_>) -> Result<PlaneLayout, FrameError> {
    let height = frame.height as usize;
    let chroma_width = (frame.width as usize).div_ceil(2);

    let layout = match frame.planes {
        Some(layout) => layout,
        None => PlaneLayout {
            uv_offset: (frame.stride as usize)
                .checked_mul(height)
                .ok_or_else(|| invalid_dimensions(frame))?,
            uv_stride: frame.stride,
            v_offset: 0,
            v_stride: 0,
        },
    };
    let uv_stride = layout.uv_stride as usize;
    if uv_stride < chroma_width * 2 {
        return Err(FrameError::InvalidDimensions {
            width: frame.width,
            height: frame.height,
            stride: layout.uv_stride,
        });
    }
    require_plane(
        frame,
        layout.uv_offset,
        uv_stride,
        height.div_ceil(2),
        chroma_width * 2,
    )?;
    Ok(layout)
}

fn planar_layout(frame: &CapturedFrame<'_>) -> Result<PlaneLayout, FrameError> {
    let height = frame.height as usize;
    let chroma_width = (frame.width as usize).div_ceil(2);
    let chroma_height = height.div_ceil(2);

    let layout = match frame.planes {
        Some(layout) => layout,
        None => {
            let chroma_stride = frame.stride.div_ceil(2);
            let u_offset = (frame.stride as usize).checked_mul(height);
            let v_offset = (chroma_stride as usize)
                .checked_mul(chroma_height)
                .and_then(|u_len| u_offset?.checked_add(u_len));
            match (u_offset, v_offset) {
                (Some(uv_offset), Some(v_offset)) => PlaneLayout {
                    uv_offset,
                    uv_stride: chroma_stride,
                    v_offset,
                    v_stride: chroma_stride,
                },
                _ => return Err(invalid_dimensions(frame)),
            }
        }
    };
    let (u_stride, v_stride) = (layout.uv_stride as usize, layout.v_stride as usize);
    if u_stride < chroma_width || v_stride < chroma_width {
        return Err(FrameError::InvalidDimensions {
            width: frame.width,
            height: frame.height,
            stride: layout.uv_stride.min(layout.v_stride),
        });
    }
    require_plane(frame, layout.uv_offset, u_stride, chroma_height, chroma_width)?;
    require_plane(frame, layout.v_offset, v_stride, chroma_height, chroma_width)?;
    Ok(layout)
}

/// Check that `rows` rows of `row_bytes` each, `stride` apart from `offset`,
/// fit in the buffer
fn require_plane(
    frame: &CapturedFrame<'_>,
    offset: usize,
    stride: usize,
    rows: usize,
    row_bytes: usize,
) -> Result<(), FrameError> {
    let expected = stride
        .checked_mul(rows - 1)
        .and_then(|len| len.checked_add(offset))
        .and_then(|len| len.checked_add(row_bytes))
        .ok_or_else(|| invalid_dimensions(frame))?;
    if frame.data.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            actual: frame.data.len(),
        });
    }
    Ok(())
}

fn convert_packed(
    frame: &CapturedFrame<'_>,
    row_bytes: usize,
    pixels: &mut [[u8; 4]],
) -> Result<(), FrameError> {
    let width = frame.width as usize;
    let stride = frame.stride as usize;

    for (y, out) in pixels.chunks_exact_mut(width).enumerate() {
        let row = &frame.data[y * stride..y * stride + row_bytes];
        match frame.format {
            PixelFormat::RGBA => {
                for (px, src) in out.iter_mut().zip(row.chunks_exact(4)) {
                    *px = [src[0], src[1], src[2], src[3]];
                }
            }
            PixelFormat::RGBx => {
                for (px, src) in out.iter_mut().zip(row.chunks_exact(4)) {
                    *px = [src[0], src[1], src[2], 255];
                }
            }
            PixelFormat::BGRA => {
                for (px, src) in out.iter_mut().zip(row.chunks_exact(4)) {
                    *px = [src[2], src[1], src[0], src[3]];
                }
            }
            PixelFormat::BGRx => {
                for (px, src) in out.iter_mut().zip(row.chunks_exact(4)) {
                    *px = [src[2], src[1], src[0], 255];
                }
            }
            PixelFormat::RGB24 => {
                for (px, src) in out.iter_mut().zip(row.chunks_exact(3)) {
                    *px = [src[0], src[1], src[2], 255];
                }
            }
            PixelFormat::Gray8 => {
                for (px, &v) in out.iter_mut().zip(row.iter()) {
                    *px = [v, v, v, 255];
                }
            }
            _ => return Err(FrameError::UnsupportedFormat(frame.format)),
        }
    }

    Ok(())
}

fn convert_packed_422(frame: &CapturedFrame<'_>, row_bytes: usize, pixels: &mut [[u8; 4]]) {
    let width = frame.width as usize;
    let stride = frame.stride as usize;

    for (y, out) in pixels.chunks_exact_mut(width).enumerate() {
        let row = &frame.data[y * stride..y * stride + row_bytes];
        for (pair, macropixel) in out.chunks_mut(2).zip(row.chunks_exact(4)) {
            // (Y0, U, Y1, V) regardless of the byte order on the wire
            let (y0, u, y1, v) = match frame.format {
                PixelFormat::YUYV => (macropixel[0], macropixel[1], macropixel[2], macropixel[3]),
                PixelFormat::YVYU => (macropixel[0], macropixel[3], macropixel[2], macropixel[1]),
                PixelFormat::UYVY => (macropixel[1], macropixel[0], macropixel[3], macropixel[2]),
                _ => (macropixel[1], macropixel[2], macropixel[3], macropixel[0]), // VYUY
            };
            pair[0] = yuv_to_rgba(y0, u, v);
            if let Some(second) = pair.get_mut(1) {
                *second = yuv_to_rgba(y1, u, v);
            }
        }
    }
}

fn convert_semi_planar(frame: &CapturedFrame<'_>, planes: &PlaneLayout, pixels: &mut [[u8; 4]]) {
    let width = frame.width as usize;
    let stride = frame.stride as usize;
    let uv_stride = planes.uv_stride as usize;
    let swap = frame.format == PixelFormat::NV21;

    for (y, out) in pixels.chunks_exact_mut(width).enumerate() {
        let luma = &frame.data[y * stride..y * stride + width];
        let chroma_row = planes.uv_offset + (y / 2) * uv_stride;
        for (x, px) in out.iter_mut().enumerate() {
            let idx = chroma_row + (x / 2) * 2;
            let (a, b) = (frame.data[idx], frame.data[idx + 1]);
            let (u, v) = if swap { (b, a) } else { (a, b) };
            *px = yuv_to_rgba(luma[x], u, v);
        }
    }
}

fn convert_planar(frame: &CapturedFrame<'_>, planes: &PlaneLayout, pixels: &mut [[u8; 4]]) {
    let width = frame.width as usize;
    let stride = frame.stride as usize;
    let (u_stride, v_stride) = (planes.uv_stride as usize, planes.v_stride as usize);

    for (y, out) in pixels.chunks_exact_mut(width).enumerate() {
        let luma = &frame.data[y * stride..y * stride + width];
        let u_row = planes.uv_offset + (y / 2) * u_stride;
        let v_row = planes.v_offset + (y / 2) * v_stride;
        for (x, px) in out.iter_mut().enumerate() {
            let u = frame.data[u_row + x / 2];
            let v = frame.data[v_row + x / 2];
            *px = yuv_to_rgba(luma[x], u, v);
        }
    }
}

/// Convert YUV (BT.601) to opaque RGBA
pub fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    [r, g, b, 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(data: &[u8], width: u32, height: u32, format: PixelFormat) -> CapturedFrame<'_> {
        CapturedFrame::packed(data, width, height, format, Duration::ZERO)
    }

    #[test]
    fn test_rgba_with_row_padding() {
        // 2x2 RGBA, stride 12 (4 bytes of padding per row)
        let mut data = vec![0xEE; 24];
        data[0..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[12..20].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        let mut f = frame(&data, 2, 2, PixelFormat::RGBA);
        f.stride = 12;

        let image = convert_to_rgba(&f).unwrap();
        assert_eq!(image.get_pixel(1, 0).0, [5, 6, 7, 8]);
        assert_eq!(image.get_pixel(0, 1).0, [9, 10, 11, 12]);
        assert_eq!(image.as_raw().len(), 16);
    }

    #[test]
    fn test_bgrx_swaps_channels_and_fills_alpha() {
        let data = [30, 20, 10, 0];
        let image = convert_to_rgba(&frame(&data, 1, 1, PixelFormat::BGRx)).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_rgb24_and_gray() {
        let rgb = [1, 2, 3, 4, 5, 6];
        let image = convert_to_rgba(&frame(&rgb, 2, 1, PixelFormat::RGB24)).unwrap();
        assert_eq!(image.get_pixel(1, 0).0, [4, 5, 6, 255]);

        let gray = [42u8];
        let image = convert_to_rgba(&frame(&gray, 1, 1, PixelFormat::Gray8)).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [42, 42, 42, 255]);
    }

    #[test]
    fn test_nv12_neutral_chroma_is_gray() {
        // 4x2 luma + 4x1 interleaved UV, all chroma neutral
        let mut data = vec![100u8; 8];
        data.extend_from_slice(&[128; 4]);
        let image = convert_to_rgba(&frame(&data, 4, 2, PixelFormat::NV12)).unwrap();
        for px in image.pixels() {
            assert_eq!(px.0, [100, 100, 100, 255]);
        }
    }

    #[test]
    fn test_nv21_swaps_chroma() {
        // Strong V (red) in NV12 order becomes strong U (blue) in NV21
        let mut data = vec![128u8; 4];
        data.extend_from_slice(&[128, 255]);
        let nv12 = convert_to_rgba(&frame(&data, 2, 2, PixelFormat::NV12)).unwrap();
        let nv21 = convert_to_rgba(&frame(&data, 2, 2, PixelFormat::NV21)).unwrap();
        let red = nv12.get_pixel(0, 0).0;
        let blue = nv21.get_pixel(0, 0).0;
        assert!(red[0] > red[2]);
        assert!(blue[2] > blue[0]);
    }

    #[test]
    fn test_i420_odd_dimensions() {
        // 3x3 luma, 2x2 U, 2x2 V with default layout (chroma stride 2)
        let mut data = vec![60u8; 9];
        data.extend_from_slice(&[128; 8]);
        let image = convert_to_rgba(&frame(&data, 3, 3, PixelFormat::I420)).unwrap();
        assert_eq!(image.get_pixel(2, 2).0, [60, 60, 60, 255]);
    }

    #[test]
    fn test_packed_422_orders() {
        let yuyv = [10, 128, 200, 128];
        let image = convert_to_rgba(&frame(&yuyv, 2, 1, PixelFormat::YUYV)).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [10, 10, 10, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [200, 200, 200, 255]);

        let uyvy = [128, 10, 128, 200];
        let image = convert_to_rgba(&frame(&uyvy, 2, 1, PixelFormat::UYVY)).unwrap();
        assert_eq!(image.get_pixel(1, 0).0, [200, 200, 200, 255]);
    }

    #[test]
    fn test_packed_422_odd_width() {
        let data = [50, 128, 70, 128, 90, 128, 0, 128];
        let image = convert_to_rgba(&frame(&data, 3, 1, PixelFormat::YVYU)).unwrap();
        assert_eq!(image.get_pixel(2, 0).0, [90, 90, 90, 255]);
    }

    #[test]
    fn test_unsupported_formats() {
        let data = [0u8; 64];
        for format in [PixelFormat::MJPEG, PixelFormat::BayerRGGB, PixelFormat::Unknown] {
            let f = CapturedFrame {
                stride: 8,
                ..frame(&data, 4, 4, format)
            };
            assert_eq!(
                convert_to_rgba(&f),
                Err(FrameError::UnsupportedFormat(format))
            );
        }
    }

    #[test]
    fn test_truncated_buffer() {
        let data = [0u8; 10];
        let result = convert_to_rgba(&frame(&data, 2, 2, PixelFormat::RGBA));
        assert_eq!(
            result,
            Err(FrameError::Truncated {
                expected: 16,
                actual: 10
            })
        );
    }

    #[test]
    fn test_zero_size_and_short_stride() {
        let data = [0u8; 16];
        assert!(matches!(
            convert_to_rgba(&frame(&data, 0, 2, PixelFormat::RGBA)),
            Err(FrameError::InvalidDimensions { .. })
        ));
        let mut f = frame(&data, 2, 2, PixelFormat::RGBA);
        f.stride = 4;
        assert!(matches!(
            convert_to_rgba(&f),
            Err(FrameError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_oversized_header_is_rejected_before_allocating() {
        let data = [0u8; 16];
        let huge = CapturedFrame {
            stride: 4_000_000_000,
            ..frame(&data, 4_000_000_000, 4_000_000_000, PixelFormat::Gray8)
        };
        assert!(matches!(
            convert_to_rgba(&huge),
            Err(FrameError::Truncated { actual: 16, .. })
        ));

        let wide = CapturedFrame {
            stride: u32::MAX,
            ..frame(&data, u32::MAX, 1, PixelFormat::RGBA)
        };
        assert!(matches!(
            convert_to_rgba(&wide),
            Err(FrameError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_chroma_offset_overflow() {
        let data = [128u8; 6];
        let f = CapturedFrame {
            planes: Some(PlaneLayout {
                uv_offset: usize::MAX,
                uv_stride: 2,
                v_offset: 0,
                v_stride: 0,
            }),
            ..frame(&data, 2, 2, PixelFormat::NV12)
        };
        assert!(matches!(
            convert_to_rgba(&f),
            Err(FrameError::InvalidDimensions { .. })
        ));
    }
}

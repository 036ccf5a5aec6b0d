// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture provider
//!
//! Provides cameras without hardware: either a test pattern generator running
//! on a capture loop thread, or manual delivery where the owner pushes frames
//! (used by the integration tests). Failures and interruptions can be
//! injected to exercise the pipeline's error paths.

use super::frame_loop::{CaptureLoop, LoopAction};
use super::types::*;
use super::{CaptureProvider, CaptureSession, FrameHandler};
use crate::constants::CapturePreset;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// How a synthetic session produces frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Moving colour bars at the preset resolution and frame rate
    TestPattern { format: PixelFormat },
    /// Frames pushed through [`SyntheticProvider::deliver`]
    Manual,
}

struct ActiveSession {
    device_path: String,
    handler: Arc<dyn FrameHandler>,
    interrupted: Arc<AtomicBool>,
}

#[derive(Default)]
struct ProviderState {
    sessions_opened: AtomicU64,
    next_open_error: Mutex<Option<BackendError>>,
    active: Mutex<HashMap<SessionId, ActiveSession>>,
}

/// Capture provider backed by generated or injected frames
pub struct SyntheticProvider {
    cameras: Vec<CameraDevice>,
    mode: DeliveryMode,
    state: Arc<ProviderState>,
}

impl SyntheticProvider {
    pub fn new(cameras: Vec<CameraDevice>, mode: DeliveryMode) -> Self {
        Self {
            cameras,
            mode,
            state: Arc::new(ProviderState::default()),
        }
    }

    /// Front and back test pattern cameras producing NV12
    pub fn with_default_cameras() -> Self {
        Self::new(
            Self::default_cameras(),
            DeliveryMode::TestPattern {
                format: PixelFormat::NV12,
            },
        )
    }

    /// Front and back cameras fed by [`SyntheticProvider::deliver`]
    pub fn manual() -> Self {
        Self::new(Self::default_cameras(), DeliveryMode::Manual)
    }

    pub fn default_cameras() -> Vec<CameraDevice> {
        vec![
            CameraDevice::new("Synthetic Front Camera", "synthetic:0", CameraPosition::Front),
            CameraDevice::new("Synthetic Back Camera", "synthetic:1", CameraPosition::Back),
        ]
    }

    /// Make the next `open_session` call fail with `error`
    pub fn fail_next_open(&self, error: BackendError) {
        *self.state.next_open_error.lock() = Some(error);
    }

    /// Number of sessions opened over the provider's lifetime
    pub fn sessions_opened(&self) -> u64 {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of sessions currently open
    pub fn active_sessions(&self) -> usize {
        self.state.active.lock().len()
    }

    /// Push a frame to every open, uninterrupted session
    ///
    /// Runs the handlers on the calling thread and returns how many sessions
    /// received the frame.
    pub fn deliver(&self, frame: &CapturedFrame<'_>) -> usize {
        let handlers: Vec<Arc<dyn FrameHandler>> = self
            .state
            .active
            .lock()
            .values()
            .filter(|s| !s.interrupted.load(Ordering::Acquire))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in &handlers {
            handler.on_frame(frame);
        }
        handlers.len()
    }

    /// End every open session as if the device had gone away
    ///
    /// Sessions stay registered (and their device busy) until the owner
    /// stops or drops them.
    pub fn interrupt(&self, reason: SessionInterruption) -> usize {
        let handlers: Vec<Arc<dyn FrameHandler>> = self
            .state
            .active
            .lock()
            .values()
            .filter(|s| !s.interrupted.swap(true, Ordering::AcqRel))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        info!(count = handlers.len(), %reason, "Interrupting synthetic sessions");
        for handler in &handlers {
            handler.on_interrupted(reason.clone());
        }
        handlers.len()
    }
}

impl CaptureProvider for SyntheticProvider {
    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::Synthetic
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.cameras.clone()
    }

    fn open_session(
        &self,
        device: &CameraDevice,
        preset: CapturePreset,
        handler: Arc<dyn FrameHandler>,
    ) -> BackendResult<Box<dyn CaptureSession>> {
        if let Some(error) = self.state.next_open_error.lock().take() {
            return Err(error);
        }
        if !self.cameras.iter().any(|c| c.path == device.path) {
            return Err(BackendError::DeviceNotFound(device.path.clone()));
        }

        let id = SessionId::new();
        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let mut active = self.state.active.lock();
            if active.values().any(|s| s.device_path == device.path) {
                return Err(BackendError::DeviceBusy(device.name.clone()));
            }
            active.insert(
                id,
                ActiveSession {
                    device_path: device.path.clone(),
                    handler: Arc::clone(&handler),
                    interrupted: Arc::clone(&interrupted),
                },
            );
        }
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);

        let generator = match self.mode {
            DeliveryMode::Manual => None,
            DeliveryMode::TestPattern { format } => {
                let spawned = spawn_test_pattern(id, preset, format, handler, interrupted);
                match spawned {
                    Ok(generator) => Some(generator),
                    Err(e) => {
                        self.state.active.lock().remove(&id);
                        return Err(BackendError::InitializationFailed(e.to_string()));
                    }
                }
            }
        };

        info!(device = %device.name, session = %id, preset = %preset, "Synthetic session opened");

        Ok(Box::new(SyntheticSession {
            id,
            state: Arc::clone(&self.state),
            generator,
        }))
    }
}

fn spawn_test_pattern(
    id: SessionId,
    preset: CapturePreset,
    format: PixelFormat,
    handler: Arc<dyn FrameHandler>,
    interrupted: Arc<AtomicBool>,
) -> std::io::Result<CaptureLoop> {
    let (width, height) = preset.resolution();
    let layout = TestPatternLayout::new(format, width, height);
    // One buffer, rewritten in place for every frame
    let mut buffer = vec![0u8; layout.len];
    let mut index = 0u64;
    let started = Instant::now();

    CaptureLoop::spawn_paced(
        &format!("synthetic-{}", id),
        Some(preset.frame_interval()),
        move || {
            if interrupted.load(Ordering::Acquire) {
                return LoopAction::Stop;
            }
            fill_test_pattern(&layout, index, &mut buffer);
            let frame = CapturedFrame {
                width,
                height,
                format,
                stride: layout.stride,
                planes: layout.planes,
                timestamp: started.elapsed(),
                data: &buffer,
            };
            handler.on_frame(&frame);
            index += 1;
            LoopAction::Continue
        },
    )
}

struct SyntheticSession {
    id: SessionId,
    state: Arc<ProviderState>,
    generator: Option<CaptureLoop>,
}

impl SyntheticSession {
    fn release(&mut self) {
        if let Some(mut generator) = self.generator.take() {
            generator.stop();
        }
        if self.state.active.lock().remove(&self.id).is_some() {
            debug!(session = %self.id, "Synthetic session released");
        }
    }
}

impl CaptureSession for SyntheticSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn stop(mut self: Box<Self>) -> BackendResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for SyntheticSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Buffer geometry of a generated frame
#[derive(Debug, Clone, Copy)]
struct TestPatternLayout {
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    planes: Option<PlaneLayout>,
    len: usize,
}

impl TestPatternLayout {
    fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let (stride, planes, len) = match format {
            PixelFormat::NV12 | PixelFormat::NV21 => {
                let planes = PlaneLayout {
                    uv_offset: w * h,
                    uv_stride: (cw * 2) as u32,
                    v_offset: 0,
                    v_stride: 0,
                };
                (w, Some(planes), w * h + cw * 2 * ch)
            }
            PixelFormat::I420 => {
                let planes = PlaneLayout {
                    uv_offset: w * h,
                    uv_stride: cw as u32,
                    v_offset: w * h + cw * ch,
                    v_stride: cw as u32,
                };
                (w, Some(planes), w * h + 2 * cw * ch)
            }
            other => {
                let stride = other.row_bytes(width).unwrap_or(width) as usize;
                (stride, None, stride * h)
            }
        };
        Self {
            format,
            width,
            height,
            stride: stride as u32,
            planes,
            len,
        }
    }
}

/// Classic eight colour bars
const BARS: [[u8; 3]; 8] = [
    [235, 235, 235],
    [235, 235, 16],
    [16, 235, 235],
    [16, 235, 16],
    [235, 16, 235],
    [235, 16, 16],
    [16, 16, 235],
    [16, 16, 16],
];

/// Colour of the bar under column `x`, scrolled by `index` pixels
fn bar_color(x: usize, width: usize, index: u64) -> [u8; 3] {
    let shifted = (x + index as usize) % width.max(1);
    BARS[shifted * BARS.len() / width.max(1)]
}

fn rgb_to_yuv([r, g, b]: [u8; 3]) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = (b - y) * 0.564 + 128.0;
    let v = (r - y) * 0.713 + 128.0;
    (
        y.clamp(0.0, 255.0) as u8,
        u.clamp(0.0, 255.0) as u8,
        v.clamp(0.0, 255.0) as u8,
    )
}

fn fill_test_pattern(layout: &TestPatternLayout, index: u64, buffer: &mut [u8]) {
    let w = layout.width as usize;
    let h = layout.height as usize;
    let stride = layout.stride as usize;

    match layout.format {
        PixelFormat::RGBA | PixelFormat::RGBx | PixelFormat::BGRA | PixelFormat::BGRx => {
            let bgr = matches!(layout.format, PixelFormat::BGRA | PixelFormat::BGRx);
            for row in buffer.chunks_exact_mut(stride).take(h) {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let [r, g, b] = bar_color(x, w, index);
                    let rgb = if bgr { [b, g, r] } else { [r, g, b] };
                    px.copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
                }
            }
        }
        PixelFormat::RGB24 => {
            for row in buffer.chunks_exact_mut(stride).take(h) {
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    px.copy_from_slice(&bar_color(x, w, index));
                }
            }
        }
        PixelFormat::YUYV | PixelFormat::YVYU | PixelFormat::UYVY | PixelFormat::VYUY => {
            for row in buffer.chunks_exact_mut(stride).take(h) {
                for (pair, macropixel) in row.chunks_exact_mut(4).enumerate() {
                    let (y0, u, v) = rgb_to_yuv(bar_color(pair * 2, w, index));
                    let (y1, _, _) = rgb_to_yuv(bar_color(pair * 2 + 1, w, index));
                    let bytes = match layout.format {
                        PixelFormat::YUYV => [y0, u, y1, v],
                        PixelFormat::YVYU => [y0, v, y1, u],
                        PixelFormat::UYVY => [u, y0, v, y1],
                        _ => [v, y0, u, y1],
                    };
                    macropixel.copy_from_slice(&bytes);
                }
            }
        }
        PixelFormat::NV12 | PixelFormat::NV21 | PixelFormat::I420 => {
            let (luma, chroma) = buffer.split_at_mut(w * h);
            for row in luma.chunks_exact_mut(w) {
                for (x, y) in row.iter_mut().enumerate() {
                    *y = rgb_to_yuv(bar_color(x, w, index)).0;
                }
            }
            let cw = w.div_ceil(2);
            let ch = h.div_ceil(2);
            match layout.format {
                PixelFormat::I420 => {
                    let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);
                    for cy in 0..ch {
                        for cx in 0..cw {
                            let (_, u, v) = rgb_to_yuv(bar_color(cx * 2, w, index));
                            u_plane[cy * cw + cx] = u;
                            v_plane[cy * cw + cx] = v;
                        }
                    }
                }
                _ => {
                    let swap = layout.format == PixelFormat::NV21;
                    for row in chroma.chunks_exact_mut(cw * 2).take(ch) {
                        for (cx, uv) in row.chunks_exact_mut(2).enumerate() {
                            let (_, u, v) = rgb_to_yuv(bar_color(cx * 2, w, index));
                            uv.copy_from_slice(&if swap { [v, u] } else { [u, v] });
                        }
                    }
                }
            }
        }
        PixelFormat::Gray8 => {
            for row in buffer.chunks_exact_mut(stride).take(h) {
                for (x, px) in row.iter_mut().enumerate() {
                    *px = rgb_to_yuv(bar_color(x, w, index)).0;
                }
            }
        }
        // Opaque payload for formats the pipeline cannot convert
        PixelFormat::MJPEG | PixelFormat::BayerRGGB | PixelFormat::Unknown => {
            buffer.fill((index % 256) as u8);
        }
    }
}

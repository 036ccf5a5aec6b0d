// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture session
//!
//! ```text
//! device source ! videoconvert ! videoscale ! capsfilter(NV12, preset size) ! appsink
//! ```
//!
//! The appsink keeps at most `pipeline::MAX_BUFFERS` samples and drops the
//! oldest when the handler falls behind. Each sample is mapped read-only for
//! exactly the duration of [`FrameHandler::on_frame`]. A capture loop polls
//! the bus and turns errors and end-of-stream into interruptions.

use super::super::frame_loop::{CaptureLoop, LoopAction};
use super::super::types::*;
use super::super::{CaptureSession, FrameHandler};
use crate::constants::{CapturePreset, pipeline, timing};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Pixel format requested from videoconvert
const OUTPUT_FORMAT: PixelFormat = PixelFormat::NV12;

pub struct GStreamerSession {
    id: SessionId,
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    bus_watch: Option<CaptureLoop>,
    released: bool,
}

impl GStreamerSession {
    pub fn open(
        gst_device: &gstreamer::Device,
        camera: &CameraDevice,
        preset: CapturePreset,
        handler: Arc<dyn FrameHandler>,
    ) -> BackendResult<Self> {
        let id = SessionId::new();
        let (width, height) = preset.resolution();
        info!(device = %camera.name, session = %id, preset = %preset, "Creating GStreamer capture pipeline");

        let source = gst_device
            .create_element(None)
            .map_err(|e| BackendError::InitializationFailed(format!("Failed to create source: {}", e)))?;
        let convert = make_element("videoconvert")?;
        let scale = make_element("videoscale")?;
        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", OUTPUT_FORMAT.to_gst_format_string())
            .field("width", width as i32)
            .field("height", height as i32)
            .build();
        let capsfilter = gstreamer::ElementFactory::make("capsfilter")
            .property("caps", &caps)
            .build()
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;
        let appsink = AppSink::builder()
            .max_buffers(pipeline::MAX_BUFFERS)
            .drop(true)
            .sync(false)
            .enable_last_sample(false)
            .build();

        let pipeline = gstreamer::Pipeline::with_name(&format!("camtex-{}", id));
        let elements = [&source, &convert, &scale, &capsfilter, appsink.upcast_ref()];
        pipeline
            .add_many(elements)
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;
        gstreamer::Element::link_many(elements).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to link pipeline: {}", e))
        })?;

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample({
                    let handler = Arc::clone(&handler);
                    let frame_counter = AtomicU64::new(0);
                    let started = Instant::now();
                    move |appsink| {
                        let frame_num = frame_counter.fetch_add(1, Ordering::Relaxed);
                        let sample = appsink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                        deliver_sample(&sample, started, frame_num, handler.as_ref())?;
                        Ok(gstreamer::FlowSuccess::Ok)
                    }
                })
                .build(),
        );

        let bus = pipeline.bus().ok_or_else(|| {
            BackendError::InitializationFailed("Pipeline has no bus".to_string())
        })?;

        let mut session = Self {
            id,
            pipeline,
            appsink,
            bus_watch: None,
            released: false,
        };

        if let Err(e) = session.pipeline.set_state(gstreamer::State::Playing) {
            let reason = pop_startup_error(&bus)
                .unwrap_or_else(|| BackendError::InitializationFailed(e.to_string()));
            let _ = session.release();
            return Err(reason);
        }

        let (result, state, pending) = session.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");
        if result.is_err() {
            let reason = pop_startup_error(&bus).unwrap_or_else(|| {
                BackendError::InitializationFailed("Pipeline failed to start".to_string())
            });
            let _ = session.release();
            return Err(reason);
        }
        if state != gstreamer::State::Playing {
            warn!(state = ?state, "Pipeline not yet playing, continuing asynchronously");
        }

        let watch = CaptureLoop::spawn(&format!("gst-bus-{}", id), move || {
            watch_bus(&bus, handler.as_ref())
        });
        match watch {
            Ok(watch) => session.bus_watch = Some(watch),
            Err(e) => {
                let _ = session.release();
                return Err(BackendError::InitializationFailed(e.to_string()));
            }
        }

        info!(session = %id, "GStreamer capture session started");
        Ok(session)
    }

    fn release(&mut self) -> BackendResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        debug!(session = %self.id, "Clearing appsink callbacks");
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        let result = self
            .pipeline
            .set_state(gstreamer::State::Null)
            .map(|_| ())
            .map_err(|e| BackendError::Other(format!("Failed to stop pipeline: {}", e)));

        let (state_result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        if let Err(e) = state_result {
            debug!(error = ?e, state = ?state, "Pipeline state change had issues");
        }

        if let Some(mut watch) = self.bus_watch.take() {
            watch.stop();
        }

        info!(session = %self.id, "GStreamer capture session released");
        result
    }
}

fn make_element(name: &str) -> BackendResult<gstreamer::Element> {
    gstreamer::ElementFactory::make(name)
        .build()
        .map_err(|e| BackendError::InitializationFailed(format!("Failed to create {}: {}", name, e)))
}

fn deliver_sample(
    sample: &gstreamer::Sample,
    started: Instant,
    frame_num: u64,
    handler: &dyn FrameHandler,
) -> Result<(), gstreamer::FlowError> {
    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
        if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
            warn!(frame = frame_num, "Buffer marked as corrupted, skipping frame");
        }
        // Skipping a frame is not a stream error
        return Ok(());
    }

    let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
    let video_info = VideoInfo::from_caps(caps).map_err(|e| {
        error!(frame = frame_num, error = ?e, "Failed to get video info");
        gstreamer::FlowError::Error
    })?;
    let map = buffer.map_readable().map_err(|e| {
        error!(frame = frame_num, error = ?e, "Failed to map buffer");
        gstreamer::FlowError::Error
    })?;

    let format = PixelFormat::from_gst_format(video_info.format().to_str().as_str());
    let offsets = video_info.offset();
    let strides = video_info.stride();
    let planes = (video_info.n_planes() > 1).then(|| PlaneLayout {
        uv_offset: offsets[1],
        uv_stride: strides[1] as u32,
        v_offset: offsets.get(2).copied().unwrap_or(0),
        v_stride: strides.get(2).map(|s| *s as u32).unwrap_or(0),
    });
    let timestamp = buffer
        .pts()
        .map(|pts| Duration::from_nanos(pts.nseconds()))
        .unwrap_or_else(|| started.elapsed());

    if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
        debug!(
            frame = frame_num,
            width = video_info.width(),
            height = video_info.height(),
            format = %format,
            stride = strides[0],
            size_kb = map.size() / 1024,
            "Frame layout"
        );
    }

    let frame = CapturedFrame {
        width: video_info.width(),
        height: video_info.height(),
        format,
        stride: strides[0] as u32,
        planes,
        timestamp,
        data: map.as_slice(),
    };
    handler.on_frame(&frame);
    // `map` is unmapped here, handing the buffer back to the pool
    Ok(())
}

fn watch_bus(bus: &gstreamer::Bus, handler: &dyn FrameHandler) -> LoopAction {
    use gstreamer::MessageView;

    let Some(message) = bus.timed_pop(gstreamer::ClockTime::from_mseconds(
        timing::BUS_POLL_INTERVAL_MS,
    )) else {
        return LoopAction::Continue;
    };

    match message.view() {
        MessageView::Error(err) => {
            let source = err.src().map(|s| s.path_string().to_string());
            error!(source = ?source, error = %err.error(), debug = ?err.debug(), "Capture pipeline error");
            let reason = if err.error().matches(gstreamer::ResourceError::NotFound)
                || err.error().matches(gstreamer::ResourceError::Read)
            {
                SessionInterruption::DeviceDisconnected
            } else {
                SessionInterruption::SessionInterrupted(err.error().to_string())
            };
            handler.on_interrupted(reason);
            LoopAction::Stop
        }
        MessageView::Eos(_) => {
            info!("Capture pipeline reached end of stream");
            handler.on_interrupted(SessionInterruption::DeviceDisconnected);
            LoopAction::Stop
        }
        MessageView::Warning(w) => {
            warn!(error = %w.error(), "Capture pipeline warning");
            LoopAction::Continue
        }
        _ => LoopAction::Continue,
    }
}

/// Classify the error message posted while the pipeline was starting
fn pop_startup_error(bus: &gstreamer::Bus) -> Option<BackendError> {
    let message = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
    let gstreamer::MessageView::Error(err) = message.view() else {
        return None;
    };
    let error = err.error();
    let text = error.to_string();
    Some(if error.matches(gstreamer::ResourceError::Busy) {
        BackendError::DeviceBusy(text)
    } else if error.matches(gstreamer::ResourceError::NotAuthorized) {
        BackendError::PermissionDenied(text)
    } else if error.matches(gstreamer::ResourceError::NotFound) {
        BackendError::DeviceNotFound(text)
    } else {
        BackendError::InitializationFailed(text)
    })
}

impl CaptureSession for GStreamerSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn stop(mut self: Box<Self>) -> BackendResult<()> {
        info!(session = %self.id, "Stopping GStreamer capture session");
        self.release()
    }
}

impl Drop for GStreamerSession {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(session = %self.id, error = %e, "Failed to release capture session");
        }
    }
}

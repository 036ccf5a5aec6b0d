// SPDX-License-Identifier: GPL-3.0-only

//! Camera frame to texture pipeline
//!
//! # Architecture
//!
//! ```text
//!  provider thread                         consumer thread(s)
//!  ───────────────                         ──────────────────
//!  on_frame(&CapturedFrame)
//!     │
//!     ├─ converting? ──yes──▶ copy into staging slot (replaces older)
//!     │
//!     ▼ no
//!  convert_to_rgba ─▶ TextureFactory ─▶ ArcSwap::store ◀── current_texture()
//!     │                                      (load_full, never blocks)
//!     └─ drain staging slot
//! ```
//!
//! Conversions are serialized and only the newest staged frame survives, so
//! there is never a queue of stale frames. Every frame is tagged with the
//! generation of the session that delivered it; a conversion whose session
//! has since been stopped is dropped at publication time.

pub mod events;
pub mod state;
pub mod stats;

pub use events::PipelineEvent;
pub use state::CaptureState;
pub use stats::{PipelineStats, StatsSnapshot};

use crate::backends::camera::types::*;
use crate::backends::camera::{CaptureProvider, CaptureSession, FrameHandler};
use crate::constants::{CapturePreset, pipeline as limits, timing};
use crate::errors::{FrameError, PipelineError};
use crate::media::convert_to_rgba;
use crate::texture::{PublishedTexture, TextureFactory};
use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use state::StateCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// What to capture; fixed for the lifetime of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfiguration {
    pub preset: CapturePreset,
    pub camera: CameraSelection,
}

impl CaptureConfiguration {
    pub fn new(preset: CapturePreset, camera: CameraSelection) -> Self {
        Self { preset, camera }
    }
}

/// Continuously converts camera frames into textures and keeps the newest
/// one available to any number of readers
pub struct CameraTexturePipeline<F: TextureFactory> {
    shared: Arc<Shared<F>>,
    provider: Arc<dyn CaptureProvider>,
    configuration: CaptureConfiguration,
    device: CameraDevice,
    /// Serializes start/stop; never taken on the frame path
    control: Mutex<Control>,
}

#[derive(Default)]
struct Control {
    session: Option<Box<dyn CaptureSession>>,
}

/// State reachable from the provider's delivery thread
struct Shared<F: TextureFactory> {
    factory: F,
    current: ArcSwapOption<PublishedTexture<F::Texture>>,
    state: StateCell,
    /// Bumped on every start and stop; frames of older sessions are stale
    generation: AtomicU64,
    /// Held for the whole of a conversion
    converting: Mutex<()>,
    /// Newest frame that arrived during a conversion
    pending: Mutex<Option<StagedFrame>>,
    /// Orders the generation check of a publication against start/stop
    publish_lock: Mutex<()>,
    sequence: AtomicU64,
    stats: PipelineStats,
    events: broadcast::Sender<PipelineEvent>,
}

/// Owned copy of a frame waiting for the converter
struct StagedFrame {
    generation: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: u32,
    planes: Option<PlaneLayout>,
    timestamp: Duration,
    data: Vec<u8>,
}

impl StagedFrame {
    fn copy_from(frame: &CapturedFrame<'_>, generation: u64) -> Self {
        Self {
            generation,
            width: frame.width,
            height: frame.height,
            format: frame.format,
            stride: frame.stride,
            planes: frame.planes,
            timestamp: frame.timestamp,
            data: frame.data.to_vec(),
        }
    }

    fn as_frame(&self) -> CapturedFrame<'_> {
        CapturedFrame {
            width: self.width,
            height: self.height,
            format: self.format,
            stride: self.stride,
            planes: self.planes,
            timestamp: self.timestamp,
            data: &self.data,
        }
    }
}

impl<F: TextureFactory> CameraTexturePipeline<F> {
    /// Build a pipeline for the configured camera without starting capture
    pub fn create(
        provider: Arc<dyn CaptureProvider>,
        configuration: CaptureConfiguration,
        factory: F,
    ) -> Result<Self, PipelineError> {
        let cameras = provider.enumerate_cameras();
        let device = cameras
            .into_iter()
            .find(|camera| configuration.camera.matches(camera))
            .ok_or_else(|| PipelineError::DeviceUnavailable(configuration.camera.clone()))?;

        info!(
            backend = %provider.backend_type(),
            device = %device.name,
            path = %device.path,
            preset = %configuration.preset,
            textures = factory.name(),
            "Camera texture pipeline created"
        );

        let (events, _) = broadcast::channel(limits::EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            shared: Arc::new(Shared {
                factory,
                current: ArcSwapOption::empty(),
                state: StateCell::new(CaptureState::Idle),
                generation: AtomicU64::new(0),
                converting: Mutex::new(()),
                pending: Mutex::new(None),
                publish_lock: Mutex::new(()),
                sequence: AtomicU64::new(0),
                stats: PipelineStats::default(),
                events,
            }),
            provider,
            configuration,
            device,
            control: Mutex::new(Control::default()),
        })
    }

    /// Open a capture session; no-op while already running
    ///
    /// Frames arrive asynchronously afterwards. On failure the pipeline stays
    /// Idle.
    pub fn start_capture(&self) -> Result<(), PipelineError> {
        let mut control = self.control.lock();
        if self.shared.state.load() == CaptureState::Running {
            debug!("Capture already running");
            return Ok(());
        }

        // Session left behind by an interruption
        if let Some(stale) = control.session.take() {
            release_session(stale);
        }

        let generation = {
            let _publish = self.shared.publish_lock.lock();
            let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            self.shared.state.store(CaptureState::Running);
            self.shared.emit(PipelineEvent::StateChanged {
                from: CaptureState::Idle,
                to: CaptureState::Running,
            });
            generation
        };

        let sink = Arc::new(SessionSink {
            shared: Arc::downgrade(&self.shared),
            generation,
            session: OnceLock::new(),
        });
        let handler: Arc<dyn FrameHandler> = sink.clone();

        match self
            .provider
            .open_session(&self.device, self.configuration.preset, handler)
        {
            Ok(session) => {
                let _ = sink.session.set(session.id());
                self.shared.stats.record_session_opened();
                info!(
                    session = %session.id(),
                    device = %self.device.name,
                    generation,
                    "Capture started"
                );
                control.session = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(device = %self.device.name, error = %e, "Failed to open capture session");
                {
                    let _publish = self.shared.publish_lock.lock();
                    self.shared.generation.fetch_add(1, Ordering::AcqRel);
                    // An interruption during open may already have ended it
                    if self
                        .shared
                        .state
                        .transition(CaptureState::Running, CaptureState::Idle)
                    {
                        self.shared.emit(PipelineEvent::StateChanged {
                            from: CaptureState::Running,
                            to: CaptureState::Idle,
                        });
                    }
                }
                Err(PipelineError::SessionConfiguration(e))
            }
        }
    }

    /// Tear down the capture session; no-op while idle
    ///
    /// The last published texture stays current.
    pub fn stop_capture(&self) -> Result<(), PipelineError> {
        let mut control = self.control.lock();
        let session = control.session.take();

        let stopping = {
            let _publish = self.shared.publish_lock.lock();
            let stopping = self
                .shared
                .state
                .transition(CaptureState::Running, CaptureState::Stopping);
            if stopping {
                self.shared.generation.fetch_add(1, Ordering::AcqRel);
                self.shared.emit(PipelineEvent::StateChanged {
                    from: CaptureState::Running,
                    to: CaptureState::Stopping,
                });
            }
            stopping
        };

        if !stopping {
            if let Some(stale) = session {
                release_session(stale);
            }
            debug!("Capture already idle");
            return Ok(());
        }

        if self.shared.pending.lock().take().is_some() {
            self.shared.stats.record_discarded_idle();
        }

        let result = match session {
            Some(session) => {
                let id = session.id();
                session.stop().map_err(|e| {
                    warn!(session = %id, error = %e, "Capture session teardown failed");
                    PipelineError::Teardown(e)
                })
            }
            None => Ok(()),
        };

        {
            let _publish = self.shared.publish_lock.lock();
            self.shared.state.store(CaptureState::Idle);
            self.shared.emit(PipelineEvent::StateChanged {
                from: CaptureState::Stopping,
                to: CaptureState::Idle,
            });
        }
        info!(device = %self.device.name, "Capture stopped");
        result
    }

    /// Most recently published texture, if any frame has been converted yet
    ///
    /// Lock-free; safe to call from any thread at any rate.
    pub fn current_texture(&self) -> Option<Arc<PublishedTexture<F::Texture>>> {
        self.shared.current.load_full()
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state.load()
    }

    /// Receive state changes, texture updates, drops and interruptions
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// The camera chosen at construction
    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn configuration(&self) -> &CaptureConfiguration {
        &self.configuration
    }

    /// Identifier of the running session
    ///
    /// `None` while idle, including after an interruption ended the session.
    pub fn session_id(&self) -> Option<SessionId> {
        let control = self.control.lock();
        if self.shared.state.load() != CaptureState::Running {
            return None;
        }
        control.session.as_ref().map(|s| s.id())
    }

    pub fn texture_factory(&self) -> &F {
        &self.shared.factory
    }
}

impl<F: TextureFactory> Drop for CameraTexturePipeline<F> {
    fn drop(&mut self) {
        if let Err(e) = self.stop_capture() {
            warn!(error = %e, "Error stopping capture on drop");
        }
    }
}

fn release_session(session: Box<dyn CaptureSession>) {
    let id = session.id();
    match session.stop() {
        Ok(()) => debug!(session = %id, "Released ended capture session"),
        Err(e) => warn!(session = %id, error = %e, "Failed to release ended capture session"),
    }
}

impl<F: TextureFactory> Shared<F> {
    fn emit(&self, event: PipelineEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.load() == CaptureState::Running
            && self.generation.load(Ordering::Acquire) == generation
    }

    fn handle_frame(&self, generation: u64, frame: &CapturedFrame<'_>) {
        let delivered = self.stats.record_delivered();
        if !self.is_current(generation) {
            self.stats.record_discarded_idle();
            return;
        }
        if delivered % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frame = delivered,
                width = frame.width,
                height = frame.height,
                format = %frame.format,
                "Frame delivered"
            );
        }

        if let Some(guard) = self.converting.try_lock() {
            self.convert_and_publish(generation, frame);
            self.drain_pending(guard);
            return;
        }

        let staged = StagedFrame::copy_from(frame, generation);
        let replaced = self.pending.lock().replace(staged);
        if let Some(replaced) = replaced {
            self.stats.record_superseded();
            debug!(timestamp = ?replaced.timestamp, "Staged frame superseded");
        }

        // The converter may have finished between the try_lock and staging
        if let Some(guard) = self.converting.try_lock() {
            self.drain_pending(guard);
        }
    }

    /// Convert staged frames until the slot stays empty after unlocking
    fn drain_pending<'a>(&'a self, mut guard: MutexGuard<'a, ()>) {
        loop {
            loop {
                let staged = self.pending.lock().take();
                let Some(staged) = staged else { break };
                if self.is_current(staged.generation) {
                    self.convert_and_publish(staged.generation, &staged.as_frame());
                } else {
                    self.stats.record_discarded_idle();
                }
            }
            drop(guard);

            if self.pending.lock().is_none() {
                return;
            }
            match self.converting.try_lock() {
                Some(next) => guard = next,
                // Whoever holds it now drains the slot
                None => return,
            }
        }
    }

    fn convert_and_publish(&self, generation: u64, frame: &CapturedFrame<'_>) {
        let converted = convert_to_rgba(frame)
            .and_then(|image| self.factory.create_texture(image).map_err(FrameError::from));

        let texture = match converted {
            Ok(texture) => texture,
            Err(error) => {
                self.report_drop(frame.timestamp, error);
                return;
            }
        };

        let sequence = {
            let _publish = self.publish_lock.lock();
            if !self.is_current(generation) {
                self.stats.record_abandoned();
                debug!(timestamp = ?frame.timestamp, "Conversion finished after session ended");
                return;
            }
            let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
            self.current.store(Some(Arc::new(PublishedTexture::new(
                texture,
                frame.timestamp,
                sequence,
                frame.width,
                frame.height,
            ))));
            self.emit(PipelineEvent::TextureUpdated {
                sequence,
                timestamp: frame.timestamp,
                width: frame.width,
                height: frame.height,
            });
            sequence
        };

        let published = self.stats.record_published();
        if published % timing::FRAME_LOG_INTERVAL == 1 {
            debug!(sequence, timestamp = ?frame.timestamp, "Texture published");
        }
    }

    fn report_drop(&self, timestamp: Duration, error: FrameError) {
        let count = match error {
            FrameError::UnsupportedFormat(_) => self.stats.record_unsupported(),
            _ => self.stats.record_conversion_failure(),
        };
        if count % timing::FRAME_LOG_INTERVAL == 1 {
            warn!(count, error = %error, "Dropping camera frame");
        }
        self.emit(PipelineEvent::FrameDropped { timestamp, error });
    }

    fn handle_interruption(
        &self,
        generation: u64,
        session: Option<SessionId>,
        reason: SessionInterruption,
    ) {
        let _publish = self.publish_lock.lock();
        let ended = self.generation.load(Ordering::Acquire) == generation
            && self
                .state
                .transition(CaptureState::Running, CaptureState::Idle);
        if !ended {
            debug!(session = ?session, %reason, "Ignoring interruption of an ended session");
            return;
        }

        if self.pending.lock().take().is_some() {
            self.stats.record_discarded_idle();
        }
        self.stats.record_interruption();
        warn!(session = ?session, %reason, "Capture session interrupted");
        self.emit(PipelineEvent::StateChanged {
            from: CaptureState::Running,
            to: CaptureState::Idle,
        });
        self.emit(PipelineEvent::Interrupted { session, reason });
    }
}

/// Frame handler given to the provider for one session
struct SessionSink<F: TextureFactory> {
    shared: Weak<Shared<F>>,
    generation: u64,
    session: OnceLock<SessionId>,
}

impl<F: TextureFactory> FrameHandler for SessionSink<F> {
    fn on_frame(&self, frame: &CapturedFrame<'_>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_frame(self.generation, frame);
        }
    }

    fn on_interrupted(&self, reason: SessionInterruption) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_interruption(self.generation, self.session.get().copied(), reason);
        }
    }
}

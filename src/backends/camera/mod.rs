// SPDX-License-Identifier: GPL-3.0-only

//! Capture provider abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────┐
//! │ CameraTexturePipeline  │  ← lifecycle, conversion, publication
//! └──────────┬─────────────┘
//!            │ open_session(handler)
//!            ▼
//! ┌────────────────────────┐
//! │ CaptureProvider trait  │  ← enumeration, session lifecycle
//! └──────────┬─────────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌─────────┐  ┌─────────┐
//! │GStreamer│  │Synthetic│
//! └─────────┘  └─────────┘
//! ```
//!
//! Providers call back into the pipeline through [`FrameHandler`] on their
//! own delivery thread. A frame is only borrowed for the duration of
//! [`FrameHandler::on_frame`]; the provider reclaims the buffer afterwards.

pub mod frame_loop;
#[cfg(feature = "gstreamer")]
pub mod gstreamer;
pub mod synthetic;
pub mod types;

pub use synthetic::{DeliveryMode, SyntheticProvider};
pub use types::*;

use crate::constants::CapturePreset;
use std::sync::Arc;

/// Receiver of frames and session notifications from a provider
pub trait FrameHandler: Send + Sync {
    /// Called on the provider's delivery thread for every captured frame
    fn on_frame(&self, frame: &CapturedFrame<'_>);

    /// Called once when a running session ends on its own
    ///
    /// The handler must not stop or drop the session from inside this call.
    fn on_interrupted(&self, reason: SessionInterruption);
}

/// An open connection to a camera device
///
/// Dropping a session releases it as well; `stop` additionally reports
/// teardown errors.
pub trait CaptureSession: Send {
    /// Identifier of this session
    fn id(&self) -> SessionId;

    /// Stop frame delivery and release the device
    ///
    /// Returns once no further `on_frame` calls will be made. May block while
    /// the device shuts down.
    fn stop(self: Box<Self>) -> BackendResult<()>;
}

/// Platform camera access
pub trait CaptureProvider: Send + Sync {
    /// Backend type identifier
    fn backend_type(&self) -> CaptureBackendType;

    /// Enumerate available cameras
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Open a capture session and start delivering frames to `handler`
    ///
    /// Delivery begins asynchronously; frames may arrive before this returns.
    fn open_session(
        &self,
        device: &CameraDevice,
        preset: CapturePreset,
        handler: Arc<dyn FrameHandler>,
    ) -> BackendResult<Box<dyn CaptureSession>>;
}

/// Create a provider for the given backend type
pub fn get_provider(backend_type: CaptureBackendType) -> BackendResult<Arc<dyn CaptureProvider>> {
    match backend_type {
        CaptureBackendType::Synthetic => Ok(Arc::new(SyntheticProvider::with_default_cameras())),
        #[cfg(feature = "gstreamer")]
        CaptureBackendType::GStreamer => Ok(Arc::new(gstreamer::GStreamerProvider::new()?)),
        #[cfg(not(feature = "gstreamer"))]
        CaptureBackendType::GStreamer => Err(BackendError::NotAvailable(
            "built without the `gstreamer` feature".to_string(),
        )),
    }
}

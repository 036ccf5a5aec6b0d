// SPDX-License-Identifier: GPL-3.0-only

//! Asynchronous pipeline notifications
//!
//! Per-frame failures and mid-session losses never surface as errors of a
//! pipeline call; they are broadcast here instead. Slow subscribers lose the
//! oldest events (`broadcast::error::RecvError::Lagged`), never block the
//! delivery thread.

use super::state::CaptureState;
use crate::backends::camera::types::{SessionId, SessionInterruption};
use crate::errors::FrameError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Capture state changed
    StateChanged { from: CaptureState, to: CaptureState },
    /// A new texture became current
    TextureUpdated {
        sequence: u64,
        timestamp: Duration,
        width: u32,
        height: u32,
    },
    /// A frame was dropped without producing a texture
    FrameDropped {
        timestamp: Duration,
        error: FrameError,
    },
    /// The session ended on its own; the pipeline is Idle
    ///
    /// `session` is `None` only when the session ended before its provider
    /// finished opening it.
    Interrupted {
        session: Option<SessionId>,
        reason: SessionInterruption,
    },
}

impl std::fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineEvent::StateChanged { from, to } => write!(f, "state {} -> {}", from, to),
            PipelineEvent::TextureUpdated {
                sequence,
                timestamp,
                width,
                height,
            } => write!(
                f,
                "texture #{} {}x{} at {:?}",
                sequence, width, height, timestamp
            ),
            PipelineEvent::FrameDropped { timestamp, error } => {
                write!(f, "frame at {:?} dropped: {}", timestamp, error)
            }
            PipelineEvent::Interrupted {
                session: Some(session),
                reason,
            } => write!(f, "session {} interrupted: {}", session, reason),
            PipelineEvent::Interrupted {
                session: None,
                reason,
            } => write!(f, "session interrupted while opening: {}", reason),
        }
    }
}

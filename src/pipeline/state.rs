// SPDX-License-Identifier: GPL-3.0-only

//! Capture state machine
//!
//! ```text
//! Idle ──start──▶ Running ──stop──▶ Stopping ──teardown──▶ Idle
//!                    │
//!                    └──device error──▶ Idle
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    /// No session; the last texture (if any) stays current
    Idle,
    /// A session is open and frames are being converted
    Running,
    /// The session is being torn down
    Stopping,
}

impl CaptureState {
    fn as_u8(self) -> u8 {
        match self {
            CaptureState::Idle => 0,
            CaptureState::Running => 1,
            CaptureState::Stopping => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CaptureState::Running,
            2 => CaptureState::Stopping,
            _ => CaptureState::Idle,
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "idle"),
            CaptureState::Running => write!(f, "running"),
            CaptureState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Lock-free cell holding a [`CaptureState`]
///
/// Read on every frame by the delivery thread; written by start/stop and by
/// interruption handling.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: CaptureState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(crate) fn load(&self) -> CaptureState {
        CaptureState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: CaptureState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Move from `from` to `to`; returns false if the state was not `from`
    pub(crate) fn transition(&self, from: CaptureState, to: CaptureState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_only_from_expected_state() {
        let cell = StateCell::new(CaptureState::Idle);
        assert!(!cell.transition(CaptureState::Running, CaptureState::Idle));
        assert!(cell.transition(CaptureState::Idle, CaptureState::Running));
        assert_eq!(cell.load(), CaptureState::Running);
        cell.store(CaptureState::Stopping);
        assert_eq!(cell.load(), CaptureState::Stopping);
    }
}

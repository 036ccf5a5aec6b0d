// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for provider loops
//!
//! Providers that produce frames or poll for notifications on their own
//! thread run that work through a [`CaptureLoop`]: a named thread that calls
//! a tick closure until it asks to stop or the owner stops it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the tick closure to control the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Run the next tick
    Continue,
    /// Leave the loop
    Stop,
}

/// A provider loop running on its own thread
///
/// With a pacing interval the loop sleeps until the next deadline between
/// ticks, so a frame generator runs at its nominal frame rate without
/// drifting. Without one the tick closure is expected to block on its own
/// source (bus polling, device reads).
pub struct CaptureLoop {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoop {
    /// Spawn a loop calling `tick` back to back
    pub fn spawn<F>(name: &str, tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn_paced(name, None, tick)
    }

    /// Spawn a loop calling `tick` once per `interval`
    pub fn spawn_paced<F>(name: &str, interval: Option<Duration>, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, ?interval, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut next_deadline = Instant::now();

                while !thread_stop.load(Ordering::Acquire) {
                    if tick() == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }

                    if let Some(interval) = interval {
                        next_deadline += interval;
                        let now = Instant::now();
                        if next_deadline > now {
                            thread::sleep(next_deadline - now);
                        } else {
                            // Fell behind (slow consumer); restart pacing from now
                            next_deadline = now;
                        }
                    }
                }

                info!(name = %thread_name, "Capture loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Ask the loop to exit after the current tick, without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::Release);
    }

    /// Stop the loop and wait for the current tick to finish
    ///
    /// Must not be called from inside the loop's own tick closure.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from within a tick: the loop exits on its own
                return;
            }
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for CaptureLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLoop")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut capture_loop = CaptureLoop::spawn("test-loop", move || {
            if counter_clone.fetch_add(1, Ordering::SeqCst) >= 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        })
        .unwrap();

        capture_loop.join();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert!(!capture_loop.is_running());
    }

    #[test]
    fn test_stop_signal() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut capture_loop =
            CaptureLoop::spawn_paced("test-paced", Some(Duration::from_millis(5)), move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            })
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        capture_loop.stop();
        let ticks = counter.load(Ordering::SeqCst);
        assert!(ticks > 0);

        // No more ticks after stop returned
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), ticks);
    }

    #[test]
    fn test_pacing_limits_rate() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let capture_loop =
            CaptureLoop::spawn_paced("test-rate", Some(Duration::from_millis(20)), move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            })
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        drop(capture_loop);
        // ~5 ticks expected; unpaced it would be thousands
        assert!(counter.load(Ordering::SeqCst) < 20);
    }
}

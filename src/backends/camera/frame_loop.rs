// SPDX-License-Identifier: GPL-3.0-only
//! Paced frame producer loops
//!
//! Runs a frame-producing closure on its own thread at a fixed interval until
//! it asks to stop or the controller is stopped. The virtual camera uses this
//! to stand in for a sensor streaming into a repeating request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Produce the next frame after the interval
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a paced loop running in a separate thread
pub struct FrameLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl FrameLoopController {
    /// Start calling `loop_fn` every `interval` on a new named thread
    pub fn start<F>(name: &str, interval: Duration, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, interval_ms = interval.as_millis() as u64, "Starting frame loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Frame loop thread started");

                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }

                    let started = Instant::now();
                    if loop_fn() == LoopAction::Stop {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }

                    // Sleep in short slices so stop() is not held up by long intervals
                    let deadline = started + interval;
                    while !stop_signal_clone.load(Ordering::SeqCst) {
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        thread::sleep((deadline - now).min(Duration::from_millis(5)));
                    }
                }

                info!(name = %name_clone, "Frame loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting frame loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside the loop callback; the thread exits on its own
                return;
            }
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Frame loop thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for FrameLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "FrameLoopController dropped, stopping loop");
            self.stop();
        }
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

        let mut controller =
            FrameLoopController::start("test-loop", Duration::from_millis(1), move || {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count >= 4 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            })
            .unwrap();

        controller.join();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_stop_interrupts_long_interval() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller =
            FrameLoopController::start("test-slow", Duration::from_secs(60), move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            })
            .unwrap();

        thread::sleep(Duration::from_millis(30));
        let started = Instant::now();
        controller.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!controller.is_running());
    }
}

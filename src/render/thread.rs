// SPDX-License-Identifier: GPL-3.0-only

//! Render thread
//!
//! Hosts the GPU context and the [`PreviewRenderer`] on a dedicated thread and
//! draws only when asked. Frame-available notifications arrive from whatever
//! thread the camera produces on; [`RedrawRequester`] turns any number of them
//! into at most one pending redraw.

use super::context::GpuContext;
use super::renderer::{DrawOutcome, PreviewRenderer, QuadGeometry, SurfaceEvent, SurfaceRenderer};
use super::texture::FrameAvailableListener;
use crate::errors::AppResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Commands processed by the render thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCommand {
    SurfaceCreated { width: u32, height: u32 },
    SurfaceChanged { width: u32, height: u32 },
    Redraw,
    Destroy,
    Shutdown,
}

/// Coalescing redraw trigger
///
/// Safe to call from any thread. While a redraw is pending, further requests
/// are absorbed; the flag is cleared right before drawing so a frame arriving
/// mid-draw schedules the next one.
#[derive(Clone)]
pub struct RedrawRequester {
    pending: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<RenderCommand>,
}

impl RedrawRequester {
    /// Returns true if this call scheduled a new redraw
    pub fn request_render(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        if self.tx.send(RenderCommand::Redraw).is_err() {
            trace!("Render thread gone, redraw request dropped");
            return false;
        }
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Counters published by the render thread
#[derive(Debug, Default)]
pub struct RenderStats {
    frames_drawn: AtomicU64,
    frames_latched: AtomicU64,
    redraws_requested: AtomicU64,
}

impl RenderStats {
    /// Draw ticks that produced a frame on screen
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn.load(Ordering::Relaxed)
    }

    /// Draw ticks that uploaded a new camera frame
    pub fn frames_latched(&self) -> u64 {
        self.frames_latched.load(Ordering::Relaxed)
    }

    /// Redraws actually scheduled (after coalescing)
    pub fn redraws_requested(&self) -> u64 {
        self.redraws_requested.load(Ordering::Relaxed)
    }
}

/// Dedicated thread owning the GPU context and renderer
pub struct RenderThread {
    tx: mpsc::UnboundedSender<RenderCommand>,
    requester: RedrawRequester,
    stats: Arc<RenderStats>,
    thread_handle: Option<JoinHandle<()>>,
    name: String,
}

impl RenderThread {
    /// Start the render thread
    ///
    /// `factory` runs on the new thread and creates the GPU context there.
    /// Surface events ([`SurfaceEvent::Ready`] and friends) are delivered on the
    /// returned receiver.
    pub fn start<C, F>(
        name: &str,
        factory: F,
        quad: QuadGeometry,
    ) -> std::io::Result<(Self, mpsc::UnboundedReceiver<SurfaceEvent>)>
    where
        C: GpuContext + 'static,
        F: FnOnce() -> AppResult<C> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RenderStats::default());
        let requester = RedrawRequester {
            pending: Arc::new(AtomicBool::new(false)),
            tx: tx.clone(),
        };

        let thread_requester = requester.clone();
        let thread_stats = Arc::clone(&stats);
        let thread_name = name.to_string();

        info!(name = %name, "Starting render thread");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let ctx = match factory() {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        error!(name = %thread_name, error = %e, "Failed to create GPU context");
                        let _ = events_tx.send(SurfaceEvent::Failed(e));
                        return;
                    }
                };

                let listener_requester = thread_requester.clone();
                let listener: Arc<dyn FrameAvailableListener> = Arc::new(move || {
                    listener_requester.request_render();
                });
                let mut renderer = PreviewRenderer::new(ctx, quad, listener, events_tx);

                run_loop(&mut renderer, &mut rx, &thread_requester, &thread_stats);
                info!(name = %thread_name, "Render thread exiting");
            })?;

        Ok((
            Self {
                tx,
                requester,
                stats,
                thread_handle: Some(thread_handle),
                name: name.to_string(),
            },
            events_rx,
        ))
    }

    pub fn surface_created(&self, width: u32, height: u32) {
        self.send(RenderCommand::SurfaceCreated { width, height });
    }

    pub fn surface_changed(&self, width: u32, height: u32) {
        self.send(RenderCommand::SurfaceChanged { width, height });
    }

    /// Tear down the surface texture and GPU texture
    pub fn destroy_surface(&self) {
        self.send(RenderCommand::Destroy);
    }

    /// Ask for a redraw; coalesced with any pending request
    pub fn request_render(&self) -> bool {
        self.requester.request_render()
    }

    pub fn requester(&self) -> RedrawRequester {
        self.requester.clone()
    }

    pub fn stats(&self) -> Arc<RenderStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Destroy the surface and wait for the thread to exit
    pub fn stop(&mut self) {
        self.send(RenderCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Render thread panicked: {:?}", e);
            }
        }
    }

    fn send(&self, command: RenderCommand) {
        if self.tx.send(command).is_err() {
            debug!(name = %self.name, ?command, "Render thread gone, command dropped");
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "RenderThread dropped, stopping");
            self.stop();
        }
    }
}

fn run_loop<R: SurfaceRenderer>(
    renderer: &mut R,
    rx: &mut mpsc::UnboundedReceiver<RenderCommand>,
    requester: &RedrawRequester,
    stats: &RenderStats,
) {
    let mut surface_alive = false;

    while let Some(command) = rx.blocking_recv() {
        match command {
            RenderCommand::SurfaceCreated { width, height } => {
                renderer.on_surface_created(width, height);
                surface_alive = true;
                draw(renderer, requester, stats);
            }
            RenderCommand::SurfaceChanged { width, height } => {
                renderer.on_surface_changed(width, height);
                draw(renderer, requester, stats);
            }
            RenderCommand::Redraw => {
                stats.redraws_requested.fetch_add(1, Ordering::Relaxed);
                draw(renderer, requester, stats);
            }
            RenderCommand::Destroy => {
                if surface_alive {
                    renderer.on_surface_destroyed();
                    surface_alive = false;
                }
            }
            RenderCommand::Shutdown => break,
        }
    }

    if surface_alive {
        renderer.on_surface_destroyed();
    }
}

fn draw<R: SurfaceRenderer>(renderer: &mut R, requester: &RedrawRequester, stats: &RenderStats) {
    requester.pending.store(false, Ordering::Release);
    if let DrawOutcome::Drawn { latched } = renderer.on_draw_frame() {
        stats.frames_drawn.fetch_add(1, Ordering::Relaxed);
        if latched.is_some() {
            stats.frames_latched.fetch_add(1, Ordering::Relaxed);
        }
    }
}

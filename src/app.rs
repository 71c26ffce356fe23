// SPDX-License-Identifier: GPL-3.0-only

//! Preview orchestration
//!
//! Ties the session controller to the render surface. The camera is opened
//! from `init_camera`; the preview starts once both the device is open and the
//! surface texture is ready, whichever happens last.

use crate::backends::camera::types::{
    CameraEvent, CapturePermission, DeviceDescriptor, LensFacing, PreviewResolution,
    SessionState, Size,
};
use crate::backends::camera::{
    CameraPlatform, CameraSessionController, WorkerThread, select_optimal,
};
use crate::config::Config;
use crate::constants::{CAMERA_WORKER_THREAD_NAME, RENDER_THREAD_NAME, timing};
use crate::errors::{AppError, AppResult, CameraError};
use crate::render::context::GpuContext;
use crate::render::renderer::{QuadGeometry, SurfaceEvent};
use crate::render::texture::SurfaceTextureHandle;
use crate::render::thread::RenderThread;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// UI-thread side of the preview
pub struct PreviewApp {
    controller: CameraSessionController,
    viewport: Size,
    surface: Option<SurfaceTextureHandle>,
    device: Option<DeviceDescriptor>,
    resolution: Option<PreviewResolution>,
    preview_started: bool,
    capture_presses: u64,
}

impl PreviewApp {
    pub fn new(controller: CameraSessionController, viewport: Size) -> Self {
        Self {
            controller,
            viewport,
            surface: None,
            device: None,
            resolution: None,
            preview_started: false,
            capture_presses: 0,
        }
    }

    pub fn controller(&self) -> &CameraSessionController {
        &self.controller
    }

    pub fn resolution(&self) -> Option<PreviewResolution> {
        self.resolution
    }

    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    pub fn is_preview_started(&self) -> bool {
        self.preview_started
    }

    pub fn capture_presses(&self) -> u64 {
        self.capture_presses
    }

    /// Capture button handler; still capture does nothing yet
    pub fn on_capture_pressed(&mut self) {
        self.capture_presses += 1;
        self.controller.capture_still();
    }

    /// Pick a camera of the controller's facing, choose its resolution and
    /// begin opening it
    pub fn init_camera(&mut self, permission: CapturePermission) -> AppResult<()> {
        if !permission.is_granted() {
            warn!("Camera permission not granted");
            return Err(CameraError::PermissionDenied.into());
        }

        let lens_facing = self.controller.lens_facing();
        let devices = self.controller.list_candidate_devices(permission, None);
        let Some(device) = devices.into_iter().next() else {
            return Err(CameraError::DeviceUnavailable(format!("no {} camera", lens_facing)).into());
        };

        let resolution = select_optimal(
            &device.characteristics.output_sizes,
            self.viewport.width,
            self.viewport.height,
        )?;
        info!(
            device = %device.id,
            resolution = %resolution,
            viewport = %self.viewport,
            "Preview resolution selected"
        );

        self.controller.open(&device.id)?;
        self.resolution = Some(resolution);
        self.device = Some(device);
        Ok(())
    }

    /// The render surface has a texture; start the preview if the camera is
    /// already open
    pub fn on_surface_ready(&mut self, surface: SurfaceTextureHandle) -> AppResult<bool> {
        debug!(surface = surface.id(), "Preview surface ready");
        self.surface = Some(surface);
        self.preview_camera()
    }

    /// The render surface is gone; the camera can no longer deliver frames
    pub fn on_surface_destroyed(&mut self) {
        info!("Preview surface destroyed, closing camera");
        self.surface = None;
        self.preview_started = false;
        self.controller.close();
    }

    /// Apply a camera event, starting the preview once the device is open
    pub fn on_camera_event(&mut self, event: CameraEvent) -> AppResult<SessionState> {
        let closed_by_event = match &event {
            CameraEvent::Disconnected(_) => Some(CameraError::DeviceDisconnected),
            CameraEvent::Error(_, code) => Some(CameraError::DeviceError(*code)),
            _ => None,
        };
        let previous = self.controller.state();
        let was_active = previous.holds_device() || previous == SessionState::Opening;

        let state = self.controller.handle_event(event);
        match state {
            SessionState::Opened => {
                self.preview_camera()?;
            }
            SessionState::ConfigureFailed => {
                self.preview_started = false;
                return Err(CameraError::ConfigureFailed.into());
            }
            SessionState::Closed if was_active => {
                self.preview_started = false;
                if let Some(e) = closed_by_event {
                    return Err(e.into());
                }
            }
            _ => {}
        }
        Ok(state)
    }

    /// Size the surface buffer and start the session, once both a device and a
    /// surface exist. Returns whether the preview was started by this call.
    pub fn preview_camera(&mut self) -> AppResult<bool> {
        if self.preview_started || self.controller.state() != SessionState::Opened {
            return Ok(false);
        }
        let (Some(surface), Some(resolution)) = (self.surface.as_mut(), self.resolution) else {
            debug!("Waiting for both the device and the surface");
            return Ok(false);
        };

        surface.set_buffer_size(resolution.width, resolution.height)?;
        let target = surface.capture_target()?;
        self.controller.start_preview(target, resolution)?;
        self.preview_started = true;
        Ok(true)
    }

    /// Close the camera
    pub fn shutdown(&mut self) {
        self.controller.close();
        self.preview_started = false;
    }

    /// Drive camera and surface events until `until` completes or an error
    /// ends the preview
    pub async fn run<F>(
        &mut self,
        surface_events: &mut mpsc::UnboundedReceiver<SurfaceEvent>,
        until: F,
    ) -> AppResult<()>
    where
        F: Future<Output = AppResult<()>>,
    {
        tokio::pin!(until);

        loop {
            tokio::select! {
                result = &mut until => return result,
                Some(event) = self.controller.next_event() => {
                    self.on_camera_event(event)?;
                }
                event = surface_events.recv() => match event {
                    Some(SurfaceEvent::Ready(surface)) => {
                        self.on_surface_ready(surface)?;
                    }
                    Some(SurfaceEvent::Destroyed) => self.on_surface_destroyed(),
                    Some(SurfaceEvent::Failed(e)) => {
                        error!(error = %e, "Render surface failed");
                        return Err(e);
                    }
                    None => return Err(AppError::Other("render thread exited".into())),
                },
            }
        }
    }
}

/// Inputs of a headless preview run
pub struct PreviewOptions {
    pub config: Config,
    pub permission: CapturePermission,
    /// Stop after this many frames were latched; run until `stop` when `None`
    pub frames: Option<u64>,
    /// Set to end the run early (e.g. from a Ctrl+C handler)
    pub stop: Arc<AtomicBool>,
    /// Press the capture button once the run ends
    pub capture_at_end: bool,
}

/// What a preview run achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewReport {
    pub device_id: Option<String>,
    pub lens_facing: LensFacing,
    pub resolution: Option<PreviewResolution>,
    pub final_state: SessionState,
    pub repeating_submissions: u64,
    pub frames_drawn: u64,
    pub frames_latched: u64,
    /// Capture button presses; none of them produce a still
    pub capture_presses: u64,
}

/// Run the full pipeline without a window
///
/// Starts the camera worker and the render thread, opens a camera of the
/// configured facing and previews until the frame budget is reached or `stop`
/// is set. `factory` creates the GPU context on the render thread.
pub async fn run_preview<C, F>(
    platform: Arc<dyn CameraPlatform>,
    options: PreviewOptions,
    factory: F,
) -> AppResult<PreviewReport>
where
    C: GpuContext + 'static,
    F: FnOnce() -> AppResult<C> + Send + 'static,
{
    let config = options.config;
    let lens_facing = config.lens_facing;
    let viewport = Size::new(config.viewport_width, config.viewport_height);

    let mut worker = WorkerThread::start(CAMERA_WORKER_THREAD_NAME)?;
    let controller = CameraSessionController::new(platform, worker.handle(), lens_facing);
    let mut app = PreviewApp::new(controller, viewport);

    let quad = QuadGeometry::for_lens(lens_facing, config.mirror_front_preview);
    let (mut render, mut surface_events) = RenderThread::start(RENDER_THREAD_NAME, factory, quad)?;
    render.surface_created(viewport.width, viewport.height);

    let stats = render.stats();
    let result = match app.init_camera(options.permission) {
        Ok(()) => {
            let stats = Arc::clone(&stats);
            let frames = options.frames;
            let stop = Arc::clone(&options.stop);
            let until = async move {
                let started = Instant::now();
                loop {
                    if stop.load(Ordering::SeqCst) {
                        info!("Preview stopped");
                        return Ok(());
                    }
                    let latched = stats.frames_latched();
                    if frames.is_some_and(|n| latched >= n) {
                        info!(frames = latched, "Frame budget reached");
                        return Ok(());
                    }
                    if latched == 0 && started.elapsed() > timing::FIRST_FRAME_TIMEOUT {
                        return Err(AppError::Other("no preview frame arrived in time".into()));
                    }
                    tokio::time::sleep(timing::RUN_LOOP_TICK).await;
                }
            };
            app.run(&mut surface_events, until).await
        }
        Err(e) => Err(e),
    };

    if result.is_ok() && options.capture_at_end {
        app.on_capture_pressed();
    }

    let report = PreviewReport {
        device_id: app.device().map(|d| d.id.clone()),
        lens_facing,
        resolution: app.resolution(),
        final_state: app.controller().state(),
        repeating_submissions: app.controller().repeating_submissions(),
        frames_drawn: stats.frames_drawn(),
        frames_latched: stats.frames_latched(),
        capture_presses: app.capture_presses(),
    };

    app.shutdown();
    render.stop();
    worker.stop();

    result.map(|()| report)
}

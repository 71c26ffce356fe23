// SPDX-License-Identifier: GPL-3.0-only

//! Frame renderer and the render-surface callbacks
//!
//! [`FrameRenderer`] draws the external texture as a full-surface quad.
//! [`PreviewRenderer`] ties it to the texture provider and implements the
//! [`SurfaceRenderer`] callbacks the render host drives.

use super::context::{GpuContext, TextureHandle};
use super::texture::{FrameAvailableListener, SurfaceTextureHandle, TextureSurfaceProvider};
use crate::backends::camera::types::LensFacing;
use crate::constants::CLEAR_COLOR;
use crate::errors::AppError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Full-surface quad corners in clip space, as a triangle fan
const VERTICES: [[f32; 2]; 4] = [[-1.0, 1.0], [-1.0, -1.0], [1.0, -1.0], [1.0, 1.0]];

/// Texture coordinates for back cameras (sensor rotated into portrait)
const TEXTURE_BACK: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

/// Texture coordinates for front cameras (rotated and mirrored)
const TEXTURE_FRONT: [[f32; 2]; 4] = [[1.0, 1.0], [0.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

/// The fan 0-1-2-3 as two triangles
const DRAW_ORDER: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Vertex data of the preview quad
#[derive(Debug, Clone, PartialEq)]
pub struct QuadGeometry {
    pub positions: [[f32; 2]; 4],
    pub tex_coords: [[f32; 2]; 4],
    pub indices: [u16; 6],
}

impl QuadGeometry {
    /// Quad for a camera facing `lens_facing`
    ///
    /// Front cameras are mirrored unless `mirror_front` is false.
    pub fn for_lens(lens_facing: LensFacing, mirror_front: bool) -> Self {
        let tex_coords = match lens_facing {
            LensFacing::Front if mirror_front => TEXTURE_FRONT,
            _ => TEXTURE_BACK,
        };
        Self {
            positions: VERTICES,
            tex_coords,
            indices: DRAW_ORDER,
        }
    }

    pub fn is_mirrored(&self) -> bool {
        self.tex_coords == TEXTURE_FRONT
    }
}

/// Result of a draw tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// A frame was drawn; `latched` is the frame uploaded by this tick
    Drawn { latched: Option<u64> },
    /// Nothing to draw yet (no texture)
    Skipped,
}

/// Draws the external texture
#[derive(Debug)]
pub struct FrameRenderer {
    quad: QuadGeometry,
    frames_drawn: u64,
}

impl FrameRenderer {
    pub fn new(quad: QuadGeometry) -> Self {
        Self {
            quad,
            frames_drawn: 0,
        }
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Latch the newest frame, clear to white and draw it
    pub fn on_frame_ready(
        &mut self,
        ctx: &mut dyn GpuContext,
        provider: &mut TextureSurfaceProvider,
        texture: TextureHandle,
    ) -> DrawOutcome {
        let latched = match provider.update_tex_image(ctx) {
            Ok(latched) => latched,
            Err(e) => {
                warn!(error = %e, "Failed to latch frame");
                None
            }
        };

        ctx.clear(CLEAR_COLOR);
        ctx.draw_textured_quad(texture, &self.quad);
        self.frames_drawn += 1;

        DrawOutcome::Drawn { latched }
    }
}

/// Render-surface callbacks, invoked only on the render thread
pub trait SurfaceRenderer {
    fn on_surface_created(&mut self, width: u32, height: u32);

    fn on_surface_changed(&mut self, width: u32, height: u32);

    fn on_draw_frame(&mut self) -> DrawOutcome;

    fn on_surface_destroyed(&mut self);
}

/// Messages from the render thread to the UI thread
#[derive(Debug)]
pub enum SurfaceEvent {
    /// Texture and surface texture exist; the handle may be sized and given
    /// to the camera
    Ready(SurfaceTextureHandle),
    /// The surface was torn down; capture targets are now released
    Destroyed,
    /// The GPU context or texture could not be created
    Failed(AppError),
}

/// Camera preview renderer owning the GPU context and texture provider
pub struct PreviewRenderer<C: GpuContext> {
    ctx: C,
    provider: TextureSurfaceProvider,
    renderer: FrameRenderer,
    listener: Arc<dyn FrameAvailableListener>,
    events: mpsc::UnboundedSender<SurfaceEvent>,
}

impl<C: GpuContext> PreviewRenderer<C> {
    /// `listener` is registered on every surface texture this renderer creates
    pub fn new(
        ctx: C,
        quad: QuadGeometry,
        listener: Arc<dyn FrameAvailableListener>,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) -> Self {
        Self {
            ctx,
            provider: TextureSurfaceProvider::new(),
            renderer: FrameRenderer::new(quad),
            listener,
            events,
        }
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn frames_drawn(&self) -> u64 {
        self.renderer.frames_drawn()
    }

    fn notify(&self, event: SurfaceEvent) {
        if self.events.send(event).is_err() {
            debug!("Surface event dropped, UI side is gone");
        }
    }
}

impl<C: GpuContext> SurfaceRenderer for PreviewRenderer<C> {
    fn on_surface_created(&mut self, width: u32, height: u32) {
        info!(width, height, "Render surface created");
        self.ctx.set_viewport(width, height);

        let texture = match self.provider.create_external_texture(&mut self.ctx) {
            Ok(texture) => texture,
            Err(e) => {
                error!(error = %e, "Failed to create external texture");
                self.notify(SurfaceEvent::Failed(e.into()));
                return;
            }
        };

        match self
            .provider
            .bind_surface_texture(texture, Arc::clone(&self.listener))
        {
            Ok(handle) => self.notify(SurfaceEvent::Ready(handle)),
            Err(e) => {
                error!(error = %e, "Failed to bind surface texture");
                self.notify(SurfaceEvent::Failed(e.into()));
            }
        }
    }

    fn on_surface_changed(&mut self, width: u32, height: u32) {
        debug!(width, height, "Render surface changed");
        self.ctx.set_viewport(width, height);
    }

    fn on_draw_frame(&mut self) -> DrawOutcome {
        let Some(texture) = self.provider.texture() else {
            trace!("Draw requested before the texture exists, skipping");
            return DrawOutcome::Skipped;
        };
        self.renderer
            .on_frame_ready(&mut self.ctx, &mut self.provider, texture)
    }

    fn on_surface_destroyed(&mut self) {
        info!("Render surface destroyed");
        self.provider.destroy(&mut self.ctx);
        self.notify(SurfaceEvent::Destroyed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::CameraFrame;
    use crate::render::context::{GpuCommand, RecordingContext};
    use std::time::Instant;

    fn renderer() -> (
        PreviewRenderer<RecordingContext>,
        mpsc::UnboundedReceiver<SurfaceEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn FrameAvailableListener> = Arc::new(|| {});
        let quad = QuadGeometry::for_lens(LensFacing::Back, true);
        (
            PreviewRenderer::new(RecordingContext::new(), quad, listener, tx),
            rx,
        )
    }

    #[test]
    fn test_front_quad_is_mirrored() {
        assert!(QuadGeometry::for_lens(LensFacing::Front, true).is_mirrored());
        assert!(!QuadGeometry::for_lens(LensFacing::Front, false).is_mirrored());
        assert!(!QuadGeometry::for_lens(LensFacing::Back, true).is_mirrored());
    }

    #[test]
    fn test_draw_before_surface_is_skipped() {
        let (mut renderer, _rx) = renderer();
        assert_eq!(renderer.on_draw_frame(), DrawOutcome::Skipped);
        assert!(renderer.context().commands().is_empty());
    }

    #[test]
    fn test_surface_created_reports_ready() {
        let (mut renderer, mut rx) = renderer();
        renderer.on_surface_created(1080, 1920);

        assert!(matches!(rx.try_recv(), Ok(SurfaceEvent::Ready(_))));
        assert_eq!(
            renderer.context().commands()[0],
            GpuCommand::Viewport(1080, 1920)
        );
    }

    #[test]
    fn test_draw_latches_clears_white_and_draws() {
        let (mut renderer, mut rx) = renderer();
        renderer.on_surface_created(8, 8);
        let Ok(SurfaceEvent::Ready(mut handle)) = rx.try_recv() else {
            panic!("surface not ready");
        };
        handle.set_buffer_size(2, 2).unwrap();
        let target = handle.capture_target().unwrap();
        target.queue_frame(CameraFrame {
            width: 2,
            height: 2,
            sequence: 7,
            data: vec![255u8; 16].into(),
            captured_at: Instant::now(),
        });

        assert_eq!(
            renderer.on_draw_frame(),
            DrawOutcome::Drawn { latched: Some(7) }
        );

        let commands = renderer.context().commands();
        let n = commands.len();
        assert!(matches!(commands[n - 3], GpuCommand::Upload { sequence: 7, .. }));
        assert_eq!(commands[n - 2], GpuCommand::Clear([1.0, 1.0, 1.0, 1.0]));
        assert!(matches!(commands[n - 1], GpuCommand::Draw(..)));

        // Redraw without a new frame still draws the latched texture
        assert_eq!(
            renderer.on_draw_frame(),
            DrawOutcome::Drawn { latched: None }
        );
        assert_eq!(renderer.frames_drawn(), 2);
    }

    #[test]
    fn test_surface_destroyed_releases_texture() {
        let (mut renderer, mut rx) = renderer();
        renderer.on_surface_created(8, 8);
        let _ = rx.try_recv();

        renderer.on_surface_destroyed();
        assert!(matches!(rx.try_recv(), Ok(SurfaceEvent::Destroyed)));
        assert!(renderer.context().live_textures().is_empty());
        assert_eq!(renderer.on_draw_frame(), DrawOutcome::Skipped);
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! External texture and surface texture plumbing
//!
//! A surface texture has two halves:
//!
//! - [`SurfaceTexture`] lives on the render thread next to the GPU texture and
//!   latches the newest frame into it.
//! - [`SurfaceTextureHandle`] is handed to the UI thread once the texture
//!   exists. The UI sizes the buffer and turns it into a [`CaptureTarget`] for
//!   the camera.
//!
//! Frames travel through a latest-value channel, so a slow renderer only ever
//! sees the newest frame. Each queued frame fires the frame-available listener.

use super::context::{GpuContext, TextureHandle, TextureParams};
use crate::backends::camera::types::{CameraFrame, Size};
use crate::errors::{TextureError, TextureResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Notified every time a new frame is queued into a surface texture
pub trait FrameAvailableListener: Send + Sync {
    fn on_frame_available(&self);
}

impl<F> FrameAvailableListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_frame_available(&self) {
        self()
    }
}

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

type FrameSlot = Option<CameraFrame>;

/// Render-thread half of a surface texture
pub struct SurfaceTexture {
    id: u64,
    texture: TextureHandle,
    frames: watch::Receiver<FrameSlot>,
    latched_sequence: Option<u64>,
}

impl SurfaceTexture {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    /// Sequence number of the frame currently held by the texture
    pub fn latched_sequence(&self) -> Option<u64> {
        self.latched_sequence
    }

    /// Upload the newest queued frame into the texture, if one arrived since
    /// the last call. Returns the sequence of the latched frame.
    pub fn update_tex_image(&mut self, ctx: &mut dyn GpuContext) -> TextureResult<Option<u64>> {
        if !self.frames.has_changed().unwrap_or(false) {
            return Ok(None);
        }

        let frame = self.frames.borrow_and_update().clone();
        let Some(frame) = frame else {
            return Ok(None);
        };

        ctx.upload_frame(self.texture, &frame)?;
        self.latched_sequence = Some(frame.sequence);
        trace!(surface = self.id, sequence = frame.sequence, "Latched frame");
        Ok(Some(frame.sequence))
    }
}

impl std::fmt::Debug for SurfaceTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceTexture")
            .field("id", &self.id)
            .field("texture", &self.texture)
            .field("latched_sequence", &self.latched_sequence)
            .finish()
    }
}

/// UI-side handle of a surface texture
///
/// Obtained from [`TextureSurfaceProvider::bind_surface_texture`] once the
/// texture exists; the buffer size must be set before a capture target can be
/// taken from it.
pub struct SurfaceTextureHandle {
    id: u64,
    frames: Arc<watch::Sender<FrameSlot>>,
    listener: Option<Arc<dyn FrameAvailableListener>>,
    buffer_size: Option<Size>,
}

impl SurfaceTextureHandle {
    fn new(id: u64, listener: Option<Arc<dyn FrameAvailableListener>>) -> (Self, watch::Receiver<FrameSlot>) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                id,
                frames: Arc::new(tx),
                listener,
                buffer_size: None,
            },
            rx,
        )
    }

    /// A surface texture pair not backed by a GPU texture
    ///
    /// Useful where frames need to flow without a render thread (tests, frame
    /// counting). The consumer half uses the invalid texture handle.
    pub fn detached() -> (Self, SurfaceTexture) {
        let id = NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed);
        let (handle, rx) = Self::new(id, None);
        let consumer = SurfaceTexture {
            id,
            texture: TextureHandle::NONE,
            frames: rx,
            latched_sequence: None,
        };
        (handle, consumer)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Size of the buffers the camera must produce
    pub fn set_buffer_size(&mut self, width: u32, height: u32) -> TextureResult<()> {
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidBufferSize { width, height });
        }
        debug!(surface = self.id, width, height, "Surface buffer size set");
        self.buffer_size = Some(Size::new(width, height));
        Ok(())
    }

    pub fn buffer_size(&self) -> Option<Size> {
        self.buffer_size
    }

    /// True once the render-thread half was destroyed
    pub fn is_released(&self) -> bool {
        self.frames.is_closed()
    }

    /// Camera-side view of this surface
    pub fn capture_target(&self) -> TextureResult<CaptureTarget> {
        if self.is_released() {
            return Err(TextureError::Released);
        }
        let buffer_size = self.buffer_size.ok_or(TextureError::BufferSizeUnset)?;
        Ok(CaptureTarget {
            surface_id: self.id,
            frames: Arc::clone(&self.frames),
            listener: self.listener.clone(),
            buffer_size,
        })
    }
}

impl std::fmt::Debug for SurfaceTextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceTextureHandle")
            .field("id", &self.id)
            .field("buffer_size", &self.buffer_size)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Where the camera writes frames for one surface texture
///
/// Only obtainable from a sized [`SurfaceTextureHandle`], so a capture
/// session can never target a surface that does not exist yet.
#[derive(Clone)]
pub struct CaptureTarget {
    surface_id: u64,
    frames: Arc<watch::Sender<FrameSlot>>,
    listener: Option<Arc<dyn FrameAvailableListener>>,
    buffer_size: Size,
}

impl CaptureTarget {
    pub fn surface_id(&self) -> u64 {
        self.surface_id
    }

    pub fn buffer_size(&self) -> Size {
        self.buffer_size
    }

    pub fn is_released(&self) -> bool {
        self.frames.is_closed()
    }

    /// Queue a frame and notify the listener
    ///
    /// Returns false when the frame was dropped: wrong size, or the surface
    /// was destroyed.
    pub fn queue_frame(&self, frame: CameraFrame) -> bool {
        if frame.size() != self.buffer_size {
            warn!(
                surface = self.surface_id,
                frame = %frame.size(),
                buffer = %self.buffer_size,
                "Dropping frame with mismatched size"
            );
            return false;
        }

        if self.frames.send(Some(frame)).is_err() {
            trace!(surface = self.surface_id, "Surface released, dropping frame");
            return false;
        }

        if let Some(listener) = &self.listener {
            listener.on_frame_available();
        }
        true
    }
}

impl std::fmt::Debug for CaptureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureTarget")
            .field("surface_id", &self.surface_id)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

/// Owner of the external texture and its surface texture (render thread only)
#[derive(Debug, Default)]
pub struct TextureSurfaceProvider {
    texture: Option<TextureHandle>,
    surface: Option<SurfaceTexture>,
}

impl TextureSurfaceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn surface(&self) -> Option<&SurfaceTexture> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut SurfaceTexture> {
        self.surface.as_mut()
    }

    /// Allocate the external texture (linear filtering, clamp to edge)
    ///
    /// Recreating replaces, and releases, the previous texture and surface.
    pub fn create_external_texture(
        &mut self,
        ctx: &mut dyn GpuContext,
    ) -> TextureResult<TextureHandle> {
        if self.texture.is_some() {
            debug!("Recreating external texture");
            self.destroy(ctx);
        }

        let texture = ctx.create_external_texture(&TextureParams::EXTERNAL)?;
        info!(texture = %texture, "External texture created");
        self.texture = Some(texture);
        Ok(texture)
    }

    /// Create the surface texture fed into `texture`
    ///
    /// `listener` fires once per queued frame; it is expected to coalesce
    /// redraw requests itself.
    pub fn bind_surface_texture(
        &mut self,
        texture: TextureHandle,
        listener: Arc<dyn FrameAvailableListener>,
    ) -> TextureResult<SurfaceTextureHandle> {
        if self.texture != Some(texture) {
            return Err(TextureError::NoTexture);
        }
        if self.surface.is_some() {
            return Err(TextureError::AlreadyBound);
        }

        let id = NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed);
        let (handle, rx) = SurfaceTextureHandle::new(id, Some(listener));
        self.surface = Some(SurfaceTexture {
            id,
            texture,
            frames: rx,
            latched_sequence: None,
        });

        debug!(surface = id, texture = %texture, "Surface texture bound");
        Ok(handle)
    }

    /// Latch the newest frame, if any
    pub fn update_tex_image(&mut self, ctx: &mut dyn GpuContext) -> TextureResult<Option<u64>> {
        match self.surface.as_mut() {
            Some(surface) => surface.update_tex_image(ctx),
            None => Err(TextureError::NoTexture),
        }
    }

    /// Release the surface texture and the GPU texture
    pub fn destroy(&mut self, ctx: &mut dyn GpuContext) {
        if let Some(surface) = self.surface.take() {
            debug!(surface = surface.id, "Surface texture released");
        }
        if let Some(texture) = self.texture.take() {
            ctx.delete_texture(texture);
            info!(texture = %texture, "External texture destroyed");
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! GPU context seam
//!
//! The renderer and the texture provider only talk to the GPU through
//! [`GpuContext`]. A context is created on, and never leaves, the render
//! thread. [`WgpuContext`](super::wgpu_context::WgpuContext) renders for real;
//! [`RecordingContext`] only records the commands it receives.

use super::renderer::QuadGeometry;
use crate::backends::camera::types::{CameraFrame, Size};
use crate::constants::RECORDING_LOG_CAPACITY;
use crate::errors::TextureResult;

/// Name of a texture allocated by a [`GpuContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    /// Never returned by a context
    pub const NONE: TextureHandle = TextureHandle(0);
}

impl std::fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

/// Sampling parameters of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParams {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl TextureParams {
    /// Parameters of the camera's external texture
    pub const EXTERNAL: TextureParams = TextureParams {
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        wrap_s: WrapMode::ClampToEdge,
        wrap_t: WrapMode::ClampToEdge,
    };
}

/// Operations the preview needs from a GPU context
///
/// Draw calls return nothing: GPU errors are not checked on the draw path.
pub trait GpuContext {
    /// Allocate an external texture; storage is sized by the first upload
    fn create_external_texture(&mut self, params: &TextureParams) -> TextureResult<TextureHandle>;

    /// Replace the texture contents with `frame`
    fn upload_frame(&mut self, texture: TextureHandle, frame: &CameraFrame) -> TextureResult<()>;

    fn delete_texture(&mut self, texture: TextureHandle);

    /// Resize the drawable area
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clear color and depth
    fn clear(&mut self, color: [f64; 4]);

    /// Draw `quad` sampling `texture`
    fn draw_textured_quad(&mut self, texture: TextureHandle, quad: &QuadGeometry);
}

/// A command received by a [`RecordingContext`]
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateTexture(TextureHandle, TextureParams),
    Upload {
        texture: TextureHandle,
        size: Size,
        sequence: u64,
    },
    DeleteTexture(TextureHandle),
    Viewport(u32, u32),
    Clear([f64; 4]),
    Draw(TextureHandle, QuadGeometry),
}

/// GPU context that records commands instead of executing them
///
/// Backs the preview when no GPU adapter is wanted (`--no-gpu`) and lets tests
/// assert what the renderer asked for. Only the most recent commands are
/// kept; draws are counted over the whole lifetime.
#[derive(Debug)]
pub struct RecordingContext {
    commands: Vec<GpuCommand>,
    capacity: usize,
    draws: u64,
    next_texture: u32,
    live_textures: Vec<TextureHandle>,
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::with_capacity(RECORDING_LOG_CAPACITY)
    }
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` commands (minimum 2)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::new(),
            capacity: capacity.max(2),
            draws: 0,
            next_texture: 0,
            live_textures: Vec::new(),
        }
    }

    /// Retained commands, oldest first
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Quads drawn since creation, including those no longer retained
    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    pub fn live_textures(&self) -> &[TextureHandle] {
        &self.live_textures
    }

    fn record(&mut self, command: GpuCommand) {
        if self.commands.len() >= self.capacity {
            self.commands.drain(..self.capacity / 2);
        }
        self.commands.push(command);
    }
}

impl GpuContext for RecordingContext {
    fn create_external_texture(&mut self, params: &TextureParams) -> TextureResult<TextureHandle> {
        self.next_texture += 1;
        let texture = TextureHandle(self.next_texture);
        self.live_textures.push(texture);
        self.record(GpuCommand::CreateTexture(texture, *params));
        Ok(texture)
    }

    fn upload_frame(&mut self, texture: TextureHandle, frame: &CameraFrame) -> TextureResult<()> {
        if !self.live_textures.contains(&texture) {
            return Err(crate::errors::TextureError::NoTexture);
        }
        self.record(GpuCommand::Upload {
            texture,
            size: frame.size(),
            sequence: frame.sequence,
        });
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.live_textures.retain(|t| *t != texture);
        self.record(GpuCommand::DeleteTexture(texture));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.record(GpuCommand::Viewport(width, height));
    }

    fn clear(&mut self, color: [f64; 4]) {
        self.record(GpuCommand::Clear(color));
    }

    fn draw_textured_quad(&mut self, texture: TextureHandle, quad: &QuadGeometry) {
        self.draws += 1;
        self.record(GpuCommand::Draw(texture, quad.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::LensFacing;

    #[test]
    fn test_recording_log_is_bounded() {
        let mut ctx = RecordingContext::with_capacity(8);
        let texture = ctx
            .create_external_texture(&TextureParams::EXTERNAL)
            .unwrap();
        let quad = QuadGeometry::for_lens(LensFacing::Back, true);

        for _ in 0..100 {
            ctx.clear([1.0; 4]);
            ctx.draw_textured_quad(texture, &quad);
        }

        assert!(ctx.commands().len() <= 8);
        assert_eq!(ctx.draw_count(), 100);
        assert_eq!(ctx.commands().last(), Some(&GpuCommand::Draw(texture, quad)));
        assert_eq!(ctx.live_textures(), &[texture]);
    }
}

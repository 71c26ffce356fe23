// SPDX-License-Identifier: GPL-3.0-only

//! Preview rendering
//!
//! ```text
//! CaptureTarget ──frame──► SurfaceTexture ──latch──► external texture
//!       │                                                  │
//!       └─ frame available ─► RedrawRequester ─► RenderThread draws quad
//! ```
//!
//! Everything that touches the GPU context runs on the render thread.

pub mod context;
pub mod renderer;
pub mod texture;
pub mod thread;
pub mod wgpu_context;

pub use context::{GpuCommand, GpuContext, RecordingContext, TextureHandle, TextureParams};
pub use renderer::{
    DrawOutcome, FrameRenderer, PreviewRenderer, QuadGeometry, SurfaceEvent, SurfaceRenderer,
};
pub use texture::{
    CaptureTarget, FrameAvailableListener, SurfaceTexture, SurfaceTextureHandle,
    TextureSurfaceProvider,
};
pub use thread::{RedrawRequester, RenderCommand, RenderStats, RenderThread};
pub use wgpu_context::WgpuContext;

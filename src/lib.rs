// SPDX-License-Identifier: GPL-3.0-only

//! Camera preview core
//!
//! Opens a camera, streams its frames into a GPU-backed surface texture and
//! draws them on an on-demand render loop.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Orchestration of camera and render surface lifecycles
//! - [`backends`]: Camera session control, resolution selection and platforms
//! - [`render`]: Surface textures, the frame renderer and the render thread
//! - [`gpu`]: wgpu device creation
//! - [`shaders`]: WGSL sources
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! // Headless preview of 30 frames from the back camera:
//! // camera-preview preview --frames 30
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod render;
pub mod shaders;

// Re-export commonly used types
pub use app::{PreviewApp, PreviewOptions, PreviewReport, run_preview};
pub use backends::camera::{CameraSessionController, select_optimal};
pub use config::Config;
pub use errors::{AppError, AppResult};

// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐
//! │ Orchestration (app)     │
//! └───────────┬─────────────┘
//!             │ open / start_preview / close
//!             ▼
//! ┌─────────────────────────┐   CameraEvent channel   ┌──────────────┐
//! │ CameraSessionController │ ◄────────────────────── │ WorkerThread │
//! └───────────┬─────────────┘                         └──────▲───────┘
//!             │ calls                                        │ posts callbacks
//!             ▼                                              │
//! ┌─────────────────────────┐                                │
//! │ CameraPlatform trait    │ ───────────────────────────────┘
//! └───────────┬─────────────┘
//!             ▼
//!   VirtualCameraPlatform (or a real platform binding)
//! ```
//!
//! The controller is the only owner of session state. The platform never
//! calls into it directly: every callback is posted to the worker and arrives
//! as a [`CameraEvent`].

pub mod controller;
pub mod frame_loop;
pub mod resolution;
pub mod types;
pub mod virtual_platform;
pub mod worker;

pub use controller::CameraSessionController;
pub use resolution::select_optimal;
pub use types::*;
pub use virtual_platform::{ConfigureBehavior, OpenBehavior, VirtualCameraPlatform, VirtualDevice};
pub use worker::{WorkerHandle, WorkerThread};

pub use crate::render::texture::CaptureTarget;

use crate::errors::PlatformResult;

/// Camera platform service
///
/// None of the asynchronous operations complete synchronously: `open` and
/// `create_capture_session` only return synchronous refusals, and their
/// outcome is delivered later through `events`, posted on `worker`.
pub trait CameraPlatform: Send + Sync {
    /// Identifiers of all cameras; fails with `AccessDenied` without permission
    fn enumerate_devices(&self) -> PlatformResult<Vec<String>>;

    /// Static properties of a camera
    fn characteristics(&self, device_id: &str) -> PlatformResult<CameraCharacteristics>;

    /// Begin opening a camera
    ///
    /// Delivers `Opened`, or later `Disconnected` / `Error`, for the returned
    /// handle.
    fn open(
        &self,
        device_id: &str,
        events: CameraEventSender,
        worker: &WorkerHandle,
    ) -> PlatformResult<()>;

    /// Begin configuring a capture session on an open device
    ///
    /// Delivers `Configured` or `ConfigureFailed`, or nothing at all.
    fn create_capture_session(
        &self,
        device: &DeviceHandle,
        config: SessionConfiguration,
        events: CameraEventSender,
        worker: &WorkerHandle,
    ) -> PlatformResult<()>;

    /// Install `request` as the session's repeating request
    ///
    /// Frames are produced into the request targets until the device closes.
    /// Capture results are delivered on `worker`.
    fn set_repeating_request(
        &self,
        session: &SessionHandle,
        request: &CaptureRequestTemplate,
        worker: &WorkerHandle,
    ) -> PlatformResult<()>;

    /// Release a device handle; closing a closed handle is a no-op
    fn close_device(&self, device: &DeviceHandle);
}

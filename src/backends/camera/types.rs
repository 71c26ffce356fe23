// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera backends

use crate::errors::CameraError;
use crate::render::texture::CaptureTarget;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;

/// Camera hardware orientation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    /// Facing away from the user
    #[default]
    Back,
    /// Facing the user (selfie camera)
    Front,
    /// Attached externally (USB etc.)
    External,
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Back => write!(f, "back"),
            LensFacing::Front => write!(f, "front"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for LensFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "back" | "rear" => Ok(LensFacing::Back),
            "front" | "selfie" => Ok(LensFacing::Front),
            "external" => Ok(LensFacing::External),
            other => Err(format!("unknown lens facing '{}'", other)),
        }
    }
}

/// A width/height pair reported by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count, widened so 4-byte dimensions cannot overflow
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resolution chosen for a preview session
pub type PreviewResolution = Size;

/// Static properties of a camera device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCharacteristics {
    pub lens_facing: LensFacing,
    /// Sizes the camera can stream into a surface texture, in platform order
    pub output_sizes: Vec<Size>,
    /// Clockwise rotation of the sensor relative to the display (degrees)
    pub sensor_orientation: u32,
}

/// A camera device offered by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub characteristics: CameraCharacteristics,
}

impl DeviceDescriptor {
    pub fn lens_facing(&self) -> LensFacing {
        self.characteristics.lens_facing
    }
}

/// Whether the user granted capture permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePermission {
    Granted,
    Denied,
}

impl CapturePermission {
    pub fn is_granted(&self) -> bool {
        matches!(self, CapturePermission::Granted)
    }
}

impl From<bool> for CapturePermission {
    fn from(granted: bool) -> Self {
        if granted {
            CapturePermission::Granted
        } else {
            CapturePermission::Denied
        }
    }
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn next_handle_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Open camera device handle issued by the platform
///
/// Every successful open yields a handle with a fresh serial, so events from a
/// previous open of the same camera can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    pub device_id: String,
    serial: u64,
}

impl DeviceHandle {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            serial: next_handle_id(),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// Configured capture session handle issued by the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub device: DeviceHandle,
    serial: u64,
}

impl SessionHandle {
    pub fn new(device: DeviceHandle) -> Self {
        Self {
            device,
            serial: next_handle_id(),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// Capture request template kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview,
}

/// Autofocus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AfMode {
    #[default]
    Off,
    Auto,
    ContinuousVideo,
    ContinuousPicture,
}

/// Auto-exposure mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AeMode {
    Off,
    #[default]
    On,
    OnAutoFlash,
    OnAlwaysFlash,
}

/// Capture parameters submitted as the repeating request
#[derive(Debug, Clone)]
pub struct CaptureRequestTemplate {
    pub template: RequestTemplate,
    pub targets: Vec<CaptureTarget>,
    pub af_mode: AfMode,
    pub ae_mode: AeMode,
}

impl CaptureRequestTemplate {
    pub fn new(template: RequestTemplate) -> Self {
        Self {
            template,
            targets: Vec::new(),
            af_mode: AfMode::default(),
            ae_mode: AeMode::default(),
        }
    }

    /// Preview request streaming into `target`, continuous-picture AF and
    /// auto-flash AE
    pub fn preview(target: CaptureTarget) -> Self {
        let mut request = Self::new(RequestTemplate::Preview);
        request.add_target(target);
        request.af_mode = AfMode::ContinuousPicture;
        request.ae_mode = AeMode::OnAutoFlash;
        request
    }

    pub fn add_target(&mut self, target: CaptureTarget) {
        self.targets.push(target);
    }
}

/// How the platform should run a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Regular,
}

/// Outputs requested for a new capture session
#[derive(Debug, Clone)]
pub struct SessionConfiguration {
    pub mode: SessionMode,
    pub outputs: Vec<CaptureTarget>,
}

/// Session state owned by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unopened,
    Opening,
    Opened,
    Configuring,
    /// The platform refused the session; no stream, nothing retried
    ConfigureFailed,
    Streaming,
    Closed,
}

impl SessionState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::Streaming)
    }

    /// States in which a device handle is held
    pub fn holds_device(&self) -> bool {
        matches!(
            self,
            SessionState::Opened
                | SessionState::Configuring
                | SessionState::ConfigureFailed
                | SessionState::Streaming
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Unopened => "unopened",
            SessionState::Opening => "opening",
            SessionState::Opened => "opened",
            SessionState::Configuring => "configuring",
            SessionState::ConfigureFailed => "configure-failed",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Callbacks delivered from the worker thread to the controller
#[derive(Debug, Clone)]
pub enum CameraEvent {
    /// The device finished opening
    Opened(DeviceHandle),
    /// The device was disconnected (unplugged, taken by a higher priority client)
    Disconnected(DeviceHandle),
    /// The device reported a fatal error
    Error(DeviceHandle, i32),
    /// The capture session finished configuring
    Configured(SessionHandle),
    /// The platform could not configure the capture session
    ConfigureFailed(DeviceHandle),
    /// The repeating request was accepted
    RequestSubmitted(SessionHandle),
    /// The repeating request was rejected
    RequestFailed(SessionHandle, CameraError),
}

impl CameraEvent {
    /// Device the event refers to
    pub fn device(&self) -> &DeviceHandle {
        match self {
            CameraEvent::Opened(device)
            | CameraEvent::Disconnected(device)
            | CameraEvent::Error(device, _)
            | CameraEvent::ConfigureFailed(device) => device,
            CameraEvent::Configured(session)
            | CameraEvent::RequestSubmitted(session)
            | CameraEvent::RequestFailed(session, _) => &session.device,
        }
    }
}

/// Sending half of the controller's event channel, handed to the platform
#[derive(Debug, Clone)]
pub struct CameraEventSender {
    tx: mpsc::UnboundedSender<CameraEvent>,
}

impl CameraEventSender {
    pub fn new(tx: mpsc::UnboundedSender<CameraEvent>) -> Self {
        Self { tx }
    }

    /// Deliver an event; events for a dropped controller are discarded
    pub fn send(&self, event: CameraEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Camera event dropped, controller is gone");
        }
    }
}

/// A single RGBA frame produced by the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Monotonic frame counter per repeating request
    pub sequence: u64,
    /// Tightly packed RGBA pixels (shared, never copied between threads)
    pub data: Arc<[u8]>,
    pub captured_at: Instant,
}

impl CameraFrame {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Bytes per row of the pixel data
    pub fn stride(&self) -> u32 {
        self.width * crate::constants::FRAME_BYTES_PER_PIXEL
    }
}

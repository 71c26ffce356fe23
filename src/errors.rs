// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera preview core
//!
//! Every camera-layer failure is terminal for the attempt that produced it:
//! callers log it and wait for a fresh lifecycle event. Nothing in this crate
//! retries.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for camera session operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Result type for texture surface operations
pub type TextureResult<T> = Result<T, TextureError>;

/// Result type for calls into the camera platform service
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera session errors
    Camera(CameraError),
    /// Resolution selection errors
    Resolution(ResolutionError),
    /// Texture surface errors
    Texture(TextureError),
    /// GPU device or pipeline errors
    Gpu(String),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Camera session errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Capture permission has not been granted
    PermissionDenied,
    /// The platform refused to open the device
    DeviceUnavailable(String),
    /// A device is already open on this controller
    DeviceBusy,
    /// An open attempt is still outstanding
    OpenInProgress,
    /// The device went away while open
    DeviceDisconnected,
    /// The device reported a fatal error code
    DeviceError(i32),
    /// The capture session could not be created
    SessionConfig(String),
    /// The platform reported that session configuration failed
    ConfigureFailed,
    /// Submitting the repeating request failed
    RequestSubmission(String),
}

/// Resolution selection errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionError {
    /// The camera reported no output sizes
    EmptySizeList,
}

/// Texture surface errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// No external texture exists yet
    NoTexture,
    /// A surface texture is already bound to the texture
    AlreadyBound,
    /// Buffer dimensions must be non-zero
    InvalidBufferSize { width: u32, height: u32 },
    /// The buffer size must be set before the surface is used as a capture target
    BufferSizeUnset,
    /// The surface texture was destroyed
    Released,
    /// The GPU context failed
    Gpu(String),
}

/// Errors reported synchronously by the camera platform service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The caller lacks capture permission
    AccessDenied,
    /// No device with this identifier
    NoSuchDevice(String),
    /// The device is in use by another client
    Busy(String),
    /// The device or session handle is no longer valid
    Closed,
    /// Any other platform failure
    Failed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Resolution(e) => write!(f, "Resolution error: {}", e),
            AppError::Texture(e) => write!(f, "Texture error: {}", e),
            AppError::Gpu(msg) => write!(f, "GPU error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied => write!(f, "Camera permission denied"),
            CameraError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CameraError::DeviceBusy => write!(f, "A camera device is already open"),
            CameraError::OpenInProgress => write!(f, "Camera open already in progress"),
            CameraError::DeviceDisconnected => write!(f, "Camera disconnected"),
            CameraError::DeviceError(code) => write!(f, "Camera device error (code {})", code),
            CameraError::SessionConfig(msg) => write!(f, "Session configuration error: {}", msg),
            CameraError::ConfigureFailed => write!(f, "Capture session configuration failed"),
            CameraError::RequestSubmission(msg) => {
                write!(f, "Repeating request submission failed: {}", msg)
            }
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::EmptySizeList => write!(f, "No supported output sizes"),
        }
    }
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::NoTexture => write!(f, "No external texture has been created"),
            TextureError::AlreadyBound => write!(f, "Surface texture already bound"),
            TextureError::InvalidBufferSize { width, height } => {
                write!(f, "Invalid buffer size {}x{}", width, height)
            }
            TextureError::BufferSizeUnset => write!(f, "Surface buffer size not set"),
            TextureError::Released => write!(f, "Surface texture released"),
            TextureError::Gpu(msg) => write!(f, "GPU failure: {}", msg),
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::AccessDenied => write!(f, "Access denied"),
            PlatformError::NoSuchDevice(id) => write!(f, "No such camera: {}", id),
            PlatformError::Busy(id) => write!(f, "Camera {} is in use", id),
            PlatformError::Closed => write!(f, "Handle already closed"),
            PlatformError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for ResolutionError {}
impl std::error::Error for TextureError {}
impl std::error::Error for PlatformError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<ResolutionError> for AppError {
    fn from(err: ResolutionError) -> Self {
        AppError::Resolution(err)
    }
}

impl From<TextureError> for AppError {
    fn from(err: TextureError) -> Self {
        AppError::Texture(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Platform refusals during `open` surface as device unavailability, except
/// missing permission which keeps its own category.
impl From<PlatformError> for CameraError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::AccessDenied => CameraError::PermissionDenied,
            other => CameraError::DeviceUnavailable(other.to_string()),
        }
    }
}

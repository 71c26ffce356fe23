// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Name of the background thread that runs every camera callback
pub const CAMERA_WORKER_THREAD_NAME: &str = "camera-worker";

/// Name of the thread that owns the GPU context
pub const RENDER_THREAD_NAME: &str = "preview-render";

/// Name of the virtual camera's frame producer thread
pub const VIRTUAL_FRAME_THREAD_NAME: &str = "virtual-camera-frames";

/// Viewport assumed before the render surface reports its real size
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1080;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1920;

/// Clear color drawn behind the preview quad (opaque white)
pub const CLEAR_COLOR: [f64; 4] = [1.0, 1.0, 1.0, 1.0];

/// Bytes per pixel of preview frames (RGBA)
pub const FRAME_BYTES_PER_PIXEL: u32 = 4;

/// Commands a recording GPU context keeps before dropping the oldest half
pub const RECORDING_LOG_CAPACITY: usize = 4096;

/// Frame interval of the virtual camera (~30fps)
pub const VIRTUAL_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Timing constants shared by the preview pipeline
pub mod timing {
    use std::time::Duration;

    /// How long the headless preview waits for the first streamed frame
    pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

    /// Poll interval of the preview run loop when idle
    pub const RUN_LOOP_TICK: Duration = Duration::from_millis(10);
}

/// Output sizes advertised by the virtual back camera, in sensor orientation
pub const VIRTUAL_BACK_SIZES: &[(u32, u32)] = &[
    (4000, 3000),
    (3840, 2160),
    (2560, 1920),
    (2048, 1536),
    (1920, 1440),
    (1920, 1080),
    (1280, 960),
    (1280, 720),
    (640, 480),
    (320, 240),
];

/// Output sizes advertised by the virtual front camera, in sensor orientation
pub const VIRTUAL_FRONT_SIZES: &[(u32, u32)] = &[
    (2592, 1944),
    (1920, 1080),
    (1280, 720),
    (640, 480),
];

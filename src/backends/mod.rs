// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! # Modules
//!
//! - [`camera`]: Session controller, resolution selection, the worker thread
//!   and the camera platform seam with its virtual implementation

pub mod camera;

// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the preview pipeline
//!
//! This module provides command-line functionality for:
//! - Listing the available cameras and their output sizes
//! - Showing which preview resolution a viewport selects
//! - Running the preview headless for a number of frames

use camera_preview::app::{PreviewOptions, run_preview};
use camera_preview::backends::camera::types::{CapturePermission, DeviceDescriptor, LensFacing};
use camera_preview::backends::camera::{CameraPlatform, VirtualCameraPlatform, select_optimal};
use camera_preview::config::Config;
use camera_preview::render::{RecordingContext, WgpuContext};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn virtual_platform(config: &Config) -> Arc<VirtualCameraPlatform> {
    Arc::new(
        VirtualCameraPlatform::with_default_devices()
            .with_frame_interval(config.virtual_frame_interval()),
    )
}

fn describe_devices(platform: &dyn CameraPlatform) -> Result<Vec<DeviceDescriptor>, Box<dyn std::error::Error>> {
    let mut devices = Vec::new();
    for id in platform.enumerate_devices()? {
        let characteristics = platform.characteristics(&id)?;
        devices.push(DeviceDescriptor {
            id,
            characteristics,
        });
    }
    Ok(devices)
}

/// List all available cameras
pub fn list_cameras(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let platform = virtual_platform(config);
    let devices = describe_devices(platform.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for device in &devices {
        let characteristics = &device.characteristics;
        println!(
            "  [{}] {} camera, sensor at {}°",
            device.id, characteristics.lens_facing, characteristics.sensor_orientation
        );

        let sizes: Vec<String> = characteristics
            .output_sizes
            .iter()
            .map(|size| size.to_string())
            .collect();
        println!("      Sizes: {}", sizes.join(", "));
        println!();
    }

    Ok(())
}

/// Print the preview resolution chosen for a viewport
pub fn select_resolution(
    config: &Config,
    width: u32,
    height: u32,
    facing: LensFacing,
) -> Result<(), Box<dyn std::error::Error>> {
    let platform = virtual_platform(config);
    let device = describe_devices(platform.as_ref())?
        .into_iter()
        .find(|device| device.lens_facing() == facing)
        .ok_or_else(|| format!("No {} camera found", facing))?;

    let selected = select_optimal(&device.characteristics.output_sizes, width, height)?;
    println!(
        "Camera {} ({}) for a {}x{} viewport: {}",
        device.id, facing, width, height, selected
    );
    Ok(())
}

/// Run the preview without a window
pub fn preview(
    mut config: Config,
    frames: Option<u64>,
    facing: Option<LensFacing>,
    no_gpu: bool,
    capture: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(facing) = facing {
        config.lens_facing = facing;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        println!("\nStopping preview...");
        stop_handler.store(true, Ordering::SeqCst);
    })?;

    let platform: Arc<dyn CameraPlatform> = virtual_platform(&config);
    let options = PreviewOptions {
        config,
        permission: CapturePermission::Granted,
        frames,
        stop,
        capture_at_end: capture,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let report = if no_gpu {
        runtime.block_on(run_preview(platform, options, || Ok(RecordingContext::new())))?
    } else {
        runtime.block_on(run_preview(platform, options, || {
            WgpuContext::new("camera-preview")
        }))?
    };

    println!("Preview finished:");
    println!(
        "  Camera:     {} ({})",
        report.device_id.as_deref().unwrap_or("-"),
        report.lens_facing
    );
    if let Some(resolution) = report.resolution {
        println!("  Resolution: {}", resolution);
    }
    println!("  State:      {}", report.final_state);
    println!("  Frames:     {} drawn, {} new", report.frames_drawn, report.frames_latched);
    if report.capture_presses > 0 {
        println!("  Capture:    pressed, still capture is not supported");
    }

    Ok(())
}

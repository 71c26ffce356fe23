// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities
//!
//! Creates the headless wgpu device the preview renders with. No window
//! surface is involved: the preview draws into an offscreen target.

use std::sync::Arc;
use tracing::{debug, info};

pub use wgpu;

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
}

/// Create a wgpu device and queue for rendering the preview
///
/// # Arguments
///
/// * `label` - A label for the device (for debugging)
///
/// # Returns
///
/// A tuple of (Device, Queue, GpuDeviceInfo) or an error message
pub async fn create_render_device(
    label: &str,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>, GpuDeviceInfo), String> {
    info!(label = label, "Creating GPU device for preview rendering");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::VULKAN,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| format!("Failed to find suitable GPU adapter: {}", e))?;

    let adapter_info = adapter.get_info();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected for preview"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| format!("Failed to create GPU device: {}", e))?;

    debug!(
        max_texture_dimension = device.limits().max_texture_dimension_2d,
        "GPU device created"
    );

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
    };

    Ok((Arc::new(device), Arc::new(queue), info))
}

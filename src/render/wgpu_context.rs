// SPDX-License-Identifier: GPL-3.0-only

//! wgpu-backed GPU context
//!
//! Renders the preview into an offscreen RGBA target the size of the
//! viewport. Each external texture gets its own sampler; storage is allocated
//! on the first upload and reallocated when the frame size changes.

use super::context::{FilterMode, GpuContext, TextureHandle, TextureParams, WrapMode};
use super::renderer::QuadGeometry;
use crate::backends::camera::types::{CameraFrame, Size};
use crate::errors::{AppError, AppResult, TextureError, TextureResult};
use crate::gpu::{self, wgpu};
use crate::shaders::PREVIEW_SHADER;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Format of the offscreen render target
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    tex_coord: [f32; 2],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Texture storage sized to the last uploaded frame
struct TextureStorage {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: Size,
}

struct ExternalTexture {
    sampler: wgpu::Sampler,
    storage: Option<TextureStorage>,
}

struct RenderTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Size,
}

/// GPU context rendering with wgpu
pub struct WgpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    textures: HashMap<TextureHandle, ExternalTexture>,
    next_texture: u32,
    target: Option<RenderTarget>,
    adapter_name: String,
}

impl WgpuContext {
    /// Create a context on a new headless device
    pub fn new(label: &str) -> AppResult<Self> {
        let (device, queue, info) =
            pollster::block_on(gpu::create_render_device(label)).map_err(AppError::Gpu)?;
        let mut ctx = Self::from_device(device, queue);
        ctx.adapter_name = info.adapter_name;
        Ok(ctx)
    }

    /// Create a context on an existing device
    pub fn from_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("camera-preview shader"),
            source: wgpu::ShaderSource::Wgsl(PREVIEW_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera-preview bind group layout"),
            entries: &[
                // Frame texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("camera-preview pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("camera-preview pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera-preview quad vertices"),
            size: (std::mem::size_of::<QuadVertex>() * 4) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // 6 u16 indices, padded to the copy alignment
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera-preview quad indices"),
            size: 16,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        info!("wgpu preview context ready");

        Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            vertex_buffer,
            index_buffer,
            textures: HashMap::new(),
            next_texture: 0,
            target: None,
            adapter_name: String::new(),
        }
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Size of the offscreen target, once a viewport was set
    pub fn target_size(&self) -> Option<Size> {
        self.target.as_ref().map(|t| t.size)
    }

    fn create_sampler(&self, params: &TextureParams) -> wgpu::Sampler {
        let filter = |mode: FilterMode| match mode {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        };
        let address = |mode: WrapMode| match mode {
            WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
        };

        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("camera-preview sampler"),
            address_mode_u: address(params.wrap_s),
            address_mode_v: address(params.wrap_t),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter(params.mag_filter),
            min_filter: filter(params.min_filter),
            ..Default::default()
        })
    }

    fn create_storage(&self, sampler: &wgpu::Sampler, size: Size) -> TextureStorage {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camera-preview frame texture"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera-preview bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        TextureStorage {
            texture,
            bind_group,
            size,
        }
    }

    fn create_target(&self, size: Size) -> RenderTarget {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camera-preview target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        RenderTarget {
            _texture: texture,
            view,
            size,
        }
    }
}

impl GpuContext for WgpuContext {
    fn create_external_texture(&mut self, params: &TextureParams) -> TextureResult<TextureHandle> {
        self.next_texture += 1;
        let handle = TextureHandle(self.next_texture);
        let sampler = self.create_sampler(params);
        self.textures.insert(
            handle,
            ExternalTexture {
                sampler,
                storage: None,
            },
        );
        debug!(texture = %handle, "wgpu external texture allocated");
        Ok(handle)
    }

    fn upload_frame(&mut self, texture: TextureHandle, frame: &CameraFrame) -> TextureResult<()> {
        let size = frame.size();
        let needed = frame.stride() as usize * size.height as usize;
        if size.is_empty() || frame.data.len() < needed {
            return Err(TextureError::Gpu(format!(
                "frame {} carries {} bytes, expected {}",
                size,
                frame.data.len(),
                needed
            )));
        }

        let entry = self.textures.get(&texture).ok_or(TextureError::NoTexture)?;
        let reallocate = entry.storage.as_ref().is_none_or(|s| s.size != size);
        if reallocate {
            debug!(texture = %texture, size = %size, "Allocating frame texture storage");
            let storage = self.create_storage(&entry.sampler, size);
            if let Some(entry) = self.textures.get_mut(&texture) {
                entry.storage = Some(storage);
            }
        }

        let Some(storage) = self.textures.get(&texture).and_then(|e| e.storage.as_ref()) else {
            return Err(TextureError::NoTexture);
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &storage.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data[..needed],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.stride()),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            debug!(texture = %texture, "wgpu external texture released");
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let size = Size::new(width, height);
        if size.is_empty() {
            warn!(size = %size, "Ignoring empty viewport");
            return;
        }
        if self.target.as_ref().is_some_and(|t| t.size == size) {
            return;
        }
        debug!(size = %size, "Resizing preview target");
        self.target = Some(self.create_target(size));
    }

    fn clear(&mut self, color: [f64; 4]) {
        let Some(target) = &self.target else {
            trace!("Clear without a viewport, skipping");
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("camera-preview clear"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("camera-preview clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color[0],
                            g: color[1],
                            b: color[2],
                            a: color[3],
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn draw_textured_quad(&mut self, texture: TextureHandle, quad: &QuadGeometry) {
        let Some(target) = &self.target else {
            trace!("Draw without a viewport, skipping");
            return;
        };
        let Some(storage) = self.textures.get(&texture).and_then(|e| e.storage.as_ref()) else {
            trace!(texture = %texture, "Texture has no frame yet, skipping draw");
            return;
        };

        let vertices: Vec<QuadVertex> = quad
            .positions
            .iter()
            .zip(quad.tex_coords.iter())
            .map(|(position, tex_coord)| QuadVertex {
                position: *position,
                tex_coord: *tex_coord,
            })
            .collect();
        let mut indices = [0u16; 8];
        indices[..6].copy_from_slice(&quad.indices);

        self.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        self.queue
            .write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&indices));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("camera-preview draw"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("camera-preview draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &storage.bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..quad.indices.len() as u32, 0, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::LensFacing;
    use std::time::Instant;

    #[test]
    fn test_vertex_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
        let layout = QuadVertex::layout();
        assert_eq!(layout.attributes[0].shader_location, 0);
        assert_eq!(layout.attributes[1].shader_location, 1);
        assert_eq!(layout.attributes[1].offset, 8);
    }

    #[test]
    fn test_render_frame_on_gpu() {
        // This test requires a GPU, so it may be skipped in CI
        let mut ctx = match WgpuContext::new("test_preview") {
            Ok(ctx) => ctx,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };

        ctx.set_viewport(64, 32);
        assert_eq!(ctx.target_size(), Some(Size::new(64, 32)));

        let texture = ctx.create_external_texture(&TextureParams::EXTERNAL).unwrap();
        let frame = CameraFrame {
            width: 8,
            height: 4,
            sequence: 1,
            data: vec![200u8; 8 * 4 * 4].into(),
            captured_at: Instant::now(),
        };
        ctx.upload_frame(texture, &frame).unwrap();
        ctx.clear([1.0, 1.0, 1.0, 1.0]);
        ctx.draw_textured_quad(texture, &QuadGeometry::for_lens(LensFacing::Back, true));

        let short = CameraFrame {
            data: vec![0u8; 4].into(),
            ..frame
        };
        assert!(matches!(
            ctx.upload_frame(texture, &short),
            Err(TextureError::Gpu(_))
        ));

        ctx.delete_texture(texture);
        assert_eq!(
            ctx.upload_frame(texture, &frame).unwrap_err(),
            TextureError::NoTexture
        );
    }
}

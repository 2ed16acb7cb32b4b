//! wgpu graphics device.
//!
//! Textures are real GPU textures; sprites are drawn with a small
//! fullscreen-triangle blit pipeline. Fixed-function state and the
//! framebuffer sRGB flag are tracked only, since wgpu bakes them into
//! pipelines.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use wgpu::{Device, Queue};

use crate::context::ScopedContext;
use crate::device::{CaptureState, GraphicsDevice};
use crate::texture::{NativeTexture, Size, TextureDesc, TextureFormat};
use crate::{GpuError, GpuResult};

const BLIT_SHADER: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> VsOut {
    let uv = vec2<f32>(f32((i << 1u) & 2u), f32(i & 2u));
    var out: VsOut;
    out.pos = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var src_smp: sampler;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(src_tex, src_smp, in.uv);
}
"#;

// =============================================================================
// WgpuTexture
// =============================================================================

struct TextureInner {
    id: u64,
    desc: TextureDesc,
    texture: wgpu::Texture,
}

/// Shared handle to a wgpu texture.
#[derive(Clone)]
pub struct WgpuTexture(Arc<TextureInner>);

impl WgpuTexture {
    /// Underlying wgpu texture.
    pub fn raw(&self) -> &wgpu::Texture {
        &self.0.texture
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.0.desc
    }
}

impl fmt::Debug for WgpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuTexture")
            .field("id", &self.0.id)
            .field("size", &self.0.desc.size)
            .finish()
    }
}

// =============================================================================
// WgpuDevice
// =============================================================================

#[derive(Default)]
struct TrackedState {
    render_targets: Vec<WgpuTexture>,
    blend_stack: Vec<CaptureState>,
    capture_state: CaptureState,
    framebuffer_srgb: bool,
    linear_srgb: bool,
}

/// Graphics device on top of a wgpu device and queue.
pub struct WgpuDevice {
    device: Arc<Device>,
    queue: Arc<Queue>,
    adapter_info: wgpu::AdapterInfo,
    blit_layout: wgpu::BindGroupLayout,
    blit_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    next_id: AtomicU64,
    state: Mutex<TrackedState>,
}

impl WgpuDevice {
    /// Check if a wgpu adapter is available.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    /// Create a device on the high-performance adapter.
    pub fn new() -> GpuResult<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> GpuResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("vfx-gpu"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

        Ok(Self::from_parts(Arc::new(device), Arc::new(queue), adapter_info))
    }

    /// Wrap an existing device and queue, e.g. the host's own.
    pub fn from_parts(device: Arc<Device>, queue: Arc<Queue>, adapter_info: wgpu::AdapterInfo) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit"),
            entries: &[
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
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            device,
            queue,
            adapter_info,
            blit_layout,
            blit_pipeline,
            sampler,
            next_id: AtomicU64::new(0),
            state: Mutex::new(TrackedState::default()),
        }
    }

    /// Get device name
    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Get backend type (Vulkan, DX12, Metal, etc.)
    pub fn backend(&self) -> wgpu::Backend {
        self.adapter_info.backend
    }

    /// Set the host's linear-sRGB preference.
    pub fn set_linear_srgb(&self, enabled: bool) {
        self.state().linear_srgb = enabled;
    }

    fn state(&self) -> MutexGuard<'_, TrackedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_target(&self) -> Option<WgpuTexture> {
        self.state().render_targets.last().cloned()
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("device", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}

impl ScopedContext for WgpuDevice {
    // wgpu has no thread-current context.
    fn enter(&self) -> GpuResult<()> {
        Ok(())
    }

    fn leave(&self) {}
}

impl GraphicsDevice for WgpuDevice {
    type Texture = WgpuTexture;

    fn create_texture(&self, desc: &TextureDesc) -> GpuResult<Self::Texture> {
        if desc.size.is_empty() {
            return Err(GpuError::InvalidDimensions(desc.size.width, desc.size.height));
        }
        let limit = self.device.limits().max_texture_dimension_2d;
        if desc.size.width > limit || desc.size.height > limit {
            return Err(GpuError::TextureCreation(format!(
                "{} exceeds device limit {limit}",
                desc.size
            )));
        }

        let format = match desc.format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        };
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        if desc.flags.render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vfx-gpu texture"),
            size: wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(id, size = %desc.size, "created texture");
        Ok(WgpuTexture(Arc::new(TextureInner { id, desc: *desc, texture })))
    }

    fn texture_size(&self, texture: &Self::Texture) -> Size {
        texture.0.desc.size
    }

    fn native_handle(&self, texture: &Self::Texture) -> NativeTexture {
        NativeTexture(texture.0.id)
    }

    fn copy_texture(&self, dst: &Self::Texture, src: &Self::Texture) -> GpuResult<()> {
        let (dsize, ssize) = (dst.0.desc.size, src.0.desc.size);
        if dsize != ssize {
            return Err(GpuError::SizeMismatch { dst: dsize, src: ssize });
        }
        let mut encoder = self.encoder("copy_texture");
        encoder.copy_texture_to_texture(
            src.0.texture.as_image_copy(),
            dst.0.texture.as_image_copy(),
            wgpu::Extent3d {
                width: ssize.width,
                height: ssize.height,
                depth_or_array_layers: 1,
            },
        );
        self.submit(encoder);
        Ok(())
    }

    fn push_render_target(&self, target: &Self::Texture) -> GpuResult<()> {
        if !target.0.desc.flags.render_target {
            return Err(GpuError::OperationFailed(format!(
                "texture {} is not a render target",
                target.0.id
            )));
        }
        self.state().render_targets.push(target.clone());
        Ok(())
    }

    fn pop_render_target(&self) {
        self.state().render_targets.pop();
    }

    fn clear(&self, color: [f32; 4]) {
        let Some(target) = self.current_target() else {
            return;
        };
        let view = target.0.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.encoder("clear");
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color[0] as f64,
                            g: color[1] as f64,
                            b: color[2] as f64,
                            a: color[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.submit(encoder);
    }

    fn push_blend_state(&self) {
        let mut state = self.state();
        let current = state.capture_state;
        state.blend_stack.push(current);
    }

    fn pop_blend_state(&self) {
        let mut state = self.state();
        if let Some(prev) = state.blend_stack.pop() {
            state.capture_state = prev;
        }
    }

    fn set_capture_state(&self, capture: CaptureState) {
        self.state().capture_state = capture;
    }

    fn framebuffer_srgb(&self) -> bool {
        self.state().framebuffer_srgb
    }

    fn set_framebuffer_srgb(&self, enabled: bool) {
        self.state().framebuffer_srgb = enabled;
    }

    fn linear_srgb(&self) -> bool {
        self.state().linear_srgb
    }

    fn draw_sprite(&self, texture: &Self::Texture, size: Size) {
        let Some(target) = self.current_target() else {
            debug!("draw_sprite without a render target");
            return;
        };
        let src_view = texture.0.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view = target.0.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit"),
            layout: &self.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let tsize = target.0.desc.size;
        let mut encoder = self.encoder("draw_sprite");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("draw_sprite"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst_view,
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
            pass.set_pipeline(&self.blit_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_viewport(
                0.0,
                0.0,
                size.width.min(tsize.width) as f32,
                size.height.min(tsize.height) as f32,
                0.0,
                1.0,
            );
            pass.draw(0..3, 0..1);
        }
        self.submit(encoder);
    }
}

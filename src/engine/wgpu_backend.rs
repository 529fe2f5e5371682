// wgpu implementation of GraphicsBackend.
//
// Draw calls are recorded during the frame and encoded into one render pass
// at end_frame(), after every buffer write of the frame has been queued. Each
// compiled program owns one pipeline per (shading mode, blend mode) pair; the
// shading mode is baked in through the SHADING_MODE override constant.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::backend::*;
use super::debug_overlay::{DebugOverlay, DebugStats};
use super::lighting::ShadingMode;
use super::mesh::{GpuVertex, InstanceRaw};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: usize,
}

type Pipelines = HashMap<(ShadingMode, BlendMode), wgpu::RenderPipeline>;

pub struct WgpuBackend {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,

    pipeline_layout: wgpu::PipelineLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    placeholder: wgpu::BindGroup,

    programs: Vec<Pipelines>,
    /// Indexed by BufferHandle; released slots are None until reused.
    buffers: Vec<Option<GpuBuffer>>,
    textures: Vec<wgpu::BindGroup>,

    pending: Vec<DrawCall>,
    frame: Option<wgpu::SurfaceTexture>,
    clear_color: wgpu::Color,

    overlay: DebugOverlay,
    overlay_stats: Option<DebugStats>,
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>, vsync: bool, clear_color: [f64; 3]) -> Result<Self, BackendError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| BackendError::Init(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::Init("no compatible adapter".into()))?;
        log::info!("adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::Init(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| BackendError::Init("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync { wgpu::PresentMode::AutoVsync } else { wgpu::PresentMode::AutoNoVsync },
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("frame_bind_group_layout"),
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("frame_bind_group"),
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
            label: Some("texture_bind_group_layout"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Scene Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let overlay = DebugOverlay::new(&window, &device, surface_format);
        let placeholder = texture_bind_group(
            &device,
            &queue,
            &texture_layout,
            &sampler,
            &TextureImage { label: "placeholder".into(), width: 1, height: 1, rgba: vec![255; 4] },
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth_view,
            pipeline_layout,
            texture_layout,
            sampler,
            uniform_buffer,
            uniform_bind_group,
            placeholder,
            programs: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            pending: Vec::new(),
            frame: None,
            clear_color: wgpu::Color { r: clear_color[0], g: clear_color[1], b: clear_color[2], a: 1.0 },
            overlay,
            overlay_stats: None,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Feed a window event to the overlay. True if egui consumed it.
    pub fn handle_window_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        self.overlay.handle_window_event(&self.window, event).consumed
    }

    pub fn toggle_overlay(&mut self) {
        self.overlay.toggle();
    }

    pub fn set_overlay_stats(&mut self, stats: DebugStats) {
        self.overlay_stats = Some(stats);
    }

    fn create_pipeline(
        &self,
        module: &wgpu::ShaderModule,
        label: &str,
        shading: ShadingMode,
        blend: BlendMode,
    ) -> wgpu::RenderPipeline {
        let constants = HashMap::from([("SHADING_MODE".to_string(), shading.shader_constant() as f64)]);
        let (color_blend, depth_write_enabled) = match blend {
            BlendMode::Opaque => (wgpu::BlendState::REPLACE, true),
            BlendMode::Blended => (wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING, false),
        };
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label} ({shading:?}, {blend:?})")),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::desc(), InstanceRaw::desc()],
                compilation_options: wgpu::PipelineCompilationOptions { constants: &constants, ..Default::default() },
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: Some(color_blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions { constants: &constants, ..Default::default() },
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // OBJ winding varies between models.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&GpuBuffer, BackendError> {
        self.buffers
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(BackendError::UnknownBuffer(handle))
    }

    fn encode_frame(&mut self, frame: &wgpu::SurfaceTexture) {
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let pending = std::mem::take(&mut self.pending);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            // Handles were validated when each draw was recorded; buffers
            // released since then are skipped.
            for call in &pending {
                let Some(pipeline) = self.programs[call.program.0 as usize].get(&(call.shading, call.blend)) else {
                    continue;
                };
                let (Ok(vertices), Ok(instances)) = (self.buffer(call.vertex_buffer), self.buffer(call.instance_buffer))
                else {
                    continue;
                };
                let texture = call
                    .texture
                    .and_then(|t| self.textures.get(t.0 as usize))
                    .unwrap_or(&self.placeholder);
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(1, texture, &[]);
                render_pass.set_vertex_buffer(0, vertices.buffer.slice(..));
                render_pass.set_vertex_buffer(1, instances.buffer.slice(..));
                render_pass.draw(0..call.vertex_count, 0..call.instance_count);
            }
        }

        if self.overlay.visible {
            if let Some(stats) = &self.overlay_stats {
                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [self.config.width, self.config.height],
                    pixels_per_point: self.window.scale_factor() as f32,
                };
                self.overlay.render(
                    &self.device,
                    &self.queue,
                    &mut encoder,
                    &self.window,
                    &view,
                    &screen_descriptor,
                    stats,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl GraphicsBackend for WgpuBackend {
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, BackendError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&source.label),
            source: wgpu::ShaderSource::Wgsl(source.source.as_str().into()),
        });
        let mut pipelines = Pipelines::new();
        for shading in ShadingMode::ALL {
            for blend in [BlendMode::Opaque, BlendMode::Blended] {
                pipelines.insert((shading, blend), self.create_pipeline(&module, &source.label, shading, blend));
            }
        }
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::Compile { label: source.label.clone(), message: error.to_string() });
        }

        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(pipelines);
        log::info!("compiled program {:?} ({} pipelines)", source.label, ShadingMode::ALL.len() * 2);
        Ok(handle)
    }

    fn upload_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferHandle, BackendError> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Instance => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        };
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(match kind {
                BufferKind::Vertex => "Vertex Buffer",
                BufferKind::Instance => "Instance Buffer",
            }),
            contents: data,
            usage,
        });
        let slot = Some(GpuBuffer { buffer, size: data.len() });
        let index = match self.buffers.iter().position(Option::is_none) {
            Some(free) => {
                self.buffers[free] = slot;
                free
            }
            None => {
                self.buffers.push(slot);
                self.buffers.len() - 1
            }
        };
        Ok(BufferHandle(index as u32))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<(), BackendError> {
        let target = self.buffer(buffer)?;
        if data.len() > target.size {
            return Err(BackendError::BufferOverflow { buffer, len: data.len(), capacity: target.size });
        }
        self.queue.write_buffer(&target.buffer, 0, data);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) -> Result<(), BackendError> {
        // wgpu keeps the allocation alive until submitted work using it is done.
        self.buffers
            .get_mut(buffer.0 as usize)
            .and_then(Option::take)
            .map(drop)
            .ok_or(BackendError::UnknownBuffer(buffer))
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, BackendError> {
        image.validate()?;
        let bind_group = texture_bind_group(&self.device, &self.queue, &self.texture_layout, &self.sampler, image);
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(bind_group);
        Ok(handle)
    }

    fn set_frame_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), BackendError> {
        self.buffer(call.vertex_buffer)?;
        self.buffer(call.instance_buffer)?;
        if call.program.0 as usize >= self.programs.len() {
            return Err(BackendError::UnknownProgram(call.program));
        }
        if let Some(texture) = call.texture {
            if texture.0 as usize >= self.textures.len() {
                return Err(BackendError::UnknownTexture(texture));
            }
        }
        self.pending.push(*call);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        self.pending.clear();
        match self.surface.get_current_texture() {
            Ok(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                // Skip this frame; the next one gets a fresh surface.
                log::warn!("surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                Ok(())
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timeout, dropping frame");
                Ok(())
            }
            Err(e) => Err(BackendError::Surface(e.to_string())),
        }
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let Some(frame) = self.frame.take() else {
            self.pending.clear();
            return Ok(());
        };
        self.encode_frame(&frame);
        frame.present();
        Ok(())
    }
}

fn texture_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    image: &TextureImage,
) -> wgpu::BindGroup {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&image.label),
            size: wgpu::Extent3d { width: image.width, height: image.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &image.rgba,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
        label: Some(&image.label),
    })
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d { width: config.width, height: config.height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

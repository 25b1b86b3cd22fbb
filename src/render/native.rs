use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use half::f16;
use log::{debug, info};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::Overlay;
use crate::gfx::shader::{
    FRAGMENT_ENTRY, TEXTURE_GROUP, TRANSFORMS_BINDING, UNIFORM_BLOCK_BINDING, UNIFORM_GROUP,
    VERTEX_ENTRY,
};
use crate::gfx::{
    DrawCall, Filter, Frame, InternalFormat, MeshData, ShaderProgram, Texture2d, Transforms,
    Vertex, Wrap, TEXTURE_UNITS,
};
use crate::settings::Settings;

const TRANSFORMS_SIZE: u64 = std::mem::size_of::<Transforms>() as u64;
const MSAA_CANDIDATES: [u32; 4] = [8, 4, 2, 1];

/// GPU renderer backed by wgpu that replays recorded [`Frame`]s.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    sample_count: u32,
    float32_filterable: bool,
    targets: RenderTargets,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_alignment: u64,
    shader_cache: HashMap<u64, wgpu::ShaderModule>,
    pipeline_cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
    mesh_cache: HashMap<u64, MeshBuffers>,
    texture_cache: HashMap<u64, GpuTexture>,
    texture_groups: HashMap<[Option<u64>; TEXTURE_UNITS], wgpu::BindGroup>,
    fallback_texture: GpuTexture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: u64,
    face_culling: bool,
    depth_test: bool,
}

impl PipelineKey {
    fn for_draw(draw: &DrawCall) -> Self {
        Self {
            program: draw.program.id(),
            face_culling: draw.face_culling,
            depth_test: draw.depth_test,
        }
    }
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>, settings: &Settings) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_info = adapter.get_info();
        info!(
            "using GPU adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let float32_filterable = adapter
            .features()
            .contains(wgpu::Features::FLOAT32_FILTERABLE);
        let required_features = if float32_filterable {
            wgpu::Features::FLOAT32_FILTERABLE
        } else {
            info!("adapter cannot filter f32 textures, lookup tables are uploaded as f16");
            wgpu::Features::empty()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("renderer-device"),
                    required_features,
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let sample_count = pick_sample_count(settings.msaa_samples, |count| {
            [surface_format, DepthBuffer::FORMAT].iter().all(|format| {
                adapter
                    .get_texture_format_features(*format)
                    .flags
                    .sample_count_supported(count)
            })
        });
        info!(
            "MSAA {sample_count}x (requested {}x)",
            settings.msaa_samples
        );
        let targets = RenderTargets::create(&device, &config, sample_count);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform-bind-layout"),
            entries: &[
                uniform_entry(TRANSFORMS_BINDING),
                uniform_entry(UNIFORM_BLOCK_BINDING),
            ],
        });
        let texture_entries: Vec<_> = (0..TEXTURE_UNITS as u32)
            .flat_map(|unit| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2 + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture-bind-layout"),
            entries: &texture_entries,
        });

        // Group indices follow UNIFORM_GROUP and TEXTURE_GROUP.
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("renderer-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let uniform_alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_buffer = create_uniform_buffer(&device, uniform_alignment * 16);
        let fallback_texture = GpuTexture::fallback(&device, &queue);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            sample_count,
            float32_filterable,
            targets,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            uniform_buffer,
            uniform_alignment,
            shader_cache: HashMap::new(),
            pipeline_cache: HashMap::new(),
            mesh_cache: HashMap::new(),
            texture_cache: HashMap::new(),
            texture_groups: HashMap::new(),
            fallback_texture,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Sample count the colour and depth targets were created with.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.targets = RenderTargets::create(&self.device, &self.config, self.sample_count);
    }

    /// Draws `frame`, then the overlay on top, and presents.
    pub fn render(&mut self, frame: &Frame, overlay: &mut Overlay) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        // Everything the pass borrows has to exist before it begins.
        for draw in &frame.draws {
            self.ensure_pipeline(draw);
            self.ensure_mesh_loaded(&draw.mesh);
            for texture in draw.textures.iter().flatten() {
                self.ensure_texture_loaded(texture);
            }
            self.ensure_texture_group(draw);
        }
        let offsets = self.write_uniforms(&frame.draws);
        let uniform_groups = self.uniform_groups(&frame.draws);

        let [r, g, b, a] = frame.clear_color.unwrap_or([0.0, 0.0, 0.0, 1.0]);
        let (color_view, resolve_target, store) = match &self.targets.msaa {
            Some(msaa) => (msaa, Some(&view), wgpu::StoreOp::Discard),
            None => (&view, None, wgpu::StoreOp::Store),
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(r),
                        g: f64::from(g),
                        b: f64::from(b),
                        a: f64::from(a),
                    }),
                    store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for (draw, (transforms_offset, uniforms_offset)) in frame.draws.iter().zip(&offsets) {
            let (Some(pipeline), Some(mesh), Some(uniforms), Some(textures)) = (
                self.pipeline_cache.get(&PipelineKey::for_draw(draw)),
                self.mesh_cache.get(&draw.mesh.id()),
                uniform_groups.get(&draw.program.id()),
                self.texture_groups.get(&texture_key(draw)),
            ) else {
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(
                UNIFORM_GROUP,
                uniforms,
                &[*transforms_offset as u32, *uniforms_offset as u32],
            );
            pass.set_bind_group(TEXTURE_GROUP, textures, &[]);
            pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        drop(pass);

        let overlay_commands = overlay.paint(
            &self.device,
            &self.queue,
            &mut encoder,
            &view,
            [self.config.width, self.config.height],
        );
        self.queue.submit(
            overlay_commands
                .into_iter()
                .chain(std::iter::once(encoder.finish())),
        );
        output.present();
        Ok(())
    }

    fn ensure_pipeline(&mut self, draw: &DrawCall) {
        let key = PipelineKey::for_draw(draw);
        if self.pipeline_cache.contains_key(&key) {
            return;
        }
        let program = &draw.program;
        let module = &*self.shader_cache.entry(program.id()).or_insert_with(|| {
            debug!("creating shader module for {}", program.label());
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(program.label()),
                    source: wgpu::ShaderSource::Wgsl(program.source().into()),
                })
        });

        debug!("creating pipeline for {} ({key:?})", program.label());
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.label()),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: VERTEX_ENTRY,
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: key.face_culling.then_some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: key.depth_test,
                    depth_compare: if key.depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: self.sample_count,
                    ..Default::default()
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: FRAGMENT_ENTRY,
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            });
        self.pipeline_cache.insert(key, pipeline);
    }

    fn ensure_mesh_loaded(&mut self, mesh: &MeshData) {
        if self.mesh_cache.contains_key(&mesh.id()) {
            return;
        }
        debug!("uploading mesh {}", mesh.label);
        let buffers = MeshBuffers::from_mesh(&self.device, mesh);
        self.mesh_cache.insert(mesh.id(), buffers);
    }

    fn ensure_texture_loaded(&mut self, texture: &Texture2d) {
        if self.texture_cache.contains_key(&texture.id()) {
            return;
        }
        debug!("uploading texture {}", texture.label());
        let gpu = GpuTexture::upload(&self.device, &self.queue, texture, self.float32_filterable);
        self.texture_cache.insert(texture.id(), gpu);
    }

    fn ensure_texture_group(&mut self, draw: &DrawCall) {
        let key = texture_key(draw);
        if self.texture_groups.contains_key(&key) {
            return;
        }
        let units: Vec<&GpuTexture> = key
            .iter()
            .map(|id| {
                id.and_then(|id| self.texture_cache.get(&id))
                    .unwrap_or(&self.fallback_texture)
            })
            .collect();
        let entries: Vec<_> = units
            .iter()
            .zip(0u32..)
            .flat_map(|(texture, unit)| {
                [
                    wgpu::BindGroupEntry {
                        binding: unit * 2,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: unit * 2 + 1,
                        resource: wgpu::BindingResource::Sampler(&texture.sampler),
                    },
                ]
            })
            .collect();
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture-bind-group"),
            layout: &self.texture_layout,
            entries: &entries,
        });
        self.texture_groups.insert(key, group);
    }

    /// Packs every draw's transforms and uniform block into the shared buffer.
    ///
    /// Returns the dynamic offsets of each draw's two uniform bindings.
    fn write_uniforms(&mut self, draws: &[DrawCall]) -> Vec<(u64, u64)> {
        let mut offsets = Vec::with_capacity(draws.len());
        let mut contents = Vec::new();
        for draw in draws {
            let transforms_offset = align_to(contents.len() as u64, self.uniform_alignment);
            contents.resize(transforms_offset as usize, 0);
            contents.extend_from_slice(bytemuck::bytes_of(&draw.transforms()));

            let uniforms_offset = align_to(contents.len() as u64, self.uniform_alignment);
            contents.resize(uniforms_offset as usize, 0);
            contents.extend_from_slice(&draw.uniforms);
            offsets.push((transforms_offset, uniforms_offset));
        }
        if contents.is_empty() {
            return offsets;
        }

        let required = align_to(contents.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        contents.resize(required as usize, 0);
        if required > self.uniform_buffer.size() {
            let size = required.next_power_of_two();
            debug!("growing uniform buffer to {size} bytes");
            self.uniform_buffer = create_uniform_buffer(&self.device, size);
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, &contents);
        offsets
    }

    /// One bind group per program, sized to its uniform block.
    fn uniform_groups(&self, draws: &[DrawCall]) -> HashMap<u64, wgpu::BindGroup> {
        let mut groups = HashMap::new();
        for draw in draws {
            groups.entry(draw.program.id()).or_insert_with(|| {
                self.uniform_group(&draw.program)
            });
        }
        groups
    }

    fn uniform_group(&self, program: &ShaderProgram) -> wgpu::BindGroup {
        let block_size = u64::from(program.layout().size());
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label()),
            layout: &self.uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: TRANSFORMS_BINDING,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.uniform_buffer,
                        offset: 0,
                        size: NonZeroU64::new(TRANSFORMS_SIZE),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: UNIFORM_BLOCK_BINDING,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.uniform_buffer,
                        offset: 0,
                        size: NonZeroU64::new(block_size),
                    }),
                },
            ],
        })
    }
}

fn texture_key(draw: &DrawCall) -> [Option<u64>; TEXTURE_UNITS] {
    let mut key = [None; TEXTURE_UNITS];
    for (slot, texture) in key.iter_mut().zip(&draw.textures) {
        *slot = texture.as_ref().map(|texture| texture.id());
    }
    key
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("draw-uniforms"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Largest candidate count not above `requested` that `supported` accepts.
fn pick_sample_count(requested: u32, supported: impl Fn(u32) -> bool) -> u32 {
    MSAA_CANDIDATES
        .into_iter()
        .filter(|&count| count <= requested.max(1))
        .find(|&count| count == 1 || supported(count))
        .unwrap_or(1)
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}-vertices", mesh.label)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}-indices", mesh.label)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.index_count(),
        }
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl GpuTexture {
    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &Texture2d,
        float32_filterable: bool,
    ) -> Self {
        let format = texture.format();
        let gpu_format = gpu_format(format.internal_format, float32_filterable);
        let data = if float32_filterable {
            bytemuck::cast_slice::<f32, u8>(texture.texels()).to_vec()
        } else {
            let halves: Vec<f16> = texture.texels().iter().copied().map(f16::from_f32).collect();
            bytemuck::cast_slice::<f16, u8>(&halves).to_vec()
        };
        let gpu_texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(texture.label()),
                size: wgpu::Extent3d {
                    width: texture.width(),
                    height: texture.height(),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: gpu_format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data,
        );
        let address_mode = match format.wrap {
            Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            Wrap::Repeat => wgpu::AddressMode::Repeat,
        };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(texture.label()),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter_mode(format.mag_filter),
            min_filter: filter_mode(format.min_filter),
            ..Default::default()
        });
        Self {
            view: gpu_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: gpu_texture,
            sampler,
        }
    }

    /// Opaque white texel bound to units nothing was bound to.
    fn fallback(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let white = [f16::ONE; 4];
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("fallback-texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&white),
        );
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: texture,
            sampler: device.create_sampler(&wgpu::SamplerDescriptor::default()),
        }
    }
}

fn gpu_format(format: InternalFormat, float32_filterable: bool) -> wgpu::TextureFormat {
    match (format, float32_filterable) {
        (InternalFormat::Rg32Float, true) => wgpu::TextureFormat::Rg32Float,
        (InternalFormat::Rg32Float, false) => wgpu::TextureFormat::Rg16Float,
        (InternalFormat::Rgba32Float, true) => wgpu::TextureFormat::Rgba32Float,
        (InternalFormat::Rgba32Float, false) => wgpu::TextureFormat::Rgba16Float,
    }
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

/// Multisampled colour target (when MSAA is on) and the matching depth buffer.
struct RenderTargets {
    msaa: Option<wgpu::TextureView>,
    depth: DepthBuffer,
}

impl RenderTargets {
    fn create(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration, sample_count: u32) -> Self {
        let msaa = (sample_count > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("msaa-color"),
                    size: wgpu::Extent3d {
                        width: config.width.max(1),
                        height: config.height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: config.format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });
        Self {
            msaa,
            depth: DepthBuffer::create(device, config.width, config.height, sample_count),
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32, sample_count: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_falls_back_to_what_is_supported() {
        assert_eq!(pick_sample_count(8, |count| count <= 4), 4);
        assert_eq!(pick_sample_count(8, |_| true), 8);
        assert_eq!(pick_sample_count(4, |_| true), 4);
        assert_eq!(pick_sample_count(8, |_| false), 1);
        assert_eq!(pick_sample_count(0, |_| true), 1);
    }

    #[test]
    fn uniform_offsets_respect_alignment() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(176, 256), 256);
        assert_eq!(align_to(512, 256), 512);
    }

    #[test]
    fn lookup_tables_degrade_to_half_floats() {
        assert_eq!(
            gpu_format(InternalFormat::Rgba32Float, true),
            wgpu::TextureFormat::Rgba32Float
        );
        assert_eq!(
            gpu_format(InternalFormat::Rg32Float, false),
            wgpu::TextureFormat::Rg16Float
        );
    }

    #[test]
    fn transforms_fill_the_shader_block() {
        // mat4x4 + mat4x4 + mat3x4
        assert_eq!(TRANSFORMS_SIZE, 176);
    }
}

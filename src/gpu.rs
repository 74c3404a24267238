//! The wgpu implementation of [`Device`].
//!
//! [`GpuContext`] owns the surface, device and queue for a window together with every
//! resource the scene creates. Drawables only ever see handles; the context resolves
//! them when a draw is recorded.
//!
//! # Frame recording
//!
//! Between [`begin_frame`](Device::begin_frame) and [`present`](Device::present) calls
//! are recorded, not encoded. `present` then encodes one render pass per
//! [`set_pass`](Device::set_pass) segment. Color is cleared by the first segment and
//! loaded by the rest. Depth is cleared to 0 (far, reversed depth) by the first segment
//! that uses it.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::device::{
    BufferDesc, BufferId, BufferUsage, CullMode, DepthCompare, Device, DrawCall, Extent,
    OverlayQuad, PassKind, ProgramDesc, ProgramId, TextureId, TextureKind,
};
use crate::error::DeviceError;
use crate::overlay_pass::OverlayPass;
use crate::texture::TextureData;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct BufferEntry {
    buffer: wgpu::Buffer,
    size: u64,
    writable: bool,
    label: String,
}

struct ProgramEntry {
    pipeline: wgpu::RenderPipeline,
    object_layout: wgpu::BindGroupLayout,
    pass: PassKind,
}

struct TextureEntry {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct FrameResources {
    constants: BufferId,
    bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
}

enum Recorded {
    Pass(PassKind),
    Draw {
        pipeline: wgpu::RenderPipeline,
        bind_group: wgpu::BindGroup,
        vertex: wgpu::Buffer,
        index: wgpu::Buffer,
        count: u32,
    },
    Overlay(Range<u32>),
}

struct Frame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    clear: wgpu::Color,
    pass: Option<PassKind>,
    commands: Vec<Recorded>,
}

/// GPU context for a window: surface, device, queue and every resource created
/// through the [`Device`] trait.
///
/// The wgpu objects are public so callers can reach the raw API when they need to.
pub struct GpuContext {
    /// The surface for presenting rendered frames to the window.
    pub surface: wgpu::Surface<'static>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
    frame_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    buffers: Vec<Option<BufferEntry>>,
    programs: Vec<Option<ProgramEntry>>,
    textures: Vec<Option<TextureEntry>>,
    object_bind_groups: HashMap<(ProgramId, BufferId, Vec<TextureId>), wgpu::BindGroup>,
    frame_resources: Option<FrameResources>,
    overlay: OverlayPass,
    frame: Option<Frame>,
}

impl GpuContext {
    /// Create a GPU context for a winit window.
    ///
    /// Picks a primary backend adapter compatible with the window surface and configures
    /// the surface with an sRGB format and Fifo presentation.
    pub fn new(window: Arc<Window>) -> Result<Self, DeviceError> {
        let size = window.inner_size();
        let extent = Extent::clamped(size.width, size.height);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| DeviceError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| DeviceError::Adapter(e.to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Stratum Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| DeviceError::DeviceRequest(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| DeviceError::Surface("surface reports no formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: extent.width,
            height: extent.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
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

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let overlay = OverlayPass::new(&device, surface_format);

        log::info!(
            "GPU context ready: {}x{} {:?}",
            extent.width,
            extent.height,
            surface_format
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            frame_layout,
            sampler,
            buffers: Vec::new(),
            programs: Vec::new(),
            textures: Vec::new(),
            object_bind_groups: HashMap::new(),
            frame_resources: None,
            overlay,
            frame: None,
        })
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.extent().aspect()
    }

    fn create_depth_view(&self) -> wgpu::TextureView {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: self.config.width,
                height: self.config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn buffer(&self, id: BufferId) -> Option<&BufferEntry> {
        self.buffers.get(id.0).and_then(Option::as_ref)
    }

    /// Checks validation errors raised since the matching `push_error_scope`.
    fn pop_validation(&self, what: &'static str) -> Result<(), DeviceError> {
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(DeviceError::Creation {
                what,
                reason: err.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn object_bind_group(&mut self, call: &DrawCall<'_>) -> Option<wgpu::BindGroup> {
        let key = (call.program, call.constants, call.textures.to_vec());
        if let Some(group) = self.object_bind_groups.get(&key) {
            return Some(group.clone());
        }

        let program = self.programs.get(call.program.0).and_then(Option::as_ref)?;
        let constants = self.buffer(call.constants)?;
        let views = call
            .textures
            .iter()
            .map(|id| self.textures.get(id.0).and_then(Option::as_ref).map(|t| &t.view))
            .collect::<Option<Vec<_>>>()?;

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: constants.buffer.as_entire_binding(),
        }];
        entries.extend(views.iter().enumerate().map(|(i, view)| wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: wgpu::BindingResource::TextureView(view),
        }));

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout: &program.object_layout,
            entries: &entries,
        });
        self.object_bind_groups.insert(key, group.clone());
        Some(group)
    }

    fn encode_segment(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame: &Frame,
        kind: PassKind,
        commands: &[Recorded],
        clear_color: bool,
        clear_depth: bool,
    ) {
        let depth_view = self.frame_resources.as_ref().map(|f| &f.depth_view);
        let depth_stencil_attachment = match (kind.depth(), depth_view) {
            (Some(_), Some(view)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: if clear_depth {
                        wgpu::LoadOp::Clear(0.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            _ => None,
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: if clear_color {
                        wgpu::LoadOp::Clear(frame.clear)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for command in commands {
            match command {
                Recorded::Draw {
                    pipeline,
                    bind_group,
                    vertex,
                    index,
                    count,
                } => {
                    let Some(frame_resources) = &self.frame_resources else {
                        continue;
                    };
                    render_pass.set_pipeline(pipeline);
                    render_pass.set_bind_group(0, &frame_resources.bind_group, &[]);
                    render_pass.set_bind_group(1, bind_group, &[]);
                    render_pass.set_vertex_buffer(0, vertex.slice(..));
                    render_pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..*count, 0, 0..1);
                }
                Recorded::Overlay(range) => self.overlay.render(&mut render_pass, range.clone()),
                Recorded::Pass(_) => {}
            }
        }
    }
}

/// Splits recorded commands at each pass switch.
fn segments(commands: &[Recorded]) -> Vec<(PassKind, &[Recorded])> {
    let mut segments = Vec::new();
    let mut current: Option<(PassKind, usize)> = None;
    for (i, command) in commands.iter().enumerate() {
        if let Recorded::Pass(kind) = command {
            if let Some((kind, start)) = current {
                segments.push((kind, &commands[start..i]));
            }
            current = Some((*kind, i + 1));
        }
    }
    if let Some((kind, start)) = current {
        segments.push((kind, &commands[start..]));
    }
    segments
}

fn compare_function(compare: DepthCompare) -> wgpu::CompareFunction {
    match compare {
        DepthCompare::Greater => wgpu::CompareFunction::Greater,
        DepthCompare::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
    }
}

impl Device for GpuContext {
    fn extent(&self) -> Extent {
        Extent {
            width: self.config.width,
            height: self.config.height,
        }
    }

    fn create_frame_resources(&mut self, constants_size: u64) -> Result<BufferId, DeviceError> {
        self.release_frame_resources();

        let contents = vec![0u8; constants_size as usize];
        let constants = self.create_buffer(&BufferDesc {
            label: "Frame Constants",
            usage: BufferUsage::Uniform,
            contents: &contents,
            writable: true,
        })?;
        let Some(entry) = self.buffer(constants) else {
            return Err(DeviceError::InvalidHandle("buffer"));
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: entry.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        let depth_view = self.create_depth_view();

        self.frame_resources = Some(FrameResources {
            constants,
            bind_group,
            depth_view,
        });
        Ok(constants)
    }

    fn release_frame_resources(&mut self) {
        if let Some(frame_resources) = self.frame_resources.take() {
            self.release_buffer(frame_resources.constants);
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError> {
        let mut usage = match desc.usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
        };
        if desc.writable {
            usage |= wgpu::BufferUsages::COPY_DST;
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents: desc.contents,
                usage,
            });

        let id = BufferId(self.buffers.len());
        self.buffers.push(Some(BufferEntry {
            buffer,
            size: desc.contents.len() as u64,
            writable: desc.writable,
            label: desc.label.to_string(),
        }));
        Ok(id)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let entry = self
            .buffer(buffer)
            .ok_or(DeviceError::InvalidHandle("buffer"))?;
        if !entry.writable {
            return Err(DeviceError::ReadOnly(entry.label.clone()));
        }
        let len = data.len() as u64;
        if offset + len > entry.size {
            return Err(DeviceError::OutOfRange {
                offset,
                len,
                size: entry.size,
            });
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(DeviceError::Creation {
                what: "buffer write",
                reason: format!("offset {offset} and length {len} must be 4-byte aligned"),
            });
        }
        self.queue.write_buffer(&entry.buffer, offset, data);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0)
            && slot.take().is_some()
        {
            self.object_bind_groups.clear();
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.source.into()),
            });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        entries.extend(desc.textures.iter().enumerate().map(|(i, kind)| {
            wgpu::BindGroupLayoutEntry {
                binding: i as u32 + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: match kind {
                        TextureKind::D2 => wgpu::TextureViewDimension::D2,
                        TextureKind::Cube => wgpu::TextureViewDimension::Cube,
                    },
                    multisampled: false,
                },
                count: None,
            }
        }));

        let object_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Object Bind Group Layout"),
                entries: &entries,
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &[&self.frame_layout, &object_layout],
                push_constant_ranges: &[],
            });

        let depth_stencil = desc.pass.depth().map(|depth| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth.write,
            depth_compare: compare_function(depth.compare),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        let cull_mode = match desc.pass.cull() {
            CullMode::Back => Some(wgpu::Face::Back),
            CullMode::None => None,
        };
        let blend = if desc.pass.blends() {
            wgpu::BlendState::ALPHA_BLENDING
        } else {
            wgpu::BlendState::REPLACE
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[desc.vertex_layout.buffer_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        self.pop_validation("program")?;

        let id = ProgramId(self.programs.len());
        self.programs.push(Some(ProgramEntry {
            pipeline,
            object_layout,
            pass: desc.pass,
        }));
        log::debug!("compiled program '{}' for {:?} pass", desc.label, desc.pass);
        Ok(id)
    }

    fn release_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0)
            && slot.take().is_some()
        {
            self.object_bind_groups.clear();
        }
    }

    fn create_texture(
        &mut self,
        label: &str,
        data: &TextureData,
    ) -> Result<TextureId, DeviceError> {
        let format = if data.srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: data.width,
                    height: data.height,
                    depth_or_array_layers: data.layers(),
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data.pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(match data.kind {
                TextureKind::D2 => wgpu::TextureViewDimension::D2,
                TextureKind::Cube => wgpu::TextureViewDimension::Cube,
            }),
            ..Default::default()
        });

        self.pop_validation("texture")?;

        let id = TextureId(self.textures.len());
        self.textures.push(Some(TextureEntry {
            _texture: texture,
            view,
        }));
        Ok(id)
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.get_mut(texture.0)
            && slot.take().is_some()
        {
            self.object_bind_groups.clear();
        }
    }

    fn resize(&mut self, extent: Extent) -> Result<(), DeviceError> {
        let extent = Extent::clamped(extent.width, extent.height);
        if extent == self.extent() {
            return Ok(());
        }
        self.config.width = extent.width;
        self.config.height = extent.height;
        self.surface.configure(&self.device, &self.config);

        if self.frame_resources.is_some() {
            let depth_view = self.create_depth_view();
            if let Some(frame_resources) = &mut self.frame_resources {
                frame_resources.depth_view = depth_view;
            }
        }
        log::debug!("resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    fn begin_frame(&mut self, clear: [f32; 4]) -> Result<(), DeviceError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(DeviceError::Surface("surface lost, reconfigured".to_string()));
            }
            Err(e) => return Err(DeviceError::Surface(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.overlay.clear();
        self.frame = Some(Frame {
            output,
            view,
            clear: wgpu::Color {
                r: clear[0] as f64,
                g: clear[1] as f64,
                b: clear[2] as f64,
                a: clear[3] as f64,
            },
            pass: None,
            commands: Vec::new(),
        });
        Ok(())
    }

    fn set_pass(&mut self, pass: PassKind) {
        match &mut self.frame {
            Some(frame) => {
                frame.pass = Some(pass);
                frame.commands.push(Recorded::Pass(pass));
            }
            None => log::warn!("set_pass({pass:?}) outside of a frame"),
        }
    }

    fn draw_indexed(&mut self, call: &DrawCall<'_>) {
        let Some(active) = self.frame.as_ref().and_then(|f| f.pass) else {
            log::warn!("draw_indexed outside of a pass");
            return;
        };

        let Some(program) = self.programs.get(call.program.0).and_then(Option::as_ref) else {
            log::warn!("draw_indexed with stale program {:?}", call.program);
            return;
        };
        if program.pass != active {
            log::warn!(
                "program built for {:?} drawn in {:?} pass, skipped",
                program.pass,
                active
            );
            return;
        }
        let pipeline = program.pipeline.clone();

        let (Some(vertex), Some(index)) = (
            self.buffer(call.vertex_buffer).map(|b| b.buffer.clone()),
            self.buffer(call.index_buffer).map(|b| b.buffer.clone()),
        ) else {
            log::warn!("draw_indexed with stale buffer handle");
            return;
        };

        let Some(bind_group) = self.object_bind_group(call) else {
            log::warn!("draw_indexed with stale constants or texture handle");
            return;
        };

        if let Some(frame) = &mut self.frame {
            frame.commands.push(Recorded::Draw {
                pipeline,
                bind_group,
                vertex,
                index,
                count: call.index_count,
            });
        }
    }

    fn draw_overlay(&mut self, quads: &[OverlayQuad]) {
        let Some(frame) = &mut self.frame else {
            log::warn!("draw_overlay outside of a frame");
            return;
        };
        if frame.pass != Some(PassKind::Overlay) {
            log::warn!("draw_overlay outside of the overlay pass, ignored");
            return;
        }
        let range = self.overlay.push(quads);
        frame.commands.push(Recorded::Overlay(range));
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        let frame = self.frame.take().ok_or(DeviceError::NoFrame)?;
        let extent = self.extent();
        self.overlay.upload(&self.device, &self.queue, extent);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let segments = segments(&frame.commands);
        if segments.is_empty() {
            // Nothing recorded, still clear the target.
            self.encode_segment(&mut encoder, &frame, PassKind::Overlay, &[], true, false);
        }

        let mut depth_cleared = false;
        for (i, (kind, commands)) in segments.into_iter().enumerate() {
            let clear_depth = kind.depth().is_some() && !depth_cleared;
            self.encode_segment(&mut encoder, &frame, kind, commands, i == 0, clear_depth);
            depth_cleared |= clear_depth;
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.output.present();
        Ok(())
    }
}

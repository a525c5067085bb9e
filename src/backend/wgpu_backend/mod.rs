//! wgpu backend implementation

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Buffered render pass command
#[derive(Clone)]
enum PassCommand {
    Draw(DrawCommand),
    SetViewport {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    },
    ExecuteBundles(Vec<RenderBundleHandle>),
}

/// Buffered compute pass command
#[derive(Clone)]
enum ComputeCommand {
    SetPipeline(ComputePipelineHandle),
    SetBindGroup { index: u32, bind_group: BindGroupHandle },
    Dispatch { x: u32, y: u32, z: u32 },
}

/// Pending render pass with buffered commands
struct PendingRenderPass {
    descriptor: RenderPassDescriptor,
    commands: Vec<PassCommand>,
}

/// Pending compute pass with buffered commands
struct PendingComputePass {
    label: Option<String>,
    commands: Vec<ComputeCommand>,
}

/// Where finished frames go
enum PresentTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        current: Option<wgpu::SurfaceTexture>,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    target: PresentTarget,
    frame_view: Option<wgpu::TextureView>,
    current_view_id: u64,

    // Resource storage
    buffers: HashMap<u64, wgpu::Buffer>,
    textures: HashMap<u64, wgpu::Texture>,
    texture_views: HashMap<u64, wgpu::TextureView>,
    samplers: HashMap<u64, wgpu::Sampler>,
    bind_group_layouts: HashMap<u64, wgpu::BindGroupLayout>,
    bind_groups: HashMap<u64, wgpu::BindGroup>,
    render_pipelines: HashMap<u64, wgpu::RenderPipeline>,
    compute_pipelines: HashMap<u64, wgpu::ComputePipeline>,
    render_bundles: HashMap<u64, wgpu::RenderBundle>,

    next_id: u64,

    // Command encoding
    encoder: Option<wgpu::CommandEncoder>,
    last_submission: Option<wgpu::SubmissionIndex>,

    // Pending passes - commands are buffered here and executed on end_*_pass
    pending_render_pass: Option<PendingRenderPass>,
    pending_compute_pass: Option<PendingComputePass>,
}

impl WgpuBackend {
    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
        }
    }

    fn convert_texture_format_back(format: wgpu::TextureFormat) -> TextureFormat {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb => TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm => TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb => TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba16Float => TextureFormat::Rgba16Float,
            wgpu::TextureFormat::Rgba32Float => TextureFormat::Rgba32Float,
            wgpu::TextureFormat::Depth32Float => TextureFormat::Depth32Float,
            wgpu::TextureFormat::R32Float => TextureFormat::R32Float,
            wgpu::TextureFormat::Rg32Float => TextureFormat::Rg32Float,
            _ => TextureFormat::Rgba8Unorm,
        }
    }

    fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
        let pairs = [
            (BufferUsage::MAP_READ, wgpu::BufferUsages::MAP_READ),
            (BufferUsage::MAP_WRITE, wgpu::BufferUsages::MAP_WRITE),
            (BufferUsage::COPY_SRC, wgpu::BufferUsages::COPY_SRC),
            (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
            (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
            (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
            (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
            (BufferUsage::STORAGE, wgpu::BufferUsages::STORAGE),
            (BufferUsage::INDIRECT, wgpu::BufferUsages::INDIRECT),
        ];
        pairs
            .into_iter()
            .filter(|(ours, _)| usage.contains(*ours))
            .fold(wgpu::BufferUsages::empty(), |acc, (_, theirs)| acc | theirs)
    }

    fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let pairs = [
            (TextureUsage::COPY_SRC, wgpu::TextureUsages::COPY_SRC),
            (TextureUsage::COPY_DST, wgpu::TextureUsages::COPY_DST),
            (TextureUsage::TEXTURE_BINDING, wgpu::TextureUsages::TEXTURE_BINDING),
            (TextureUsage::STORAGE_BINDING, wgpu::TextureUsages::STORAGE_BINDING),
            (TextureUsage::RENDER_ATTACHMENT, wgpu::TextureUsages::RENDER_ATTACHMENT),
        ];
        pairs
            .into_iter()
            .filter(|(ours, _)| usage.contains(*ours))
            .fold(wgpu::TextureUsages::empty(), |acc, (_, theirs)| acc | theirs)
    }

    fn convert_shader_stages(stages: ShaderStageFlags) -> wgpu::ShaderStages {
        let mut visibility = wgpu::ShaderStages::empty();
        if stages.contains(ShaderStageFlags::VERTEX) {
            visibility |= wgpu::ShaderStages::VERTEX;
        }
        if stages.contains(ShaderStageFlags::FRAGMENT) {
            visibility |= wgpu::ShaderStages::FRAGMENT;
        }
        if stages.contains(ShaderStageFlags::COMPUTE) {
            visibility |= wgpu::ShaderStages::COMPUTE;
        }
        visibility
    }

    fn convert_view_dimension(dimension: TextureViewDimension) -> wgpu::TextureViewDimension {
        match dimension {
            TextureViewDimension::D2 => wgpu::TextureViewDimension::D2,
            TextureViewDimension::D2Array => wgpu::TextureViewDimension::D2Array,
            TextureViewDimension::Cube => wgpu::TextureViewDimension::Cube,
        }
    }

    fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
        match format {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
            VertexFormat::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        }
    }

    fn convert_compare_function(func: CompareFunction) -> wgpu::CompareFunction {
        match func {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }

    fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
        match mode {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }

    fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
        match mode {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }

    fn convert_load_op(op: &LoadOp) -> wgpu::LoadOp<wgpu::Color> {
        match op {
            LoadOp::Clear(color) => wgpu::LoadOp::Clear(wgpu::Color {
                r: color[0] as f64,
                g: color[1] as f64,
                b: color[2] as f64,
                a: color[3] as f64,
            }),
            LoadOp::Load => wgpu::LoadOp::Load,
        }
    }

    fn convert_store_op(op: StoreOp) -> wgpu::StoreOp {
        match op {
            StoreOp::Store => wgpu::StoreOp::Store,
            StoreOp::Discard => wgpu::StoreOp::Discard,
        }
    }

    fn convert_index_format(format: IndexFormat) -> wgpu::IndexFormat {
        match format {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }

    fn copy_location<'a>(
        textures: &'a HashMap<u64, wgpu::Texture>,
        location: &TextureCopyLocation,
    ) -> Option<wgpu::ImageCopyTexture<'a>> {
        let texture = textures.get(&location.texture.0)?;
        Some(wgpu::ImageCopyTexture {
            texture,
            mip_level: location.mip_level,
            origin: wgpu::Origin3d {
                x: location.origin[0],
                y: location.origin[1],
                z: location.origin[2],
            },
            aspect: wgpu::TextureAspect::All,
        })
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Clamp to device limits while maintaining aspect ratio
    fn clamp_size(&self, width: u32, height: u32) -> (u32, u32) {
        let max_size = self.device.limits().max_texture_dimension_2d;
        if width > max_size || height > max_size {
            let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
            (
                ((width as f32 * scale) as u32).max(1),
                ((height as f32 * scale) as u32).max(1),
            )
        } else {
            (width.max(1), height.max(1))
        }
    }

    fn create_offscreen_target(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
    ) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// Pop the validation scope pushed before a pipeline or bundle was created
    fn check_validation(&self) -> Option<String> {
        pollster::block_on(self.device.pop_error_scope()).map(|error| error.to_string())
    }

    fn ensure_encoder(&mut self, label: &str) {
        if self.encoder.is_none() {
            self.encoder = Some(
                self.device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) }),
            );
        }
    }
}

impl WgpuBackend {
    /// Create a backend presenting to a window
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    /// Create a backend rendering into an offscreen texture
    pub fn headless(width: u32, height: u32) -> BackendResult<Self> {
        pollster::block_on(Self::headless_async(width, height))
    }

    pub async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let (device, queue) = Self::request_device(&adapter).await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| BackendError::SurfaceCreationFailed("Surface reports no formats".into()))?;

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let mut backend = Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            surface_config,
            PresentTarget::Surface {
                surface,
                current: None,
            },
        );
        let (width, height) = (backend.surface_config.width, backend.surface_config.height);
        backend.resize(width, height);
        Ok(backend)
    }

    pub async fn headless_async(width: u32, height: u32) -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
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
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let (device, queue) = Self::request_device(&adapter).await?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let texture = Self::create_offscreen_target(&device, &surface_config);

        Ok(Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            surface_config,
            PresentTarget::Offscreen { texture },
        ))
    }

    async fn request_device(adapter: &wgpu::Adapter) -> BackendResult<(wgpu::Device, wgpu::Queue)> {
        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Renderer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))
    }

    fn from_parts(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_config: wgpu::SurfaceConfiguration,
        target: PresentTarget,
    ) -> Self {
        Self {
            instance,
            adapter,
            device,
            queue,
            surface_config,
            target,
            frame_view: None,
            current_view_id: 0,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_views: HashMap::new(),
            samplers: HashMap::new(),
            bind_group_layouts: HashMap::new(),
            bind_groups: HashMap::new(),
            render_pipelines: HashMap::new(),
            compute_pipelines: HashMap::new(),
            render_bundles: HashMap::new(),
            next_id: 1,
            encoder: None,
            last_submission: None,
            pending_render_pass: None,
            pending_compute_pass: None,
        }
    }

    /// Get reference to the wgpu device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get reference to the wgpu queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl GraphicsBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let (clamped_width, clamped_height) = self.clamp_size(width, height);
        self.surface_config.width = clamped_width;
        self.surface_config.height = clamped_height;

        match &mut self.target {
            PresentTarget::Surface { surface, .. } => {
                surface.configure(&self.device, &self.surface_config);
            }
            PresentTarget::Offscreen { texture } => {
                texture.destroy();
                *texture = Self::create_offscreen_target(&self.device, &self.surface_config);
            }
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn surface_format(&self) -> TextureFormat {
        Self::convert_texture_format_back(self.surface_config.format)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let view = match &mut self.target {
            PresentTarget::Surface { surface, current } => {
                let output = surface.get_current_texture().map_err(|e| match e {
                    wgpu::SurfaceError::Lost => BackendError::SurfaceLost,
                    wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
                    _ => BackendError::AcquireImageFailed(e.to_string()),
                })?;
                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                *current = Some(output);
                view
            }
            PresentTarget::Offscreen { texture } => {
                texture.create_view(&wgpu::TextureViewDescriptor::default())
            }
        };

        // The frame target gets a fresh handle every frame
        self.current_view_id = self.next_handle();
        self.frame_view = Some(view);
        self.ensure_encoder("Frame Encoder");

        Ok(FrameContext {
            target_view: TextureViewHandle(self.current_view_id),
            width: self.surface_config.width,
            height: self.surface_config.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.submit();
        self.frame_view = None;

        if let PresentTarget::Surface { current, .. } = &mut self.target {
            if let Some(texture) = current.take() {
                texture.present();
            }
        }

        Ok(())
    }

    fn begin_commands(&mut self, label: Option<&str>) {
        self.ensure_encoder(label.unwrap_or("Offscreen Encoder"));
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.last_submission = Some(self.queue.submit(std::iter::once(encoder.finish())));
        }
    }

    fn wait_idle(&mut self) -> BackendResult<()> {
        let maintain = match self.last_submission.take() {
            Some(index) => wgpu::Maintain::WaitForSubmissionIndex(index),
            None => wgpu::Maintain::Wait,
        };
        let _ = self.device.poll(maintain);
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: Self::convert_buffer_usage(desc.usage),
            mapped_at_creation: desc.mapped_at_creation,
        });

        let id = self.next_handle();
        self.buffers.insert(id, buffer);

        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: desc.label.as_deref(),
            contents: data,
            usage: Self::convert_buffer_usage(desc.usage),
        });

        let id = self.next_handle();
        self.buffers.insert(id, buffer);

        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(buf) = self.buffers.get(&buffer.0) {
            self.queue.write_buffer(buf, offset, data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.array_layers,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(desc.format),
            usage: Self::convert_texture_usage(desc.usage),
            view_formats: &[],
        });

        let id = self.next_handle();
        self.textures.insert(id, texture);

        Ok(TextureHandle(id))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        let tex = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::TextureCreationFailed("Texture not found".into()))?;

        let view = tex.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label.as_deref(),
            format: None,
            dimension: Some(Self::convert_view_dimension(desc.dimension)),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: desc.base_mip_level,
            mip_level_count: desc.mip_level_count,
            base_array_layer: desc.base_array_layer,
            array_layer_count: desc.array_layer_count,
        });

        let id = self.next_handle();
        self.texture_views.insert(id, view);

        Ok(TextureViewHandle(id))
    }

    fn write_texture(
        &mut self,
        destination: TextureCopyLocation,
        data: &[u8],
        bytes_per_row: u32,
        width: u32,
        height: u32,
    ) {
        let Some(copy) = Self::copy_location(&self.textures, &destination) else {
            log::warn!("write_texture: unknown texture {:?}", destination.texture);
            return;
        };
        self.queue.write_texture(
            copy,
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: Self::convert_address_mode(desc.address_mode_u),
            address_mode_v: Self::convert_address_mode(desc.address_mode_v),
            address_mode_w: Self::convert_address_mode(desc.address_mode_w),
            mag_filter: Self::convert_filter_mode(desc.mag_filter),
            min_filter: Self::convert_filter_mode(desc.min_filter),
            mipmap_filter: Self::convert_filter_mode(desc.mipmap_filter),
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: desc.compare.map(Self::convert_compare_function),
            anisotropy_clamp: 1,
            border_color: None,
        });

        let id = self.next_handle();
        self.samplers.insert(id, sampler);

        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        label: Option<&str>,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let wgpu_entries: Vec<wgpu::BindGroupLayoutEntry> = entries
            .iter()
            .map(|e| {
                let ty = match &e.ty {
                    BindingType::UniformBuffer => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    BindingType::StorageBuffer { read_only } => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage {
                            read_only: *read_only,
                        },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    BindingType::Texture {
                        sample_type,
                        view_dimension,
                    } => wgpu::BindingType::Texture {
                        sample_type: match sample_type {
                            TextureSampleType::Float { filterable } => {
                                wgpu::TextureSampleType::Float {
                                    filterable: *filterable,
                                }
                            }
                            TextureSampleType::Depth => wgpu::TextureSampleType::Depth,
                            TextureSampleType::Sint => wgpu::TextureSampleType::Sint,
                            TextureSampleType::Uint => wgpu::TextureSampleType::Uint,
                        },
                        view_dimension: Self::convert_view_dimension(*view_dimension),
                        multisampled: false,
                    },
                    BindingType::StorageTexture {
                        format,
                        view_dimension,
                    } => wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: Self::convert_texture_format(*format),
                        view_dimension: Self::convert_view_dimension(*view_dimension),
                    },
                    BindingType::Sampler(kind) => wgpu::BindingType::Sampler(match kind {
                        SamplerBindingType::Filtering => wgpu::SamplerBindingType::Filtering,
                        SamplerBindingType::NonFiltering => wgpu::SamplerBindingType::NonFiltering,
                        SamplerBindingType::Comparison => wgpu::SamplerBindingType::Comparison,
                    }),
                };

                wgpu::BindGroupLayoutEntry {
                    binding: e.binding,
                    visibility: Self::convert_shader_stages(e.visibility),
                    ty,
                    count: None,
                }
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label,
                entries: &wgpu_entries,
            });

        let id = self.next_handle();
        self.bind_group_layouts.insert(id, layout);

        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let layout_ref = self
            .bind_group_layouts
            .get(&layout.0)
            .ok_or_else(|| BackendError::BindGroupCreationFailed("Layout not found".into()))?;

        let wgpu_entries = entries
            .iter()
            .map(|(binding, entry)| {
                let resource = match entry {
                    BindGroupEntry::Buffer {
                        buffer,
                        offset,
                        size,
                    } => {
                        let buf = self.buffers.get(&buffer.0).ok_or_else(|| {
                            BackendError::BindGroupCreationFailed(format!(
                                "buffer {:?} not found",
                                buffer
                            ))
                        })?;
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: buf,
                            offset: *offset,
                            size: size.and_then(std::num::NonZeroU64::new),
                        })
                    }
                    BindGroupEntry::Texture(view) | BindGroupEntry::StorageTexture(view) => {
                        let v = self.texture_views.get(&view.0).ok_or_else(|| {
                            BackendError::BindGroupCreationFailed(format!(
                                "texture view {:?} not found",
                                view
                            ))
                        })?;
                        wgpu::BindingResource::TextureView(v)
                    }
                    BindGroupEntry::Sampler(sampler) => {
                        let s = self.samplers.get(&sampler.0).ok_or_else(|| {
                            BackendError::BindGroupCreationFailed(format!(
                                "sampler {:?} not found",
                                sampler
                            ))
                        })?;
                        wgpu::BindingResource::Sampler(s)
                    }
                };

                Ok(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource,
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: layout_ref,
            entries: &wgpu_entries,
        });

        let id = self.next_handle();
        self.bind_groups.insert(id, bind_group);

        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(desc.shader.as_str().into()),
            });

        let layouts: Vec<&wgpu::BindGroupLayout> = desc
            .bind_group_layouts
            .iter()
            .filter_map(|h| self.bind_group_layouts.get(&h.0))
            .collect();

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label.as_deref(),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        // Build vertex buffer layouts with proper lifetimes
        let vertex_attrs: Vec<Vec<wgpu::VertexAttribute>> = desc
            .vertex_layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: Self::convert_vertex_format(a.format),
                        offset: a.offset,
                        shader_location: a.location,
                    })
                    .collect()
            })
            .collect();

        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_layouts
            .iter()
            .zip(vertex_attrs.iter())
            .map(|(layout, attrs)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: match layout.step_mode {
                    VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
                    VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
                },
                attributes: attrs,
            })
            .collect();

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: Self::convert_texture_format(target.format),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let primitive = wgpu::PrimitiveState {
            topology: match desc.primitive_topology {
                PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
                PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
                PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
                PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
                PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
            },
            strip_index_format: None,
            front_face: match desc.front_face {
                FrontFace::Ccw => wgpu::FrontFace::Ccw,
                FrontFace::Cw => wgpu::FrontFace::Cw,
            },
            cull_mode: match desc.cull_mode {
                CullMode::None => None,
                CullMode::Front => Some(wgpu::Face::Front),
                CullMode::Back => Some(wgpu::Face::Back),
            },
            ..Default::default()
        };

        let depth_stencil = desc.depth_stencil.as_ref().map(|ds| wgpu::DepthStencilState {
            format: Self::convert_texture_format(ds.format),
            depth_write_enabled: ds.depth_write_enabled,
            depth_compare: Self::convert_compare_function(ds.depth_compare),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label.as_deref(),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: &desc.vertex_entry,
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: desc.fragment_entry.as_deref().map(|entry| wgpu::FragmentState {
                    module: &shader,
                    entry_point: entry,
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive,
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        if let Some(message) = self.check_validation() {
            return Err(BackendError::PipelineCreationFailed(message));
        }

        let id = self.next_handle();
        self.render_pipelines.insert(id, pipeline);

        Ok(RenderPipelineHandle(id))
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(desc.shader.as_str().into()),
            });

        let layouts: Vec<&wgpu::BindGroupLayout> = desc
            .bind_group_layouts
            .iter()
            .filter_map(|h| self.bind_group_layouts.get(&h.0))
            .collect();

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label.as_deref(),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: desc.label.as_deref(),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: &desc.entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            });

        if let Some(message) = self.check_validation() {
            return Err(BackendError::PipelineCreationFailed(message));
        }

        let id = self.next_handle();
        self.compute_pipelines.insert(id, pipeline);

        Ok(ComputePipelineHandle(id))
    }

    fn create_render_bundle(
        &mut self,
        desc: &RenderBundleDescriptor,
        commands: &[DrawCommand],
    ) -> BackendResult<RenderBundleHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let color_formats: Vec<Option<wgpu::TextureFormat>> = desc
            .color_formats
            .iter()
            .map(|f| Some(Self::convert_texture_format(*f)))
            .collect();

        let mut encoder =
            self.device
                .create_render_bundle_encoder(&wgpu::RenderBundleEncoderDescriptor {
                    label: desc.label.as_deref(),
                    color_formats: &color_formats,
                    depth_stencil: desc.depth_format.map(|format| wgpu::RenderBundleDepthStencil {
                        format: Self::convert_texture_format(format),
                        depth_read_only: false,
                        stencil_read_only: true,
                    }),
                    sample_count: 1,
                    multiview: None,
                });

        for cmd in commands {
            match cmd {
                DrawCommand::SetPipeline(handle) => {
                    if let Some(pipeline) = self.render_pipelines.get(&handle.0) {
                        encoder.set_pipeline(pipeline);
                    }
                }
                DrawCommand::SetBindGroup { index, bind_group } => {
                    if let Some(bg) = self.bind_groups.get(&bind_group.0) {
                        encoder.set_bind_group(*index, bg, &[]);
                    }
                }
                DrawCommand::SetVertexBuffer {
                    slot,
                    buffer,
                    offset,
                } => {
                    if let Some(buf) = self.buffers.get(&buffer.0) {
                        encoder.set_vertex_buffer(*slot, buf.slice(*offset..));
                    }
                }
                DrawCommand::SetIndexBuffer {
                    buffer,
                    offset,
                    format,
                } => {
                    if let Some(buf) = self.buffers.get(&buffer.0) {
                        encoder.set_index_buffer(
                            buf.slice(*offset..),
                            Self::convert_index_format(*format),
                        );
                    }
                }
                DrawCommand::Draw {
                    vertices,
                    instances,
                } => encoder.draw(vertices.clone(), instances.clone()),
                DrawCommand::DrawIndexed {
                    indices,
                    base_vertex,
                    instances,
                } => encoder.draw_indexed(indices.clone(), *base_vertex, instances.clone()),
            }
        }

        let bundle = encoder.finish(&wgpu::RenderBundleDescriptor {
            label: desc.label.as_deref(),
        });

        if let Some(message) = self.check_validation() {
            return Err(BackendError::RenderBundleCreationFailed(message));
        }

        let id = self.next_handle();
        self.render_bundles.insert(id, bundle);

        Ok(RenderBundleHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.pending_render_pass = Some(PendingRenderPass {
            descriptor: desc.clone(),
            commands: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        let Some(pending) = self.pending_render_pass.take() else {
            return;
        };

        let Some(mut encoder) = self.encoder.take() else {
            log::warn!("end_render_pass without an open encoder");
            return;
        };

        let current_view_id = self.current_view_id;
        let frame_view = self.frame_view.as_ref();
        let texture_views = &self.texture_views;
        let resolve_view = |handle: TextureViewHandle| {
            if handle.0 == current_view_id {
                frame_view
            } else {
                texture_views.get(&handle.0)
            }
        };

        {
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = pending
                .descriptor
                .color_attachments
                .iter()
                .filter_map(|att| {
                    let view = resolve_view(att.view)?;
                    Some(Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: Self::convert_load_op(&att.load_op),
                            store: Self::convert_store_op(att.store_op),
                        },
                    }))
                })
                .collect();

            let depth_attachment =
                pending
                    .descriptor
                    .depth_stencil_attachment
                    .as_ref()
                    .and_then(|att| {
                        let view = resolve_view(att.view)?;
                        Some(wgpu::RenderPassDepthStencilAttachment {
                            view,
                            depth_ops: Some(wgpu::Operations {
                                load: match &att.depth_load_op {
                                    LoadOp::Clear(_) => wgpu::LoadOp::Clear(att.depth_clear_value),
                                    LoadOp::Load => wgpu::LoadOp::Load,
                                },
                                store: Self::convert_store_op(att.depth_store_op),
                            }),
                            stencil_ops: None,
                        })
                    });

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: pending.descriptor.label.as_deref(),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for cmd in &pending.commands {
                match cmd {
                    PassCommand::Draw(DrawCommand::SetPipeline(handle)) => {
                        if let Some(pipeline) = self.render_pipelines.get(&handle.0) {
                            render_pass.set_pipeline(pipeline);
                        }
                    }
                    PassCommand::Draw(DrawCommand::SetBindGroup { index, bind_group }) => {
                        if let Some(bg) = self.bind_groups.get(&bind_group.0) {
                            render_pass.set_bind_group(*index, bg, &[]);
                        }
                    }
                    PassCommand::Draw(DrawCommand::SetVertexBuffer {
                        slot,
                        buffer,
                        offset,
                    }) => {
                        if let Some(buf) = self.buffers.get(&buffer.0) {
                            render_pass.set_vertex_buffer(*slot, buf.slice(*offset..));
                        }
                    }
                    PassCommand::Draw(DrawCommand::SetIndexBuffer {
                        buffer,
                        offset,
                        format,
                    }) => {
                        if let Some(buf) = self.buffers.get(&buffer.0) {
                            render_pass.set_index_buffer(
                                buf.slice(*offset..),
                                Self::convert_index_format(*format),
                            );
                        }
                    }
                    PassCommand::Draw(DrawCommand::Draw {
                        vertices,
                        instances,
                    }) => {
                        render_pass.draw(vertices.clone(), instances.clone());
                    }
                    PassCommand::Draw(DrawCommand::DrawIndexed {
                        indices,
                        base_vertex,
                        instances,
                    }) => {
                        render_pass.draw_indexed(indices.clone(), *base_vertex, instances.clone());
                    }
                    PassCommand::SetViewport {
                        x,
                        y,
                        width,
                        height,
                        min_depth,
                        max_depth,
                    } => {
                        render_pass.set_viewport(*x, *y, *width, *height, *min_depth, *max_depth);
                    }
                    PassCommand::ExecuteBundles(handles) => {
                        let bundles: Vec<&wgpu::RenderBundle> = handles
                            .iter()
                            .filter_map(|h| self.render_bundles.get(&h.0))
                            .collect();
                        render_pass.execute_bundles(bundles);
                    }
                }
            }
        }

        self.encoder = Some(encoder);
    }

    fn begin_compute_pass(&mut self, label: Option<&str>) {
        self.pending_compute_pass = Some(PendingComputePass {
            label: label.map(|s| s.to_string()),
            commands: Vec::new(),
        });
    }

    fn end_compute_pass(&mut self) {
        let Some(pending) = self.pending_compute_pass.take() else {
            return;
        };

        let Some(encoder) = self.encoder.as_mut() else {
            log::warn!("end_compute_pass without an open encoder");
            return;
        };

        let compute_pipelines = &self.compute_pipelines;
        let bind_groups = &self.bind_groups;

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: pending.label.as_deref(),
            timestamp_writes: None,
        });

        for cmd in &pending.commands {
            match cmd {
                ComputeCommand::SetPipeline(handle) => {
                    if let Some(pipeline) = compute_pipelines.get(&handle.0) {
                        compute_pass.set_pipeline(pipeline);
                    }
                }
                ComputeCommand::SetBindGroup { index, bind_group } => {
                    if let Some(bg) = bind_groups.get(&bind_group.0) {
                        compute_pass.set_bind_group(*index, bg, &[]);
                    }
                }
                ComputeCommand::Dispatch { x, y, z } => {
                    compute_pass.dispatch_workgroups(*x, *y, *z);
                }
            }
        }
    }

    fn draw_command(&mut self, command: DrawCommand) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(PassCommand::Draw(command));
        }
    }

    fn execute_bundles(&mut self, bundles: &[RenderBundleHandle]) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending
                .commands
                .push(PassCommand::ExecuteBundles(bundles.to_vec()));
        }
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(PassCommand::SetViewport {
                x,
                y,
                width,
                height,
                min_depth,
                max_depth,
            });
        }
    }

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        if let Some(ref mut pending) = self.pending_compute_pass {
            pending.commands.push(ComputeCommand::SetPipeline(pipeline));
        }
    }

    fn set_compute_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        if let Some(ref mut pending) = self.pending_compute_pass {
            pending
                .commands
                .push(ComputeCommand::SetBindGroup { index, bind_group });
        }
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        if let Some(ref mut pending) = self.pending_compute_pass {
            pending.commands.push(ComputeCommand::Dispatch { x, y, z });
        }
    }

    fn copy_texture_to_texture(
        &mut self,
        source: TextureCopyLocation,
        destination: TextureCopyLocation,
        size: [u32; 3],
    ) {
        let Some(encoder) = self.encoder.as_mut() else {
            log::warn!("copy_texture_to_texture without an open encoder");
            return;
        };
        let (Some(src), Some(dst)) = (
            Self::copy_location(&self.textures, &source),
            Self::copy_location(&self.textures, &destination),
        ) else {
            log::warn!(
                "copy_texture_to_texture: unknown texture {:?} -> {:?}",
                source.texture,
                destination.texture
            );
            return;
        };
        encoder.copy_texture_to_texture(
            src,
            dst,
            wgpu::Extent3d {
                width: size[0],
                height: size[1],
                depth_or_array_layers: size[2],
            },
        );
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.remove(&buffer.0) {
            buf.destroy();
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(tex) = self.textures.remove(&texture.0) {
            tex.destroy();
        }
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.texture_views.remove(&view.0);
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.samplers.remove(&sampler.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }

    fn destroy_render_bundle(&mut self, bundle: RenderBundleHandle) {
        self.render_bundles.remove(&bundle.0);
    }
}

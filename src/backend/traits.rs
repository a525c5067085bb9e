//! Core backend abstraction traits
//!
//! The renderer talks to the GPU exclusively through [`GraphicsBackend`]. The
//! trait is object safe so the controller can drive the real wgpu device and
//! the recording backend used in tests through the same `&mut dyn` seam.

use crate::backend::types::*;
use std::ops::Range;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Failed to create bind group: {0}")]
    BindGroupCreationFailed(String),
    #[error("Failed to create render bundle: {0}")]
    RenderBundleCreationFailed(String),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewHandle(pub(crate) u64);

/// Handle to a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerHandle(pub(crate) u64);

/// Handle to a render pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineHandle(pub(crate) u64);

/// Handle to a compute pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputePipelineHandle(pub(crate) u64);

/// Handle to a bind group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupHandle(pub(crate) u64);

/// Handle to a bind group layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupLayoutHandle(pub(crate) u64);

/// Handle to a pre-recorded render bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderBundleHandle(pub(crate) u64);

/// Bind group entry for creating bind groups
#[derive(Debug, Clone, PartialEq)]
pub enum BindGroupEntry {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        size: Option<u64>,
    },
    Texture(TextureViewHandle),
    Sampler(SamplerHandle),
    StorageTexture(TextureViewHandle),
}

/// Bind group layout entry
#[derive(Debug, Clone, PartialEq)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStageFlags,
    pub ty: BindingType,
}

/// Binding type
#[derive(Debug, Clone, PartialEq)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer {
        read_only: bool,
    },
    Texture {
        sample_type: TextureSampleType,
        view_dimension: TextureViewDimension,
    },
    StorageTexture {
        format: TextureFormat,
        view_dimension: TextureViewDimension,
    },
    Sampler(SamplerBindingType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSampleType {
    Float { filterable: bool },
    Depth,
    Sint,
    Uint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerBindingType {
    Filtering,
    NonFiltering,
    Comparison,
}

/// Render pipeline descriptor. A single WGSL module carries both entry
/// points; pipelines without a fragment entry are depth-only.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    pub shader: String,
    pub vertex_entry: String,
    pub fragment_entry: Option<String>,
    pub vertex_layouts: Vec<VertexBufferLayout>,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub primitive_topology: PrimitiveTopology,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_targets: Vec<ColorTargetState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorTargetState {
    pub format: TextureFormat,
}

impl ColorTargetState {
    pub fn replace(format: TextureFormat) -> Self {
        Self { format }
    }
}

/// Compute pipeline descriptor
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    pub label: Option<String>,
    pub shader: String,
    pub entry_point: String,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
}

/// Color attachment for render pass
#[derive(Debug, Clone, PartialEq)]
pub struct ColorAttachment {
    pub view: TextureViewHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOp {
    Clear([f32; 4]),
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    Discard,
}

/// Depth stencil attachment for render pass
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilAttachment {
    pub view: TextureViewHandle,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub depth_clear_value: f32,
}

/// Render pass descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
}

/// Target formats a render bundle is recorded against. They must match the
/// attachments of every pass that executes the bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBundleDescriptor {
    pub label: Option<String>,
    pub color_formats: Vec<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
}

/// Draw-state command that may be recorded into a render bundle or issued
/// directly inside a render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetPipeline(RenderPipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        offset: u64,
        format: IndexFormat,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// Frame context returned when beginning a frame
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub target_view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

/// Main graphics backend trait
pub trait GraphicsBackend {
    /// Resize the presentation target
    fn resize(&mut self, width: u32, height: u32);

    /// Get the actual surface size (may be clamped by device limits)
    fn surface_size(&self) -> (u32, u32);

    /// Get the presentation target format
    fn surface_format(&self) -> TextureFormat;

    /// Acquire the presentation target and open the frame's command encoder
    fn begin_frame(&mut self) -> BackendResult<FrameContext>;

    /// Submit the frame's commands and present
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Open a command encoder for offscreen work outside a frame
    fn begin_commands(&mut self, label: Option<&str>);

    /// Submit any recorded commands without presenting
    fn submit(&mut self);

    /// Block until all submitted work has finished executing
    fn wait_idle(&mut self) -> BackendResult<()>;

    // Resource creation

    /// Create a buffer
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Create a buffer with initial data
    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8])
        -> BackendResult<BufferHandle>;

    /// Write data to a buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Create a view over a range of a texture's mips and layers
    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle>;

    /// Upload tightly packed texel rows into one mip level and layer
    fn write_texture(
        &mut self,
        destination: TextureCopyLocation,
        data: &[u8],
        bytes_per_row: u32,
        width: u32,
        height: u32,
    );

    /// Create a sampler
    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    // Pipeline creation

    /// Create a bind group layout
    fn create_bind_group_layout(
        &mut self,
        label: Option<&str>,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle>;

    /// Create a bind group
    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle>;

    /// Create a render pipeline. Returns once the device has validated it.
    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle>;

    /// Create a compute pipeline. Returns once the device has validated it.
    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle>;

    /// Pre-record draw commands into a reusable bundle
    fn create_render_bundle(
        &mut self,
        desc: &RenderBundleDescriptor,
        commands: &[DrawCommand],
    ) -> BackendResult<RenderBundleHandle>;

    // Command recording and execution

    /// Begin a render pass
    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor);

    /// End the current render pass
    fn end_render_pass(&mut self);

    /// Begin a compute pass
    fn begin_compute_pass(&mut self, label: Option<&str>);

    /// End the current compute pass
    fn end_compute_pass(&mut self);

    /// Record a draw-state command into the current render pass
    fn draw_command(&mut self, command: DrawCommand);

    /// Replay pre-recorded bundles inside the current render pass
    fn execute_bundles(&mut self, bundles: &[RenderBundleHandle]);

    /// Set viewport
    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32);

    /// Set the compute pipeline
    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle);

    /// Set a bind group on the current compute pass
    fn set_compute_bind_group(&mut self, index: u32, bind_group: BindGroupHandle);

    /// Dispatch compute work
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);

    /// Copy a region between two textures on the open encoder
    fn copy_texture_to_texture(
        &mut self,
        source: TextureCopyLocation,
        destination: TextureCopyLocation,
        size: [u32; 3],
    );

    // Resource cleanup

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Drop a texture view
    fn destroy_texture_view(&mut self, view: TextureViewHandle);

    /// Drop a sampler
    fn destroy_sampler(&mut self, sampler: SamplerHandle);

    /// Drop a bind group
    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle);

    /// Drop a render bundle
    fn destroy_render_bundle(&mut self, bundle: RenderBundleHandle);
}

/// Index format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

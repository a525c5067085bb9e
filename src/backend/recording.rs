//! Recording backend
//!
//! Hands out handles without touching a GPU and keeps an ordered trace of
//! every call. Integration tests drive the full controller through it and
//! assert on the resulting command stream.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::{HashMap, HashSet};

/// One call made against the backend
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    CreateBuffer {
        handle: BufferHandle,
        label: Option<String>,
        size: u64,
        usage: BufferUsage,
        initialized: bool,
    },
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        len: usize,
    },
    CreateTexture {
        handle: TextureHandle,
        desc: TextureDescriptor,
    },
    CreateTextureView {
        handle: TextureViewHandle,
        texture: TextureHandle,
        desc: TextureViewDescriptor,
    },
    WriteTexture {
        destination: TextureCopyLocation,
        len: usize,
        width: u32,
        height: u32,
    },
    CreateSampler {
        handle: SamplerHandle,
        compare: Option<CompareFunction>,
    },
    CreateBindGroupLayout {
        handle: BindGroupLayoutHandle,
        label: Option<String>,
        entries: Vec<BindGroupLayoutEntry>,
    },
    CreateBindGroup {
        handle: BindGroupHandle,
        layout: BindGroupLayoutHandle,
        entries: Vec<(u32, BindGroupEntry)>,
    },
    CreateRenderPipeline {
        handle: RenderPipelineHandle,
        label: Option<String>,
    },
    CreateComputePipeline {
        handle: ComputePipelineHandle,
        label: Option<String>,
    },
    CreateRenderBundle {
        handle: RenderBundleHandle,
        label: Option<String>,
        commands: Vec<DrawCommand>,
    },
    BeginFrame,
    EndFrame,
    BeginCommands,
    Submit,
    WaitIdle,
    BeginRenderPass {
        label: Option<String>,
        color_views: Vec<TextureViewHandle>,
        depth_view: Option<TextureViewHandle>,
    },
    EndRenderPass,
    BeginComputePass {
        label: Option<String>,
    },
    EndComputePass,
    Draw(DrawCommand),
    ExecuteBundles(Vec<RenderBundleHandle>),
    SetViewport,
    SetComputePipeline(ComputePipelineHandle),
    SetComputeBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    CopyTextureToTexture {
        source: TextureCopyLocation,
        destination: TextureCopyLocation,
        size: [u32; 3],
    },
    DestroyBuffer(BufferHandle),
    DestroyTexture(TextureHandle),
    DestroyTextureView(TextureViewHandle),
    DestroySampler(SamplerHandle),
    DestroyBindGroup(BindGroupHandle),
    DestroyRenderBundle(RenderBundleHandle),
}

/// A pass that samples a texture before a later pass in the same submission
/// writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hazard {
    pub texture: TextureHandle,
    pub reader: Option<String>,
    pub writer: Option<String>,
}

#[derive(Default)]
struct PassAccess {
    label: Option<String>,
    reads: HashSet<TextureHandle>,
    writes: HashSet<TextureHandle>,
}

impl PassAccess {
    fn note_bind_group(
        &mut self,
        group: &BindGroupHandle,
        bind_groups: &HashMap<BindGroupHandle, Vec<BindGroupEntry>>,
        view_textures: &HashMap<TextureViewHandle, TextureHandle>,
    ) {
        for entry in bind_groups.get(group).into_iter().flatten() {
            match entry {
                BindGroupEntry::Texture(view) => {
                    if let Some(texture) = view_textures.get(view) {
                        self.reads.insert(*texture);
                    }
                }
                BindGroupEntry::StorageTexture(view) => {
                    if let Some(texture) = view_textures.get(view) {
                        self.writes.insert(*texture);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Backend that records calls instead of executing them
pub struct RecordingBackend {
    width: u32,
    height: u32,
    format: TextureFormat,
    next_id: u64,
    events: Vec<TraceEvent>,
    live_textures: HashMap<TextureHandle, TextureDescriptor>,
    live_buffers: HashSet<BufferHandle>,
    live_views: HashSet<TextureViewHandle>,
    live_samplers: HashSet<SamplerHandle>,
    live_bind_groups: HashSet<BindGroupHandle>,
    live_bundles: HashSet<RenderBundleHandle>,
    // Creation records survive `clear_events` and destruction, so hazards
    // resolve handles made before the trace was cleared
    view_textures: HashMap<TextureViewHandle, TextureHandle>,
    bind_group_entries: HashMap<BindGroupHandle, Vec<BindGroupEntry>>,
    bundle_commands: HashMap<RenderBundleHandle, Vec<DrawCommand>>,
    failing_pipelines: Vec<String>,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Bgra8UnormSrgb,
            next_id: 1,
            events: Vec::new(),
            live_textures: HashMap::new(),
            live_buffers: HashSet::new(),
            live_views: HashSet::new(),
            live_samplers: HashSet::new(),
            live_bind_groups: HashSet::new(),
            live_bundles: HashSet::new(),
            view_textures: HashMap::new(),
            bind_group_entries: HashMap::new(),
            bundle_commands: HashMap::new(),
            failing_pipelines: Vec::new(),
        }
    }

    /// Make pipeline creation fail for any label containing `pattern`
    pub fn fail_pipelines_matching(&mut self, pattern: impl Into<String>) {
        self.failing_pipelines.push(pattern.into());
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn is_texture_alive(&self, texture: TextureHandle) -> bool {
        self.live_textures.contains_key(&texture)
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.live_textures.get(&texture)
    }

    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.len()
    }

    pub fn live_view_count(&self) -> usize {
        self.live_views.len()
    }

    pub fn live_sampler_count(&self) -> usize {
        self.live_samplers.len()
    }

    pub fn live_bind_group_count(&self) -> usize {
        self.live_bind_groups.len()
    }

    pub fn live_bundle_count(&self) -> usize {
        self.live_bundles.len()
    }

    /// Labels of render passes in the order they were begun
    pub fn render_pass_labels(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::BeginRenderPass { label, .. } => {
                    Some(label.clone().unwrap_or_default())
                }
                _ => None,
            })
            .collect()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&TraceEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).count()
    }

    pub fn position<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&TraceEvent) -> bool,
    {
        self.events.iter().position(predicate)
    }

    /// Find read-before-write orderings between passes of one submission
    pub fn hazards(&self) -> Vec<Hazard> {
        let view_textures = &self.view_textures;
        let bind_groups = &self.bind_group_entries;
        let bundles = &self.bundle_commands;
        let mut hazards = Vec::new();
        let mut submission: Vec<PassAccess> = Vec::new();
        let mut current: Option<PassAccess> = None;

        for event in &self.events {
            match event {
                TraceEvent::BeginRenderPass {
                    label,
                    color_views,
                    depth_view,
                } => {
                    let mut pass = PassAccess {
                        label: label.clone(),
                        ..Default::default()
                    };
                    for view in color_views.iter().chain(depth_view.iter()) {
                        if let Some(texture) = view_textures.get(view) {
                            pass.writes.insert(*texture);
                        }
                    }
                    current = Some(pass);
                }
                TraceEvent::BeginComputePass { label } => {
                    current = Some(PassAccess {
                        label: label.clone(),
                        ..Default::default()
                    });
                }
                TraceEvent::Draw(DrawCommand::SetBindGroup { bind_group, .. })
                | TraceEvent::SetComputeBindGroup { bind_group, .. } => {
                    if let Some(pass) = current.as_mut() {
                        pass.note_bind_group(bind_group, bind_groups, view_textures);
                    }
                }
                TraceEvent::ExecuteBundles(handles) => {
                    if let Some(pass) = current.as_mut() {
                        for command in handles.iter().filter_map(|h| bundles.get(h)).flatten() {
                            if let DrawCommand::SetBindGroup { bind_group, .. } = command {
                                pass.note_bind_group(bind_group, bind_groups, view_textures);
                            }
                        }
                    }
                }
                TraceEvent::EndRenderPass | TraceEvent::EndComputePass => {
                    if let Some(pass) = current.take() {
                        for earlier in &submission {
                            for texture in earlier.reads.intersection(&pass.writes) {
                                if !earlier.writes.contains(texture) {
                                    hazards.push(Hazard {
                                        texture: *texture,
                                        reader: earlier.label.clone(),
                                        writer: pass.label.clone(),
                                    });
                                }
                            }
                        }
                        submission.push(pass);
                    }
                }
                TraceEvent::Submit | TraceEvent::EndFrame => submission.clear(),
                _ => {}
            }
        }

        hazards
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsBackend for RecordingBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn surface_format(&self) -> TextureFormat {
        self.format
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        self.events.push(TraceEvent::BeginFrame);
        let view = TextureViewHandle(self.next_handle());
        Ok(FrameContext {
            target_view: view,
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.events.push(TraceEvent::EndFrame);
        Ok(())
    }

    fn begin_commands(&mut self, _label: Option<&str>) {
        self.events.push(TraceEvent::BeginCommands);
    }

    fn submit(&mut self) {
        self.events.push(TraceEvent::Submit);
    }

    fn wait_idle(&mut self) -> BackendResult<()> {
        self.events.push(TraceEvent::WaitIdle);
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let handle = BufferHandle(self.next_handle());
        self.live_buffers.insert(handle);
        self.events.push(TraceEvent::CreateBuffer {
            handle,
            label: desc.label.clone(),
            size: desc.size,
            usage: desc.usage,
            initialized: false,
        });
        Ok(handle)
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let handle = BufferHandle(self.next_handle());
        self.live_buffers.insert(handle);
        self.events.push(TraceEvent::CreateBuffer {
            handle,
            label: desc.label.clone(),
            size: data.len() as u64,
            usage: desc.usage,
            initialized: true,
        });
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        self.events.push(TraceEvent::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 || desc.array_layers == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "zero-sized texture {:?}",
                desc.label
            )));
        }
        let handle = TextureHandle(self.next_handle());
        self.live_textures.insert(handle, desc.clone());
        self.events.push(TraceEvent::CreateTexture {
            handle,
            desc: desc.clone(),
        });
        Ok(handle)
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        if !self.live_textures.contains_key(&texture) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let handle = TextureViewHandle(self.next_handle());
        self.live_views.insert(handle);
        self.view_textures.insert(handle, texture);
        self.events.push(TraceEvent::CreateTextureView {
            handle,
            texture,
            desc: desc.clone(),
        });
        Ok(handle)
    }

    fn write_texture(
        &mut self,
        destination: TextureCopyLocation,
        data: &[u8],
        _bytes_per_row: u32,
        width: u32,
        height: u32,
    ) {
        self.events.push(TraceEvent::WriteTexture {
            destination,
            len: data.len(),
            width,
            height,
        });
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let handle = SamplerHandle(self.next_handle());
        self.live_samplers.insert(handle);
        self.events.push(TraceEvent::CreateSampler {
            handle,
            compare: desc.compare,
        });
        Ok(handle)
    }

    fn create_bind_group_layout(
        &mut self,
        label: Option<&str>,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let handle = BindGroupLayoutHandle(self.next_handle());
        self.events.push(TraceEvent::CreateBindGroupLayout {
            handle,
            label: label.map(str::to_string),
            entries: entries.to_vec(),
        });
        Ok(handle)
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let handle = BindGroupHandle(self.next_handle());
        self.live_bind_groups.insert(handle);
        self.bind_group_entries
            .insert(handle, entries.iter().map(|(_, e)| e.clone()).collect());
        self.events.push(TraceEvent::CreateBindGroup {
            handle,
            layout,
            entries: entries.to_vec(),
        });
        Ok(handle)
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let label = desc.label.clone().unwrap_or_default();
        if self.failing_pipelines.iter().any(|p| label.contains(p.as_str())) {
            return Err(BackendError::PipelineCreationFailed(format!(
                "injected failure for '{}'",
                label
            )));
        }
        let handle = RenderPipelineHandle(self.next_handle());
        self.events.push(TraceEvent::CreateRenderPipeline {
            handle,
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle> {
        let label = desc.label.clone().unwrap_or_default();
        if self.failing_pipelines.iter().any(|p| label.contains(p.as_str())) {
            return Err(BackendError::PipelineCreationFailed(format!(
                "injected failure for '{}'",
                label
            )));
        }
        let handle = ComputePipelineHandle(self.next_handle());
        self.events.push(TraceEvent::CreateComputePipeline {
            handle,
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn create_render_bundle(
        &mut self,
        desc: &RenderBundleDescriptor,
        commands: &[DrawCommand],
    ) -> BackendResult<RenderBundleHandle> {
        let handle = RenderBundleHandle(self.next_handle());
        self.live_bundles.insert(handle);
        self.bundle_commands.insert(handle, commands.to_vec());
        self.events.push(TraceEvent::CreateRenderBundle {
            handle,
            label: desc.label.clone(),
            commands: commands.to_vec(),
        });
        Ok(handle)
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.events.push(TraceEvent::BeginRenderPass {
            label: desc.label.clone(),
            color_views: desc.color_attachments.iter().map(|a| a.view).collect(),
            depth_view: desc.depth_stencil_attachment.as_ref().map(|a| a.view),
        });
    }

    fn end_render_pass(&mut self) {
        self.events.push(TraceEvent::EndRenderPass);
    }

    fn begin_compute_pass(&mut self, label: Option<&str>) {
        self.events.push(TraceEvent::BeginComputePass {
            label: label.map(str::to_string),
        });
    }

    fn end_compute_pass(&mut self) {
        self.events.push(TraceEvent::EndComputePass);
    }

    fn draw_command(&mut self, command: DrawCommand) {
        self.events.push(TraceEvent::Draw(command));
    }

    fn execute_bundles(&mut self, bundles: &[RenderBundleHandle]) {
        self.events.push(TraceEvent::ExecuteBundles(bundles.to_vec()));
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, _width: f32, _height: f32, _min_depth: f32, _max_depth: f32) {
        self.events.push(TraceEvent::SetViewport);
    }

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.events.push(TraceEvent::SetComputePipeline(pipeline));
    }

    fn set_compute_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.events
            .push(TraceEvent::SetComputeBindGroup { index, bind_group });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.events.push(TraceEvent::Dispatch { x, y, z });
    }

    fn copy_texture_to_texture(
        &mut self,
        source: TextureCopyLocation,
        destination: TextureCopyLocation,
        size: [u32; 3],
    ) {
        self.events.push(TraceEvent::CopyTextureToTexture {
            source,
            destination,
            size,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.live_buffers.remove(&buffer);
        self.events.push(TraceEvent::DestroyBuffer(buffer));
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.live_textures.remove(&texture);
        self.events.push(TraceEvent::DestroyTexture(texture));
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.live_views.remove(&view);
        self.events.push(TraceEvent::DestroyTextureView(view));
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.live_samplers.remove(&sampler);
        self.events.push(TraceEvent::DestroySampler(sampler));
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.live_bind_groups.remove(&bind_group);
        self.events.push(TraceEvent::DestroyBindGroup(bind_group));
    }

    fn destroy_render_bundle(&mut self, bundle: RenderBundleHandle) {
        self.live_bundles.remove(&bundle);
        self.events.push(TraceEvent::DestroyRenderBundle(bundle));
    }
}

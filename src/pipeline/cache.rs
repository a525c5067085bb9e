//! Pipeline construction and caching
//!
//! Pipelines are generated from the same ordered name lists that build their
//! bind groups, so a pipeline and the groups bound to it can never disagree
//! on binding indices. Generated modules are validated with naga before they
//! reach the device.

use crate::backend::{
    BindGroupLayoutHandle, ColorTargetState, CompareFunction, ComputePipelineDescriptor,
    ComputePipelineHandle, CullMode, DepthStencilState, FrontFace, GraphicsBackend,
    PrimitiveTopology, RenderPipelineDescriptor, RenderPipelineHandle, TextureFormat,
    VertexAttribute, VertexBufferLayout, VertexStepMode,
};
use crate::error::{RendererError, RendererResult};
use crate::resources::{BindGroupFactory, BindingLayout};
use crate::shader::{
    generate, validate_wgsl, vertex_slot_format, PassKind, TemplateKind, COMPUTE_ENTRY,
    FRAGMENT_ENTRY, VERTEX_ENTRY,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything needed to build one render pipeline
#[derive(Debug, Clone)]
pub struct RenderPipelineRequest<'a> {
    pub label: &'a str,
    pub template: TemplateKind,
    pub pass: PassKind,
    pub vertex_slots: &'a [&'a str],
    pub groups: &'a [&'a [&'a str]],
    pub color_targets: Vec<TextureFormat>,
    pub depth: Option<DepthStencilState>,
    pub cull_mode: CullMode,
}

/// A built pipeline with the layouts of its groups, in group order
#[derive(Debug, Clone)]
pub struct PreparedPipeline<H> {
    pub handle: H,
    pub layouts: Vec<Arc<BindingLayout>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RenderKey {
    source: String,
    layouts: Vec<BindGroupLayoutHandle>,
    colors: Vec<TextureFormat>,
    depth: Option<(TextureFormat, bool, CompareFunction)>,
    cull_mode: CullMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ComputeKey {
    source: String,
    layouts: Vec<BindGroupLayoutHandle>,
}

/// Caches pipelines by generated source and layouts
#[derive(Default)]
pub struct PipelineCache {
    render: HashMap<RenderKey, RenderPipelineHandle>,
    compute: HashMap<ComputeKey, ComputePipelineHandle>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct pipelines built
    pub fn len(&self) -> usize {
        self.render.len() + self.compute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build (or fetch) the render pipeline for `request`. Blocks until the
    /// device has accepted the pipeline.
    pub fn render_pipeline(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        bind_groups: &mut BindGroupFactory,
        request: &RenderPipelineRequest,
    ) -> RendererResult<PreparedPipeline<RenderPipelineHandle>> {
        let source = generate(request.vertex_slots, request.groups, request.pass, request.template)?;
        let layouts = create_layouts(backend, bind_groups, request.groups)?;

        let key = RenderKey {
            source,
            layouts: layouts.iter().map(|layout| layout.handle).collect(),
            colors: request.color_targets.clone(),
            depth: request
                .depth
                .as_ref()
                .map(|depth| (depth.format, depth.depth_write_enabled, depth.depth_compare)),
            cull_mode: request.cull_mode,
        };
        if let Some(handle) = self.render.get(&key) {
            return Ok(PreparedPipeline {
                handle: *handle,
                layouts,
            });
        }

        validate_wgsl(request.label, &key.source).map_err(|e| build_failure(request.label, e))?;

        let desc = RenderPipelineDescriptor {
            label: Some(request.label.to_string()),
            shader: key.source.clone(),
            vertex_entry: VERTEX_ENTRY.to_string(),
            fragment_entry: (request.pass == PassKind::Render).then(|| FRAGMENT_ENTRY.to_string()),
            vertex_layouts: vertex_layouts(request.vertex_slots)?,
            bind_group_layouts: key.layouts.clone(),
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: request.cull_mode,
            depth_stencil: request.depth.clone(),
            color_targets: request
                .color_targets
                .iter()
                .map(|format| ColorTargetState::replace(*format))
                .collect(),
        };
        let handle = backend
            .create_render_pipeline(&desc)
            .map_err(|e| RendererError::from(e).for_pipeline(request.label))?;
        log::debug!("Created render pipeline '{}'", request.label);

        self.render.insert(key, handle);
        Ok(PreparedPipeline { handle, layouts })
    }

    /// Build (or fetch) a compute pipeline for a compute template
    pub fn compute_pipeline(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        bind_groups: &mut BindGroupFactory,
        label: &str,
        template: TemplateKind,
        groups: &[&[&str]],
    ) -> RendererResult<PreparedPipeline<ComputePipelineHandle>> {
        let source = generate(&[], groups, PassKind::Render, template)?;
        let layouts = create_layouts(backend, bind_groups, groups)?;

        let key = ComputeKey {
            source,
            layouts: layouts.iter().map(|layout| layout.handle).collect(),
        };
        if let Some(handle) = self.compute.get(&key) {
            return Ok(PreparedPipeline {
                handle: *handle,
                layouts,
            });
        }

        validate_wgsl(label, &key.source).map_err(|e| build_failure(label, e))?;

        let handle = backend
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(label.to_string()),
                shader: key.source.clone(),
                entry_point: COMPUTE_ENTRY.to_string(),
                bind_group_layouts: key.layouts.clone(),
            })
            .map_err(|e| RendererError::from(e).for_pipeline(label))?;
        log::debug!("Created compute pipeline '{}'", label);

        self.compute.insert(key, handle);
        Ok(PreparedPipeline { handle, layouts })
    }
}

fn create_layouts(
    backend: &mut dyn GraphicsBackend,
    bind_groups: &mut BindGroupFactory,
    groups: &[&[&str]],
) -> RendererResult<Vec<Arc<BindingLayout>>> {
    groups
        .iter()
        .map(|names| bind_groups.create_layout(backend, names))
        .collect()
}

fn build_failure(label: &str, error: RendererError) -> RendererError {
    match error {
        RendererError::ShaderTemplate { message, .. } => RendererError::PipelineBuildFailure {
            label: label.to_string(),
            message,
        },
        other => other,
    }
}

/// One vertex buffer per slot; slot `i` feeds `@location(i)`
pub fn vertex_layouts(slots: &[&str]) -> RendererResult<Vec<VertexBufferLayout>> {
    slots
        .iter()
        .enumerate()
        .map(|(location, slot)| {
            let format = vertex_slot_format(slot)
                .ok_or_else(|| RendererError::UnknownResourceName(slot.to_string()))?;
            Ok(VertexBufferLayout {
                array_stride: format.size(),
                step_mode: VertexStepMode::Vertex,
                attributes: vec![VertexAttribute {
                    location: location as u32,
                    format,
                    offset: 0,
                }],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{RecordingBackend, TraceEvent};
    use crate::backend::VertexFormat;
    use crate::config::RendererConfig;
    use crate::resources::names::*;
    use crate::resources::FormatRegistry;

    fn factory() -> BindGroupFactory {
        BindGroupFactory::new(Arc::new(FormatRegistry::with_builtin_formats(&RendererConfig::default())))
    }

    fn skybox_request(label: &str) -> RenderPipelineRequest<'_> {
        RenderPipelineRequest {
            label,
            template: TemplateKind::Skybox,
            pass: PassKind::Render,
            vertex_slots: &[POSITION],
            groups: &[&[CAMERA], &[ENV_MAP, ENV_SAMPLER]],
            color_targets: vec![TextureFormat::Rgba16Float],
            depth: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: CompareFunction::LessEqual,
            }),
            cull_mode: CullMode::None,
        }
    }

    #[test]
    fn test_identical_requests_share_one_pipeline() {
        let mut backend = RecordingBackend::new(4, 4);
        let mut bind_groups = factory();
        let mut cache = PipelineCache::new();

        let first = cache
            .render_pipeline(&mut backend, &mut bind_groups, &skybox_request("Skybox"))
            .unwrap();
        let second = cache
            .render_pipeline(&mut backend, &mut bind_groups, &skybox_request("Skybox again"))
            .unwrap();

        assert_eq!(first.handle, second.handle);
        assert_eq!(first.layouts.len(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            backend.count(|e| matches!(e, TraceEvent::CreateRenderPipeline { .. })),
            1
        );
    }

    #[test]
    fn test_backend_failure_carries_label() {
        let mut backend = RecordingBackend::new(4, 4);
        backend.fail_pipelines_matching("Skybox");
        let mut bind_groups = factory();
        let mut cache = PipelineCache::new();

        let err = cache
            .render_pipeline(&mut backend, &mut bind_groups, &skybox_request("Skybox"))
            .unwrap_err();
        assert!(matches!(err, RendererError::PipelineBuildFailure { ref label, .. } if label == "Skybox"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_compute_pipeline() {
        let mut backend = RecordingBackend::new(4, 4);
        let mut bind_groups = factory();
        let mut cache = PipelineCache::new();

        let pipeline = cache
            .compute_pipeline(
                &mut backend,
                &mut bind_groups,
                "BRDF LUT",
                TemplateKind::BrdfLut,
                &[&[BRDF_LUT_OUTPUT, IBL_PARAMS]],
            )
            .unwrap();
        assert_eq!(pipeline.layouts[0].names, vec![BRDF_LUT_OUTPUT, IBL_PARAMS]);
        assert_eq!(
            backend.count(|e| matches!(e, TraceEvent::CreateComputePipeline { .. })),
            1
        );
    }

    #[test]
    fn test_vertex_layouts_follow_slot_order() {
        let layouts = vertex_layouts(&[POSITION, UV, SKIN_INDEX]).unwrap();
        assert_eq!(layouts.len(), 3);
        assert_eq!(layouts[1].array_stride, 8);
        assert_eq!(layouts[1].attributes[0].location, 1);
        assert_eq!(layouts[2].attributes[0].format, VertexFormat::Uint32x4);
        assert!(vertex_layouts(&[INDEX]).is_err());
    }
}

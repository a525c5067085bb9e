//! Environment cube drawn behind all opaque geometry

use super::{bind_groups, draw_commands, RecordContext};
use crate::backend::{CompareFunction, CullMode, GraphicsBackend, RenderBundleHandle};
use crate::error::RendererResult;
use crate::pipeline::{depth_state, RenderPipelineRequest};
use crate::resources::names::*;
use crate::resources::{BindGroup, MeshData, ResourceFactory, ResourceInputs, ResourceSet};
use crate::shader::{PassKind, TemplateKind};

const SLOTS: [&str; 1] = [POSITION];

#[derive(Debug, Default)]
pub struct SkyboxObject {
    element_count: u32,
    vertices: ResourceSet,
    bind_groups: Vec<BindGroup>,
    render_bundle: Option<RenderBundleHandle>,
}

impl SkyboxObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_bundle(&self) -> Option<RenderBundleHandle> {
        self.render_bundle
    }

    pub fn init_vertex_buffer(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        factory: &ResourceFactory,
    ) -> RendererResult<()> {
        let cube = MeshData::cube();
        let mut inputs = ResourceInputs::new().bytes(POSITION, bytemuck::cast_slice::<_, u8>(&cube.positions));
        let mut names = vec![POSITION];
        if let Some(indices) = cube.index_bytes() {
            inputs.set_bytes(INDEX, indices);
            names.push(INDEX);
        }
        self.vertices = factory.create_resources(backend, &names, &inputs)?;
        self.element_count = cube.element_count();
        Ok(())
    }

    pub fn set_render_bundle(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        ctx: &mut RecordContext,
    ) -> RendererResult<()> {
        let groups: [&[&str]; 2] = [&[CAMERA], &[ENV_MAP, ENV_SAMPLER]];

        // Seen from inside, at the far plane
        let pipeline = ctx.cache.render_pipeline(
            backend,
            ctx.bind_groups,
            &RenderPipelineRequest {
                label: "Skybox",
                template: TemplateKind::Skybox,
                pass: PassKind::Render,
                vertex_slots: &SLOTS,
                groups: &groups,
                color_targets: ctx.geometry_target.color_formats.clone(),
                depth: Some(depth_state(CompareFunction::LessEqual, false)),
                cull_mode: CullMode::None,
            },
        )?;

        self.bind_groups = bind_groups(backend, ctx.bind_groups, &groups, &pipeline.layouts, ctx.sources)?;
        let position = self.vertices.buffer(POSITION)?;
        let commands = draw_commands(
            pipeline.handle,
            &self.bind_groups,
            &[position],
            &self.vertices,
            self.element_count,
            1,
        )?;
        self.render_bundle = Some(backend.create_render_bundle(ctx.geometry_target, &commands)?);
        Ok(())
    }

    pub fn release_bundles(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(bundle) = self.render_bundle.take() {
            backend.destroy_render_bundle(bundle);
        }
        for group in self.bind_groups.drain(..) {
            group.release(backend);
        }
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.release_bundles(backend);
        self.vertices.release(backend);
    }
}

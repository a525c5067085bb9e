//! Renderable objects
//!
//! Every object walks the same lifecycle: vertex buffers, then its own bind
//! resources, then one geometry bundle and one shadow bundle recorded against
//! the pipelines built for its attribute set. After that only `update` runs,
//! rewriting buffers that already exist.

mod mesh;
mod skybox;

pub use mesh::MeshObject;
pub use skybox::SkyboxObject;

use crate::backend::{
    BufferHandle, DrawCommand, GraphicsBackend, IndexFormat, RenderBundleDescriptor,
    RenderBundleHandle, RenderPipelineHandle,
};
use crate::error::RendererResult;
use crate::pipeline::PipelineCache;
use crate::resources::names::INDEX;
use crate::resources::{BindGroup, BindGroupFactory, BindingLayout, ResourceFactory, ResourceSet};
use crate::scene::SceneDescription;
use std::sync::Arc;

/// Shared state an object needs while building pipelines and bundles
pub struct RecordContext<'a> {
    pub cache: &'a mut PipelineCache,
    pub bind_groups: &'a mut BindGroupFactory,
    /// Global and environment resources the object groups may reference
    pub sources: &'a [&'a ResourceSet],
    /// Registered name of the scene light uniform
    pub light: &'static str,
    pub geometry_target: &'a RenderBundleDescriptor,
    pub shadow_target: &'a RenderBundleDescriptor,
}

/// Discriminant of [`Renderable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    StaticMesh,
    SkinnedMesh,
    Skybox,
}

/// Closed set of objects the frame graph draws
#[derive(Debug)]
pub enum Renderable {
    StaticMesh(MeshObject),
    SkinnedMesh(MeshObject),
    Skybox(SkyboxObject),
}

impl Renderable {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Renderable::StaticMesh(_) => ObjectKind::StaticMesh,
            Renderable::SkinnedMesh(_) => ObjectKind::SkinnedMesh,
            Renderable::Skybox(_) => ObjectKind::Skybox,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.name(),
            Renderable::Skybox(_) => "skybox",
        }
    }

    pub fn init_vertex_buffer(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        factory: &ResourceFactory,
    ) -> RendererResult<()> {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.init_vertex_buffer(backend, factory),
            Renderable::Skybox(sky) => sky.init_vertex_buffer(backend, factory),
        }
    }

    pub fn init_group_resource(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        factory: &ResourceFactory,
    ) -> RendererResult<()> {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.init_group_resource(backend, factory),
            // Binds only global environment resources
            Renderable::Skybox(_) => Ok(()),
        }
    }

    pub fn set_render_bundle(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        ctx: &mut RecordContext,
    ) -> RendererResult<()> {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.set_render_bundle(backend, ctx),
            Renderable::Skybox(sky) => sky.set_render_bundle(backend, ctx),
        }
    }

    pub fn set_shadow_bundle(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        ctx: &mut RecordContext,
    ) -> RendererResult<()> {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.set_shadow_bundle(backend, ctx),
            // The sky casts no shadow
            Renderable::Skybox(_) => Ok(()),
        }
    }

    /// Push this frame's transforms and bone matrices
    pub fn update(&mut self, backend: &mut dyn GraphicsBackend, scene: &SceneDescription) -> RendererResult<()> {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.update(backend, scene),
            Renderable::Skybox(_) => Ok(()),
        }
    }

    pub fn render_bundle(&self) -> Option<RenderBundleHandle> {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.render_bundle(),
            Renderable::Skybox(sky) => sky.render_bundle(),
        }
    }

    pub fn shadow_bundle(&self) -> Option<RenderBundleHandle> {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.shadow_bundle(),
            Renderable::Skybox(_) => None,
        }
    }

    /// Drop recorded bundles and their bind groups
    pub fn release_bundles(&mut self, backend: &mut dyn GraphicsBackend) {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.release_bundles(backend),
            Renderable::Skybox(sky) => sky.release_bundles(backend),
        }
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        match self {
            Renderable::StaticMesh(mesh) | Renderable::SkinnedMesh(mesh) => mesh.release(backend),
            Renderable::Skybox(sky) => sky.release(backend),
        }
    }
}

/// Create one bind group per name list, in group order. A failure drops
/// the groups already built.
fn bind_groups(
    backend: &mut dyn GraphicsBackend,
    factory: &mut BindGroupFactory,
    groups: &[&[&str]],
    layouts: &[Arc<BindingLayout>],
    sources: &[&ResourceSet],
) -> RendererResult<Vec<BindGroup>> {
    let mut created = Vec::with_capacity(groups.len());
    for (names, layout) in groups.iter().zip(layouts) {
        let group = ResourceSet::gather(names, sources)
            .and_then(|instances| factory.create(backend, names, &instances, Some(layout)));
        match group {
            Ok(group) => created.push(group),
            Err(err) => {
                for group in &created {
                    group.release(backend);
                }
                return Err(err);
            }
        }
    }
    Ok(created)
}

/// Draw state shared by geometry and shadow bundles
fn draw_commands(
    pipeline: RenderPipelineHandle,
    groups: &[BindGroup],
    vertex_buffers: &[BufferHandle],
    vertices: &ResourceSet,
    element_count: u32,
    instance_count: u32,
) -> RendererResult<Vec<DrawCommand>> {
    let mut commands = vec![DrawCommand::SetPipeline(pipeline)];
    for (index, group) in groups.iter().enumerate() {
        commands.push(DrawCommand::SetBindGroup {
            index: index as u32,
            bind_group: group.handle,
        });
    }
    for (slot, buffer) in vertex_buffers.iter().enumerate() {
        commands.push(DrawCommand::SetVertexBuffer {
            slot: slot as u32,
            buffer: *buffer,
            offset: 0,
        });
    }

    let instances = 0..instance_count.max(1);
    if vertices.contains(INDEX) {
        commands.push(DrawCommand::SetIndexBuffer {
            buffer: vertices.buffer(INDEX)?,
            offset: 0,
            format: IndexFormat::Uint32,
        });
        commands.push(DrawCommand::DrawIndexed {
            indices: 0..element_count,
            base_vertex: 0,
            instances,
        });
    } else {
        commands.push(DrawCommand::Draw {
            vertices: 0..element_count,
            instances,
        });
    }
    Ok(commands)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::backend::recording::RecordingBackend;
    use crate::backend::TextureFormat;
    use crate::config::RendererConfig;
    use crate::pipeline::{GeometryPass, ShadowPass};
    use crate::resources::names::*;
    use crate::resources::{FormatRegistry, ImageSource, ResourceInputs};
    use crate::scene::{CameraUniform, LightUniform};
    use bytemuck::Zeroable;

    /// Registry, caches and global resources for recording object bundles
    pub struct Fixture {
        pub backend: RecordingBackend,
        pub registry: Arc<FormatRegistry>,
        pub cache: PipelineCache,
        pub bind_groups: BindGroupFactory,
        pub globals: ResourceSet,
        pub geometry_target: RenderBundleDescriptor,
        pub shadow_target: RenderBundleDescriptor,
    }

    impl Fixture {
        pub fn new() -> Self {
            let registry = Arc::new(FormatRegistry::with_builtin_formats(&RendererConfig::default()));
            let mut backend = RecordingBackend::new(64, 64);
            let factory = ResourceFactory::new(&registry);
            let faces = vec![ImageSource::solid_color([128, 128, 255, 255]); 6];
            let globals = factory
                .create_resources(
                    &mut backend,
                    &[CAMERA, DIRECTIONAL_LIGHT, ENV_MAP, ENV_SAMPLER],
                    &ResourceInputs::new()
                        .bytes(CAMERA, bytemuck::bytes_of(&CameraUniform::zeroed()))
                        .bytes(DIRECTIONAL_LIGHT, bytemuck::bytes_of(&LightUniform::zeroed()))
                        .images(ENV_MAP, faces),
                )
                .unwrap();
            let geometry_target = GeometryPass::bundle_descriptor(&registry).unwrap();
            assert_eq!(geometry_target.color_formats[0], TextureFormat::Rgba16Float);

            Self {
                backend,
                bind_groups: BindGroupFactory::new(registry.clone()),
                registry,
                cache: PipelineCache::new(),
                globals,
                geometry_target,
                shadow_target: ShadowPass::bundle_descriptor(),
            }
        }

        /// Run `f` with a record context over the fixture globals
        pub fn record<T>(
            &mut self,
            f: impl FnOnce(&mut RecordingBackend, &mut RecordContext) -> T,
        ) -> T {
            let sources = [&self.globals];
            let mut ctx = RecordContext {
                cache: &mut self.cache,
                bind_groups: &mut self.bind_groups,
                sources: &sources,
                light: DIRECTIONAL_LIGHT,
                geometry_target: &self.geometry_target,
                shadow_target: &self.shadow_target,
            };
            f(&mut self.backend, &mut ctx)
        }
    }
}

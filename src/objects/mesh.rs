//! Static, skinned and instanced meshes

use super::{bind_groups, draw_commands, RecordContext};
use crate::backend::{BufferHandle, CompareFunction, CullMode, GraphicsBackend, RenderBundleHandle};
use crate::error::{RendererError, RendererResult};
use crate::pipeline::{depth_state, RenderPipelineRequest};
use crate::resources::names::*;
use crate::resources::{BindGroup, ResourceFactory, ResourceInputs, ResourceSet};
use crate::scene::{MeshNode, ModelUniform, SceneDescription, Transform};
use crate::shader::{PassKind, TemplateKind};

/// GPU side of one mesh node
#[derive(Debug)]
pub struct MeshObject {
    name: String,
    /// Index of the source node in the scene
    node: usize,
    skinned: bool,
    vertex_slots: Vec<&'static str>,
    map_names: Vec<&'static str>,
    element_count: u32,
    instance_count: u32,
    bone_count: usize,

    vertices: ResourceSet,
    resources: ResourceSet,
    bind_groups: Vec<BindGroup>,
    render_bundle: Option<RenderBundleHandle>,
    shadow_bundle: Option<RenderBundleHandle>,

    // Data captured from the node until the resources exist
    pending: Option<MeshNode>,
}

impl MeshObject {
    pub fn new(node: usize, source: &MeshNode) -> Self {
        let skinned = source.is_skinned();
        let vertex_slots = source
            .mesh
            .vertex_slots()
            .into_iter()
            .filter(|slot| skinned || !matches!(*slot, SKIN_INDEX | SKIN_WEIGHT))
            .collect();
        let map_names = source.material.map_bindings().into_iter().map(|(name, _)| name).collect();

        Self {
            name: source.mesh.name.clone(),
            node,
            skinned,
            vertex_slots,
            map_names,
            element_count: source.mesh.element_count(),
            instance_count: source.instances.len() as u32,
            bone_count: source.skin.as_ref().map_or(0, |skin| skin.bone_matrices.len()),
            vertices: ResourceSet::new(),
            resources: ResourceSet::new(),
            bind_groups: Vec::new(),
            render_bundle: None,
            shadow_bundle: None,
            pending: Some(source.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> usize {
        self.node
    }

    pub fn is_skinned(&self) -> bool {
        self.skinned
    }

    pub fn is_instanced(&self) -> bool {
        self.instance_count > 0
    }

    /// Instances each draw emits
    pub fn draw_instances(&self) -> u32 {
        self.instance_count.max(1)
    }

    pub fn vertex_slots(&self) -> &[&'static str] {
        &self.vertex_slots
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn render_bundle(&self) -> Option<RenderBundleHandle> {
        self.render_bundle
    }

    pub fn shadow_bundle(&self) -> Option<RenderBundleHandle> {
        self.shadow_bundle
    }

    fn source(&self) -> RendererResult<&MeshNode> {
        self.pending.as_ref().ok_or(RendererError::InvalidState {
            operation: "initialize mesh resources",
            state: "already recorded",
        })
    }

    /// Names of the per-object group, in binding order
    fn object_group(&self) -> Vec<&'static str> {
        let mut names = vec![MODEL, MATERIAL];
        if !self.map_names.is_empty() {
            names.push(MATERIAL_SAMPLER);
            names.extend(self.map_names.iter().copied());
        }
        if self.skinned {
            names.push(BONE_MATRICES);
        }
        if self.is_instanced() {
            names.push(INSTANCE_MATRICES);
        }
        names
    }

    fn shadow_slots(&self) -> Vec<&'static str> {
        let mut slots = vec![POSITION];
        if self.skinned {
            slots.extend([SKIN_INDEX, SKIN_WEIGHT]);
        }
        slots
    }

    fn shadow_group(&self) -> Vec<&'static str> {
        let mut names = vec![MODEL];
        if self.skinned {
            names.push(BONE_MATRICES);
        }
        if self.is_instanced() {
            names.push(INSTANCE_MATRICES);
        }
        names
    }

    pub fn init_vertex_buffer(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        factory: &ResourceFactory,
    ) -> RendererResult<()> {
        let source = self.source()?;
        let mut names = self.vertex_slots.clone();
        let mut inputs = ResourceInputs::new();
        for slot in &self.vertex_slots {
            let bytes = source
                .mesh
                .slot_bytes(slot)
                .ok_or_else(|| RendererError::MissingResourceData(slot.to_string()))?;
            inputs.set_bytes(slot, bytes);
        }
        if let Some(indices) = source.mesh.index_bytes() {
            names.push(INDEX);
            inputs.set_bytes(INDEX, indices);
        }

        self.vertices = factory.create_resources(backend, &names, &inputs)?;
        log::debug!(
            "Mesh '{}': {} vertex buffer(s), {} elements",
            self.name,
            self.vertex_slots.len(),
            self.element_count
        );
        Ok(())
    }

    pub fn init_group_resource(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        factory: &ResourceFactory,
    ) -> RendererResult<()> {
        let source = self.source()?;
        let names = self.object_group();

        let mut inputs = ResourceInputs::new()
            .bytes(MODEL, bytemuck::bytes_of(&source.transform.uniform_data()))
            .bytes(MATERIAL, bytemuck::bytes_of(&source.material.uniform_data()));
        for (name, images) in source.material.map_bindings() {
            inputs.set_images(name, images);
        }
        if let Some(skin) = source.skin.as_ref().filter(|_| self.skinned) {
            inputs.set_bytes(BONE_MATRICES, bytemuck::cast_slice::<_, u8>(&skin.skinning_matrices()));
        }
        if self.is_instanced() {
            inputs.set_bytes(INSTANCE_MATRICES, instance_bytes(&source.instances));
        }

        self.resources = factory.create_resources(backend, &names, &inputs)?;
        Ok(())
    }

    pub fn set_render_bundle(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        ctx: &mut RecordContext,
    ) -> RendererResult<()> {
        let globals = [CAMERA, ctx.light];
        let object = self.object_group();
        let groups: [&[&str]; 2] = [&globals, &object];
        let label = format!("{} Geometry", self.name);

        let pipeline = ctx.cache.render_pipeline(
            backend,
            ctx.bind_groups,
            &RenderPipelineRequest {
                label: &label,
                template: TemplateKind::Mesh,
                pass: PassKind::Render,
                vertex_slots: &self.vertex_slots,
                groups: &groups,
                color_targets: ctx.geometry_target.color_formats.clone(),
                depth: Some(depth_state(CompareFunction::Less, true)),
                cull_mode: CullMode::Back,
            },
        )?;

        let mut sources = ctx.sources.to_vec();
        sources.push(&self.resources);
        let groups = bind_groups(backend, ctx.bind_groups, &groups, &pipeline.layouts, &sources)?;
        let first = self.bind_groups.len();
        self.bind_groups.extend(groups);

        let buffers = self.slot_buffers(&self.vertex_slots)?;
        let commands = draw_commands(
            pipeline.handle,
            &self.bind_groups[first..],
            &buffers,
            &self.vertices,
            self.element_count,
            self.draw_instances(),
        )?;
        self.render_bundle = Some(backend.create_render_bundle(ctx.geometry_target, &commands)?);
        Ok(())
    }

    pub fn set_shadow_bundle(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        ctx: &mut RecordContext,
    ) -> RendererResult<()> {
        let light = [ctx.light];
        let object = self.shadow_group();
        let groups: [&[&str]; 2] = [&light, &object];
        let slots = self.shadow_slots();
        let label = format!("{} Shadow", self.name);

        let pipeline = ctx.cache.render_pipeline(
            backend,
            ctx.bind_groups,
            &RenderPipelineRequest {
                label: &label,
                template: TemplateKind::Mesh,
                pass: PassKind::Shadow,
                vertex_slots: &slots,
                groups: &groups,
                color_targets: Vec::new(),
                depth: Some(depth_state(CompareFunction::Less, true)),
                cull_mode: CullMode::Back,
            },
        )?;

        let mut sources = ctx.sources.to_vec();
        sources.push(&self.resources);
        let groups = bind_groups(backend, ctx.bind_groups, &groups, &pipeline.layouts, &sources)?;
        let first = self.bind_groups.len();
        self.bind_groups.extend(groups);

        let buffers = self.slot_buffers(&slots)?;
        let commands = draw_commands(
            pipeline.handle,
            &self.bind_groups[first..],
            &buffers,
            &self.vertices,
            self.element_count,
            self.draw_instances(),
        )?;
        self.shadow_bundle = Some(backend.create_render_bundle(ctx.shadow_target, &commands)?);

        // Both bundles exist, later frames read the scene directly
        if self.render_bundle.is_some() {
            self.pending = None;
        }
        Ok(())
    }

    fn slot_buffers(&self, slots: &[&str]) -> RendererResult<Vec<BufferHandle>> {
        slots.iter().map(|slot| self.vertices.buffer(slot)).collect()
    }

    /// Rewrite model, bone and instance buffers from the scene node
    pub fn update(&mut self, backend: &mut dyn GraphicsBackend, scene: &SceneDescription) -> RendererResult<()> {
        let Some(node) = scene.mesh(self.node) else {
            return Err(RendererError::IncompleteScene { missing: "mesh node" });
        };

        let model = node.transform.uniform_data();
        backend.write_buffer(self.resources.buffer(MODEL)?, 0, bytemuck::bytes_of(&model));

        if self.skinned {
            if let Some(skin) = &node.skin {
                if skin.bone_matrices.len() == self.bone_count {
                    let bones = skin.skinning_matrices();
                    backend.write_buffer(self.resources.buffer(BONE_MATRICES)?, 0, bytemuck::cast_slice(&bones));
                } else {
                    log::warn!(
                        "Mesh '{}': skeleton changed from {} to {} bones, keeping the old pose",
                        self.name,
                        self.bone_count,
                        skin.bone_matrices.len()
                    );
                }
            }
        }

        if self.is_instanced() {
            if node.instances.len() as u32 == self.instance_count {
                backend.write_buffer(
                    self.resources.buffer(INSTANCE_MATRICES)?,
                    0,
                    &instance_bytes(&node.instances),
                );
            } else {
                log::warn!(
                    "Mesh '{}': instance count changed from {} to {}, recreate the object to resize",
                    self.name,
                    self.instance_count,
                    node.instances.len()
                );
            }
        }
        Ok(())
    }

    /// Drop both bundles and their bind groups, keeping the buffers
    pub fn release_bundles(&mut self, backend: &mut dyn GraphicsBackend) {
        for bundle in self.render_bundle.take().into_iter().chain(self.shadow_bundle.take()) {
            backend.destroy_render_bundle(bundle);
        }
        for group in self.bind_groups.drain(..) {
            group.release(backend);
        }
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.release_bundles(backend);
        self.vertices.release(backend);
        self.resources.release(backend);
    }
}

fn instance_bytes(instances: &[Transform]) -> Vec<u8> {
    let data: Vec<ModelUniform> = instances.iter().map(|instance| instance.uniform_data()).collect();
    bytemuck::cast_slice(&data).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::TraceEvent;
    use crate::backend::DrawCommand;
    use crate::objects::test_support::Fixture;
    use crate::resources::{ImageSource, Material, MeshData};
    use crate::scene::Skin;
    use glam::{Vec3, Vec4};

    fn record(fixture: &mut Fixture, node: &MeshNode) -> MeshObject {
        let mut object = MeshObject::new(0, node);
        let registry = fixture.registry.clone();
        let factory = ResourceFactory::new(&registry);
        object.init_vertex_buffer(&mut fixture.backend, &factory).unwrap();
        object.init_group_resource(&mut fixture.backend, &factory).unwrap();
        fixture
            .record(|backend, ctx| {
                object.set_render_bundle(backend, ctx)?;
                object.set_shadow_bundle(backend, ctx)
            })
            .unwrap();
        object
    }

    fn bundle_commands(fixture: &Fixture, bundle: RenderBundleHandle) -> Vec<DrawCommand> {
        fixture
            .backend
            .events()
            .iter()
            .find_map(|e| match e {
                TraceEvent::CreateRenderBundle { handle, commands, .. } if *handle == bundle => Some(commands.clone()),
                _ => None,
            })
            .unwrap()
    }

    fn skinned_cube() -> MeshNode {
        let mesh = MeshData::cube();
        let count = mesh.positions.len();
        let mesh = mesh.with_skin(vec![[0, 1, 0, 0]; count], vec![Vec4::new(0.5, 0.5, 0.0, 0.0); count]);
        MeshNode::new(mesh, Material::default()).with_skin(Skin::new(2))
    }

    #[test]
    fn test_static_mesh_records_both_bundles() {
        let mut fixture = Fixture::new();
        let node = MeshNode::new(MeshData::cube(), Material::plastic(Vec3::ONE));
        let object = record(&mut fixture, &node);

        let geometry = bundle_commands(&fixture, object.render_bundle().unwrap());
        assert!(matches!(geometry.last(), Some(DrawCommand::DrawIndexed { indices, instances, .. })
            if *indices == (0..36) && *instances == (0..1)));
        // position, normal, uv, tangent
        let vertex_buffers = geometry
            .iter()
            .filter(|c| matches!(c, DrawCommand::SetVertexBuffer { .. }))
            .count();
        assert_eq!(vertex_buffers, 4);

        let shadow = bundle_commands(&fixture, object.shadow_bundle().unwrap());
        let shadow_buffers = shadow
            .iter()
            .filter(|c| matches!(c, DrawCommand::SetVertexBuffer { .. }))
            .count();
        assert_eq!(shadow_buffers, 1);
        assert_eq!(
            fixture
                .backend
                .count(|e| matches!(e, TraceEvent::CreateRenderPipeline { .. })),
            2
        );
    }

    #[test]
    fn test_identical_meshes_share_pipelines() {
        let mut fixture = Fixture::new();
        let node = MeshNode::new(MeshData::uv_sphere(8, 4), Material::gold());
        record(&mut fixture, &node);
        record(&mut fixture, &node.clone().with_position(Vec3::X));

        assert_eq!(fixture.cache.len(), 2);
    }

    #[test]
    fn test_skinned_mesh_binds_bones_in_both_passes() {
        let mut fixture = Fixture::new();
        let object = record(&mut fixture, &skinned_cube());

        assert!(object.is_skinned());
        assert!(object.vertex_slots().contains(&SKIN_INDEX));
        assert!(object.resources().contains(BONE_MATRICES));
        let shadow = bundle_commands(&fixture, object.shadow_bundle().unwrap());
        let shadow_buffers = shadow
            .iter()
            .filter(|c| matches!(c, DrawCommand::SetVertexBuffer { .. }))
            .count();
        assert_eq!(shadow_buffers, 3);
    }

    #[test]
    fn test_skin_attributes_without_skeleton_stay_static() {
        let mut node = skinned_cube();
        node.skin = None;
        let object = MeshObject::new(0, &node);
        assert!(!object.is_skinned());
        assert!(!object.vertex_slots().contains(&SKIN_WEIGHT));
    }

    #[test]
    fn test_instanced_mesh_draws_every_instance() {
        let mut fixture = Fixture::new();
        let instances = (0..5).map(|i| Transform::from_position(Vec3::X * i as f32)).collect();
        let node = MeshNode::new(MeshData::cube(), Material::default()).with_instances(instances);
        let object = record(&mut fixture, &node);

        assert!(object.resources().contains(INSTANCE_MATRICES));
        for bundle in [object.render_bundle().unwrap(), object.shadow_bundle().unwrap()] {
            let commands = bundle_commands(&fixture, bundle);
            assert!(matches!(commands.last(), Some(DrawCommand::DrawIndexed { instances, .. }) if *instances == (0..5)));
        }
    }

    #[test]
    fn test_material_maps_join_the_object_group() {
        let mut fixture = Fixture::new();
        let material = Material::default()
            .with_base_map(ImageSource::checkerboard(4, [255; 4], [0, 0, 0, 255]))
            .with_roughness_map(ImageSource::white());
        let object = record(&mut fixture, &MeshNode::new(MeshData::cube(), material));

        for name in [MATERIAL_SAMPLER, BASE_MAP, ROUGHNESS_MAP] {
            assert!(object.resources().contains(name), "{name}");
        }
        assert!(!object.resources().contains(NORMAL_MAP));
    }

    #[test]
    fn test_update_rewrites_model_and_bones() {
        let mut fixture = Fixture::new();
        let mut scene = SceneDescription::new();
        let index = scene.add_mesh(skinned_cube());
        let mut object = MeshObject::new(index, scene.mesh(index).unwrap());
        let registry = fixture.registry.clone();
        let factory = ResourceFactory::new(&registry);
        object.init_vertex_buffer(&mut fixture.backend, &factory).unwrap();
        object.init_group_resource(&mut fixture.backend, &factory).unwrap();

        fixture.backend.clear_events();
        object.update(&mut fixture.backend, &scene).unwrap();
        assert_eq!(fixture.backend.count(|e| matches!(e, TraceEvent::WriteBuffer { .. })), 2);

        // A resized skeleton keeps the old pose
        scene.mesh_mut(index).unwrap().skin = Some(Skin::new(7));
        fixture.backend.clear_events();
        object.update(&mut fixture.backend, &scene).unwrap();
        assert_eq!(fixture.backend.count(|e| matches!(e, TraceEvent::WriteBuffer { .. })), 1);
    }

    #[test]
    fn test_update_with_missing_node_fails() {
        let mut fixture = Fixture::new();
        let node = MeshNode::new(MeshData::cube(), Material::default());
        let mut object = record(&mut fixture, &node);
        let err = object.update(&mut fixture.backend, &SceneDescription::new()).unwrap_err();
        assert!(matches!(err, RendererError::IncompleteScene { .. }));
    }

    #[test]
    fn test_release_destroys_owned_buffers() {
        let mut fixture = Fixture::new();
        let node = MeshNode::new(MeshData::cube(), Material::default());
        let mut object = record(&mut fixture, &node);
        let before = fixture.backend.live_buffer_count();

        object.release(&mut fixture.backend);
        // position, normal, uv, tangent, index, model, material
        assert_eq!(before - fixture.backend.live_buffer_count(), 7);
        assert!(object.render_bundle().is_none());
        assert_eq!(fixture.backend.live_bundle_count(), 0);
        assert_eq!(fixture.backend.live_bind_group_count(), 0);
    }
}

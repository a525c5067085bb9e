//! Render graph controller
//!
//! Drives one scene through its lifecycle:
//!
//! ```text
//! Uninitialized -> SceneBound -> ResourcesInitialized -> PassesRecorded -> Running
//! ```
//!
//! Binding validates the scene and builds the object list. Initialization
//! allocates every object, global and G-buffer resource and runs the IBL
//! precompute. Recording builds pipelines and freezes each object into its
//! shadow and geometry bundles. From then on a frame is `update` (buffer
//! writes only) followed by `draw` (bundle replay and post-process passes).

use crate::backend::{GraphicsBackend, RenderBundleHandle, TextureViewDescriptor};
use crate::config::RendererConfig;
use crate::error::{RendererError, RendererResult};
use crate::ibl::{precompute, IblResources};
use crate::objects::{MeshObject, RecordContext, Renderable, SkyboxObject};
use crate::pipeline::{
    build_deferred_graph, GeometryPass, LightingPass, PipelineCache, ShadowPass, ToneMappingUniform,
    TonemappingPass,
};
use crate::render_graph::{CompiledGraph, RenderGraph, RenderGraphExecutor};
use crate::resources::names::*;
use crate::resources::{
    BindGroupFactory, FormatRegistry, ImageSource, ResourceFactory, ResourceInputs, ResourceSet,
};
use crate::scene::{Camera, Light, SceneDescription};
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle state of a [`RenderGraphController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    SceneBound,
    ResourcesInitialized,
    PassesRecorded,
    Running,
}

impl RendererState {
    pub fn as_str(self) -> &'static str {
        match self {
            RendererState::Uninitialized => "uninitialized",
            RendererState::SceneBound => "scene bound",
            RendererState::ResourcesInitialized => "resources initialized",
            RendererState::PassesRecorded => "passes recorded",
            RendererState::Running => "running",
        }
    }

    fn is_recorded(self) -> bool {
        matches!(self, RendererState::PassesRecorded | RendererState::Running)
    }
}

/// G-buffer attachments plus the post-process inputs that follow the
/// surface size
const GBUFFER_SET: [&str; 7] = [
    GBUFFER_NORMAL,
    GBUFFER_MATERIAL,
    GBUFFER_BASE_COLOR,
    GBUFFER_DEPTH,
    HDR_COLOR,
    POST_SAMPLER,
    TONE_MAPPING,
];

/// Textures the frame graph attaches by name
const ATTACHMENTS: [&str; 6] = [
    SHADOW_MAP,
    GBUFFER_NORMAL,
    GBUFFER_MATERIAL,
    GBUFFER_BASE_COLOR,
    GBUFFER_DEPTH,
    HDR_COLOR,
];

/// The single camera and light of a scene
fn scene_singletons(scene: &SceneDescription) -> RendererResult<(&Camera, &Light)> {
    let cameras: Vec<&Camera> = scene.cameras().collect();
    let lights: Vec<&Light> = scene.lights().collect();

    if cameras.len() > 1 {
        return Err(RendererError::AmbiguousSceneGraph {
            kind: "camera",
            count: cameras.len(),
        });
    }
    if lights.len() > 1 {
        return Err(RendererError::AmbiguousSceneGraph {
            kind: "light",
            count: lights.len(),
        });
    }
    match (cameras.first(), lights.first()) {
        (None, _) => Err(RendererError::IncompleteScene { missing: "camera" }),
        (_, None) => Err(RendererError::IncompleteScene { missing: "light" }),
        (Some(camera), Some(light)) => Ok((camera, light)),
    }
}

/// Environment outputs of the IBL precompute
fn environment_set<'a>(ibl: &'a Option<IblResources>, operation: &'static str) -> RendererResult<&'a ResourceSet> {
    ibl.as_ref()
        .map(|ibl| &ibl.resources)
        .ok_or(RendererError::InvalidState {
            operation,
            state: "missing environment",
        })
}

/// Owns the objects, the shared resource sets and the frame graph
pub struct RenderGraphController {
    config: RendererConfig,
    registry: Arc<FormatRegistry>,
    bind_groups: BindGroupFactory,
    cache: PipelineCache,
    state: RendererState,

    objects: Vec<Renderable>,
    camera: Option<Camera>,
    light: Option<Light>,
    environment: Vec<ImageSource>,

    globals: ResourceSet,
    gbuffer: ResourceSet,
    ibl: Option<IblResources>,

    graph: Option<(RenderGraph, CompiledGraph)>,
    executor: RenderGraphExecutor,
    frame_count: u64,
}

impl RenderGraphController {
    pub fn new(config: RendererConfig) -> Self {
        let registry = Arc::new(FormatRegistry::with_builtin_formats(&config));
        Self {
            bind_groups: BindGroupFactory::new(registry.clone()),
            registry,
            config,
            cache: PipelineCache::new(),
            state: RendererState::Uninitialized,
            objects: Vec::new(),
            camera: None,
            light: None,
            environment: Vec::new(),
            globals: ResourceSet::new(),
            gbuffer: ResourceSet::new(),
            ibl: None,
            graph: None,
            executor: RenderGraphExecutor::new(),
            frame_count: 0,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn objects(&self) -> &[Renderable] {
        &self.objects
    }

    pub fn ibl(&self) -> Option<&IblResources> {
        self.ibl.as_ref()
    }

    pub fn globals(&self) -> &ResourceSet {
        &self.globals
    }

    pub fn gbuffer(&self) -> &ResourceSet {
        &self.gbuffer
    }

    pub fn graph(&self) -> Option<&RenderGraph> {
        self.graph.as_ref().map(|(graph, _)| graph)
    }

    pub fn pipeline_count(&self) -> usize {
        self.cache.len()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn expect_state(&self, expected: RendererState, operation: &'static str) -> RendererResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RendererError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    fn expect_recorded(&self, operation: &'static str) -> RendererResult<()> {
        if self.state.is_recorded() {
            Ok(())
        } else {
            Err(RendererError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    /// Registered name of the bound light uniform
    fn light_name(&self) -> RendererResult<&'static str> {
        self.light
            .as_ref()
            .map(Light::resource_name)
            .ok_or(RendererError::NoLightBound)
    }

    /// Validate the scene and wrap every mesh node into an object. The
    /// skybox is always last.
    pub fn bind_scene(&mut self, scene: &SceneDescription) -> RendererResult<()> {
        self.expect_state(RendererState::Uninitialized, "bind a scene")?;
        let (camera, light) = scene_singletons(scene)?;

        let mut objects: Vec<Renderable> = scene
            .meshes()
            .map(|(index, node)| {
                let object = MeshObject::new(index, node);
                if object.is_skinned() {
                    Renderable::SkinnedMesh(object)
                } else {
                    Renderable::StaticMesh(object)
                }
            })
            .collect();
        objects.push(Renderable::Skybox(SkyboxObject::new()));

        self.camera = Some(camera.clone());
        self.light = Some(light.clone());
        self.environment = scene.environment.clone();
        self.objects = objects;
        self.state = RendererState::SceneBound;

        log::info!(
            "Scene bound: {} object(s), {} light",
            self.objects.len(),
            self.light_name()?
        );
        Ok(())
    }

    /// Allocate object, global and G-buffer resources, then run the IBL
    /// precompute once. A failure destroys whatever was allocated and
    /// leaves the scene bound.
    pub fn initialize_resources(&mut self, backend: &mut dyn GraphicsBackend) -> RendererResult<()> {
        self.expect_state(RendererState::SceneBound, "initialize resources")?;
        let start = Instant::now();
        if let Err(err) = self.allocate(backend) {
            self.release_resources(backend);
            return Err(err);
        }

        self.state = RendererState::ResourcesInitialized;
        log::info!("Resources initialized in {:.2?}", start.elapsed());
        Ok(())
    }

    fn allocate(&mut self, backend: &mut dyn GraphicsBackend) -> RendererResult<()> {
        let registry = self.registry.clone();
        let factory = ResourceFactory::new(&registry);

        for object in &mut self.objects {
            object.init_vertex_buffer(backend, &factory)?;
            object.init_group_resource(backend, &factory)?;
        }

        let light_name = self.light_name()?;
        let (camera, light) = match (&self.camera, &self.light) {
            (Some(camera), Some(light)) => (camera.uniform_data(), light.uniform_data(&self.config.shadow)),
            _ => return Err(RendererError::IncompleteScene { missing: "camera" }),
        };
        self.globals = factory.create_resources(
            backend,
            &[CAMERA, light_name, SHADOW_MAP, SHADOW_SAMPLER],
            &ResourceInputs::new()
                .bytes(CAMERA, bytemuck::bytes_of(&camera))
                .bytes(light_name, bytemuck::bytes_of(&light)),
        )?;

        let (width, height) = backend.surface_size();
        self.gbuffer = self.create_gbuffer(backend, &factory, width, height)?;

        let ibl = precompute(
            backend,
            &registry,
            &mut self.cache,
            &mut self.bind_groups,
            &self.config.ibl,
            &self.environment,
        )?;
        self.ibl = Some(ibl);
        Ok(())
    }

    fn create_gbuffer(
        &self,
        backend: &mut dyn GraphicsBackend,
        factory: &ResourceFactory,
        width: u32,
        height: u32,
    ) -> RendererResult<ResourceSet> {
        let tone_mapping = ToneMappingUniform::new(&self.config.tone_mapping, backend.surface_format());
        let mut inputs = ResourceInputs::new().bytes(TONE_MAPPING, bytemuck::bytes_of(&tone_mapping));
        for name in &GBUFFER_SET[..5] {
            inputs = inputs.extent(name, width, height);
        }
        log::debug!("Creating G-buffer at {}x{}", width, height);
        factory.create_resources(backend, &GBUFFER_SET, &inputs)
    }

    /// Build every pipeline, record the object bundles and compile the
    /// frame graph. A failure drops every bundle and view recorded so far.
    pub fn record_passes(&mut self, backend: &mut dyn GraphicsBackend) -> RendererResult<()> {
        self.expect_state(RendererState::ResourcesInitialized, "record passes")?;
        let graph = self
            .bind_attachments(backend)
            .and_then(|()| self.record_graph(backend));
        match graph {
            Ok(graph) => self.graph = Some(graph),
            Err(err) => {
                self.executor.release(backend);
                for object in &mut self.objects {
                    object.release_bundles(backend);
                }
                return Err(err);
            }
        }

        self.state = RendererState::PassesRecorded;
        log::info!(
            "Recorded {} object(s) with {} pipeline(s)",
            self.objects.len(),
            self.cache.len()
        );
        Ok(())
    }

    fn record_graph(&mut self, backend: &mut dyn GraphicsBackend) -> RendererResult<(RenderGraph, CompiledGraph)> {
        let light = self.light_name()?;
        let geometry_target = GeometryPass::bundle_descriptor(&self.registry)?;
        let shadow_target = ShadowPass::bundle_descriptor();

        let ibl = environment_set(&self.ibl, "record passes")?;
        let sources = [&self.globals, ibl];
        let mut ctx = RecordContext {
            cache: &mut self.cache,
            bind_groups: &mut self.bind_groups,
            sources: &sources,
            light,
            geometry_target: &geometry_target,
            shadow_target: &shadow_target,
        };

        let mut shadow_bundles: Vec<RenderBundleHandle> = Vec::new();
        let mut geometry_bundles: Vec<RenderBundleHandle> = Vec::new();
        for object in &mut self.objects {
            object.set_shadow_bundle(backend, &mut ctx)?;
            object.set_render_bundle(backend, &mut ctx)?;
            shadow_bundles.extend(object.shadow_bundle());
            geometry_bundles.extend(object.render_bundle());
        }

        let (lighting, tonemapping) = self.post_passes(backend)?;
        build_deferred_graph(
            ShadowPass::new(shadow_bundles, self.config.shadow.map_size),
            GeometryPass::new(geometry_bundles, self.config.clear_color),
            lighting,
            tonemapping,
        )
    }

    /// Lighting and tone mapping over the current G-buffer
    fn post_passes(&mut self, backend: &mut dyn GraphicsBackend) -> RendererResult<(LightingPass, TonemappingPass)> {
        let light = self.light_name()?;
        let ibl = environment_set(&self.ibl, "build post passes")?;
        let mut lighting = LightingPass::new(
            backend,
            &mut self.cache,
            &mut self.bind_groups,
            light,
            self.config.ibl.energy_compensation,
            &[&self.globals, &self.gbuffer, ibl],
        )?;
        match TonemappingPass::new(backend, &mut self.cache, &mut self.bind_groups, &[&self.gbuffer]) {
            Ok(tonemapping) => Ok((lighting, tonemapping)),
            Err(err) => {
                lighting.release(backend);
                Err(err)
            }
        }
    }

    /// Bind groups of the passes that sample size-dependent targets
    fn release_post_passes(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some((graph, _)) = &mut self.graph {
            if let Some(pass) = graph.pass_mut::<LightingPass>() {
                pass.release(backend);
            }
            if let Some(pass) = graph.pass_mut::<TonemappingPass>() {
                pass.release(backend);
            }
        }
    }

    fn bind_attachments(&mut self, backend: &mut dyn GraphicsBackend) -> RendererResult<()> {
        self.executor.release(backend);
        for name in ATTACHMENTS {
            let texture = if name == SHADOW_MAP {
                self.globals.texture(name)?
            } else {
                self.gbuffer.texture(name)?
            };
            let mut desc = TextureViewDescriptor::default();
            desc.label = Some(name.to_string());
            let view = backend.create_texture_view(texture, &desc)?;
            self.executor.set_view(name, view);
        }
        Ok(())
    }

    /// Bind, initialize and record in one call
    pub fn prepare(&mut self, backend: &mut dyn GraphicsBackend, scene: &SceneDescription) -> RendererResult<()> {
        self.bind_scene(scene)?;
        self.initialize_resources(backend)?;
        self.record_passes(backend)
    }

    /// Write this frame's camera, light and object data
    pub fn update(&mut self, backend: &mut dyn GraphicsBackend, scene: &SceneDescription) -> RendererResult<()> {
        self.expect_recorded("update")?;
        let (camera, light) = scene_singletons(scene)?;
        let light_name = self.light_name()?;
        if light.resource_name() != light_name {
            return Err(RendererError::InvalidState {
                operation: "switch the light model",
                state: self.state.as_str(),
            });
        }

        let camera_data = camera.uniform_data();
        backend.write_buffer(self.globals.buffer(CAMERA)?, 0, bytemuck::bytes_of(&camera_data));
        let light_data = light.uniform_data(&self.config.shadow);
        backend.write_buffer(self.globals.buffer(light_name)?, 0, bytemuck::bytes_of(&light_data));

        for object in &mut self.objects {
            object.update(backend, scene)?;
        }
        Ok(())
    }

    /// Replay the frame graph into one submission
    pub fn draw(&mut self, backend: &mut dyn GraphicsBackend) -> RendererResult<()> {
        self.expect_recorded("draw")?;
        let Some((graph, compiled)) = &self.graph else {
            return Err(RendererError::InvalidState {
                operation: "draw",
                state: "missing frame graph",
            });
        };
        self.executor.execute(graph, compiled, backend)?;

        if self.state == RendererState::PassesRecorded {
            log::info!("First frame drawn");
        }
        self.state = RendererState::Running;
        self.frame_count += 1;
        Ok(())
    }

    /// Recreate the size-dependent resources and the passes that bind them.
    /// Object bundles are kept.
    pub fn resize(&mut self, backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> RendererResult<()> {
        self.expect_recorded("resize")?;
        if width == 0 || height == 0 {
            return Ok(());
        }
        backend.resize(width, height);
        let (width, height) = backend.surface_size();

        let registry = self.registry.clone();
        let factory = ResourceFactory::new(&registry);
        self.release_post_passes(backend);
        self.gbuffer.release(backend);
        self.gbuffer = self.create_gbuffer(backend, &factory, width, height)?;

        let (lighting, tonemapping) = self.post_passes(backend)?;
        if let Some((graph, _)) = &mut self.graph {
            if let Some(pass) = graph.pass_mut::<LightingPass>() {
                *pass = lighting;
            }
            if let Some(pass) = graph.pass_mut::<TonemappingPass>() {
                *pass = tonemapping;
            }
        }
        self.bind_attachments(backend)?;

        log::info!("Resized to {}x{}", width, height);
        Ok(())
    }

    /// Destroy every GPU object the controller created except the cached
    /// pipelines and layouts, and return to `Uninitialized`
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.release_resources(backend);
        self.objects.clear();
        self.camera = None;
        self.light = None;
        self.state = RendererState::Uninitialized;
        log::debug!("Renderer released");
    }

    /// Destroy everything allocated since the scene was bound. Objects stay
    /// in the list without GPU state.
    fn release_resources(&mut self, backend: &mut dyn GraphicsBackend) {
        self.release_post_passes(backend);
        self.graph = None;
        self.executor.release(backend);
        for object in &mut self.objects {
            object.release(backend);
        }
        self.globals.release(backend);
        self.gbuffer.release(backend);
        if let Some(mut ibl) = self.ibl.take() {
            ibl.resources.release(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;
    use crate::resources::{Material, MeshData};
    use crate::scene::{DirectionalLight, MeshNode, PointLight};
    use glam::Vec3;

    fn small_config() -> RendererConfig {
        let mut config = RendererConfig::default().with_size(32, 32);
        config.ibl.diffuse_size = 8;
        config.ibl.lut_size = 8;
        config.ibl.emu_size = 8;
        config.shadow.map_size = 64;
        config
    }

    fn scene() -> SceneDescription {
        let mut scene = SceneDescription::new();
        scene.add_camera(Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO));
        scene.add_light(Light::Directional(DirectionalLight::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::ONE,
            3.0,
        )));
        scene.add_mesh(MeshNode::new(MeshData::cube(), Material::default()));
        scene
    }

    #[test]
    fn test_states_advance_in_order() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut controller = RenderGraphController::new(small_config());
        assert_eq!(controller.state(), RendererState::Uninitialized);

        controller.bind_scene(&scene()).unwrap();
        assert_eq!(controller.state(), RendererState::SceneBound);
        controller.initialize_resources(&mut backend).unwrap();
        assert_eq!(controller.state(), RendererState::ResourcesInitialized);
        controller.record_passes(&mut backend).unwrap();
        assert_eq!(controller.state(), RendererState::PassesRecorded);
        controller.draw(&mut backend).unwrap();
        assert_eq!(controller.state(), RendererState::Running);
        assert_eq!(controller.frame_count(), 1);
    }

    #[test]
    fn test_out_of_order_calls_fail() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut controller = RenderGraphController::new(small_config());

        let err = controller.draw(&mut backend).unwrap_err();
        assert_eq!(
            err,
            RendererError::InvalidState {
                operation: "draw",
                state: "uninitialized",
            }
        );
        assert!(controller.record_passes(&mut backend).is_err());

        controller.bind_scene(&scene()).unwrap();
        assert!(matches!(
            controller.bind_scene(&scene()),
            Err(RendererError::InvalidState { state: "scene bound", .. })
        ));
    }

    #[test]
    fn test_scene_needs_a_camera() {
        let mut scene = SceneDescription::new();
        scene.add_light(Light::Point(PointLight::new(Vec3::Y, Vec3::ONE, 1.0)));
        let mut controller = RenderGraphController::new(small_config());
        assert_eq!(
            controller.bind_scene(&scene).unwrap_err(),
            RendererError::IncompleteScene { missing: "camera" }
        );
        assert_eq!(controller.state(), RendererState::Uninitialized);
    }

    #[test]
    fn test_two_lights_are_ambiguous() {
        let mut scene = scene();
        scene.add_light(Light::Point(PointLight::new(Vec3::Y, Vec3::ONE, 1.0)));
        let mut controller = RenderGraphController::new(small_config());
        assert_eq!(
            controller.bind_scene(&scene).unwrap_err(),
            RendererError::AmbiguousSceneGraph { kind: "light", count: 2 }
        );
    }

    #[test]
    fn test_light_model_is_fixed_at_bind_time() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut controller = RenderGraphController::new(small_config());
        let mut scene = scene();
        controller.prepare(&mut backend, &scene).unwrap();

        for node in &mut scene.nodes {
            if let crate::scene::SceneNode::Light(light) = node {
                *light = Light::Point(PointLight::new(Vec3::Y, Vec3::ONE, 1.0));
            }
        }
        assert!(matches!(
            controller.update(&mut backend, &scene),
            Err(RendererError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_resize_keeps_bundles() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut controller = RenderGraphController::new(small_config());
        controller.prepare(&mut backend, &scene()).unwrap();
        let bundles: Vec<_> = controller.objects().iter().map(|o| o.render_bundle()).collect();
        let hdr = controller.gbuffer().texture(HDR_COLOR).unwrap();

        controller.resize(&mut backend, 64, 48).unwrap();

        let after: Vec<_> = controller.objects().iter().map(|o| o.render_bundle()).collect();
        assert_eq!(bundles, after);
        assert!(!backend.is_texture_alive(hdr));
        let new_hdr = controller.gbuffer().texture(HDR_COLOR).unwrap();
        assert_eq!(backend.texture_descriptor(new_hdr).map(|d| (d.width, d.height)), Some((64, 48)));
        controller.draw(&mut backend).unwrap();
    }

    #[test]
    fn test_release_returns_to_uninitialized() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut controller = RenderGraphController::new(small_config());
        controller.prepare(&mut backend, &scene()).unwrap();
        controller.draw(&mut backend).unwrap();

        controller.release(&mut backend);
        assert_eq!(controller.state(), RendererState::Uninitialized);
        assert_eq!(live_objects(&backend), [0; 6]);
        controller.prepare(&mut backend, &scene()).unwrap();
    }

    /// Textures, buffers, samplers, views, bind groups and bundles
    fn live_objects(backend: &RecordingBackend) -> [usize; 6] {
        [
            backend.live_texture_count(),
            backend.live_buffer_count(),
            backend.live_sampler_count(),
            backend.live_view_count(),
            backend.live_bind_group_count(),
            backend.live_bundle_count(),
        ]
    }

    #[test]
    fn test_repeated_resizes_do_not_grow_the_backend() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut controller = RenderGraphController::new(small_config());
        controller.prepare(&mut backend, &scene()).unwrap();
        let live = live_objects(&backend);

        for size in [48, 64, 16] {
            controller.resize(&mut backend, size, size).unwrap();
            assert_eq!(live_objects(&backend), live);
        }
        controller.draw(&mut backend).unwrap();
    }

    #[test]
    fn test_failed_initialization_releases_partial_allocations() {
        let mut backend = RecordingBackend::new(32, 32);
        backend.fail_pipelines_matching("BRDF LUT");
        let mut controller = RenderGraphController::new(small_config());
        controller.bind_scene(&scene()).unwrap();

        let err = controller.initialize_resources(&mut backend).unwrap_err();
        assert!(matches!(err, RendererError::PipelineBuildFailure { .. }));
        assert_eq!(controller.state(), RendererState::SceneBound);
        assert_eq!(live_objects(&backend), [0; 6]);
        assert!(controller.globals().is_empty());
        assert!(controller.gbuffer().is_empty());
    }

    #[test]
    fn test_failed_recording_drops_bundles() {
        let mut backend = RecordingBackend::new(32, 32);
        backend.fail_pipelines_matching("Tonemapping");
        let mut controller = RenderGraphController::new(small_config());
        controller.bind_scene(&scene()).unwrap();
        controller.initialize_resources(&mut backend).unwrap();

        assert!(controller.record_passes(&mut backend).is_err());
        assert_eq!(controller.state(), RendererState::ResourcesInitialized);
        assert_eq!(backend.live_bundle_count(), 0);
        assert_eq!(backend.live_bind_group_count(), 0);
        assert_eq!(backend.live_view_count(), 0);
    }

    #[test]
    fn test_lighting_before_shadow_is_a_hazard() {
        let mut backend = RecordingBackend::new(32, 32);
        let mut controller = RenderGraphController::new(small_config());
        controller.prepare(&mut backend, &scene()).unwrap();
        backend.clear_events();
        controller.draw(&mut backend).unwrap();
        assert_eq!(backend.hazards(), Vec::new());

        if let Some((_, compiled)) = &mut controller.graph {
            compiled.pass_order.reverse();
        }
        backend.clear_events();
        controller.draw(&mut backend).unwrap();

        let shadow_map = controller.globals().texture(SHADOW_MAP).unwrap();
        let hazards = backend.hazards();
        assert!(
            hazards.iter().any(|h| h.texture == shadow_map
                && h.reader.as_deref() == Some("Deferred Lighting Pass")
                && h.writer.as_deref() == Some("Shadow Pass")),
            "{hazards:?}"
        );
    }
}

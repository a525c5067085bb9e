//! End-to-end tests for the render graph controller.
//!
//! Most tests drive the controller against the recording backend and inspect
//! the captured trace. The GPU test at the end is ignored by default and
//! skips itself when no adapter is available.
//!
//! ```bash
//! cargo test --test renderer
//! cargo test --test renderer -- --ignored
//! ```

mod common;

use rstest::rstest;

use common::{init_logging, instanced_scene, mixed_scene, small_config};
use deferred_renderer::backend::recording::TraceEvent;
use deferred_renderer::backend::DrawCommand;
use deferred_renderer::objects::{ObjectKind, Renderable};
use deferred_renderer::resources::names::BONE_MATRICES;
use deferred_renderer::scene::{Camera, Light, PointLight, SceneDescription};
use deferred_renderer::{RecordingBackend, RenderGraphController, RendererError, RendererState, WgpuBackend};
use glam::{Mat4, Vec3};

fn prepared(scene: &SceneDescription) -> (RecordingBackend, RenderGraphController) {
    init_logging();
    let mut backend = RecordingBackend::new(32, 32);
    let mut controller = RenderGraphController::new(small_config());
    controller.prepare(&mut backend, scene).unwrap();
    (backend, controller)
}

// ============================================================================
// Frame Tests
// ============================================================================

#[rstest]
#[case::one_frame(1)]
#[case::several_frames(4)]
fn test_frames_have_no_read_write_hazards(#[case] frames: usize) {
    let scene = mixed_scene();
    let (mut backend, mut controller) = prepared(&scene);
    backend.clear_events();

    for _ in 0..frames {
        controller.update(&mut backend, &scene).unwrap();
        controller.draw(&mut backend).unwrap();
    }

    assert_eq!(backend.hazards(), Vec::new());
    assert_eq!(backend.count(|e| matches!(e, TraceEvent::BeginFrame)), frames);
    assert_eq!(controller.frame_count(), frames as u64);
}

#[test]
fn test_passes_run_in_dependency_order() {
    let scene = mixed_scene();
    let (mut backend, mut controller) = prepared(&scene);
    backend.clear_events();

    controller.draw(&mut backend).unwrap();
    controller.draw(&mut backend).unwrap();

    let frame = [
        "Shadow Pass",
        "Geometry Pass",
        "Deferred Lighting Pass",
        "Tonemapping",
    ];
    let expected: Vec<String> = frame.iter().chain(frame.iter()).map(|s| s.to_string()).collect();
    assert_eq!(backend.render_pass_labels(), expected);
}

#[test]
fn test_frames_replay_bundles_without_new_pipelines() {
    let scene = mixed_scene();
    let (mut backend, mut controller) = prepared(&scene);
    let pipelines = controller.pipeline_count();
    backend.clear_events();

    controller.update(&mut backend, &scene).unwrap();
    controller.draw(&mut backend).unwrap();

    assert_eq!(controller.pipeline_count(), pipelines);
    assert_eq!(backend.count(|e| matches!(e, TraceEvent::CreateRenderPipeline { .. })), 0);
    assert_eq!(backend.count(|e| matches!(e, TraceEvent::CreateRenderBundle { .. })), 0);
    // Shadow and geometry pass each replay their bundles
    assert_eq!(backend.count(|e| matches!(e, TraceEvent::ExecuteBundles(_))), 2);
}

// ============================================================================
// Scene Binding Tests
// ============================================================================

#[test]
fn test_objects_follow_scene_order_with_trailing_skybox() {
    let (_backend, controller) = prepared(&mixed_scene());

    let kinds: Vec<_> = controller.objects().iter().map(|o| o.kind()).collect();
    assert_eq!(
        kinds,
        vec![ObjectKind::StaticMesh, ObjectKind::SkinnedMesh, ObjectKind::Skybox]
    );
    assert!(controller.objects().iter().all(|o| o.render_bundle().is_some()));
}

#[test]
fn test_instanced_mesh_draws_every_instance() {
    let (backend, _controller) = prepared(&instanced_scene(7));

    let instance_ranges: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            TraceEvent::CreateRenderBundle { label: Some(label), commands, .. } if label == "Geometry Bundle" => {
                Some(commands.clone())
            }
            _ => None,
        })
        .flatten()
        .filter_map(|command| match command {
            DrawCommand::DrawIndexed { instances, .. } => Some(instances),
            _ => None,
        })
        .collect();
    // Cube instances, then the skybox
    assert_eq!(instance_ranges, vec![0..7, 0..1]);
}

#[rstest]
#[case::no_camera(false, 1, RendererError::IncompleteScene { missing: "camera" })]
#[case::no_light(true, 0, RendererError::IncompleteScene { missing: "light" })]
#[case::two_lights(true, 2, RendererError::AmbiguousSceneGraph { kind: "light", count: 2 })]
fn test_scene_singletons_are_enforced(#[case] with_camera: bool, #[case] lights: usize, #[case] expected: RendererError) {
    let mut scene = SceneDescription::new();
    if with_camera {
        scene.add_camera(common::camera());
    }
    for _ in 0..lights {
        scene.add_light(common::sun());
    }

    let mut controller = RenderGraphController::new(small_config());
    assert_eq!(controller.bind_scene(&scene).unwrap_err(), expected);
    assert_eq!(controller.state(), RendererState::Uninitialized);
}

#[test]
fn test_two_cameras_are_ambiguous() {
    let mut scene = mixed_scene();
    scene.add_camera(Camera::new(Vec3::ONE, Vec3::ZERO));
    let mut controller = RenderGraphController::new(small_config());
    assert_eq!(
        controller.bind_scene(&scene).unwrap_err(),
        RendererError::AmbiguousSceneGraph { kind: "camera", count: 2 }
    );
}

#[test]
fn test_point_light_scene_renders() {
    let mut scene = SceneDescription::new();
    scene.add_camera(common::camera());
    scene.add_light(Light::Point(PointLight::new(Vec3::new(0.0, 3.0, 0.0), Vec3::ONE, 10.0)));
    scene.add_mesh(common::skinned_cube(3));

    let (mut backend, mut controller) = prepared(&scene);
    controller.update(&mut backend, &scene).unwrap();
    controller.draw(&mut backend).unwrap();
    assert_eq!(controller.state(), RendererState::Running);
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[test]
fn test_lifecycle_rejects_skipped_steps() {
    init_logging();
    let mut backend = RecordingBackend::new(32, 32);
    let mut controller = RenderGraphController::new(small_config());

    assert!(matches!(
        controller.initialize_resources(&mut backend),
        Err(RendererError::InvalidState { operation: "initialize resources", .. })
    ));
    controller.bind_scene(&mixed_scene()).unwrap();
    assert!(matches!(
        controller.draw(&mut backend),
        Err(RendererError::InvalidState { state: "scene bound", .. })
    ));
    assert!(matches!(
        controller.update(&mut backend, &mixed_scene()),
        Err(RendererError::InvalidState { .. })
    ));
    assert_eq!(backend.events().len(), 0);
}

#[test]
fn test_skin_updates_reach_the_bone_buffer() {
    let mut scene = mixed_scene();
    let (mut backend, mut controller) = prepared(&scene);
    let bones = match &controller.objects()[1] {
        Renderable::SkinnedMesh(mesh) => mesh.resources().buffer(BONE_MATRICES).unwrap(),
        other => panic!("expected a skinned mesh, got {:?}", other.kind()),
    };

    if let Some(skin) = scene.mesh_mut(3).and_then(|mesh| mesh.skin.as_mut()) {
        skin.bone_matrices[1] = Mat4::from_translation(Vec3::Y);
    }
    backend.clear_events();
    controller.update(&mut backend, &scene).unwrap();

    let bone_bytes = 2 * std::mem::size_of::<Mat4>();
    assert_eq!(
        backend.count(|e| matches!(e, TraceEvent::WriteBuffer { buffer, len, .. } if *buffer == bones && *len == bone_bytes)),
        1
    );
}

#[test]
fn test_pipeline_failure_names_the_pipeline() {
    init_logging();
    let mut backend = RecordingBackend::new(32, 32);
    backend.fail_pipelines_matching("sphere Geometry");
    let mut controller = RenderGraphController::new(small_config());

    let err = controller.prepare(&mut backend, &mixed_scene()).unwrap_err();
    assert!(matches!(
        err,
        RendererError::PipelineBuildFailure { ref label, .. } if label == "sphere Geometry"
    ));
    assert_ne!(controller.state(), RendererState::PassesRecorded);
}

#[test]
fn test_release_then_prepare_again() {
    let scene = mixed_scene();
    let (mut backend, mut controller) = prepared(&scene);
    controller.draw(&mut backend).unwrap();

    controller.release(&mut backend);
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(backend.live_buffer_count(), 0);

    controller.prepare(&mut backend, &scene).unwrap();
    controller.draw(&mut backend).unwrap();
    assert_eq!(controller.state(), RendererState::Running);
}

// ============================================================================
// GPU Tests
// ============================================================================

#[test]
#[ignore = "requires a GPU adapter"]
fn test_headless_gpu_frames() {
    init_logging();
    let mut backend = match WgpuBackend::headless(64, 64) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("No GPU adapter available, skipping: {}", err);
            return;
        }
    };
    let scene = mixed_scene();
    let mut controller = RenderGraphController::new(small_config().with_size(64, 64));
    controller.prepare(&mut backend, &scene).unwrap();
    for _ in 0..3 {
        controller.update(&mut backend, &scene).unwrap();
        controller.draw(&mut backend).unwrap();
    }
    controller.release(&mut backend);
}

//! Renders a generated scene offscreen for a fixed number of frames

use deferred_renderer::resources::{ImageSource, Material, MeshData};
use deferred_renderer::scene::{Camera, DirectionalLight, Light, MeshNode, SceneDescription, Skin, Transform};
use deferred_renderer::{RenderGraphController, RendererConfig, RendererResult, WgpuBackend};
use glam::{Quat, Vec3, Vec4};
use std::time::Instant;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const FRAMES: u32 = 120;

fn build_scene() -> SceneDescription {
    let mut scene = SceneDescription::new();
    scene.add_camera(Camera::new(Vec3::new(0.0, 3.0, 8.0), Vec3::ZERO));
    scene.add_light(Light::Directional(DirectionalLight::new(
        Vec3::new(-0.4, -1.0, -0.3),
        Vec3::new(1.0, 0.96, 0.9),
        4.0,
    )));

    let floor = Material::rubber(Vec3::splat(0.6))
        .with_base_map(ImageSource::checkerboard(64, [200, 200, 200, 255], [90, 90, 90, 255]));
    scene.add_mesh(MeshNode::new(MeshData::plane(20.0, 20.0), floor));

    // A row of spheres sweeping roughness
    for i in 0..5 {
        let roughness = 0.1 + i as f32 * 0.2;
        let material = Material::metal(Vec3::new(0.95, 0.64, 0.54), roughness);
        let node = MeshNode::new(MeshData::uv_sphere(32, 16), material)
            .with_position(Vec3::new(-4.0 + i as f32 * 2.0, 1.0, 0.0));
        scene.add_mesh(node);
    }

    // Instanced cubes
    let instances = (0..16)
        .map(|i| {
            let angle = i as f32 / 16.0 * std::f32::consts::TAU;
            Transform::from_position_scale(Vec3::new(angle.cos() * 6.0, 0.25, angle.sin() * 6.0), Vec3::splat(0.5))
        })
        .collect();
    scene.add_mesh(MeshNode::new(MeshData::cube(), Material::plastic(Vec3::new(0.2, 0.5, 0.9))).with_instances(instances));

    // A two-bone skinned column
    let mut column = MeshData::cube();
    let joints = column
        .positions
        .iter()
        .map(|p| if p.y > 0.0 { [1, 0, 0, 0] } else { [0, 0, 0, 0] })
        .collect();
    let weights = vec![Vec4::new(1.0, 0.0, 0.0, 0.0); column.positions.len()];
    column = column.with_skin(joints, weights);
    scene.add_mesh(
        MeshNode::new(column, Material::gold())
            .with_position(Vec3::new(0.0, 0.5, -2.5))
            .with_skin(Skin::new(2)),
    );

    scene
}

/// Sway the skinned column and spin the instance ring
fn animate(scene: &mut SceneDescription, time: f32) {
    let count = scene.nodes.len();
    for index in 0..count {
        let Some(mesh) = scene.mesh_mut(index) else {
            continue;
        };
        if let Some(skin) = &mut mesh.skin {
            if let Some(bone) = skin.bone_matrices.get_mut(1) {
                *bone = glam::Mat4::from_rotation_z(time.sin() * 0.4);
            }
        }
        for instance in &mut mesh.instances {
            instance.rotation = Quat::from_rotation_y(time);
        }
    }
}

fn main() -> RendererResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting headless deferred renderer ({}x{})", WIDTH, HEIGHT);

    let mut backend = WgpuBackend::headless(WIDTH, HEIGHT)?;
    let mut renderer = RenderGraphController::new(RendererConfig::default().with_size(WIDTH, HEIGHT));
    let mut scene = build_scene();

    let start = Instant::now();
    renderer.prepare(&mut backend, &scene)?;
    log::info!(
        "Prepared {} object(s), {} pipeline(s) in {:.2?}",
        renderer.objects().len(),
        renderer.pipeline_count(),
        start.elapsed()
    );

    let start = Instant::now();
    for frame in 0..FRAMES {
        animate(&mut scene, frame as f32 / 60.0);
        renderer.update(&mut backend, &scene)?;
        renderer.draw(&mut backend)?;
    }
    let elapsed = start.elapsed();
    log::info!(
        "Rendered {} frames in {:.2?} ({:.2} ms/frame)",
        FRAMES,
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / FRAMES as f64
    );

    renderer.release(&mut backend);
    Ok(())
}

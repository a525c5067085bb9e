//! Shared fixtures for the integration tests

#![allow(dead_code)]

use deferred_renderer::resources::{Material, MeshData};
use deferred_renderer::scene::{Camera, DirectionalLight, Light, MeshNode, SceneDescription, Skin, Transform};
use deferred_renderer::RendererConfig;
use glam::{Vec3, Vec4};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sizes kept tiny so the recorded traces stay short
pub fn small_config() -> RendererConfig {
    let mut config = RendererConfig::default().with_size(32, 32);
    config.ibl.diffuse_size = 8;
    config.ibl.lut_size = 8;
    config.ibl.emu_size = 8;
    config.shadow.map_size = 64;
    config
}

pub fn camera() -> Camera {
    Camera::new(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO)
}

pub fn sun() -> Light {
    Light::Directional(DirectionalLight::new(Vec3::new(-0.5, -1.0, -0.2), Vec3::ONE, 3.0))
}

pub fn skinned_cube(bones: usize) -> MeshNode {
    let cube = MeshData::cube();
    let count = cube.positions.len();
    let joints = (0..count).map(|i| [(i % bones) as u32, 0, 0, 0]).collect();
    let weights = vec![Vec4::new(1.0, 0.0, 0.0, 0.0); count];
    MeshNode::new(cube.with_skin(joints, weights), Material::gold()).with_skin(Skin::new(bones))
}

/// Camera, sun, one static sphere and one skinned cube
pub fn mixed_scene() -> SceneDescription {
    let mut scene = SceneDescription::new();
    scene.add_camera(camera());
    scene.add_light(sun());
    scene.add_mesh(MeshNode::new(MeshData::uv_sphere(8, 4), Material::plastic(Vec3::X)));
    scene.add_mesh(skinned_cube(2).with_position(Vec3::new(2.0, 0.0, 0.0)));
    scene
}

pub fn instanced_scene(instances: usize) -> SceneDescription {
    let mut scene = SceneDescription::new();
    scene.add_camera(camera());
    scene.add_light(sun());
    let transforms = (0..instances)
        .map(|i| Transform::from_position(Vec3::new(i as f32, 0.0, 0.0)))
        .collect();
    scene.add_mesh(MeshNode::new(MeshData::cube(), Material::default()).with_instances(transforms));
    scene
}

//! Scene description consumed by the renderer
//!
//! The scene is a flat list of nodes produced by the application. The
//! renderer reads it when binding and again every frame to pick up new
//! transforms, camera and light state, and bone matrices.

mod camera;
mod light;
mod transform;

pub use camera::*;
pub use light::*;
pub use transform::*;

use crate::resources::{ImageSource, Material, MeshData};
use glam::{Mat4, Vec3};

/// Skeleton state of a skinned mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub bind_matrix: Mat4,
    pub bind_matrix_inverse: Mat4,
    /// Bone world matrix times bone inverse, one per joint
    pub bone_matrices: Vec<Mat4>,
}

impl Skin {
    pub fn new(bone_count: usize) -> Self {
        Self {
            bind_matrix: Mat4::IDENTITY,
            bind_matrix_inverse: Mat4::IDENTITY,
            bone_matrices: vec![Mat4::IDENTITY; bone_count.max(1)],
        }
    }

    /// Matrices uploaded to the bone buffer with the bind transform folded in
    pub fn skinning_matrices(&self) -> Vec<Mat4> {
        self.bone_matrices
            .iter()
            .map(|bone| self.bind_matrix_inverse * *bone * self.bind_matrix)
            .collect()
    }
}

/// A mesh-like node: geometry, material and placement
#[derive(Debug, Clone)]
pub struct MeshNode {
    pub mesh: MeshData,
    pub material: Material,
    pub transform: Transform,
    pub skin: Option<Skin>,
    /// Per-instance transforms applied after `transform`; empty draws once
    pub instances: Vec<Transform>,
}

impl MeshNode {
    pub fn new(mesh: MeshData, material: Material) -> Self {
        Self {
            mesh,
            material,
            transform: Transform::default(),
            skin: None,
            instances: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_skin(mut self, skin: Skin) -> Self {
        self.skin = Some(skin);
        self
    }

    pub fn with_instances(mut self, instances: Vec<Transform>) -> Self {
        self.instances = instances;
        self
    }

    /// A node is skinned when it has a skeleton and skin attributes
    pub fn is_skinned(&self) -> bool {
        self.skin.is_some() && self.mesh.is_skinned()
    }
}

/// One entry of the scene
#[derive(Debug, Clone)]
pub enum SceneNode {
    Camera(Camera),
    Light(Light),
    Mesh(MeshNode),
}

/// The scene containing all renderable content
#[derive(Debug, Clone)]
pub struct SceneDescription {
    pub nodes: Vec<SceneNode>,
    /// Six cube faces in +X, -X, +Y, -Y, +Z, -Z order
    pub environment: Vec<ImageSource>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneDescription {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            environment: default_environment(),
        }
    }

    pub fn with_environment(mut self, faces: Vec<ImageSource>) -> Self {
        self.environment = faces;
        self
    }

    /// Add a node and return its index
    pub fn add(&mut self, node: SceneNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_camera(&mut self, camera: Camera) -> usize {
        self.add(SceneNode::Camera(camera))
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.add(SceneNode::Light(light))
    }

    pub fn add_mesh(&mut self, mesh: MeshNode) -> usize {
        self.add(SceneNode::Mesh(mesh))
    }

    pub fn cameras(&self) -> impl Iterator<Item = &Camera> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::Camera(camera) => Some(camera),
            _ => None,
        })
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::Light(light) => Some(light),
            _ => None,
        })
    }

    /// Mesh nodes with their node index
    pub fn meshes(&self) -> impl Iterator<Item = (usize, &MeshNode)> {
        self.nodes.iter().enumerate().filter_map(|(index, node)| match node {
            SceneNode::Mesh(mesh) => Some((index, mesh)),
            _ => None,
        })
    }

    pub fn mesh(&self, index: usize) -> Option<&MeshNode> {
        match self.nodes.get(index) {
            Some(SceneNode::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self, index: usize) -> Option<&mut MeshNode> {
        match self.nodes.get_mut(index) {
            Some(SceneNode::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.nodes.iter_mut().find_map(|node| match node {
            SceneNode::Camera(camera) => Some(camera),
            _ => None,
        })
    }
}

/// Sky gradient used when the application supplies no environment
fn default_environment() -> Vec<ImageSource> {
    let horizon = [150, 170, 200, 255];
    let sky = [90, 130, 200, 255];
    let ground = [60, 55, 50, 255];
    vec![
        ImageSource::solid_color(horizon),
        ImageSource::solid_color(horizon),
        ImageSource::solid_color(sky),
        ImageSource::solid_color(ground),
        ImageSource::solid_color(horizon),
        ImageSource::solid_color(horizon),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skinning_matrices_fold_bind_transform() {
        let mut skin = Skin::new(2);
        skin.bind_matrix = Mat4::from_translation(Vec3::X);
        skin.bind_matrix_inverse = skin.bind_matrix.inverse();
        let matrices = skin.skinning_matrices();
        assert_eq!(matrices.len(), 2);
        assert!(matrices[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_mesh_lookup_by_index() {
        let mut scene = SceneDescription::new();
        scene.add_camera(Camera::default());
        let index = scene.add_mesh(MeshNode::new(MeshData::cube(), Material::default()));
        assert!(scene.mesh(index).is_some());
        assert!(scene.mesh(0).is_none());
        assert_eq!(scene.environment.len(), 6);
    }
}

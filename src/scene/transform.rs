//! Transform for positioning objects and instances

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Translation, rotation and scale of an object in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_position_scale(position: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            scale,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Get the model matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Rotate around an axis
    pub fn rotate_axis(&mut self, axis: Vec3, angle: f32) {
        let delta = Quat::from_axis_angle(axis, angle);
        self.rotation = delta * self.rotation;
    }

    /// Build uniform data for shaders
    pub fn uniform_data(&self) -> ModelUniform {
        ModelUniform::from_matrix(self.matrix())
    }
}

/// Model and normal matrices; also the element type of instance buffers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl ModelUniform {
    pub fn from_matrix(model: Mat4) -> Self {
        Self {
            model,
            normal_matrix: model.inverse().transpose(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_matrix_of_uniform_scale_keeps_direction() {
        let transform = Transform::from_position_scale(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(2.0));
        let data = transform.uniform_data();
        let n = data.normal_matrix.transform_vector3(Vec3::Y).normalize();
        assert!((n - Vec3::Y).length() < 1e-5);
        assert_eq!(std::mem::size_of::<ModelUniform>(), 128);
    }
}

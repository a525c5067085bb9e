//! Light types for the scene

use crate::config::ShadowConfig;
use crate::resources::names;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Omnidirectional light at a position
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 0.0),
            color: Vec3::ONE,
            intensity: 10.0,
            range: 20.0,
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            ..Default::default()
        }
    }
}

/// Directional light (like the sun)
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.5).normalize(),
            color: Vec3::ONE,
            intensity: 3.0,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            color,
            intensity,
        }
    }
}

/// The single light of a scene. The variant picks the light model compiled
/// into every shader that reads it.
#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    Point(PointLight),
    Directional(DirectionalLight),
}

impl Light {
    /// Logical resource name the light uniform is bound under
    pub fn resource_name(&self) -> &'static str {
        match self {
            Light::Point(_) => names::POINT_LIGHT,
            Light::Directional(_) => names::DIRECTIONAL_LIGHT,
        }
    }

    /// Light-space view-projection used by the shadow pass. Directional
    /// lights use an orthographic box around the origin, point lights a
    /// wide perspective frustum aimed at the origin.
    pub fn shadow_matrix(&self, shadow: &ShadowConfig) -> Mat4 {
        match self {
            Light::Directional(light) => {
                let direction = light.direction.normalize_or_zero();
                let eye = -direction * (shadow.far * 0.5);
                let view = Mat4::look_at_rh(eye, Vec3::ZERO, up_for(direction));
                let e = shadow.ortho_extent;
                Mat4::orthographic_rh(-e, e, -e, e, shadow.near, shadow.far) * view
            }
            Light::Point(light) => {
                let direction = (-light.position).normalize_or_zero();
                let view = Mat4::look_at_rh(light.position, Vec3::ZERO, up_for(direction));
                let far = shadow.far.min(light.range.max(shadow.near * 2.0));
                Mat4::perspective_rh(120f32.to_radians(), 1.0, shadow.near, far) * view
            }
        }
    }

    /// Build light uniform data for shaders
    pub fn uniform_data(&self, shadow: &ShadowConfig) -> LightUniform {
        let (position_or_direction, color, intensity, range) = match self {
            Light::Point(light) => (light.position.extend(1.0), light.color, light.intensity, light.range),
            Light::Directional(light) => (
                light.direction.normalize_or_zero().extend(0.0),
                light.color,
                light.intensity,
                0.0,
            ),
        };

        LightUniform {
            position_or_direction,
            color: color.extend(intensity),
            params: Vec4::new(shadow.depth_bias, range, shadow.map_size as f32, 0.0),
            shadow_matrix: self.shadow_matrix(shadow),
        }
    }
}

fn up_for(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// GPU-friendly light data structure
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    /// xyz = position (w = 1) or direction (w = 0)
    pub position_or_direction: Vec4,
    /// xyz = color, w = intensity
    pub color: Vec4,
    /// x = depth bias, y = range, z = shadow map size
    pub params: Vec4,
    pub shadow_matrix: Mat4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size_matches_wgsl_struct() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 112);
    }

    #[test]
    fn test_directional_shadow_matrix_covers_origin() {
        let light = Light::Directional(DirectionalLight::new(-Vec3::Y, Vec3::ONE, 1.0));
        let clip = light.shadow_matrix(&ShadowConfig::default()) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_light_resource_names() {
        assert_eq!(Light::Point(PointLight::default()).resource_name(), "point_light");
        assert_eq!(
            Light::Directional(DirectionalLight::default()).resource_name(),
            "directional_light"
        );
    }
}

//! Material definitions for PBR rendering

use crate::resources::{names, ImageSource};
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// PBR material properties
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub metalness: f32,
    pub roughness: f32,
    /// Reflectance at normal incidence for dielectrics, scaled by 0.08
    pub specular: f32,

    pub base_map: Option<ImageSource>,
    pub normal_map: Option<ImageSource>,
    pub metalness_map: Option<ImageSource>,
    pub roughness_map: Option<ImageSource>,
    /// Layers of the base map array; the shader samples `map_layer`
    pub base_map_array: Vec<ImageSource>,
    pub map_layer: u32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            metalness: 0.0,
            roughness: 0.5,
            specular: 0.5,
            base_map: None,
            normal_map: None,
            metalness_map: None,
            roughness_map: None,
            base_map_array: Vec::new(),
            map_layer: 0,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_specular(mut self, specular: f32) -> Self {
        self.specular = specular;
        self
    }

    pub fn with_base_map(mut self, image: ImageSource) -> Self {
        self.base_map = Some(image);
        self
    }

    pub fn with_normal_map(mut self, image: ImageSource) -> Self {
        self.normal_map = Some(image);
        self
    }

    pub fn with_metalness_map(mut self, image: ImageSource) -> Self {
        self.metalness_map = Some(image);
        self
    }

    pub fn with_roughness_map(mut self, image: ImageSource) -> Self {
        self.roughness_map = Some(image);
        self
    }

    pub fn with_base_map_array(mut self, layers: Vec<ImageSource>, map_layer: u32) -> Self {
        self.base_map_array = layers;
        self.map_layer = map_layer;
        self
    }

    /// Texture bindings this material contributes, in binding order, with their images
    pub fn map_bindings(&self) -> Vec<(&'static str, Vec<ImageSource>)> {
        let mut maps = Vec::new();
        if let Some(image) = &self.base_map {
            maps.push((names::BASE_MAP, vec![image.clone()]));
        }
        if !self.base_map_array.is_empty() {
            maps.push((names::BASE_MAP_ARRAY, self.base_map_array.clone()));
        }
        if let Some(image) = &self.normal_map {
            maps.push((names::NORMAL_MAP, vec![image.clone()]));
        }
        if let Some(image) = &self.metalness_map {
            maps.push((names::METALNESS_MAP, vec![image.clone()]));
        }
        if let Some(image) = &self.roughness_map {
            maps.push((names::ROUGHNESS_MAP, vec![image.clone()]));
        }
        maps
    }

    /// Create a uniform data struct for GPU
    pub fn uniform_data(&self) -> MaterialUniformData {
        MaterialUniformData {
            base_color: self.base_color.to_array(),
            metalness: self.metalness,
            roughness: self.roughness,
            specular: self.specular,
            map_layer: self.map_layer,
        }
    }

    // Preset materials

    pub fn plastic(color: Vec3) -> Self {
        Self::new("plastic")
            .with_base_color(color.extend(1.0))
            .with_metalness(0.0)
            .with_roughness(0.4)
    }

    pub fn metal(color: Vec3, roughness: f32) -> Self {
        Self::new("metal")
            .with_base_color(color.extend(1.0))
            .with_metalness(1.0)
            .with_roughness(roughness)
    }

    pub fn gold() -> Self {
        Self::metal(Vec3::new(1.0, 0.766, 0.336), 0.3)
    }

    pub fn rubber(color: Vec3) -> Self {
        Self::new("rubber")
            .with_base_color(color.extend(1.0))
            .with_metalness(0.0)
            .with_roughness(0.9)
    }
}

/// Material uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniformData {
    pub base_color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    pub specular: f32,
    pub map_layer: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout_matches_wgsl_struct() {
        assert_eq!(std::mem::size_of::<MaterialUniformData>(), 32);
    }

    #[test]
    fn test_map_bindings_order() {
        let material = Material::gold()
            .with_roughness_map(ImageSource::white())
            .with_base_map(ImageSource::white())
            .with_normal_map(ImageSource::default_normal());
        let names: Vec<_> = material.map_bindings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["base_map", "normal_map", "roughness_map"]);
    }
}

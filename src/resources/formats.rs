//! Built-in resource format tables
//!
//! Each table is a feature's contribution to the registry. Tables are merged
//! in order, later ones overriding earlier names.

use super::names::*;
use super::registry::{FormatRegistry, ResourceDescriptor, ResourceKind};
use crate::backend::{
    CompareFunction, FilterMode, SamplerBindingType, SamplerDescriptor, ShaderStageFlags,
    TextureFormat, TextureSampleType,
};
use crate::config::RendererConfig;
use crate::ibl::IblParams;
use crate::pipeline::ToneMappingUniform;
use crate::scene::{CameraUniform, LightUniform, ModelUniform};
use glam::Mat4;
use std::mem::size_of;

/// Per-vertex attribute buffers and the index buffer
pub fn vertex_formats() -> Vec<ResourceDescriptor> {
    [POSITION, NORMAL, UV, TANGENT, SKIN_INDEX, SKIN_WEIGHT]
        .into_iter()
        .map(ResourceDescriptor::vertex)
        .chain(std::iter::once(ResourceDescriptor::index(INDEX)))
        .collect()
}

/// Camera, light and shadow resources shared by every object
pub fn global_formats(config: &RendererConfig) -> Vec<ResourceDescriptor> {
    let vf = ShaderStageFlags::VERTEX_FRAGMENT;
    let map_size = config.shadow.map_size;
    vec![
        ResourceDescriptor::uniform(CAMERA, size_of::<CameraUniform>() as u64, vf),
        ResourceDescriptor::uniform(POINT_LIGHT, size_of::<LightUniform>() as u64, vf),
        ResourceDescriptor::uniform(DIRECTIONAL_LIGHT, size_of::<LightUniform>() as u64, vf),
        ResourceDescriptor::render_target(SHADOW_MAP, TextureFormat::Depth32Float, ShaderStageFlags::FRAGMENT)
            .with_extent(map_size, map_size),
        ResourceDescriptor::sampler(
            SHADOW_SAMPLER,
            SamplerDescriptor::comparison(CompareFunction::LessEqual),
            SamplerBindingType::Comparison,
            ShaderStageFlags::FRAGMENT,
        ),
    ]
}

/// Environment cube and the image-based lighting outputs. Output names alias
/// the texture their sampled counterpart binds.
pub fn environment_formats(config: &RendererConfig) -> Vec<ResourceDescriptor> {
    let ibl = &config.ibl;
    let fragment = ShaderStageFlags::FRAGMENT;
    let hdr = TextureFormat::Rgba16Float;
    let unfilterable = TextureSampleType::Float { filterable: false };

    vec![
        ResourceDescriptor::cube_texture(ENV_MAP, TextureFormat::Rgba8UnormSrgb, fragment),
        ResourceDescriptor::texture_array(ENV_FACES, TextureFormat::Rgba8UnormSrgb, ShaderStageFlags::COMPUTE)
            .with_layers(6)
            .with_sample_type(unfilterable),
        ResourceDescriptor::sampler(ENV_SAMPLER, SamplerDescriptor::default(), SamplerBindingType::Filtering, fragment),
        ResourceDescriptor::cube_texture(DIFFUSE_ENV, hdr, fragment),
        ResourceDescriptor::storage_texture(DIFFUSE_ENV_OUTPUT, ResourceKind::TextureArray, hdr)
            .with_layers(6)
            .with_extent(ibl.diffuse_size, ibl.diffuse_size),
        ResourceDescriptor::cube_texture(SPECULAR_ENV, hdr, fragment).as_copy_target(),
        ResourceDescriptor::storage_texture(SPECULAR_TEMP, ResourceKind::TextureArray, hdr).with_layers(6),
        ResourceDescriptor::texture(BRDF_LUT, hdr, fragment),
        ResourceDescriptor::storage_texture(BRDF_LUT_OUTPUT, ResourceKind::Texture, hdr)
            .with_extent(ibl.lut_size, ibl.lut_size),
        ResourceDescriptor::texture(EMU, TextureFormat::R32Float, fragment).with_sample_type(unfilterable),
        ResourceDescriptor::storage_texture(EMU_OUTPUT, ResourceKind::Texture, TextureFormat::R32Float)
            .with_extent(ibl.emu_size, ibl.emu_size),
        ResourceDescriptor::texture(EAVG, TextureFormat::R32Float, fragment).with_sample_type(unfilterable),
        ResourceDescriptor::storage_texture(EAVG_OUTPUT, ResourceKind::Texture, TextureFormat::R32Float)
            .with_extent(ibl.emu_size, 1),
        ResourceDescriptor::uniform(IBL_PARAMS, size_of::<IblParams>() as u64, ShaderStageFlags::COMPUTE),
    ]
}

/// G-buffer attachments, the HDR target and tone mapping inputs
pub fn gbuffer_formats(width: u32, height: u32) -> Vec<ResourceDescriptor> {
    let fragment = ShaderStageFlags::FRAGMENT;
    vec![
        ResourceDescriptor::render_target(GBUFFER_NORMAL, TextureFormat::Rgba16Float, fragment)
            .with_extent(width, height),
        ResourceDescriptor::render_target(GBUFFER_MATERIAL, TextureFormat::Rgba8Unorm, fragment)
            .with_extent(width, height),
        ResourceDescriptor::render_target(GBUFFER_BASE_COLOR, TextureFormat::Rgba8Unorm, fragment)
            .with_extent(width, height),
        ResourceDescriptor::render_target(GBUFFER_DEPTH, TextureFormat::Depth32Float, fragment)
            .with_extent(width, height),
        ResourceDescriptor::render_target(HDR_COLOR, TextureFormat::Rgba16Float, fragment)
            .with_extent(width, height)
            .with_sample_type(TextureSampleType::Float { filterable: true }),
        ResourceDescriptor::sampler(
            POST_SAMPLER,
            SamplerDescriptor {
                mipmap_filter: FilterMode::Nearest,
                ..Default::default()
            },
            SamplerBindingType::Filtering,
            fragment,
        ),
        ResourceDescriptor::uniform(TONE_MAPPING, size_of::<ToneMappingUniform>() as u64, fragment),
    ]
}

/// Per-object uniforms, material maps, bones and instances
pub fn object_formats() -> Vec<ResourceDescriptor> {
    let vf = ShaderStageFlags::VERTEX_FRAGMENT;
    let fragment = ShaderStageFlags::FRAGMENT;
    vec![
        ResourceDescriptor::uniform(MODEL, size_of::<ModelUniform>() as u64, vf),
        ResourceDescriptor::uniform(MATERIAL, 32, vf),
        ResourceDescriptor::sampler(MATERIAL_SAMPLER, SamplerDescriptor::repeat(), SamplerBindingType::Filtering, fragment),
        ResourceDescriptor::texture(BASE_MAP, TextureFormat::Rgba8UnormSrgb, fragment),
        ResourceDescriptor::texture_array(BASE_MAP_ARRAY, TextureFormat::Rgba8UnormSrgb, fragment),
        ResourceDescriptor::texture(NORMAL_MAP, TextureFormat::Rgba8Unorm, fragment),
        ResourceDescriptor::texture(METALNESS_MAP, TextureFormat::Rgba8Unorm, fragment),
        ResourceDescriptor::texture(ROUGHNESS_MAP, TextureFormat::Rgba8Unorm, fragment),
        ResourceDescriptor::storage(BONE_MATRICES, size_of::<Mat4>() as u64, ShaderStageFlags::VERTEX),
        ResourceDescriptor::storage(INSTANCE_MATRICES, size_of::<ModelUniform>() as u64, ShaderStageFlags::VERTEX),
    ]
}

impl FormatRegistry {
    /// Registry holding every built-in table
    pub fn with_builtin_formats(config: &RendererConfig) -> Self {
        let mut registry = FormatRegistry::new();
        registry.register_formats(vertex_formats());
        registry.register_formats(global_formats(config));
        registry.register_formats(environment_formats(config));
        registry.register_formats(gbuffer_formats(config.width, config.height));
        registry.register_formats(object_formats());
        log::debug!("Registered {} built-in resource formats", registry.len());
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceFormat;

    #[test]
    fn test_builtin_names_are_unique_across_tables() {
        let config = RendererConfig::default();
        let total = vertex_formats().len()
            + global_formats(&config).len()
            + environment_formats(&config).len()
            + gbuffer_formats(4, 4).len()
            + object_formats().len();
        assert_eq!(FormatRegistry::with_builtin_formats(&config).len(), total);
    }

    #[test]
    fn test_shadow_map_uses_configured_size() {
        let config = RendererConfig::default();
        let registry = FormatRegistry::with_builtin_formats(&config);
        let desc = registry.get(SHADOW_MAP).unwrap();
        assert!(matches!(
            desc.format,
            ResourceFormat::Texture { extent: (2048, 2048), .. }
        ));
    }

    #[test]
    fn test_material_uniform_size_matches_material_struct() {
        let registry = FormatRegistry::with_builtin_formats(&RendererConfig::default());
        let expected = size_of::<crate::resources::MaterialUniformData>() as u64;
        assert!(matches!(
            registry.get(MATERIAL).unwrap().format,
            ResourceFormat::Buffer { default_size, .. } if default_size == expected
        ));
    }
}

//! WGSL declarations for named resources and vertex slots

use crate::backend::VertexFormat;
use crate::resources::names::*;

/// How a registered resource appears in generated WGSL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderBinding {
    pub name: &'static str,
    /// Variable name inside the shader
    pub variable: &'static str,
    /// Address space, `None` for handle types
    pub space: Option<&'static str>,
    pub ty: &'static str,
}

impl ShaderBinding {
    const fn uniform(name: &'static str, variable: &'static str, ty: &'static str) -> Self {
        Self {
            name,
            variable,
            space: Some("uniform"),
            ty,
        }
    }

    const fn storage(name: &'static str, variable: &'static str, ty: &'static str) -> Self {
        Self {
            name,
            variable,
            space: Some("storage, read"),
            ty,
        }
    }

    const fn handle(name: &'static str, ty: &'static str) -> Self {
        Self {
            name,
            variable: name,
            space: None,
            ty,
        }
    }

    /// `@group(g) @binding(b) var<...> name: type;`
    pub fn declare(&self, group: usize, binding: usize) -> String {
        match self.space {
            Some(space) => format!(
                "@group({group}) @binding({binding}) var<{space}> {}: {};",
                self.variable, self.ty
            ),
            None => format!(
                "@group({group}) @binding({binding}) var {}: {};",
                self.variable, self.ty
            ),
        }
    }
}

const TEXTURE_2D: &str = "texture_2d<f32>";
const TEXTURE_2D_ARRAY: &str = "texture_2d_array<f32>";
const TEXTURE_CUBE: &str = "texture_cube<f32>";
const TEXTURE_DEPTH: &str = "texture_depth_2d";
const HDR_STORAGE_ARRAY: &str = "texture_storage_2d_array<rgba16float, write>";

static BINDINGS: &[ShaderBinding] = &[
    ShaderBinding::uniform(CAMERA, "camera", "Camera"),
    ShaderBinding::uniform(POINT_LIGHT, "light", "Light"),
    ShaderBinding::uniform(DIRECTIONAL_LIGHT, "light", "Light"),
    ShaderBinding::handle(SHADOW_MAP, TEXTURE_DEPTH),
    ShaderBinding::handle(SHADOW_SAMPLER, "sampler_comparison"),
    ShaderBinding::handle(ENV_MAP, TEXTURE_CUBE),
    ShaderBinding::handle(ENV_FACES, TEXTURE_2D_ARRAY),
    ShaderBinding::handle(ENV_SAMPLER, "sampler"),
    ShaderBinding::handle(DIFFUSE_ENV, TEXTURE_CUBE),
    ShaderBinding::handle(DIFFUSE_ENV_OUTPUT, HDR_STORAGE_ARRAY),
    ShaderBinding::handle(SPECULAR_ENV, TEXTURE_CUBE),
    ShaderBinding::handle(SPECULAR_TEMP, HDR_STORAGE_ARRAY),
    ShaderBinding::handle(BRDF_LUT, TEXTURE_2D),
    ShaderBinding::handle(BRDF_LUT_OUTPUT, "texture_storage_2d<rgba16float, write>"),
    ShaderBinding::handle(EMU, TEXTURE_2D),
    ShaderBinding::handle(EMU_OUTPUT, "texture_storage_2d<r32float, write>"),
    ShaderBinding::handle(EAVG, TEXTURE_2D),
    ShaderBinding::handle(EAVG_OUTPUT, "texture_storage_2d<r32float, write>"),
    ShaderBinding::uniform(IBL_PARAMS, "params", "IblParams"),
    ShaderBinding::handle(GBUFFER_NORMAL, TEXTURE_2D),
    ShaderBinding::handle(GBUFFER_MATERIAL, TEXTURE_2D),
    ShaderBinding::handle(GBUFFER_BASE_COLOR, TEXTURE_2D),
    ShaderBinding::handle(GBUFFER_DEPTH, TEXTURE_DEPTH),
    ShaderBinding::handle(HDR_COLOR, TEXTURE_2D),
    ShaderBinding::handle(POST_SAMPLER, "sampler"),
    ShaderBinding::uniform(TONE_MAPPING, "tone_mapping", "ToneMapping"),
    ShaderBinding::uniform(MODEL, "model", "Model"),
    ShaderBinding::uniform(MATERIAL, "material", "Material"),
    ShaderBinding::handle(MATERIAL_SAMPLER, "sampler"),
    ShaderBinding::handle(BASE_MAP, TEXTURE_2D),
    ShaderBinding::handle(BASE_MAP_ARRAY, TEXTURE_2D_ARRAY),
    ShaderBinding::handle(NORMAL_MAP, TEXTURE_2D),
    ShaderBinding::handle(METALNESS_MAP, TEXTURE_2D),
    ShaderBinding::handle(ROUGHNESS_MAP, TEXTURE_2D),
    ShaderBinding::storage(BONE_MATRICES, "bone_matrices", "array<mat4x4<f32>>"),
    ShaderBinding::storage(INSTANCE_MATRICES, "instances", "array<Model>"),
];

/// Every resource the generator can declare
pub fn shader_bindings() -> &'static [ShaderBinding] {
    BINDINGS
}

pub fn shader_binding(name: &str) -> Option<&'static ShaderBinding> {
    BINDINGS.iter().find(|binding| binding.name == name)
}

/// Attribute format of a named vertex slot
pub fn vertex_slot_format(name: &str) -> Option<VertexFormat> {
    match name {
        POSITION | NORMAL => Some(VertexFormat::Float32x3),
        UV => Some(VertexFormat::Float32x2),
        TANGENT | SKIN_WEIGHT => Some(VertexFormat::Float32x4),
        SKIN_INDEX => Some(VertexFormat::Uint32x4),
        _ => None,
    }
}

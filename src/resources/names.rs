//! Logical resource names shared by the registry, the objects and the
//! generated shaders

// Vertex slots
pub const POSITION: &str = "position";
pub const NORMAL: &str = "normal";
pub const UV: &str = "uv";
pub const TANGENT: &str = "tangent";
pub const SKIN_INDEX: &str = "skin_index";
pub const SKIN_WEIGHT: &str = "skin_weight";
pub const INDEX: &str = "index";

// Globals
pub const CAMERA: &str = "camera";
pub const POINT_LIGHT: &str = "point_light";
pub const DIRECTIONAL_LIGHT: &str = "directional_light";
pub const SHADOW_MAP: &str = "shadow_map";
pub const SHADOW_SAMPLER: &str = "shadow_sampler";

// Environment and IBL
pub const ENV_MAP: &str = "env_map";
pub const ENV_FACES: &str = "env_faces";
pub const ENV_SAMPLER: &str = "env_sampler";
pub const DIFFUSE_ENV: &str = "diffuse_env";
pub const DIFFUSE_ENV_OUTPUT: &str = "diffuse_env_output";
pub const SPECULAR_ENV: &str = "specular_env";
pub const SPECULAR_TEMP: &str = "specular_temp";
pub const BRDF_LUT: &str = "brdf_lut";
pub const BRDF_LUT_OUTPUT: &str = "brdf_lut_output";
pub const EMU: &str = "emu";
pub const EMU_OUTPUT: &str = "emu_output";
pub const EAVG: &str = "eavg";
pub const EAVG_OUTPUT: &str = "eavg_output";
pub const IBL_PARAMS: &str = "ibl_params";

// G-buffer and post-process
pub const GBUFFER_NORMAL: &str = "gbuffer_normal";
pub const GBUFFER_MATERIAL: &str = "gbuffer_material";
pub const GBUFFER_BASE_COLOR: &str = "gbuffer_base_color";
pub const GBUFFER_DEPTH: &str = "gbuffer_depth";
pub const HDR_COLOR: &str = "hdr_color";
pub const POST_SAMPLER: &str = "post_sampler";
pub const TONE_MAPPING: &str = "tone_mapping";

// Per object
pub const MODEL: &str = "model";
pub const MATERIAL: &str = "material";
pub const MATERIAL_SAMPLER: &str = "material_sampler";
pub const BASE_MAP: &str = "base_map";
pub const BASE_MAP_ARRAY: &str = "base_map_array";
pub const NORMAL_MAP: &str = "normal_map";
pub const METALNESS_MAP: &str = "metalness_map";
pub const ROUGHNESS_MAP: &str = "roughness_map";
pub const BONE_MATRICES: &str = "bone_matrices";
pub const INSTANCE_MATRICES: &str = "instance_matrices";

//! Built-in shader chunks and templates.
//!
//! The sources live as `.wgsl` files under `shaders/` and are embedded at
//! compile time.
//!
//! | Include name | Contents |
//! |--------------|----------|
//! | `uniforms` | Uniform struct layouts shared with the CPU side |
//! | `math` | Constants |
//! | `brdf` | GGX distribution, Smith visibility, Schlick fresnel |
//! | `sampling` | Hammersley sequence and GGX importance sampling |
//! | `cube` | Cube face addressing and manual bilinear environment lookup |
//! | `fullscreen` | Fullscreen triangle vertex stage |
//! | `gbuffer` | G-buffer output struct |

use super::TemplateKind;

const UNIFORMS_CHUNK: &str = include_str!("../../shaders/library/uniforms.wgsl");
const MATH_CHUNK: &str = include_str!("../../shaders/library/math.wgsl");
const BRDF_CHUNK: &str = include_str!("../../shaders/library/brdf.wgsl");
const SAMPLING_CHUNK: &str = include_str!("../../shaders/library/sampling.wgsl");
const CUBE_CHUNK: &str = include_str!("../../shaders/library/cube.wgsl");
const FULLSCREEN_CHUNK: &str = include_str!("../../shaders/library/fullscreen.wgsl");
const GBUFFER_CHUNK: &str = include_str!("../../shaders/library/gbuffer.wgsl");

const MESH_TEMPLATE: &str = include_str!("../../shaders/templates/mesh.wgsl");
const SKYBOX_TEMPLATE: &str = include_str!("../../shaders/templates/skybox.wgsl");
const DEFERRED_LIGHTING_TEMPLATE: &str = include_str!("../../shaders/templates/deferred_lighting.wgsl");
const TONE_MAPPING_TEMPLATE: &str = include_str!("../../shaders/templates/tone_mapping.wgsl");
const BRDF_LUT_TEMPLATE: &str = include_str!("../../shaders/templates/brdf_lut.wgsl");
const IRRADIANCE_TEMPLATE: &str = include_str!("../../shaders/templates/irradiance.wgsl");
const SPECULAR_PREFILTER_TEMPLATE: &str = include_str!("../../shaders/templates/specular_prefilter.wgsl");
const ENERGY_EMU_TEMPLATE: &str = include_str!("../../shaders/templates/energy_emu.wgsl");
const ENERGY_EAVG_TEMPLATE: &str = include_str!("../../shaders/templates/energy_eavg.wgsl");

/// Collection of includable shader chunks
pub struct ShaderLibrary {
    chunks: Vec<(&'static str, &'static str)>,
}

impl ShaderLibrary {
    /// The built-in chunks
    pub fn standard() -> Self {
        Self {
            chunks: vec![
                ("uniforms", UNIFORMS_CHUNK),
                ("math", MATH_CHUNK),
                ("brdf", BRDF_CHUNK),
                ("sampling", SAMPLING_CHUNK),
                ("cube", CUBE_CHUNK),
                ("fullscreen", FULLSCREEN_CHUNK),
                ("gbuffer", GBUFFER_CHUNK),
            ],
        }
    }

    pub fn chunk(&self, name: &str) -> Option<&'static str> {
        self.chunks
            .iter()
            .find(|(chunk, _)| *chunk == name)
            .map(|(_, source)| *source)
    }

    pub fn chunk_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.chunks.iter().map(|(name, _)| *name)
    }
}

/// Template body for a template kind
pub fn template_source(template: TemplateKind) -> &'static str {
    match template {
        TemplateKind::Mesh => MESH_TEMPLATE,
        TemplateKind::Skybox => SKYBOX_TEMPLATE,
        TemplateKind::DeferredLighting => DEFERRED_LIGHTING_TEMPLATE,
        TemplateKind::ToneMapping => TONE_MAPPING_TEMPLATE,
        TemplateKind::BrdfLut => BRDF_LUT_TEMPLATE,
        TemplateKind::Irradiance => IRRADIANCE_TEMPLATE,
        TemplateKind::SpecularPrefilter => SPECULAR_PREFILTER_TEMPLATE,
        TemplateKind::EnergyEmu => ENERGY_EMU_TEMPLATE,
        TemplateKind::EnergyEavg => ENERGY_EAVG_TEMPLATE,
    }
}

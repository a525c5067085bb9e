//! Shader variant generation.
//!
//! A variant is assembled from a template (one per pipeline kind) and the
//! shared chunks of the [`ShaderLibrary`]. The caller describes the pipeline
//! by the ordered names of its vertex slots and bind groups; the generator
//! turns list positions into `@location` and `@group`/`@binding` indices and
//! derives the [`ShaderFeatures`] of the variant from which names are present.
//!
//! # Example
//!
//! ```ignore
//! use deferred_renderer::shader::{generate, PassKind, TemplateKind};
//!
//! let source = generate(
//!     &["position", "normal", "uv"],
//!     &[&["camera", "directional_light"], &["model", "material", "material_sampler", "base_map"]],
//!     PassKind::Render,
//!     TemplateKind::Mesh,
//! )?;
//! ```
//!
//! Generation is a pure function of its inputs, so the output can be cached
//! by [`ShaderVariantKey`] together with the name lists.

mod bindings;
mod compose;
mod library;
mod validate;

pub use bindings::{shader_binding, shader_bindings, vertex_slot_format, ShaderBinding};
pub use compose::{compose, preprocess};
pub use library::{template_source, ShaderLibrary};
pub use validate::validate_wgsl;

use crate::error::{RendererError, RendererResult};
use crate::resources::check_unique;
use crate::resources::names::*;
use bitflags::bitflags;
use std::fmt::Write;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";
pub const COMPUTE_ENTRY: &str = "cs_main";

/// Compute templates run in 8x8 tiles
pub const WORKGROUP_SIZE: u32 = 8;

/// Shader template, one per pipeline kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Mesh,
    Skybox,
    DeferredLighting,
    ToneMapping,
    BrdfLut,
    Irradiance,
    SpecularPrefilter,
    EnergyEmu,
    EnergyEavg,
}

impl TemplateKind {
    pub fn name(self) -> &'static str {
        match self {
            TemplateKind::Mesh => "mesh",
            TemplateKind::Skybox => "skybox",
            TemplateKind::DeferredLighting => "deferred_lighting",
            TemplateKind::ToneMapping => "tone_mapping",
            TemplateKind::BrdfLut => "brdf_lut",
            TemplateKind::Irradiance => "irradiance",
            TemplateKind::SpecularPrefilter => "specular_prefilter",
            TemplateKind::EnergyEmu => "energy_emu",
            TemplateKind::EnergyEavg => "energy_eavg",
        }
    }

    pub fn is_compute(self) -> bool {
        matches!(
            self,
            TemplateKind::BrdfLut
                | TemplateKind::Irradiance
                | TemplateKind::SpecularPrefilter
                | TemplateKind::EnergyEmu
                | TemplateKind::EnergyEavg
        )
    }

    /// Vertex slots the template reads for `pass`. `None` when the template
    /// takes no vertex input at all.
    fn required_slots(self, pass: PassKind) -> Option<&'static [&'static str]> {
        match (self, pass) {
            (TemplateKind::Mesh, PassKind::Render) => Some(&[POSITION, NORMAL, UV]),
            (TemplateKind::Mesh, PassKind::Shadow) | (TemplateKind::Skybox, _) => Some(&[POSITION]),
            _ => None,
        }
    }

    fn required_bindings(self, pass: PassKind) -> &'static [&'static str] {
        match (self, pass) {
            (TemplateKind::Mesh, PassKind::Render) => &[CAMERA, MODEL, MATERIAL],
            (TemplateKind::Mesh, PassKind::Shadow) => &[MODEL],
            (TemplateKind::Skybox, _) => &[CAMERA, ENV_MAP, ENV_SAMPLER],
            (TemplateKind::DeferredLighting, _) => &[
                CAMERA,
                GBUFFER_NORMAL,
                GBUFFER_MATERIAL,
                GBUFFER_BASE_COLOR,
                GBUFFER_DEPTH,
            ],
            (TemplateKind::ToneMapping, _) => &[HDR_COLOR, POST_SAMPLER, TONE_MAPPING],
            (TemplateKind::BrdfLut, _) => &[BRDF_LUT_OUTPUT, IBL_PARAMS],
            (TemplateKind::Irradiance, _) => &[ENV_FACES, DIFFUSE_ENV_OUTPUT, IBL_PARAMS],
            (TemplateKind::SpecularPrefilter, _) => &[ENV_FACES, SPECULAR_TEMP, IBL_PARAMS],
            (TemplateKind::EnergyEmu, _) => &[EMU_OUTPUT, IBL_PARAMS],
            (TemplateKind::EnergyEavg, _) => &[EAVG_OUTPUT, IBL_PARAMS],
        }
    }

    fn needs_light(self) -> bool {
        matches!(self, TemplateKind::Mesh | TemplateKind::DeferredLighting)
    }
}

/// Render pass a variant is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Full shading output
    Render,
    /// Position-only transform into light clip space
    Shadow,
}

bitflags! {
    /// Conditional branches of a template. Flag names double as the
    /// `#if` conditions in template sources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderFeatures: u32 {
        const TANGENT = 1 << 0;
        const SKINNING = 1 << 1;
        const POINT_LIGHT = 1 << 2;
        const INSTANCING = 1 << 3;
        const BASE_MAP = 1 << 4;
        const BASE_MAP_ARRAY = 1 << 5;
        const METALNESS_MAP = 1 << 6;
        const ROUGHNESS_MAP = 1 << 7;
        const SHADOW = 1 << 8;
        const IBL = 1 << 9;
        const ENERGY_COMPENSATION = 1 << 10;
        const SHADOW_PASS = 1 << 11;
    }
}

/// Identity of a generated variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderVariantKey {
    pub template: TemplateKind,
    pub pass: PassKind,
    pub features: ShaderFeatures,
}

fn template_error(template: TemplateKind, message: String) -> RendererError {
    RendererError::ShaderTemplate {
        template: template.name().to_string(),
        message,
    }
}

impl ShaderVariantKey {
    /// Validate the name lists and derive the variant they select
    pub fn derive(
        vertex_slots: &[&str],
        groups: &[&[&str]],
        pass: PassKind,
        template: TemplateKind,
    ) -> RendererResult<Self> {
        check_unique("vertex slots", vertex_slots)?;
        let bound: Vec<&str> = groups.iter().flat_map(|group| group.iter().copied()).collect();
        check_unique("bind groups", &bound)?;

        for slot in vertex_slots {
            if vertex_slot_format(slot).is_none() {
                return Err(RendererError::UnknownResourceName(slot.to_string()));
            }
        }
        for name in &bound {
            if shader_binding(name).is_none() {
                return Err(RendererError::UnknownResourceName(name.to_string()));
            }
        }

        if pass == PassKind::Shadow && template != TemplateKind::Mesh {
            return Err(template_error(template, "no shadow pass variant".into()));
        }
        match template.required_slots(pass) {
            Some(required) => {
                if let Some(missing) = required.iter().find(|slot| !vertex_slots.contains(*slot)) {
                    return Err(RendererError::MissingVertexSlot(missing.to_string()));
                }
            }
            None if !vertex_slots.is_empty() => {
                return Err(template_error(template, "template takes no vertex input".into()));
            }
            None => {}
        }
        if let Some(missing) = template
            .required_bindings(pass)
            .iter()
            .find(|name| !bound.contains(*name))
        {
            return Err(template_error(template, format!("missing binding '{missing}'")));
        }

        let has_slot = |name: &str| vertex_slots.contains(&name);
        let has = |name: &str| bound.contains(&name);

        let point = has(POINT_LIGHT);
        let directional = has(DIRECTIONAL_LIGHT);
        if point && directional {
            return Err(template_error(
                template,
                "point and directional light bound together".into(),
            ));
        }
        if template.needs_light() && !point && !directional {
            return Err(RendererError::NoLightBound);
        }

        let maps = [BASE_MAP, BASE_MAP_ARRAY, NORMAL_MAP, METALNESS_MAP, ROUGHNESS_MAP];
        if maps.iter().any(|&map| has(map)) && !has(MATERIAL_SAMPLER) {
            return Err(template_error(template, "material maps bound without material_sampler".into()));
        }

        let mut features = ShaderFeatures::empty();
        features.set(ShaderFeatures::TANGENT, has_slot(TANGENT) && has(NORMAL_MAP));
        features.set(
            ShaderFeatures::SKINNING,
            has_slot(SKIN_INDEX) && has_slot(SKIN_WEIGHT) && has(BONE_MATRICES),
        );
        features.set(ShaderFeatures::POINT_LIGHT, point);
        features.set(ShaderFeatures::INSTANCING, has(INSTANCE_MATRICES));
        features.set(ShaderFeatures::BASE_MAP, has(BASE_MAP));
        features.set(ShaderFeatures::BASE_MAP_ARRAY, has(BASE_MAP_ARRAY));
        features.set(ShaderFeatures::METALNESS_MAP, has(METALNESS_MAP));
        features.set(ShaderFeatures::ROUGHNESS_MAP, has(ROUGHNESS_MAP));
        features.set(ShaderFeatures::SHADOW, has(SHADOW_MAP) && has(SHADOW_SAMPLER));
        features.set(
            ShaderFeatures::IBL,
            has(DIFFUSE_ENV) && has(SPECULAR_ENV) && has(BRDF_LUT) && has(ENV_SAMPLER),
        );
        features.set(ShaderFeatures::ENERGY_COMPENSATION, has(EMU) && has(EAVG));
        features.set(ShaderFeatures::SHADOW_PASS, pass == PassKind::Shadow);

        Ok(Self {
            template,
            pass,
            features,
        })
    }
}

/// Generate the WGSL source of a variant.
///
/// Vertex slot `i` becomes `@location(i)`, name `j` of group `i` becomes
/// `@group(i) @binding(j)`. Fails with [`RendererError::NoLightBound`] when a
/// lit template has neither light bound.
pub fn generate(
    vertex_slots: &[&str],
    groups: &[&[&str]],
    pass: PassKind,
    template: TemplateKind,
) -> RendererResult<String> {
    let key = ShaderVariantKey::derive(vertex_slots, groups, pass, template)?;
    let mut source = String::new();

    let flags: Vec<&str> = key.features.iter_names().map(|(name, _)| name).collect();
    let _ = writeln!(
        source,
        "// template: {}, pass: {:?}, features: [{}]",
        template.name(),
        pass,
        flags.join(", ")
    );
    source.push_str("#include \"uniforms\"\n\n");

    for (group, names) in groups.iter().enumerate() {
        for (binding, name) in names.iter().enumerate() {
            // Names were checked by derive
            if let Some(decl) = shader_binding(name) {
                source.push_str(&decl.declare(group, binding));
                source.push('\n');
            }
        }
    }

    if !vertex_slots.is_empty() {
        source.push_str("\nstruct VertexInput {\n");
        for (location, slot) in vertex_slots.iter().enumerate() {
            if let Some(format) = vertex_slot_format(slot) {
                let _ = writeln!(source, "    @location({location}) {slot}: {},", format.wgsl_type());
            }
        }
        source.push_str("}\n");
    }

    source.push('\n');
    source.push_str(template_source(template));

    compose(template.name(), &source, &ShaderLibrary::standard(), key.features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const STATIC_SLOTS: &[&str] = &[POSITION, NORMAL, UV];
    const GLOBALS: &[&str] = &[CAMERA, DIRECTIONAL_LIGHT];
    const TEXTURED: &[&str] = &[MODEL, MATERIAL, MATERIAL_SAMPLER, BASE_MAP];

    fn mesh(slots: &[&str], object: &[&str]) -> RendererResult<String> {
        generate(slots, &[GLOBALS, object], PassKind::Render, TemplateKind::Mesh)
    }

    #[test]
    fn test_generation_is_pure() {
        let a = mesh(STATIC_SLOTS, TEXTURED).unwrap();
        let b = mesh(STATIC_SLOTS, TEXTURED).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_textured_static_mesh_branches() {
        let source = mesh(STATIC_SLOTS, TEXTURED).unwrap();
        assert!(source.contains("textureSample(base_map, material_sampler"));
        assert!(!source.contains("normal_map"));
        assert!(!source.contains("input.tangent"));
        validate_wgsl("textured", &source).unwrap();
    }

    #[test]
    fn test_tangent_and_normal_map_flip_only_the_tangent_branch() {
        let before = ShaderVariantKey::derive(STATIC_SLOTS, &[GLOBALS, TEXTURED], PassKind::Render, TemplateKind::Mesh)
            .unwrap();
        let slots = [POSITION, NORMAL, UV, TANGENT];
        let object = [MODEL, MATERIAL, MATERIAL_SAMPLER, BASE_MAP, NORMAL_MAP];
        let after = ShaderVariantKey::derive(&slots, &[GLOBALS, &object], PassKind::Render, TemplateKind::Mesh)
            .unwrap();
        assert_eq!(before.features ^ after.features, ShaderFeatures::TANGENT);

        let source = mesh(&slots, &object).unwrap();
        assert!(source.contains("textureSample(base_map, material_sampler"));
        assert!(source.contains("textureSample(normal_map, material_sampler"));
        assert!(source.contains("@location(3) tangent: vec4<f32>"));
    }

    #[test]
    fn test_tangent_slot_alone_keeps_branch_off() {
        let key = ShaderVariantKey::derive(
            &[POSITION, NORMAL, UV, TANGENT],
            &[GLOBALS, TEXTURED],
            PassKind::Render,
            TemplateKind::Mesh,
        )
        .unwrap();
        assert!(!key.features.contains(ShaderFeatures::TANGENT));
    }

    #[test]
    fn test_locations_and_bindings_follow_list_order() {
        let source = mesh(&[UV, POSITION, NORMAL], &[MATERIAL, MODEL]).unwrap();
        assert!(source.contains("@location(0) uv: vec2<f32>"));
        assert!(source.contains("@location(1) position: vec3<f32>"));
        assert!(source.contains("@group(0) @binding(1) var<uniform> light: Light;"));
        assert!(source.contains("@group(1) @binding(0) var<uniform> material: Material;"));
        assert!(source.contains("@group(1) @binding(1) var<uniform> model: Model;"));
    }

    #[test]
    fn test_no_light_bound() {
        let err = generate(STATIC_SLOTS, &[&[CAMERA], &[MODEL, MATERIAL]], PassKind::Render, TemplateKind::Mesh)
            .unwrap_err();
        assert_eq!(err, RendererError::NoLightBound);

        let err = generate(&[POSITION], &[&[MODEL]], PassKind::Shadow, TemplateKind::Mesh).unwrap_err();
        assert_eq!(err, RendererError::NoLightBound);
    }

    #[test]
    fn test_invalid_name_lists() {
        let err = mesh(&[POSITION, NORMAL, UV, UV], &[MODEL, MATERIAL]).unwrap_err();
        assert!(matches!(err, RendererError::DuplicateName { .. }));

        let err = mesh(STATIC_SLOTS, &[MODEL, MATERIAL, CAMERA]).unwrap_err();
        assert!(matches!(err, RendererError::DuplicateName { ref name, .. } if name == CAMERA));

        let err = mesh(&[POSITION, NORMAL, UV, "color"], &[MODEL, MATERIAL]).unwrap_err();
        assert_eq!(err, RendererError::UnknownResourceName("color".into()));

        let err = mesh(&[POSITION, NORMAL], &[MODEL, MATERIAL]).unwrap_err();
        assert_eq!(err, RendererError::MissingVertexSlot(UV.into()));

        let err = mesh(STATIC_SLOTS, &[MODEL, MATERIAL, BASE_MAP]).unwrap_err();
        assert!(matches!(err, RendererError::ShaderTemplate { .. }));
    }

    #[test]
    fn test_both_lights_rejected() {
        let err = generate(
            STATIC_SLOTS,
            &[&[CAMERA, POINT_LIGHT, DIRECTIONAL_LIGHT], &[MODEL, MATERIAL]],
            PassKind::Render,
            TemplateKind::Mesh,
        )
        .unwrap_err();
        assert!(matches!(err, RendererError::ShaderTemplate { .. }));
    }

    #[rstest]
    fn test_mesh_variant_matrix_validates(
        #[values(false, true)] skinned: bool,
        #[values(false, true)] tangent: bool,
        #[values(false, true)] point: bool,
        #[values(false, true)] instanced: bool,
        #[values(PassKind::Render, PassKind::Shadow)] pass: PassKind,
    ) {
        let mut slots = vec![POSITION, NORMAL, UV];
        let mut object = vec![MODEL, MATERIAL, MATERIAL_SAMPLER, BASE_MAP, METALNESS_MAP, ROUGHNESS_MAP];
        if tangent {
            slots.push(TANGENT);
            object.push(NORMAL_MAP);
        }
        if skinned {
            slots.extend([SKIN_INDEX, SKIN_WEIGHT]);
            object.push(BONE_MATRICES);
        }
        if instanced {
            object.push(INSTANCE_MATRICES);
        }
        let light = if point { POINT_LIGHT } else { DIRECTIONAL_LIGHT };
        let globals = match pass {
            PassKind::Render => vec![CAMERA, light],
            PassKind::Shadow => vec![light],
        };

        let key = ShaderVariantKey::derive(&slots, &[globals.as_slice(), object.as_slice()], pass, TemplateKind::Mesh).unwrap();
        assert_eq!(key.features.contains(ShaderFeatures::SKINNING), skinned);
        assert_eq!(key.features.contains(ShaderFeatures::TANGENT), tangent);
        assert_eq!(key.features.contains(ShaderFeatures::POINT_LIGHT), point);
        assert_eq!(key.features.contains(ShaderFeatures::INSTANCING), instanced);

        let source = generate(&slots, &[globals.as_slice(), object.as_slice()], pass, TemplateKind::Mesh).unwrap();
        assert_eq!(source.contains("fn fs_main"), pass == PassKind::Render);
        validate_wgsl("mesh", &source).unwrap();
    }

    #[rstest]
    #[case::skybox(TemplateKind::Skybox, &[POSITION], vec![&[CAMERA][..], &[ENV_MAP, ENV_SAMPLER][..]])]
    #[case::lighting_minimal(
        TemplateKind::DeferredLighting,
        &[],
        vec![
            &[CAMERA, POINT_LIGHT][..],
            &[GBUFFER_NORMAL, GBUFFER_MATERIAL, GBUFFER_BASE_COLOR, GBUFFER_DEPTH][..],
        ]
    )]
    #[case::lighting_full(
        TemplateKind::DeferredLighting,
        &[],
        vec![
            &[CAMERA, DIRECTIONAL_LIGHT, SHADOW_MAP, SHADOW_SAMPLER][..],
            &[GBUFFER_NORMAL, GBUFFER_MATERIAL, GBUFFER_BASE_COLOR, GBUFFER_DEPTH][..],
            &[DIFFUSE_ENV, SPECULAR_ENV, BRDF_LUT, ENV_SAMPLER, EMU, EAVG][..],
        ]
    )]
    #[case::tone_mapping(TemplateKind::ToneMapping, &[], vec![&[HDR_COLOR, POST_SAMPLER, TONE_MAPPING][..]])]
    #[case::brdf_lut(TemplateKind::BrdfLut, &[], vec![&[BRDF_LUT_OUTPUT, IBL_PARAMS][..]])]
    #[case::irradiance(TemplateKind::Irradiance, &[], vec![&[ENV_FACES, DIFFUSE_ENV_OUTPUT, IBL_PARAMS][..]])]
    #[case::specular(TemplateKind::SpecularPrefilter, &[], vec![&[ENV_FACES, SPECULAR_TEMP, IBL_PARAMS][..]])]
    #[case::emu(TemplateKind::EnergyEmu, &[], vec![&[EMU_OUTPUT, IBL_PARAMS][..]])]
    #[case::eavg(TemplateKind::EnergyEavg, &[], vec![&[EAVG_OUTPUT, IBL_PARAMS][..]])]
    fn test_templates_validate(
        #[case] template: TemplateKind,
        #[case] slots: &[&str],
        #[case] groups: Vec<&[&str]>,
    ) {
        let source = generate(slots, &groups, PassKind::Render, template).unwrap();
        let entry = if template.is_compute() { COMPUTE_ENTRY } else { FRAGMENT_ENTRY };
        assert!(source.contains(&format!("fn {entry}")));
        validate_wgsl(template.name(), &source).unwrap();
    }

    #[test]
    fn test_compute_template_rejects_vertex_input() {
        let err = generate(&[POSITION], &[&[BRDF_LUT_OUTPUT, IBL_PARAMS]], PassKind::Render, TemplateKind::BrdfLut)
            .unwrap_err();
        assert!(matches!(err, RendererError::ShaderTemplate { .. }));
    }

    #[test]
    fn test_lighting_feature_detection() {
        let key = ShaderVariantKey::derive(
            &[],
            &[
                &[CAMERA, DIRECTIONAL_LIGHT, SHADOW_MAP, SHADOW_SAMPLER],
                &[GBUFFER_NORMAL, GBUFFER_MATERIAL, GBUFFER_BASE_COLOR, GBUFFER_DEPTH],
                &[DIFFUSE_ENV, SPECULAR_ENV, BRDF_LUT, ENV_SAMPLER, EMU, EAVG],
            ],
            PassKind::Render,
            TemplateKind::DeferredLighting,
        )
        .unwrap();
        assert_eq!(
            key.features,
            ShaderFeatures::SHADOW | ShaderFeatures::IBL | ShaderFeatures::ENERGY_COMPENSATION
        );
    }
}

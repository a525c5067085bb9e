//! Deferred lighting pass
//!
//! Resolves the G-buffer into the HDR target with a fullscreen triangle:
//! direct light with PCF shadows, split-sum image-based lighting and, when
//! the Emu/Eavg tables exist, multi-bounce energy compensation. Pixels the
//! skybox marked unlit keep their base color.

use super::postprocess::FullscreenDraw;
use crate::backend::GraphicsBackend;
use crate::error::{RendererError, RendererResult};
use crate::pipeline::PipelineCache;
use crate::render_graph::*;
use crate::resources::names::*;
use crate::resources::{BindGroupFactory, ResourceSet};
use crate::shader::TemplateKind;
use std::any::Any;

/// G-buffer group of the lighting pass, also the attachments it samples
pub const GBUFFER_INPUTS: [&str; 4] = [GBUFFER_NORMAL, GBUFFER_MATERIAL, GBUFFER_BASE_COLOR, GBUFFER_DEPTH];

/// Deferred lighting pass
pub struct LightingPass {
    draw: FullscreenDraw,
}

impl LightingPass {
    /// Bind group name lists: globals, G-buffer, environment
    pub fn groups(light: &'static str, energy_compensation: bool) -> Vec<Vec<&'static str>> {
        let mut environment = vec![DIFFUSE_ENV, SPECULAR_ENV, BRDF_LUT, ENV_SAMPLER];
        if energy_compensation {
            environment.extend([EMU, EAVG]);
        }
        vec![
            vec![CAMERA, light, SHADOW_MAP, SHADOW_SAMPLER],
            GBUFFER_INPUTS.to_vec(),
            environment,
        ]
    }

    /// `sources` must cover every name of [`LightingPass::groups`]
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        cache: &mut PipelineCache,
        bind_groups: &mut BindGroupFactory,
        light: &'static str,
        energy_compensation: bool,
        sources: &[&ResourceSet],
    ) -> RendererResult<Self> {
        let target_format = bind_groups
            .registry()
            .get(HDR_COLOR)?
            .texture_format()
            .ok_or_else(|| RendererError::ResourceKindMismatch {
                name: HDR_COLOR.to_string(),
                expected: "texture",
            })?;

        let groups = Self::groups(light, energy_compensation);
        let group_refs: Vec<&[&str]> = groups.iter().map(Vec::as_slice).collect();
        let draw = FullscreenDraw::prepare(
            backend,
            cache,
            bind_groups,
            "Deferred Lighting",
            TemplateKind::DeferredLighting,
            &group_refs,
            sources,
            target_format,
        )?;
        Ok(Self { draw })
    }
}

impl LightingPass {
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.draw.release(backend);
    }
}

impl RenderPass for LightingPass {
    fn name(&self) -> &str {
        "Deferred Lighting Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        for input in GBUFFER_INPUTS {
            ctx.read(input, ResourceUsage::TextureRead);
        }
        ctx.read(SHADOW_MAP, ResourceUsage::TextureRead);
        ctx.write(HDR_COLOR, ResourceUsage::RenderTarget);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> RendererResult<()> {
        let target = ctx.view(HDR_COLOR)?;
        self.draw.record(ctx, "Deferred Lighting Pass", target, [0.0, 0.0, 0.0, 1.0]);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{generate, validate_wgsl, PassKind};

    #[test]
    fn test_groups_generate_a_valid_module() {
        for energy in [false, true] {
            let groups = LightingPass::groups(POINT_LIGHT, energy);
            let refs: Vec<&[&str]> = groups.iter().map(Vec::as_slice).collect();
            let source = generate(&[], &refs, PassKind::Render, TemplateKind::DeferredLighting).unwrap();
            assert_eq!(source.contains("fn energy_compensation"), energy);
            validate_wgsl("lighting", &source).unwrap();
        }
    }
}

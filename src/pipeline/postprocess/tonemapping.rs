//! Tonemapping post-processing

use super::FullscreenDraw;
use crate::backend::{GraphicsBackend, TextureFormat};
use crate::config::ToneMapping;
use crate::error::RendererResult;
use crate::pipeline::PipelineCache;
use crate::render_graph::*;
use crate::resources::names::*;
use crate::resources::{BindGroupFactory, ResourceSet};
use crate::shader::TemplateKind;
use bytemuck::{Pod, Zeroable};
use std::any::Any;

/// GPU layout of the tone mapping parameters
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ToneMappingUniform {
    pub exposure: f32,
    pub gamma: f32,
    pub mode: u32,
    pub _padding: u32,
}

impl ToneMappingUniform {
    /// sRGB targets encode on store, so the shader skips its own gamma
    pub fn new(tone_mapping: &ToneMapping, target: TextureFormat) -> Self {
        Self {
            exposure: tone_mapping.exposure,
            gamma: if target.is_srgb() { 1.0 } else { tone_mapping.gamma },
            mode: tone_mapping.operator.shader_index(),
            _padding: 0,
        }
    }
}

/// Resolves the HDR target to the frame target
pub struct TonemappingPass {
    draw: FullscreenDraw,
}

impl TonemappingPass {
    pub const GROUPS: &'static [&'static [&'static str]] = &[&[HDR_COLOR, POST_SAMPLER, TONE_MAPPING]];

    /// `sources` must hold the HDR target, the post sampler and the tone
    /// mapping uniform
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        cache: &mut PipelineCache,
        bind_groups: &mut BindGroupFactory,
        sources: &[&ResourceSet],
    ) -> RendererResult<Self> {
        let target_format = backend.surface_format();
        let draw = FullscreenDraw::prepare(
            backend,
            cache,
            bind_groups,
            "Tonemapping",
            TemplateKind::ToneMapping,
            Self::GROUPS,
            sources,
            target_format,
        )?;
        Ok(Self { draw })
    }
}

impl TonemappingPass {
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.draw.release(backend);
    }
}

impl RenderPass for TonemappingPass {
    fn name(&self) -> &str {
        "Tonemapping"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(HDR_COLOR, ResourceUsage::TextureRead);
        ctx.write(FRAME_TARGET, ResourceUsage::RenderTarget);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> RendererResult<()> {
        let target = ctx.view(FRAME_TARGET)?;
        self.draw.record(ctx, "Tonemapping", target, [0.0, 0.0, 0.0, 1.0]);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

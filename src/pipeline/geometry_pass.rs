//! Geometry (G-Buffer) pass for deferred rendering
//!
//! Replays every object's pre-recorded render bundle into multiple render
//! targets:
//! - World-space normals (RGBA16F)
//! - Material properties: metalness, roughness, specular, lit flag
//! - Base color
//! - Depth buffer

use crate::backend::*;
use crate::error::{RendererError, RendererResult};
use crate::render_graph::*;
use crate::resources::names::*;
use crate::resources::FormatRegistry;
use std::any::Any;

/// Color attachments in `@location` order of the G-buffer output struct
pub const GBUFFER_COLOR_TARGETS: [&str; 3] = [GBUFFER_NORMAL, GBUFFER_MATERIAL, GBUFFER_BASE_COLOR];

/// Color formats of the G-buffer attachments
pub fn gbuffer_color_formats(registry: &FormatRegistry) -> RendererResult<Vec<TextureFormat>> {
    GBUFFER_COLOR_TARGETS
        .iter()
        .map(|name| {
            registry
                .get(name)?
                .texture_format()
                .ok_or_else(|| RendererError::ResourceKindMismatch {
                    name: name.to_string(),
                    expected: "texture",
                })
        })
        .collect()
}

/// Geometry pass replaying object bundles
pub struct GeometryPass {
    bundles: Vec<RenderBundleHandle>,
    clear_color: [f32; 4],
}

impl GeometryPass {
    pub fn new(bundles: Vec<RenderBundleHandle>, clear_color: [f32; 4]) -> Self {
        Self { bundles, clear_color }
    }

    /// Formats every geometry bundle must be recorded against
    pub fn bundle_descriptor(registry: &FormatRegistry) -> RendererResult<RenderBundleDescriptor> {
        Ok(RenderBundleDescriptor {
            label: Some("Geometry Bundle".into()),
            color_formats: gbuffer_color_formats(registry)?,
            depth_format: Some(TextureFormat::Depth32Float),
        })
    }

    pub fn bundles(&self) -> &[RenderBundleHandle] {
        &self.bundles
    }
}

impl RenderPass for GeometryPass {
    fn name(&self) -> &str {
        "Geometry Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        for target in GBUFFER_COLOR_TARGETS {
            ctx.write(target, ResourceUsage::RenderTarget);
        }
        ctx.write(GBUFFER_DEPTH, ResourceUsage::DepthStencilWrite);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> RendererResult<()> {
        let normal_view = ctx.view(GBUFFER_NORMAL)?;
        let material_view = ctx.view(GBUFFER_MATERIAL)?;
        let base_color_view = ctx.view(GBUFFER_BASE_COLOR)?;
        let depth_view = ctx.view(GBUFFER_DEPTH)?;

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Geometry Pass".into()),
            color_attachments: vec![
                // Location 0: Normal
                ColorAttachment {
                    view: normal_view,
                    load_op: LoadOp::Clear([0.0, 0.0, 0.0, 0.0]),
                    store_op: StoreOp::Store,
                },
                // Location 1: Material, w = 0 leaves the pixel unlit
                ColorAttachment {
                    view: material_view,
                    load_op: LoadOp::Clear([0.0, 0.5, 0.5, 0.0]),
                    store_op: StoreOp::Store,
                },
                // Location 2: Base color
                ColorAttachment {
                    view: base_color_view,
                    load_op: LoadOp::Clear(self.clear_color),
                    store_op: StoreOp::Store,
                },
            ],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });

        ctx.set_full_viewport();
        if !self.bundles.is_empty() {
            ctx.backend.execute_bundles(&self.bundles);
        }

        ctx.backend.end_render_pass();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

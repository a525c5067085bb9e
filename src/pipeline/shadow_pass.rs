//! Shadow map pass
//!
//! Depth-only pass from the light's point of view. Objects contribute
//! pre-recorded shadow bundles; the skybox casts no shadow.

use crate::backend::*;
use crate::error::RendererResult;
use crate::render_graph::*;
use crate::resources::names::SHADOW_MAP;
use std::any::Any;

pub struct ShadowPass {
    bundles: Vec<RenderBundleHandle>,
    map_size: u32,
}

impl ShadowPass {
    pub fn new(bundles: Vec<RenderBundleHandle>, map_size: u32) -> Self {
        Self { bundles, map_size }
    }

    /// Depth-only target every shadow bundle is recorded against
    pub fn bundle_descriptor() -> RenderBundleDescriptor {
        RenderBundleDescriptor {
            label: Some("Shadow Bundle".into()),
            color_formats: Vec::new(),
            depth_format: Some(TextureFormat::Depth32Float),
        }
    }

    pub fn bundles(&self) -> &[RenderBundleHandle] {
        &self.bundles
    }
}

impl RenderPass for ShadowPass {
    fn name(&self) -> &str {
        "Shadow Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.write(SHADOW_MAP, ResourceUsage::DepthStencilWrite);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> RendererResult<()> {
        let depth_view = ctx.view(SHADOW_MAP)?;

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Shadow Pass".into()),
            color_attachments: Vec::new(),
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });

        let size = self.map_size as f32;
        ctx.backend.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
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

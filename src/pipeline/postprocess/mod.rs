//! Post-processing effects
//!
//! Every post-process stage draws one fullscreen triangle that samples the
//! previous stage's output.

mod tonemapping;

pub use tonemapping::{ToneMappingUniform, TonemappingPass};

use crate::backend::{
    ColorAttachment, CullMode, DrawCommand, GraphicsBackend, LoadOp,
    RenderPassDescriptor, RenderPipelineHandle, StoreOp, TextureFormat, TextureViewHandle,
};
use crate::error::RendererResult;
use crate::pipeline::{PipelineCache, RenderPipelineRequest};
use crate::render_graph::PassExecuteContext;
use crate::resources::{BindGroup, BindGroupFactory, ResourceSet};
use crate::shader::{PassKind, TemplateKind};

/// Pipeline and bind groups of a fullscreen stage
#[derive(Debug)]
pub struct FullscreenDraw {
    pub pipeline: RenderPipelineHandle,
    pub bind_groups: Vec<BindGroup>,
}

impl FullscreenDraw {
    /// Build the pipeline for `groups` and bind each group from `sources`
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        backend: &mut dyn GraphicsBackend,
        cache: &mut PipelineCache,
        bind_groups: &mut BindGroupFactory,
        label: &str,
        template: TemplateKind,
        groups: &[&[&str]],
        sources: &[&ResourceSet],
        target_format: TextureFormat,
    ) -> RendererResult<Self> {
        let pipeline = cache.render_pipeline(
            backend,
            bind_groups,
            &RenderPipelineRequest {
                label,
                template,
                pass: PassKind::Render,
                vertex_slots: &[],
                groups,
                color_targets: vec![target_format],
                depth: None,
                cull_mode: CullMode::None,
            },
        )?;

        let mut draw = Self {
            pipeline: pipeline.handle,
            bind_groups: Vec::with_capacity(groups.len()),
        };
        for (names, layout) in groups.iter().zip(&pipeline.layouts) {
            let group = ResourceSet::gather(names, sources)
                .and_then(|instances| bind_groups.create(backend, names, &instances, Some(layout)));
            match group {
                Ok(group) => draw.bind_groups.push(group),
                Err(err) => {
                    draw.release(backend);
                    return Err(err);
                }
            }
        }
        Ok(draw)
    }

    /// Drop the bind groups and their views. The pipeline stays cached.
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for group in self.bind_groups.drain(..) {
            group.release(backend);
        }
    }

    /// Clear `target` and draw the triangle into it
    pub fn record(&self, ctx: &mut PassExecuteContext, label: &str, target: TextureViewHandle, clear: [f32; 4]) {
        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(label.to_string()),
            color_attachments: vec![ColorAttachment {
                view: target,
                load_op: LoadOp::Clear(clear),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });
        ctx.set_full_viewport();

        ctx.backend.draw_command(DrawCommand::SetPipeline(self.pipeline));
        for (index, group) in self.bind_groups.iter().enumerate() {
            ctx.backend.draw_command(DrawCommand::SetBindGroup {
                index: index as u32,
                bind_group: group.handle,
            });
        }
        ctx.backend.draw_command(DrawCommand::Draw {
            vertices: 0..3,
            instances: 0..1,
        });

        ctx.backend.end_render_pass();
    }
}

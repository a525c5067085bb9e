//! Render graph executor

use crate::backend::{GraphicsBackend, TextureViewHandle};
use crate::error::RendererResult;
use crate::render_graph::graph::*;
use crate::render_graph::pass::*;
use std::collections::HashMap;

/// Runs a compiled graph once per frame into a single submission
pub struct RenderGraphExecutor {
    /// Attachment views mapped by resource name
    views: HashMap<String, TextureViewHandle>,
}

impl RenderGraphExecutor {
    pub fn new() -> Self {
        Self {
            views: HashMap::new(),
        }
    }

    /// Set the view a pass attaches for `resource`
    pub fn set_view(&mut self, resource: &str, view: TextureViewHandle) {
        self.views.insert(resource.to_string(), view);
    }

    pub fn view(&self, resource: &str) -> Option<TextureViewHandle> {
        self.views.get(resource).copied()
    }

    /// Begin the frame, record every pass in compiled order and submit
    pub fn execute(
        &self,
        graph: &RenderGraph,
        compiled: &CompiledGraph,
        backend: &mut dyn GraphicsBackend,
    ) -> RendererResult<()> {
        let frame = backend.begin_frame()?;

        for &pass_id in &compiled.pass_order {
            if let Some(pass) = graph.get_pass(pass_id) {
                let mut ctx = PassExecuteContext {
                    backend: &mut *backend,
                    width: frame.width,
                    height: frame.height,
                    target_view: frame.target_view,
                    views: &self.views,
                };
                log::trace!("Executing pass '{}'", pass.name());
                pass.execute(&mut ctx)?;
            }
        }

        backend.end_frame()?;
        Ok(())
    }

    /// Destroy every attachment view
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, view) in self.views.drain() {
            backend.destroy_texture_view(view);
        }
    }
}

impl Default for RenderGraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{RecordingBackend, TraceEvent};
    use crate::backend::{ColorAttachment, LoadOp, RenderPassDescriptor, StoreOp};
    use crate::render_graph::{ResourceUsage, FRAME_TARGET};
    use std::any::Any;

    struct ClearPass {
        target: &'static str,
    }

    impl RenderPass for ClearPass {
        fn name(&self) -> &str {
            self.target
        }

        fn setup(&mut self, ctx: &mut PassSetupContext) {
            ctx.write(self.target, ResourceUsage::RenderTarget);
        }

        fn execute(&self, ctx: &mut PassExecuteContext) -> RendererResult<()> {
            let view = ctx.view(self.target)?;
            ctx.backend.begin_render_pass(&RenderPassDescriptor {
                label: Some(self.target.into()),
                color_attachments: vec![ColorAttachment {
                    view,
                    load_op: LoadOp::Clear([0.0; 4]),
                    store_op: StoreOp::Store,
                }],
                depth_stencil_attachment: None,
            });
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

    #[test]
    fn test_frame_is_bracketed_by_begin_and_end() {
        let mut graph = RenderGraph::new();
        graph.add_pass(ClearPass { target: FRAME_TARGET }, PassType::Graphics);
        let compiled = graph.compile().unwrap();

        let mut backend = RecordingBackend::new(8, 8);
        let executor = RenderGraphExecutor::new();
        executor.execute(&graph, &compiled, &mut backend).unwrap();

        let events = backend.events();
        assert_eq!(events.first(), Some(&TraceEvent::BeginFrame));
        assert_eq!(events.last(), Some(&TraceEvent::EndFrame));
        assert_eq!(backend.render_pass_labels(), vec![FRAME_TARGET.to_string()]);
    }

    #[test]
    fn test_release_destroys_attachment_views() {
        let mut backend = RecordingBackend::new(8, 8);
        let texture = backend
            .create_texture(&crate::backend::TextureDescriptor {
                width: 8,
                height: 8,
                ..Default::default()
            })
            .unwrap();
        let view = backend
            .create_texture_view(texture, &crate::backend::TextureViewDescriptor::default())
            .unwrap();

        let mut executor = RenderGraphExecutor::new();
        executor.set_view("hdr_color", view);
        executor.release(&mut backend);

        assert_eq!(executor.view("hdr_color"), None);
        assert_eq!(backend.live_view_count(), 0);
    }

    #[test]
    fn test_missing_view_fails_the_frame() {
        let mut graph = RenderGraph::new();
        graph.add_pass(ClearPass { target: "hdr_color" }, PassType::Graphics);
        let compiled = graph.compile().unwrap();

        let mut backend = RecordingBackend::new(8, 8);
        let executor = RenderGraphExecutor::new();
        assert!(executor.execute(&graph, &compiled, &mut backend).is_err());
    }
}

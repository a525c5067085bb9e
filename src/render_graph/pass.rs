//! Render pass definitions for the render graph

use crate::backend::{GraphicsBackend, TextureViewHandle};
use crate::error::{RendererError, RendererResult};
use crate::render_graph::resource::*;
use std::any::Any;
use std::collections::HashMap;

/// Unique identifier for a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

/// Context for declaring pass dependencies
pub struct PassSetupContext<'a> {
    pub(crate) inputs: &'a mut Vec<ResourceAccess>,
    pub(crate) outputs: &'a mut Vec<ResourceAccess>,
}

impl<'a> PassSetupContext<'a> {
    /// Declare that this pass reads from a resource
    pub fn read(&mut self, resource: &str, usage: ResourceUsage) {
        self.inputs.push(ResourceAccess {
            resource: resource.to_string(),
            usage,
        });
    }

    /// Declare that this pass writes to a resource
    pub fn write(&mut self, resource: &str, usage: ResourceUsage) {
        self.outputs.push(ResourceAccess {
            resource: resource.to_string(),
            usage,
        });
    }
}

/// Context for executing a render pass
pub struct PassExecuteContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub width: u32,
    pub height: u32,
    pub(crate) target_view: TextureViewHandle,
    pub(crate) views: &'a HashMap<String, TextureViewHandle>,
}

impl<'a> PassExecuteContext<'a> {
    /// Attachment view for a resource name; [`FRAME_TARGET`] is the
    /// presentation target of the current frame
    pub fn view(&self, resource: &str) -> RendererResult<TextureViewHandle> {
        if resource == FRAME_TARGET {
            return Ok(self.target_view);
        }
        self.views
            .get(resource)
            .copied()
            .ok_or_else(|| RendererError::ResourceInstanceMissing(resource.to_string()))
    }

    /// Full-target viewport
    pub fn set_full_viewport(&mut self) {
        self.backend
            .set_viewport(0.0, 0.0, self.width as f32, self.height as f32, 0.0, 1.0);
    }
}

/// Trait for render passes
pub trait RenderPass: Send + Sync {
    /// Get the pass name for debugging
    fn name(&self) -> &str;

    /// Setup phase - declare resource reads and writes
    fn setup(&mut self, ctx: &mut PassSetupContext);

    /// Execute phase - record commands
    fn execute(&self, ctx: &mut PassExecuteContext) -> RendererResult<()>;

    /// Allow downcasting
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Type of render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    /// Graphics render pass
    Graphics,
    /// Compute pass
    Compute,
}

/// Metadata about a pass in the graph
#[derive(Debug)]
pub struct PassNode {
    pub id: PassId,
    pub name: String,
    pub pass_type: PassType,
    pub inputs: Vec<ResourceAccess>,
    pub outputs: Vec<ResourceAccess>,
}

impl PassNode {
    pub fn reads_resource(&self, resource: &str) -> bool {
        self.inputs.iter().any(|a| a.resource == resource)
    }

    pub fn writes_resource(&self, resource: &str) -> bool {
        self.outputs.iter().any(|a| a.resource == resource)
    }
}

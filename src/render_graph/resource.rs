//! Resource access declarations for the render graph
//!
//! Passes refer to attachments and sampled textures by their logical
//! resource name, the same names the format registry and the bind groups use.

/// Name under which the executor exposes the frame's presentation target
pub const FRAME_TARGET: &str = "frame_target";

/// How a pass uses a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsage {
    /// Read as a texture (sampled)
    TextureRead,
    /// Write as a render target
    RenderTarget,
    /// Written from a compute shader
    StorageWrite,
    /// Depth attachment
    DepthStencilWrite,
    /// Read as uniform buffer
    UniformBuffer,
}

/// Resource access declaration for a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAccess {
    pub resource: String,
    pub usage: ResourceUsage,
}

impl ResourceAccess {
    pub fn is_read(&self) -> bool {
        matches!(
            self.usage,
            ResourceUsage::TextureRead | ResourceUsage::UniformBuffer
        )
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self.usage,
            ResourceUsage::RenderTarget
                | ResourceUsage::StorageWrite
                | ResourceUsage::DepthStencilWrite
        )
    }
}

//! Deferred rendering pipeline
//!
//! This module implements a deferred rendering pipeline:
//! 1. Shadow pass - Depth from the light into the shadow map
//! 2. Geometry pass - Object bundles into the G-buffer attachments
//! 3. Lighting pass - Fullscreen pass resolving the G-buffer into HDR
//! 4. Post-processing - Tonemapping into the frame target

mod cache;
pub mod geometry_pass;
pub mod lighting_pass;
pub mod postprocess;
pub mod shadow_pass;

pub use cache::*;
pub use geometry_pass::GeometryPass;
pub use lighting_pass::LightingPass;
pub use postprocess::{ToneMappingUniform, TonemappingPass};
pub use shadow_pass::ShadowPass;

use crate::backend::{CompareFunction, DepthStencilState, TextureFormat};
use crate::error::RendererResult;
use crate::render_graph::{CompiledGraph, PassType, RenderGraph};

/// Depth32 test state
pub fn depth_state(compare: CompareFunction, write: bool) -> DepthStencilState {
    DepthStencilState {
        format: TextureFormat::Depth32Float,
        depth_write_enabled: write,
        depth_compare: compare,
    }
}

/// Assemble the frame graph from its passes and sort it
pub fn build_deferred_graph(
    shadow: ShadowPass,
    geometry: GeometryPass,
    lighting: LightingPass,
    tonemapping: TonemappingPass,
) -> RendererResult<(RenderGraph, CompiledGraph)> {
    let mut graph = RenderGraph::new();
    graph.add_pass(shadow, PassType::Graphics);
    graph.add_pass(geometry, PassType::Graphics);
    graph.add_pass(lighting, PassType::Graphics);
    graph.add_pass(tonemapping, PassType::Graphics);

    let compiled = graph.compile()?;
    log::debug!(
        "Frame graph order: {}",
        compiled
            .pass_order
            .iter()
            .filter_map(|id| graph.get_pass_node(*id))
            .map(|node| node.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    Ok((graph, compiled))
}

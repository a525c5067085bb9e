//! Render graph definition and compilation

use crate::error::{RendererError, RendererResult};
use crate::render_graph::pass::*;
use std::collections::{BTreeSet, HashMap, HashSet};

/// The main render graph structure
pub struct RenderGraph {
    passes: Vec<Box<dyn RenderPass>>,
    pass_nodes: Vec<PassNode>,
    next_pass_id: u32,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            pass_nodes: Vec::new(),
            next_pass_id: 0,
        }
    }

    /// Add a render pass to the graph
    pub fn add_pass<P: RenderPass + 'static>(&mut self, pass: P, pass_type: PassType) -> PassId {
        let id = PassId(self.next_pass_id);
        self.next_pass_id += 1;

        let name = pass.name().to_string();
        let mut boxed_pass = Box::new(pass);

        // Setup the pass
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        {
            let mut ctx = PassSetupContext {
                inputs: &mut inputs,
                outputs: &mut outputs,
            };
            boxed_pass.setup(&mut ctx);
        }
        log::debug!(
            "Added pass '{}' reading [{}] writing [{}]",
            name,
            inputs.iter().map(|a| a.resource.as_str()).collect::<Vec<_>>().join(", "),
            outputs.iter().map(|a| a.resource.as_str()).collect::<Vec<_>>().join(", ")
        );

        self.passes.push(boxed_pass);
        self.pass_nodes.push(PassNode {
            id,
            name,
            pass_type,
            inputs,
            outputs,
        });

        id
    }

    /// Compile the graph - topological sort and resource lifetimes.
    ///
    /// Passes that do not depend on each other keep the order they were
    /// added in. A dependency cycle is an error.
    pub fn compile(&self) -> RendererResult<CompiledGraph> {
        // A pass depends on another if it reads a resource that the other writes
        let mut dependencies: HashMap<PassId, HashSet<PassId>> = HashMap::new();
        for reader in &self.pass_nodes {
            let mut depends_on = HashSet::new();
            for writer in &self.pass_nodes {
                if reader.id == writer.id {
                    continue;
                }
                if reader.inputs.iter().any(|input| writer.writes_resource(&input.resource)) {
                    depends_on.insert(writer.id);
                }
            }
            dependencies.insert(reader.id, depends_on);
        }

        // Kahn's algorithm, lowest id first
        let mut in_degree: HashMap<PassId, usize> = dependencies
            .iter()
            .map(|(id, deps)| (*id, deps.len()))
            .collect();
        let mut ready: BTreeSet<PassId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut sorted_passes = Vec::with_capacity(self.pass_nodes.len());
        while let Some(pass_id) = ready.pop_first() {
            sorted_passes.push(pass_id);

            for node in &self.pass_nodes {
                if dependencies[&node.id].contains(&pass_id) {
                    if let Some(degree) = in_degree.get_mut(&node.id) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(node.id);
                        }
                    }
                }
            }
        }

        if sorted_passes.len() != self.pass_nodes.len() {
            return Err(RendererError::InvalidState {
                operation: "compile render graph",
                state: "cyclic pass dependencies",
            });
        }

        // Determine resource lifetimes
        let mut resource_lifetimes: HashMap<String, ResourceLifetime> = HashMap::new();
        for (order, pass_id) in sorted_passes.iter().enumerate() {
            let Some(node) = self.get_pass_node(*pass_id) else {
                continue;
            };
            for access in node.inputs.iter().chain(node.outputs.iter()) {
                let lifetime = resource_lifetimes
                    .entry(access.resource.clone())
                    .or_insert(ResourceLifetime {
                        first_use: order,
                        last_use: order,
                    });
                lifetime.last_use = order;
            }
        }

        Ok(CompiledGraph {
            pass_order: sorted_passes,
            resource_lifetimes,
        })
    }

    /// Get all passes
    pub fn passes(&self) -> &[Box<dyn RenderPass>] {
        &self.passes
    }

    /// Get pass nodes (metadata)
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.pass_nodes
    }

    /// Get pass by ID
    pub fn get_pass(&self, id: PassId) -> Option<&dyn RenderPass> {
        let index = self.pass_nodes.iter().position(|n| n.id == id)?;
        Some(self.passes[index].as_ref())
    }

    /// Get pass node by ID
    pub fn get_pass_node(&self, id: PassId) -> Option<&PassNode> {
        self.pass_nodes.iter().find(|n| n.id == id)
    }

    /// First pass of concrete type `P`
    pub fn pass_mut<P: RenderPass + 'static>(&mut self) -> Option<&mut P> {
        self.passes
            .iter_mut()
            .find_map(|pass| pass.as_any_mut().downcast_mut::<P>())
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Resource lifetime in terms of pass execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    pub first_use: usize,
    pub last_use: usize,
}

/// Compiled render graph with execution order and resource lifetimes
#[derive(Debug)]
pub struct CompiledGraph {
    pub pass_order: Vec<PassId>,
    pub resource_lifetimes: HashMap<String, ResourceLifetime>,
}

impl CompiledGraph {
    /// Check if a resource is alive at a given execution step
    pub fn is_resource_alive(&self, resource: &str, step: usize) -> bool {
        if let Some(lifetime) = self.resource_lifetimes.get(resource) {
            step >= lifetime.first_use && step <= lifetime.last_use
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::ResourceUsage;
    use std::any::Any;

    struct TestPass {
        name: &'static str,
        reads: Vec<&'static str>,
        writes: Vec<&'static str>,
    }

    impl TestPass {
        fn new(name: &'static str, reads: &[&'static str], writes: &[&'static str]) -> Self {
            Self {
                name,
                reads: reads.to_vec(),
                writes: writes.to_vec(),
            }
        }
    }

    impl RenderPass for TestPass {
        fn name(&self) -> &str {
            self.name
        }

        fn setup(&mut self, ctx: &mut PassSetupContext) {
            for read in &self.reads {
                ctx.read(read, ResourceUsage::TextureRead);
            }
            for write in &self.writes {
                ctx.write(write, ResourceUsage::RenderTarget);
            }
        }

        fn execute(&self, _ctx: &mut PassExecuteContext) -> RendererResult<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn order_names(graph: &RenderGraph, compiled: &CompiledGraph) -> Vec<String> {
        compiled
            .pass_order
            .iter()
            .map(|id| graph.get_pass_node(*id).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_readers_follow_writers() {
        let mut graph = RenderGraph::new();
        graph.add_pass(TestPass::new("tone", &["hdr"], &["frame_target"]), PassType::Graphics);
        graph.add_pass(TestPass::new("lighting", &["gbuffer", "shadow"], &["hdr"]), PassType::Graphics);
        graph.add_pass(TestPass::new("geometry", &[], &["gbuffer"]), PassType::Graphics);
        graph.add_pass(TestPass::new("shadow", &[], &["shadow"]), PassType::Graphics);

        let compiled = graph.compile().unwrap();
        assert_eq!(order_names(&graph, &compiled), ["geometry", "shadow", "lighting", "tone"]);
    }

    #[test]
    fn test_independent_passes_keep_insertion_order() {
        let mut graph = RenderGraph::new();
        graph.add_pass(TestPass::new("shadow", &[], &["shadow"]), PassType::Graphics);
        graph.add_pass(TestPass::new("geometry", &[], &["gbuffer"]), PassType::Graphics);
        graph.add_pass(TestPass::new("lighting", &["gbuffer", "shadow"], &["hdr"]), PassType::Graphics);

        let compiled = graph.compile().unwrap();
        assert_eq!(order_names(&graph, &compiled), ["shadow", "geometry", "lighting"]);
        assert!(compiled.is_resource_alive("shadow", 1));
        assert!(!compiled.is_resource_alive("hdr", 0));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(TestPass::new("a", &["y"], &["x"]), PassType::Graphics);
        graph.add_pass(TestPass::new("b", &["x"], &["y"]), PassType::Graphics);
        assert!(matches!(graph.compile(), Err(RendererError::InvalidState { .. })));
    }

    #[test]
    fn test_downcast_pass() {
        let mut graph = RenderGraph::new();
        graph.add_pass(TestPass::new("a", &[], &["x"]), PassType::Compute);
        assert_eq!(graph.pass_mut::<TestPass>().map(|p| p.name), Some("a"));
    }
}

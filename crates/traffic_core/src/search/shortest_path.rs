use crate::constants::{NodeId, Weight};
use crate::graph::EdgeIndex;

/// Result of a successful search
#[derive(Debug, PartialEq, Clone)]
pub struct Route {
    /// Node ids from start to end, no node appears twice
    pub nodes: Vec<NodeId>,
    /// Edges taken, `edges[i]` leads from `nodes[i]` to `nodes[i + 1]`
    pub edges: Vec<EdgeIndex>,
    /// Sum of the current weights of `edges`
    pub cost: Weight,
}

impl Route {
    pub fn new(nodes: Vec<NodeId>, edges: Vec<EdgeIndex>, cost: Weight) -> Self {
        Route { nodes, edges, cost }
    }

    pub fn start(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn end(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }
}

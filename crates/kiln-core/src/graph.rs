//! Dataflow graph of tensor compute operations.
//!
//! The fusion passes never own the graph; they see it through the
//! [`GraphQuery`] capability trait (node lookup plus adjacency queries).
//! [`ComputeGraph`] is the concrete implementation the pass driver builds.

use crate::{Bhwc, Conv2dAttributes, DepthwiseConv2dAttributes, HashMap, RVec, ReluAttributes};

/// Unique identifier for graph nodes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Unique identifier for graph edges.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl std::fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Operation kind plus its attribute payload, decoded once at graph build
/// time. The fusion pass only distinguishes the kinds it can fuse; anything
/// else is `Other` and acts as a fusion barrier.
#[derive(Debug, Clone)]
pub enum Operation {
    DepthwiseConv2d(DepthwiseConv2dAttributes),
    Conv2d(Conv2dAttributes),
    Relu(ReluAttributes),
    Other(String),
}

impl Operation {
    pub fn name(&self) -> &str {
        match self {
            Operation::DepthwiseConv2d(_) => "depthwise_conv2d",
            Operation::Conv2d(_) => "conv2d",
            Operation::Relu(_) => "relu",
            Operation::Other(name) => name,
        }
    }
}

/// An operation instance placed in the graph.
#[derive(Debug)]
pub struct ComputeNode {
    pub id: NodeId,
    pub op: Operation,
}

/// A directed value edge; carries the concrete activation shape.
#[derive(Debug)]
pub struct TensorEdge {
    pub id: EdgeId,
    pub shape: Bhwc,
}

/// Read-only graph access used by the fusion passes.
pub trait GraphQuery {
    fn node(&self, id: NodeId) -> Option<&ComputeNode>;
    fn edge(&self, id: EdgeId) -> Option<&TensorEdge>;
    /// Input edges of `node`, in declaration order.
    fn inputs(&self, node: NodeId) -> &[EdgeId];
    /// Output edges of `node`, in declaration order.
    fn outputs(&self, node: NodeId) -> &[EdgeId];
    /// Nodes consuming `edge`.
    fn consumers(&self, edge: EdgeId) -> &[NodeId];
}

/// Concrete graph with an explicit adjacency index.
#[derive(Debug, Default)]
pub struct ComputeGraph {
    nodes: HashMap<NodeId, ComputeNode>,
    edges: HashMap<EdgeId, TensorEdge>,
    node_inputs: HashMap<NodeId, RVec<EdgeId>>,
    node_outputs: HashMap<NodeId, RVec<EdgeId>>,
    edge_consumers: HashMap<EdgeId, RVec<NodeId>>,
    next_node: usize,
    next_edge: usize,
}

impl ComputeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a value edge carrying `shape`.
    pub fn add_edge(&mut self, shape: Bhwc) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(id, TensorEdge { id, shape });
        id
    }

    /// Place `op` consuming `inputs` and producing `outputs`, maintaining
    /// the consumer index.
    pub fn add_node(&mut self, op: Operation, inputs: &[EdgeId], outputs: &[EdgeId]) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, ComputeNode { id, op });
        self.node_inputs.insert(id, inputs.into());
        self.node_outputs.insert(id, outputs.into());
        for &edge in inputs {
            self.edge_consumers.entry(edge).or_default().push(id);
        }
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl GraphQuery for ComputeGraph {
    fn node(&self, id: NodeId) -> Option<&ComputeNode> {
        self.nodes.get(&id)
    }

    fn edge(&self, id: EdgeId) -> Option<&TensorEdge> {
        self.edges.get(&id)
    }

    fn inputs(&self, node: NodeId) -> &[EdgeId] {
        self.node_inputs.get(&node).map(|e| e.as_slice()).unwrap_or(&[])
    }

    fn outputs(&self, node: NodeId) -> &[EdgeId] {
        self.node_outputs.get(&node).map(|e| e.as_slice()).unwrap_or(&[])
    }

    fn consumers(&self, edge: EdgeId) -> &[NodeId] {
        self.edge_consumers.get(&edge).map(|n| n.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_index_tracks_consumers() {
        let mut graph = ComputeGraph::new();
        let a = graph.add_edge(Bhwc::new(1, 4, 4, 8));
        let b = graph.add_edge(Bhwc::new(1, 4, 4, 8));
        let c = graph.add_edge(Bhwc::new(1, 4, 4, 8));
        let n0 = graph.add_node(Operation::Relu(ReluAttributes::relu()), &[a], &[b]);
        let n1 = graph.add_node(Operation::Relu(ReluAttributes::relu()), &[b], &[c]);
        let n2 = graph.add_node(Operation::Other("pad".into()), &[b], &[c]);

        assert_eq!(graph.consumers(a), &[n0]);
        assert_eq!(graph.consumers(b), &[n1, n2]);
        assert!(graph.consumers(c).is_empty());
        assert_eq!(graph.inputs(n1), &[b]);
        assert_eq!(graph.outputs(n0), &[b]);
        assert_eq!(graph.node(n0).unwrap().op.name(), "relu");
    }
}

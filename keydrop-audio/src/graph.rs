//! Signal routing graph
//!
//! Nodes live in an arena and are connected by index. The graph is compiled
//! once into a processing order; each node owns one interleaved stereo
//! buffer that downstream nodes read from.

use crate::deck::DeckId;
use thiserror::Error;

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a node does when it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Source: renders a deck
    Deck(DeckId),
    /// Insert: runs a deck's effects rack over its input
    Rack(DeckId),
    /// Two-port crossfade: port 0 is deck 1, port 1 is deck 2
    Mixer,
    /// Sink: master stage feeding the device
    Bus,
}

/// Connection from one node's output to an input port of another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub port: usize,
}

/// Graph wiring errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    UnknownNode(usize),

    #[error("routing contains a cycle")]
    Cycle,
}

/// Arena of processing nodes with index-based edges
#[derive(Debug, Default)]
pub struct SignalGraph {
    nodes: Vec<NodeKind>,
    edges: Vec<Edge>,
    order: Vec<NodeId>,
    buffers: Vec<Vec<f32>>,
}

impl SignalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The console wiring: `Deck n -> Rack n -> Mixer port n -> Bus`
    pub fn dj_console() -> Result<Self, GraphError> {
        let mut graph = Self::new();
        let mixer = graph.add_node(NodeKind::Mixer);
        let bus = graph.add_node(NodeKind::Bus);
        for deck in DeckId::ALL {
            let source = graph.add_node(NodeKind::Deck(deck));
            let rack = graph.add_node(NodeKind::Rack(deck));
            graph.connect(source, rack, 0)?;
            graph.connect(rack, mixer, deck.index())?;
        }
        graph.connect(mixer, bus, 0)?;
        graph.compile()?;
        Ok(graph)
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(kind);
        self.buffers.push(Vec::new());
        NodeId(self.nodes.len() - 1)
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId, port: usize) -> Result<(), GraphError> {
        for id in [from, to] {
            if id.0 >= self.nodes.len() {
                return Err(GraphError::UnknownNode(id.0));
            }
        }
        self.edges.push(Edge { from, to, port });
        Ok(())
    }

    /// Topologically sort the nodes (Kahn's algorithm, stable by insertion)
    pub fn compile(&mut self) -> Result<(), GraphError> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        for edge in &self.edges {
            in_degree[edge.to.0] += 1;
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut ready: Vec<usize> = (0..self.nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        ready.reverse();

        while let Some(node) = ready.pop() {
            order.push(NodeId(node));
            for edge in self.edges.iter().filter(|e| e.from.0 == node) {
                in_degree[edge.to.0] -= 1;
                if in_degree[edge.to.0] == 0 {
                    ready.push(edge.to.0);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(GraphError::Cycle);
        }
        self.order = order;
        Ok(())
    }

    /// Nodes in processing order (empty until compiled)
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0]
    }

    /// First node feeding `port` of `id`
    pub fn input(&self, id: NodeId, port: usize) -> Option<NodeId> {
        self.edges
            .iter()
            .find(|e| e.to == id && e.port == port)
            .map(|e| e.from)
    }

    /// Size every node buffer for a block of `len` samples and zero it
    pub fn prepare(&mut self, len: usize) {
        for buffer in &mut self.buffers {
            if buffer.len() < len {
                buffer.resize(len, 0.0);
            }
            buffer[..len].fill(0.0);
        }
    }

    /// Output buffer of a node
    pub fn buffer(&self, id: NodeId, len: usize) -> &[f32] {
        &self.buffers[id.0][..len]
    }

    /// Detach a node's buffer so it can be written while inputs are read
    pub fn take_buffer(&mut self, id: NodeId) -> Vec<f32> {
        std::mem::take(&mut self.buffers[id.0])
    }

    pub fn restore_buffer(&mut self, id: NodeId, buffer: Vec<f32>) {
        self.buffers[id.0] = buffer;
    }

    /// Sum everything connected to `port` of `id` into `out`
    pub fn gather(&self, id: NodeId, port: usize, out: &mut [f32]) {
        for edge in self.edges.iter().filter(|e| e.to == id && e.port == port) {
            let src = &self.buffers[edge.from.0];
            for (o, s) in out.iter_mut().zip(src.iter()) {
                *o += s;
            }
        }
    }
}

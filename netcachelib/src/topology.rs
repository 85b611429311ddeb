use crate::config::{TopologyConfig, TopologyKind};
use crate::error::{SimError, SimResult};

pub type NodeId = usize;
pub type EdgeId = usize;

pub const RECEIVER: NodeId = 0;
pub const ROOT: NodeId = 1;
const FIRST_SOURCE: NodeId = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeRole {
    Receiver,
    Root,
    Source(usize),
}

/// An undirected link between two nodes
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Edge {
    pub endpoints: (NodeId, NodeId),
    pub delay: f64,
}

/// The route from the receiver to one source, precomputed at build time
///
/// `nodes[0]` is always the receiver and the last node is the source. `edges[i]` joins `nodes[i]`
/// and `nodes[i + 1]`, and `cumulative_delay[i]` is the total delay from the receiver to `nodes[i]`
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub cumulative_delay: Vec<f64>,
}

impl Path {
    pub fn hops(&self) -> usize {
        self.edges.len()
    }
}

/// An immutable tree of one receiver, one root and `n` source nodes
///
/// Routing is unambiguous: exactly one path exists between the receiver and each source. Every
/// path is built once so lookups during simulation are O(1)
#[derive(Debug, Clone)]
pub struct Topology {
    kind: TopologyKind,
    roles: Vec<NodeRole>,
    edges: Vec<Edge>,
    paths: Vec<Path>,
}

impl Topology {
    /// Builds the topology described by the configuration
    pub fn new(config: &TopologyConfig) -> SimResult<Self> {
        if config.n < 1 {
            return Err(SimError::config("a topology needs at least one source"));
        }
        let mut roles = vec![NodeRole::Receiver, NodeRole::Root];
        roles.extend((0..config.n).map(NodeRole::Source));
        let mut edges = vec![Edge { endpoints: (RECEIVER, ROOT), delay: config.access_delay }];
        match config.kind {
            TopologyKind::Scale => {
                edges.extend((0..config.n).map(|source| Edge { endpoints: (ROOT, FIRST_SOURCE + source), delay: config.delay }));
            }
            TopologyKind::Line => {
                let mut previous = ROOT;
                for source in 0..config.n {
                    let node = FIRST_SOURCE + source;
                    edges.push(Edge { endpoints: (previous, node), delay: config.delay });
                    previous = node;
                }
            }
        }
        let mut topology = Self { kind: config.kind, roles, edges, paths: Vec::with_capacity(config.n) };
        topology.paths = (0..config.n).map(|source| topology.build_path(source)).collect();
        Ok(topology)
    }

    // In both shapes source i hangs off edge i + 1, and its parent is the root (star) or the
    // previous source (line), so the route can be read off without a graph search
    fn build_path(&self, source: usize) -> Path {
        let edge_chain: Vec<EdgeId> = match self.kind {
            TopologyKind::Scale => vec![0, source + 1],
            TopologyKind::Line => (0..=source + 1).collect(),
        };
        let mut nodes = vec![RECEIVER];
        let mut cumulative_delay = vec![0.0];
        for &edge in &edge_chain {
            let (_, far) = self.edges[edge].endpoints;
            nodes.push(far);
            cumulative_delay.push(cumulative_delay.last().copied().unwrap_or(0.0) + self.edges[edge].delay);
        }
        Path { nodes, edges: edge_chain, cumulative_delay }
    }

    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    pub fn source_count(&self) -> usize {
        self.paths.len()
    }

    pub fn node_count(&self) -> usize {
        self.roles.len()
    }

    pub fn role(&self, node: NodeId) -> NodeRole {
        self.roles[node]
    }

    /// The topology node hosting the given source
    pub fn source_node(&self, source: usize) -> NodeId {
        FIRST_SOURCE + source
    }

    /// The source index hosted on a node, if any
    pub fn source_of(&self, node: NodeId) -> Option<usize> {
        match self.roles.get(node) {
            Some(NodeRole::Source(source)) => Some(*source),
            _ => None,
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn path(&self, source: usize) -> &Path {
        &self.paths[source]
    }

    /// Hops from the receiver to the given source
    pub fn distance(&self, source: usize) -> usize {
        self.paths[source].hops()
    }

    /// A human readable label for an edge, used as a key in link load results
    pub fn edge_label(&self, edge: EdgeId) -> String {
        let (a, b) = self.edges[edge].endpoints;
        format!("{}-{}", self.node_label(a), self.node_label(b))
    }

    pub fn node_label(&self, node: NodeId) -> String {
        match self.roles[node] {
            NodeRole::Receiver => "receiver".to_string(),
            NodeRole::Root => "root".to_string(),
            NodeRole::Source(source) => format!("source_{source}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(kind: TopologyKind, n: usize) -> TopologyConfig {
        TopologyConfig { kind, n, delay: 2.0, access_delay: 1.0 }
    }

    #[test]
    fn star_paths_have_two_hops() {
        let topology = Topology::new(&config(TopologyKind::Scale, 4)).unwrap();
        assert_eq!(topology.node_count(), 6);
        assert_eq!(topology.edges().len(), 5);
        for source in 0..4 {
            let path = topology.path(source);
            assert_eq!(path.nodes, vec![RECEIVER, ROOT, topology.source_node(source)]);
            assert_eq!(path.cumulative_delay, vec![0.0, 1.0, 3.0]);
            assert_eq!(topology.distance(source), 2);
        }
    }

    #[test]
    fn line_paths_pass_through_earlier_sources() {
        let topology = Topology::new(&config(TopologyKind::Line, 3)).unwrap();
        let path = topology.path(2);
        assert_eq!(path.nodes, vec![RECEIVER, ROOT, 2, 3, 4]);
        assert_eq!(path.edges, vec![0, 1, 2, 3]);
        assert_eq!(path.cumulative_delay, vec![0.0, 1.0, 3.0, 5.0, 7.0]);
        assert_eq!(topology.source_of(3), Some(1));
        assert_eq!(topology.source_of(ROOT), None);
        assert_eq!(topology.edge_label(2), "source_0-source_1");
    }

    #[test]
    fn rejects_empty_topology() {
        assert!(matches!(Topology::new(&config(TopologyKind::Line, 0)), Err(SimError::Configuration(_))));
    }
}

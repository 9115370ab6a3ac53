use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use log::{debug, warn};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use super::{DEFAULT_LINK_WEIGHT, Link, LinkWeight, Node, NodeRole, Path};
use crate::NodeId;
use crate::error::{NoPathError, TopologyError};

/// Network the endpoints are numbered from unless told otherwise.
pub const DEFAULT_SUBNET: (Ipv4Addr, u8) = (Ipv4Addr::new(10, 0, 0, 0), 8);

pub fn default_subnet() -> Ipv4Net {
    Ipv4Net::new(DEFAULT_SUBNET.0, DEFAULT_SUBNET.1).unwrap_or_default()
}

/// Undirected simple graph over the discovered nodes.
///
/// Parallel links collapse onto one edge (the weight of the last one wins) and self-loops are
/// dropped. Every node also gets an IPv4 address so routes can be expressed as gateways.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    graph: UnGraph<Node, LinkWeight>,
    index: HashMap<NodeId, NodeIndex>,
    addresses: HashMap<NodeId, Ipv4Addr>,
}

#[derive(Debug, PartialEq, Eq)]
struct State {
    cost: u64,
    node: NodeIndex,
    path: Path,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on cost, smallest node sequence first among equal costs
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.path.cmp(&self.path))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TopologyGraph {
    pub fn build(links: impl IntoIterator<Item = Link>) -> Self {
        Self::build_with_nodes(std::iter::empty(), links)
    }

    /// Like [`TopologyGraph::build`], but also registers `nodes`, including ones without any
    /// link. Roles given here take precedence over the ones inferred from link endpoints.
    pub fn build_with_nodes(
        nodes: impl IntoIterator<Item = Node>,
        links: impl IntoIterator<Item = Link>,
    ) -> Self {
        let mut topo = Self::default();

        for node in nodes {
            topo.insert_node(node);
        }

        for link in links {
            if link.is_self_loop() {
                warn!("Ignoring self-loop on {}", link.a);
                continue;
            }

            let weight = match link.weight {
                Some(0) => {
                    warn!(
                        "Link {}-{} has weight 0, using {}",
                        link.a, link.b, DEFAULT_LINK_WEIGHT
                    );
                    DEFAULT_LINK_WEIGHT
                }
                Some(weight) => weight,
                None => DEFAULT_LINK_WEIGHT,
            };

            let a = topo.insert_node(Node::from_name(&link.a));
            let b = topo.insert_node(Node::from_name(&link.b));
            if topo.graph.find_edge(a, b).is_some() {
                debug!("Duplicate link {}-{}, keeping weight {}", link.a, link.b, weight);
            }
            topo.graph.update_edge(a, b, weight);
        }

        if let Err(e) = topo.assign_addresses(default_subnet()) {
            warn!("Could not number endpoints: {}", e);
        }

        topo
    }

    fn insert_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    /// Numbers hosts first (in discovery order), then switches, from the usable addresses of
    /// `subnet`. Leaves the current plan untouched on failure.
    pub fn assign_addresses(&mut self, subnet: Ipv4Net) -> Result<(), TopologyError> {
        let ordered = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].role == NodeRole::Host)
            .chain(
                self.graph
                    .node_indices()
                    .filter(|&idx| self.graph[idx].role == NodeRole::Switch),
            );

        let mut pool = subnet.hosts();
        let mut addresses = HashMap::with_capacity(self.graph.node_count());
        for idx in ordered {
            let addr = pool.next().ok_or(TopologyError::SubnetTooSmall {
                subnet,
                needed: self.graph.node_count(),
            })?;
            addresses.insert(self.graph[idx].id.clone(), addr);
        }

        self.addresses = addresses;
        Ok(())
    }

    pub fn address_of(&self, id: &str) -> Option<Ipv4Addr> {
        self.addresses.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// All nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes().filter(|node| node.is_host())
    }

    pub fn switches(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes().filter(|node| !node.is_host())
    }

    pub fn host_ids(&self) -> Vec<NodeId> {
        self.hosts().map(|node| node.id.clone()).collect()
    }

    /// Neighbors of `id`, sorted by identifier.
    pub fn neighbors(&self, id: &str) -> Vec<NodeId> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut neighbors: Vec<NodeId> = self
            .graph
            .neighbors(idx)
            .map(|n| self.graph[n].id.clone())
            .collect();
        neighbors.sort();
        neighbors.dedup();
        neighbors
    }

    pub fn link_weight(&self, a: &str, b: &str) -> Option<LinkWeight> {
        let (&a, &b) = (self.index.get(a)?, self.index.get(b)?);
        self.graph
            .find_edge(a, b)
            .and_then(|edge| self.graph.edge_weight(edge))
            .copied()
    }

    pub fn is_adjacent(&self, a: &str, b: &str) -> bool {
        self.link_weight(a, b).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn component_count(&self) -> usize {
        petgraph::algo::connected_components(&self.graph)
    }

    /// Shortest path using the stored link weights.
    pub fn shortest_path(&self, src: &str, dst: &str) -> Result<Path, NoPathError> {
        self.shortest_path_by(src, dst, |weight| weight)
    }

    /// Shortest path where each edge costs `metric(link weight)`.
    ///
    /// Among equal-cost paths the lexicographically smallest node sequence is returned, so
    /// repeated queries on the same graph always agree. A metric of 0 is treated as 1.
    pub fn shortest_path_by<F>(&self, src: &str, dst: &str, metric: F) -> Result<Path, NoPathError>
    where
        F: Fn(LinkWeight) -> LinkWeight,
    {
        let (Some(&start), Some(&goal)) = (self.index.get(src), self.index.get(dst)) else {
            return Err(NoPathError::new(src, dst));
        };
        if start == goal {
            return Ok(vec![src.to_string()]);
        }

        let mut best: HashMap<NodeIndex, (u64, Path)> = HashMap::new();
        let mut settled: HashSet<NodeIndex> = HashSet::new();
        let mut heap = BinaryHeap::new();

        best.insert(start, (0, vec![src.to_string()]));
        heap.push(State {
            cost: 0,
            node: start,
            path: vec![src.to_string()],
        });

        while let Some(State { cost, node, path }) = heap.pop() {
            if !settled.insert(node) {
                continue;
            }
            if node == goal {
                return Ok(path);
            }

            for edge in self.graph.edges(node) {
                let next = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                if settled.contains(&next) {
                    continue;
                }

                let next_cost = cost.saturating_add(u64::from(metric(*edge.weight()).max(1)));
                let mut next_path = path.clone();
                next_path.push(self.graph[next].id.clone());

                let improves = match best.get(&next) {
                    None => true,
                    Some((best_cost, best_path)) => (next_cost, &next_path) < (*best_cost, best_path),
                };
                if improves {
                    best.insert(next, (next_cost, next_path.clone()));
                    heap.push(State {
                        cost: next_cost,
                        node: next,
                        path: next_path,
                    });
                }
            }
        }

        Err(NoPathError::new(src, dst))
    }
}

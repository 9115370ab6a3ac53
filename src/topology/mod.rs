//! Network topology: nodes, links and the undirected graph every routing policy reads from.

pub mod generate;
pub mod graph;

pub use graph::TopologyGraph;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path as FsPath;

use crate::error::TopologyError;
use crate::NodeId;

pub type LinkWeight = u32;

pub const DEFAULT_LINK_WEIGHT: LinkWeight = 1;

/// Ordered node sequence, first element is the source and last the destination.
pub type Path = Vec<NodeId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Switch,
    Host,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub role: NodeRole,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, role: NodeRole) -> Self {
        Self { id: id.into(), role }
    }

    pub fn host(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeRole::Host)
    }

    pub fn switch(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeRole::Switch)
    }

    /// Infers the role from the usual naming scheme: `h1`, `h2`, ... are hosts, everything
    /// else is a switch.
    pub fn from_name(id: &str) -> Self {
        if id.starts_with('h') {
            Self::host(id)
        } else {
            Self::switch(id)
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == NodeRole::Host
    }
}

/// Traffic shaping the emulator should apply to a link. Ignored by route computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkShaping {
    pub bandwidth_mbps: u32,
    pub delay_ms: u32,
}

/// An undirected link between two nodes as reported by topology discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<LinkWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shaping: Option<LinkShaping>,
}

impl Link {
    pub fn new(a: impl Into<NodeId>, b: impl Into<NodeId>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            weight: None,
            shaping: None,
        }
    }

    pub fn with_weight(mut self, weight: LinkWeight) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_shaping(mut self, shaping: LinkShaping) -> Self {
        self.shaping = Some(shaping);
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.a == self.b
    }
}

/// Serializable topology: explicit nodes (optional) plus the link list.
///
/// This is the format read by `--topology-file` and written by `--dump-topology`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDescription {
    #[serde(default)]
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl TopologyDescription {
    pub fn load(path: impl AsRef<FsPath>) -> Result<Self, TopologyError> {
        let content = fs::read_to_string(path)?;
        let description: TopologyDescription = serde_json::from_str(&content)?;
        Ok(description)
    }

    pub fn save(&self, path: impl AsRef<FsPath>) -> Result<(), TopologyError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn build(&self) -> TopologyGraph {
        TopologyGraph::build_with_nodes(self.nodes.iter().cloned(), self.links.iter().cloned())
    }
}

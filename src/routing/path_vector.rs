use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{PolicyKind, RoutingPolicy};
use crate::NodeId;
use crate::error::NoPathError;
use crate::topology::{Path, TopologyGraph};

/// Autonomous-system number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AsId(pub u32);

impl fmt::Display for AsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

pub const AS_RANGE: (u32, u32) = (1, 65535);

/// Hop-count shortest path, with an AS number drawn for every node when the policy is created.
///
/// The AS numbers are metadata only: path selection does not look at them.
#[derive(Debug, Clone)]
pub struct PathVector {
    graph: Arc<TopologyGraph>,
    as_numbers: BTreeMap<NodeId, AsId>,
}

impl PathVector {
    pub fn new<R: Rng>(graph: Arc<TopologyGraph>, rng: &mut R) -> Self {
        let as_numbers: BTreeMap<NodeId, AsId> = graph
            .nodes()
            .map(|node| (node.id.clone(), AsId(rng.gen_range(AS_RANGE.0..=AS_RANGE.1))))
            .collect();
        debug!("PathVector: assigned AS numbers {:?}", as_numbers);
        Self { graph, as_numbers }
    }

    pub fn as_number(&self, id: &str) -> Option<AsId> {
        self.as_numbers.get(id).copied()
    }

    pub fn as_numbers(&self) -> &BTreeMap<NodeId, AsId> {
        &self.as_numbers
    }

    /// AS numbers along the current path from `src` to `dst`.
    pub fn as_path(&self, src: &str, dst: &str) -> Result<Vec<AsId>, NoPathError> {
        let path = self.path(src, dst)?;
        Ok(path.iter().filter_map(|id| self.as_number(id)).collect())
    }
}

impl RoutingPolicy for PathVector {
    fn kind(&self) -> PolicyKind {
        PolicyKind::PathVector
    }

    fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    fn path(&self, src: &str, dst: &str) -> Result<Path, NoPathError> {
        self.graph.shortest_path_by(src, dst, |_| 1)
    }
}

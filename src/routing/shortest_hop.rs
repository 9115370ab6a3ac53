use std::sync::Arc;

use super::{PolicyKind, RoutingPolicy};
use crate::error::NoPathError;
use crate::topology::{Path, TopologyGraph};

/// Minimum hop count. Link weights are ignored.
#[derive(Debug, Clone)]
pub struct ShortestHop {
    graph: Arc<TopologyGraph>,
}

impl ShortestHop {
    pub fn new(graph: Arc<TopologyGraph>) -> Self {
        Self { graph }
    }
}

impl RoutingPolicy for ShortestHop {
    fn kind(&self) -> PolicyKind {
        PolicyKind::ShortestHop
    }

    fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    fn path(&self, src: &str, dst: &str) -> Result<Path, NoPathError> {
        self.graph.shortest_path_by(src, dst, |_| 1)
    }
}

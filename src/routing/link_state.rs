use std::sync::Arc;

use super::{PolicyKind, RoutingPolicy};
use crate::error::NoPathError;
use crate::topology::{LinkWeight, Path, TopologyGraph};

/// Least total link cost, where the cost of a link is its configured weight.
///
/// With no weights configured every link costs 1 and the result matches [`super::ShortestHop`].
#[derive(Debug, Clone)]
pub struct LinkState {
    graph: Arc<TopologyGraph>,
}

impl LinkState {
    pub fn new(graph: Arc<TopologyGraph>) -> Self {
        Self { graph }
    }

    /// Total cost of `path`, or `None` if two consecutive nodes are not linked.
    pub fn path_cost(&self, path: &[String]) -> Option<u64> {
        path.windows(2).try_fold(0u64, |cost, pair| {
            let weight: LinkWeight = self.graph.link_weight(&pair[0], &pair[1])?;
            Some(cost + u64::from(weight))
        })
    }
}

impl RoutingPolicy for LinkState {
    fn kind(&self) -> PolicyKind {
        PolicyKind::LinkState
    }

    fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    fn path(&self, src: &str, dst: &str) -> Result<Path, NoPathError> {
        self.graph.shortest_path(src, dst)
    }
}

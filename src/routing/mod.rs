//! Route computation and installation for the three routing policies.
//!
//! Every policy owns a shared, immutable [`TopologyGraph`] and produces a fresh
//! [`RouteTable`] on each call. Installation goes through an [`EndpointControl`].

pub mod control;
pub mod link_state;
pub mod path_vector;
pub mod shortest_hop;

pub use control::{CommandControl, EndpointControl};
pub use link_state::LinkState;
pub use path_vector::{AsId, PathVector};
pub use shortest_hop::ShortestHop;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::NodeId;
use crate::error::NoPathError;
use crate::topology::{Path, TopologyGraph};

/// All-pairs host paths computed by one policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: BTreeMap<NodeId, BTreeMap<NodeId, Path>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path` under its first and last node. Empty paths are ignored.
    pub fn insert(&mut self, path: Path) {
        let (Some(src), Some(dst)) = (path.first(), path.last()) else {
            return;
        };
        let (src, dst) = (src.clone(), dst.clone());
        self.routes.entry(src).or_default().insert(dst, path);
    }

    pub fn get(&self, src: &str, dst: &str) -> Option<&Path> {
        self.routes.get(src)?.get(dst)
    }

    pub fn contains(&self, src: &str, dst: &str) -> bool {
        self.get(src, dst).is_some()
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(src, dst, path)` in source, then destination order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeId, &Path)> + '_ {
        self.routes
            .iter()
            .flat_map(|(src, dsts)| dsts.iter().map(move |(dst, path)| (src, dst, path)))
    }
}

impl Index<&str> for RouteTable {
    type Output = BTreeMap<NodeId, Path>;

    fn index(&self, src: &str) -> &Self::Output {
        &self.routes[src]
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:<12} {:<12} {:<5} {}", "Source", "Destination", "Next Hop", "Hops", "Path")?;
        writeln!(f, "{}", "-".repeat(70))?;
        if self.is_empty() {
            return writeln!(f, "No routes found");
        }
        for (src, dst, path) in self.iter() {
            let next_hop = path.get(1).unwrap_or(dst);
            writeln!(
                f,
                "{:<12} {:<12} {:<12} {:<5} {}",
                src,
                dst,
                next_hop,
                path.len() - 1,
                path.join(" -> ")
            )?;
        }
        Ok(())
    }
}

/// Outcome of one [`RoutingPolicy::apply_routing`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    pub attempted: usize,
    pub installed: usize,
    pub failed: usize,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    ShortestHop,
    LinkState,
    PathVector,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [Self::ShortestHop, Self::LinkState, Self::PathVector];

    pub fn name(self) -> &'static str {
        match self {
            Self::ShortestHop => "ShortestHop",
            Self::LinkState => "LinkState",
            Self::PathVector => "PathVector",
        }
    }

    pub fn build<R: Rng>(self, graph: Arc<TopologyGraph>, rng: &mut R) -> Box<dyn RoutingPolicy> {
        match self {
            Self::ShortestHop => Box::new(ShortestHop::new(graph)),
            Self::LinkState => Box::new(LinkState::new(graph)),
            Self::PathVector => Box::new(PathVector::new(graph, rng)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Path-selection strategy applied to a topology.
///
/// Implementors only decide how a single path is chosen ([`RoutingPolicy::path`]); table
/// construction, installation and next-hop lookup are shared.
pub trait RoutingPolicy: Send + Sync {
    fn kind(&self) -> PolicyKind;

    fn graph(&self) -> &TopologyGraph;

    fn path(&self, src: &str, dst: &str) -> Result<Path, NoPathError>;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Paths for every ordered pair of distinct hosts. Unreachable pairs are left out.
    fn compute_routes(&self) -> RouteTable {
        let hosts = self.graph().host_ids();
        let mut table = RouteTable::new();
        for src in &hosts {
            for dst in &hosts {
                if src == dst {
                    continue;
                }
                match self.path(src, dst) {
                    Ok(path) => table.insert(path),
                    Err(e) => debug!("{}: {}", self.name(), e),
                }
            }
        }
        table
    }

    /// Installs a host route on every source towards every reachable destination, using the
    /// second node of the path as gateway. Failures are logged and skipped.
    fn apply_routing(&self, control: &mut dyn EndpointControl) -> InstallSummary {
        let routes = self.compute_routes();
        let graph = self.graph();
        let mut summary = InstallSummary::default();

        for (src, dst, path) in routes.iter() {
            let Some(via_node) = path.get(1) else {
                continue;
            };
            summary.attempted += 1;

            let (Some(destination), Some(via)) = (graph.address_of(dst), graph.address_of(via_node))
            else {
                warn!("{}: no address for {} or {}, skipping route on {}", self.name(), dst, via_node, src);
                summary.failed += 1;
                continue;
            };

            match control.install_route(src, destination, via) {
                Ok(()) => {
                    debug!("{}: {} -> {} via {} ({})", self.name(), src, dst, via_node, via);
                    summary.installed += 1;
                }
                Err(e) => {
                    warn!("{}: failed to install route {} -> {}: {}", self.name(), src, dst, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "{}: installed {}/{} routes ({} failed)",
            self.name(),
            summary.installed,
            summary.attempted,
            summary.failed
        );
        summary
    }

    /// Second node of the current path, or `dst` itself when there is no intermediate hop.
    fn next_hop(&self, src: &str, dst: &str) -> Result<NodeId, NoPathError> {
        let path = self.path(src, dst)?;
        Ok(path.get(1).cloned().unwrap_or_else(|| dst.to_string()))
    }
}

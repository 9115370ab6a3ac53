//! Random lab topologies.

use rand::Rng;
use rand::seq::SliceRandom;

use super::{Link, LinkShaping, Node, TopologyDescription};

pub const BANDWIDTH_RANGE_MBPS: (u32, u32) = (10, 100);
pub const DELAY_RANGE_MS: (u32, u32) = (1, 10);

/// Full mesh of `switches` switches with random shaping, and `hosts` hosts each attached to one
/// uniformly chosen switch. Switches are named `s1..`, hosts `h1..`.
///
/// With zero switches the hosts are returned as isolated nodes.
pub fn mesh<R: Rng>(switches: usize, hosts: usize, rng: &mut R) -> TopologyDescription {
    let switch_nodes: Vec<Node> = (1..=switches).map(|i| Node::switch(format!("s{}", i))).collect();
    let host_nodes: Vec<Node> = (1..=hosts).map(|i| Node::host(format!("h{}", i))).collect();

    let mut links = Vec::new();
    for (i, a) in switch_nodes.iter().enumerate() {
        for b in &switch_nodes[i + 1..] {
            let shaping = LinkShaping {
                bandwidth_mbps: rng.gen_range(BANDWIDTH_RANGE_MBPS.0..=BANDWIDTH_RANGE_MBPS.1),
                delay_ms: rng.gen_range(DELAY_RANGE_MS.0..=DELAY_RANGE_MS.1),
            };
            links.push(Link::new(a.id.clone(), b.id.clone()).with_shaping(shaping));
        }
    }

    for host in &host_nodes {
        if let Some(switch) = switch_nodes.choose(rng) {
            links.push(Link::new(host.id.clone(), switch.id.clone()));
        }
    }

    TopologyDescription {
        nodes: switch_nodes.into_iter().chain(host_nodes).collect(),
        links,
    }
}

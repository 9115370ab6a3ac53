use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::NodeId;

/// Raised by a path lookup when the endpoints are unknown or not connected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no path from {src} to {dst}")]
pub struct NoPathError {
    pub src: NodeId,
    pub dst: NodeId,
}

impl NoPathError {
    pub fn new(src: &str, dst: &str) -> Self {
        Self {
            src: src.to_string(),
            dst: dst.to_string(),
        }
    }
}

/// Failure of a single external probe. Never escapes the measurement client.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("`{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("could not parse {metric} from probe output")]
    Parse { metric: &'static str, output: String },

    #[error("could not start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("no address known for endpoint {0}")]
    UnknownEndpoint(NodeId),
}

/// Failure to install a forwarding rule on a host.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("could not run route command on {host}: {source}")]
    Spawn {
        host: NodeId,
        #[source]
        source: io::Error,
    },

    #[error("route command on {host} exited with {status}: {stderr}")]
    CommandFailed {
        host: NodeId,
        status: String,
        stderr: String,
    },

    #[error("route command is empty")]
    EmptyCommand,
}

/// Fatal: the topology for an experiment run could not be built.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("could not read topology file: {0}")]
    Io(#[from] io::Error),

    #[error("could not parse topology file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("topology has {found} host(s), at least 2 are required")]
    TooFewHosts { found: usize },

    #[error("subnet {subnet} has no room for {needed} endpoints")]
    SubnetTooSmall { subnet: ipnet::Ipv4Net, needed: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access config file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the experiment run itself.
#[derive(Debug, Error)]
pub enum Error {
    #[error("topology build failed: {0}")]
    Topology(#[from] TopologyError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not write results: {0}")]
    Results(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Comparison of routing policies on an emulated network by their end-to-end QoS.
//!
//! A run builds one [`topology::TopologyGraph`], installs the routes of each
//! [`routing::RoutingPolicy`] in turn, probes random host pairs with a
//! [`measurement::MeasurementClient`] and writes every trial to a CSV file through the
//! [`experiment::ResultSink`].

pub mod clock;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod experiment;
pub mod logger;
pub mod measurement;
pub mod routing;
pub mod topology;

pub type NodeId = String;

pub use config::{ExperimentConfig, ProbeConfig, TopologySource};
pub use error::{Error, Result};
pub use experiment::{Experiment, ExperimentReport, Phase};

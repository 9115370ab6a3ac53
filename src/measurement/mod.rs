//! QoS probes between two hosts: throughput, round-trip latency and jitter.
//!
//! Each measurement is a self-contained pair of external commands run through a
//! [`ProbeRunner`]. Failures are logged and reported as absent values, never as errors.

pub mod parse;
pub mod probe;

pub use probe::{CommandProbeRunner, ProbeRunner, ReceiverGuard, ReceiverProcess};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::topology::TopologyGraph;

/// Extra time a client command gets beyond its own run time before it counts as hung.
const RUN_GRACE: Duration = Duration::from_secs(5);

/// Bandwidth in Mbit/s, latency and jitter in ms. `None` means the probe failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeasurementResult {
    pub bandwidth: Option<f64>,
    pub latency: Option<f64>,
    pub jitter: Option<f64>,
}

impl MeasurementResult {
    pub fn is_complete(&self) -> bool {
        self.bandwidth.is_some() && self.latency.is_some() && self.jitter.is_some()
    }
}

impl fmt::Display for MeasurementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field(value: Option<f64>, unit: &str) -> String {
            match value {
                Some(v) => format!("{:.3} {}", v, unit),
                None => "N/A".to_string(),
            }
        }
        write!(
            f,
            "bandwidth {}, latency {}, jitter {}",
            field(self.bandwidth, "Mbit/s"),
            field(self.latency, "ms"),
            field(self.jitter, "ms")
        )
    }
}

pub struct MeasurementClient<P, C> {
    runner: P,
    graph: Arc<TopologyGraph>,
    config: ProbeConfig,
    clock: C,
}

impl<P: ProbeRunner, C: Clock> MeasurementClient<P, C> {
    pub fn new(runner: P, graph: Arc<TopologyGraph>, config: ProbeConfig, clock: C) -> Self {
        Self {
            runner,
            graph,
            config,
            clock,
        }
    }

    /// TCP throughput from `src` to `dst` over `duration`.
    pub async fn measure_bandwidth(&self, src: &str, dst: &str, duration: Duration) -> Option<f64> {
        let result = self.iperf(src, dst, duration, false).await;
        self.report("bandwidth", src, dst, result.and_then(|out| parse::bandwidth(&out)))
    }

    /// Average round-trip time over `count` echo requests.
    pub async fn measure_latency(&self, src: &str, dst: &str, count: u32) -> Option<f64> {
        let result = self.ping(src, dst, count).await;
        self.report("latency", src, dst, result.and_then(|out| parse::latency(&out)))
    }

    /// UDP jitter from `src` to `dst` over `duration`.
    pub async fn measure_jitter(&self, src: &str, dst: &str, duration: Duration) -> Option<f64> {
        let result = self.iperf(src, dst, duration, true).await;
        self.report("jitter", src, dst, result.and_then(|out| parse::jitter(&out)))
    }

    /// Bandwidth, latency and jitter one after another.
    pub async fn measure_all(&self, src: &str, dst: &str) -> MeasurementResult {
        let result = MeasurementResult {
            bandwidth: self
                .measure_bandwidth(src, dst, self.config.bandwidth_duration())
                .await,
            latency: self.measure_latency(src, dst, self.config.ping_count).await,
            jitter: self
                .measure_jitter(src, dst, self.config.jitter_duration())
                .await,
        };
        info!("{} -> {}: {}", src, dst, result);
        result
    }

    async fn iperf(
        &self,
        src: &str,
        dst: &str,
        duration: Duration,
        udp: bool,
    ) -> Result<String, ProbeError> {
        let address = self.address(dst)?;
        let port = self.config.port.to_string();

        let mut server = vec![self.config.iperf.clone(), "-s".to_string()];
        if udp {
            server.push("-u".to_string());
        }
        server.extend(["-p".to_string(), port.clone()]);

        let mut client = vec![self.config.iperf.clone(), "-c".to_string(), address];
        if udp {
            client.push("-u".to_string());
        }
        client.extend([
            "-p".to_string(),
            port,
            "-t".to_string(),
            duration.as_secs().max(1).to_string(),
        ]);

        let mut receiver = self.runner.spawn_receiver(dst, &server)?;
        self.clock.sleep(self.config.settle()).await;
        let output = self.runner.run(src, &client, self.bound(duration)).await;
        receiver.terminate();
        output
    }

    async fn ping(&self, src: &str, dst: &str, count: u32) -> Result<String, ProbeError> {
        let address = self.address(dst)?;
        let argv = vec![
            self.config.ping.clone(),
            "-c".to_string(),
            count.to_string(),
            address,
        ];
        let expected = Duration::from_secs(u64::from(count));
        self.runner.run(src, &argv, self.bound(expected)).await
    }

    fn address(&self, id: &str) -> Result<String, ProbeError> {
        self.graph
            .address_of(id)
            .map(|addr| addr.to_string())
            .ok_or_else(|| ProbeError::UnknownEndpoint(id.to_string()))
    }

    fn bound(&self, expected: Duration) -> Duration {
        self.config.command_timeout().max(expected + RUN_GRACE)
    }

    fn report(
        &self,
        metric: &str,
        src: &str,
        dst: &str,
        result: Result<f64, ProbeError>,
    ) -> Option<f64> {
        match result {
            Ok(value) => Some(value),
            Err(ProbeError::Parse { output, .. }) => {
                warn!("{} {} -> {}: unparseable output:\n{}", metric, src, dst, output.trim_end());
                None
            }
            Err(e) => {
                warn!("{} {} -> {}: {}", metric, src, dst, e);
                None
            }
        }
    }
}

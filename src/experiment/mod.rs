//! Drives a full comparison run: build the topology, then for every policy install its routes,
//! wait for convergence and measure random host pairs.

pub mod sink;

pub use sink::{PolicySummary, ResultSink, TrialRecord};

use std::fmt;
use std::sync::Arc;

use log::{error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::clock::Clock;
use crate::config::{ExperimentConfig, TopologySource};
use crate::error::{Result, TopologyError};
use crate::measurement::{MeasurementClient, ProbeRunner};
use crate::routing::{EndpointControl, InstallSummary, PolicyKind, RouteTable};
use crate::topology::{TopologyDescription, TopologyGraph, generate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    TopologyBuilding,
    PolicyApplying(PolicyKind),
    Measuring(PolicyKind),
    Finalizing,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::TopologyBuilding => write!(f, "building topology"),
            Phase::PolicyApplying(kind) => write!(f, "applying {}", kind),
            Phase::Measuring(kind) => write!(f, "measuring {}", kind),
            Phase::Finalizing => write!(f, "finalizing"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct ExperimentReport {
    pub records: Vec<TrialRecord>,
    pub installs: Vec<(PolicyKind, InstallSummary)>,
    pub topology_error: Option<TopologyError>,
    pub phase: Phase,
}

pub struct Experiment<E, P, C> {
    config: ExperimentConfig,
    control: E,
    runner: P,
    clock: C,
    rng: StdRng,
    phase: Phase,
}

impl<E, P, C> Experiment<E, P, C>
where
    E: EndpointControl,
    P: ProbeRunner,
    C: Clock,
{
    pub fn new(config: ExperimentConfig, control: E, runner: P, clock: C) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            control,
            runner,
            clock,
            rng,
            phase: Phase::Idle,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Loads or generates the link list from the configured source.
    pub fn describe_topology(&mut self) -> std::result::Result<TopologyDescription, TopologyError> {
        match &self.config.topology {
            TopologySource::Generated { switches, hosts } => {
                Ok(generate::mesh(*switches, *hosts, &mut self.rng))
            }
            TopologySource::File { path } => {
                info!("Loading topology from {}", path.display());
                TopologyDescription::load(path)
            }
        }
    }

    /// Builds the graph, numbers its endpoints from the configured subnet and checks there are
    /// hosts to measure between.
    pub fn build_topology(&mut self) -> std::result::Result<Arc<TopologyGraph>, TopologyError> {
        let mut graph = self.describe_topology()?.build();
        graph.assign_addresses(self.config.subnet)?;

        let hosts = graph.hosts().count();
        if hosts < 2 {
            return Err(TopologyError::TooFewHosts { found: hosts });
        }
        let components = graph.component_count();
        if components > 1 {
            warn!("Topology has {} disconnected parts, some pairs will not be routed", components);
        }

        info!(
            "Topology ready: {} hosts, {} switches, {} links",
            hosts,
            graph.switches().count(),
            graph.link_count()
        );
        Ok(Arc::new(graph))
    }

    /// Route tables of every configured policy, without installing or measuring anything.
    pub fn preview_routes(
        &mut self,
    ) -> std::result::Result<Vec<(PolicyKind, RouteTable)>, TopologyError> {
        let graph = self.build_topology()?;
        let tables = self
            .config
            .policies
            .iter()
            .map(|&kind| {
                let policy = kind.build(graph.clone(), &mut self.rng);
                (kind, policy.compute_routes())
            })
            .collect();
        Ok(tables)
    }

    /// Runs every configured policy and writes the result file.
    ///
    /// Only a topology failure stops the run early; the result file is still written, with
    /// the header alone.
    pub async fn run(mut self) -> Result<ExperimentReport> {
        Self::transition(&mut self.phase, Phase::TopologyBuilding);

        let mut sink = ResultSink::new();
        let mut installs = Vec::new();
        let topology_error = match self.build_topology() {
            Ok(graph) => {
                self.run_policies(graph, &mut sink, &mut installs).await;
                None
            }
            Err(e) => {
                error!("Topology build failed: {}", e);
                Some(e)
            }
        };

        Self::transition(&mut self.phase, Phase::Finalizing);
        for (kind, summary) in sink.summary() {
            info!(
                "{}: {} trial(s), mean bandwidth {}, latency {}, jitter {}",
                kind,
                summary.trials,
                format_mean(summary.bandwidth, "Mbit/s"),
                format_mean(summary.latency, "ms"),
                format_mean(summary.jitter, "ms")
            );
        }
        sink.write_to_path(&self.config.output)?;
        Self::transition(&mut self.phase, Phase::Done);

        Ok(ExperimentReport {
            records: sink.into_records(),
            installs,
            topology_error,
            phase: self.phase,
        })
    }

    async fn run_policies(
        &mut self,
        graph: Arc<TopologyGraph>,
        sink: &mut ResultSink,
        installs: &mut Vec<(PolicyKind, InstallSummary)>,
    ) {
        let Self {
            config,
            control,
            runner,
            clock,
            rng,
            phase,
        } = self;

        let client = MeasurementClient::new(&*runner, graph.clone(), config.probe.clone(), &*clock);
        let hosts = graph.host_ids();

        for (i, &kind) in config.policies.iter().enumerate() {
            Self::transition(phase, Phase::PolicyApplying(kind));
            let policy = kind.build(graph.clone(), rng);
            installs.push((kind, policy.apply_routing(control)));

            info!("Waiting {}s for {} to converge", config.convergence_secs, kind);
            clock.sleep(config.convergence()).await;

            Self::transition(phase, Phase::Measuring(kind));
            for trial in 1..=config.trials_per_policy {
                let pair: Vec<&String> = hosts.choose_multiple(rng, 2).collect();
                let [src, dst] = pair.as_slice() else {
                    warn!("{}: not enough hosts for trial {}", kind, trial);
                    continue;
                };
                info!(
                    "{} trial {}/{}: {} -> {}",
                    kind, trial, config.trials_per_policy, src, dst
                );
                let result = client.measure_all(src, dst).await;
                sink.push(TrialRecord {
                    policy: kind,
                    src: src.to_string(),
                    dst: dst.to_string(),
                    result,
                });
            }

            if i + 1 < config.policies.len() {
                info!("Cooling down for {}s", config.cooldown_secs);
                clock.sleep(config.cooldown()).await;
            }
        }
    }

    fn transition(phase: &mut Phase, next: Phase) {
        info!("Experiment: {} -> {}", phase, next);
        *phase = next;
    }
}

fn format_mean(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.3} {}", v, unit),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{ControlError, ProbeError};
    use crate::measurement::{MeasurementResult, ReceiverGuard};

    struct Refuse;

    #[async_trait]
    impl ProbeRunner for Refuse {
        fn spawn_receiver(&self, _: &str, argv: &[String]) -> std::result::Result<ReceiverGuard, ProbeError> {
            Err(ProbeError::Spawn {
                command: argv.join(" "),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "iperf"),
            })
        }

        async fn run(&self, _: &str, argv: &[String], after: Duration) -> std::result::Result<String, ProbeError> {
            Err(ProbeError::Timeout {
                command: argv.join(" "),
                after,
            })
        }
    }

    struct Accept;

    impl EndpointControl for Accept {
        fn install_route(&mut self, _: &str, _: Ipv4Addr, _: Ipv4Addr) -> std::result::Result<(), ControlError> {
            Ok(())
        }
    }

    struct NoWait;

    #[async_trait]
    impl Clock for NoWait {
        async fn sleep(&self, _: Duration) {}
    }

    fn config(name: &str) -> ExperimentConfig {
        ExperimentConfig {
            topology: TopologySource::Generated {
                switches: 3,
                hosts: 4,
            },
            seed: Some(42),
            output: std::env::temp_dir().join(format!("qos-lab-{}-{}.csv", name, std::process::id())),
            ..Default::default()
        }
    }

    #[test]
    fn generated_topology_is_numbered() {
        let mut experiment = Experiment::new(config("numbered"), Accept, Refuse, NoWait);
        let graph = experiment.build_topology().unwrap();
        assert_eq!(graph.hosts().count(), 4);
        assert_eq!(graph.switches().count(), 3);
        assert_eq!(graph.address_of("h1"), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(graph.component_count(), 1);
    }

    #[test]
    fn single_host_topology_is_rejected() {
        let mut cfg = config("single");
        cfg.topology = TopologySource::Generated {
            switches: 2,
            hosts: 1,
        };
        let mut experiment = Experiment::new(cfg, Accept, Refuse, NoWait);
        assert!(matches!(
            experiment.build_topology(),
            Err(TopologyError::TooFewHosts { found: 1 })
        ));
    }

    #[test]
    fn missing_topology_file_is_an_error() {
        let mut cfg = config("missing");
        cfg.topology = TopologySource::File {
            path: PathBuf::from("/nonexistent/links.json"),
        };
        let mut experiment = Experiment::new(cfg, Accept, Refuse, NoWait);
        assert!(matches!(experiment.build_topology(), Err(TopologyError::Io(_))));
    }

    #[test]
    fn same_seed_same_topology() {
        let a = Experiment::new(config("seed-a"), Accept, Refuse, NoWait).describe_topology().unwrap();
        let b = Experiment::new(config("seed-b"), Accept, Refuse, NoWait).describe_topology().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn preview_covers_every_policy() {
        let mut experiment = Experiment::new(config("preview"), Accept, Refuse, NoWait);
        let tables = experiment.preview_routes().unwrap();
        let kinds: Vec<PolicyKind> = tables.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, PolicyKind::ALL.to_vec());
        for (_, table) in tables {
            // 4 hosts on one connected mesh
            assert_eq!(table.len(), 12);
        }
        assert_eq!(experiment.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn failed_probes_still_produce_rows() {
        let cfg = config("failed-probes");
        let output = cfg.output.clone();
        let report = Experiment::new(cfg, Accept, Refuse, NoWait).run().await.unwrap();
        let content = std::fs::read_to_string(&output).unwrap();
        let _ = std::fs::remove_file(&output);

        assert_eq!(report.phase, Phase::Done);
        assert!(report.topology_error.is_none());
        assert_eq!(report.records.len(), 9);
        assert!(report.records.iter().all(|r| r.result == MeasurementResult::default()));
        assert_eq!(content.lines().count(), 10);
        assert!(content.lines().skip(1).all(|line| line.ends_with(",,,")));
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::Measuring(PolicyKind::LinkState).to_string(), "measuring LinkState");
        assert_eq!(Phase::Done.to_string(), "done");
    }
}

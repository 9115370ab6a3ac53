use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio::runtime::Builder;

use qos_routing_lab::clock::TokioClock;
use qos_routing_lab::logger;
use qos_routing_lab::measurement::CommandProbeRunner;
use qos_routing_lab::routing::{CommandControl, PolicyKind};
use qos_routing_lab::{Experiment, ExperimentConfig, TopologySource};

#[derive(Parser)]
#[command(name = "qos-routing-lab", version, about = "Compare routing policies by measured QoS")]
struct Cli {
    /// JSON experiment configuration; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    switches: Option<usize>,

    #[arg(long)]
    hosts: Option<usize>,

    /// Read the link list from this JSON file instead of generating a mesh
    #[arg(long, conflicts_with_all = ["switches", "hosts"])]
    topology_file: Option<PathBuf>,

    /// Host pairs measured per policy
    #[arg(long)]
    trials: Option<usize>,

    #[arg(long, value_enum, value_delimiter = ',')]
    policies: Option<Vec<PolicyKind>>,

    /// CSV result file
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    convergence_secs: Option<u64>,

    #[arg(long)]
    cooldown_secs: Option<u64>,

    #[arg(long)]
    settle_secs: Option<u64>,

    #[arg(long)]
    probe_timeout_secs: Option<u64>,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Write the topology link list to this file and exit
    #[arg(long)]
    dump_topology: Option<PathBuf>,

    /// Print every policy's route table without installing or measuring
    #[arg(long)]
    routes_only: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn experiment_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ExperimentConfig::default(),
        };

        if let Some(path) = &self.topology_file {
            config.topology = TopologySource::File { path: path.clone() };
        } else if self.switches.is_some() || self.hosts.is_some() {
            let (default_switches, default_hosts) = match config.topology {
                TopologySource::Generated { switches, hosts } => (switches, hosts),
                TopologySource::File { .. } => (5, 8),
            };
            config.topology = TopologySource::Generated {
                switches: self.switches.unwrap_or(default_switches),
                hosts: self.hosts.unwrap_or(default_hosts),
            };
        }
        if let Some(trials) = self.trials {
            config.trials_per_policy = trials;
        }
        if let Some(policies) = &self.policies {
            config.policies = policies.clone();
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(secs) = self.convergence_secs {
            config.convergence_secs = secs;
        }
        if let Some(secs) = self.cooldown_secs {
            config.cooldown_secs = secs;
        }
        if let Some(secs) = self.settle_secs {
            config.probe.settle_secs = secs;
        }
        if let Some(secs) = self.probe_timeout_secs {
            config.probe.command_timeout_secs = secs;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(logger::level_from_verbosity(cli.verbose));

    let config = cli.experiment_config()?;

    if let Some(path) = &cli.save_config {
        config
            .save(path)
            .with_context(|| format!("saving {}", path.display()))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let control = CommandControl::new(config.exec_prefix.clone());
    let runner = CommandProbeRunner::new(config.exec_prefix.clone());
    let mut experiment = Experiment::new(config, control, runner, TokioClock);

    if let Some(path) = &cli.dump_topology {
        let description = experiment.describe_topology()?;
        description
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(
            "Topology with {} links written to {}",
            description.links.len(),
            path.display()
        );
        return Ok(());
    }

    if cli.routes_only {
        for (kind, table) in experiment.preview_routes()? {
            println!("=== {} ===", kind);
            print!("{}", table);
            println!();
        }
        return Ok(());
    }

    let rt = Builder::new_current_thread().enable_all().build()?;
    let report = rt.block_on(experiment.run())?;

    for (kind, summary) in &report.installs {
        info!(
            "{}: {}/{} routes installed",
            kind, summary.installed, summary.attempted
        );
    }
    if let Some(e) = report.topology_error {
        return Err(e).context("experiment aborted");
    }
    info!("{} trial(s) recorded", report.records.len());
    Ok(())
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::endpoint::ExecPrefix;
use crate::error::ConfigError;
use crate::routing::PolicyKind;
use crate::topology::graph::default_subnet;

/// Where the experiment topology comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TopologySource {
    /// Full switch mesh with every host attached to a random switch.
    Generated { switches: usize, hosts: usize },
    /// JSON link list as written by `TopologyDescription::save`.
    File { path: PathBuf },
}

impl Default for TopologySource {
    fn default() -> Self {
        Self::Generated {
            switches: 5,
            hosts: 8,
        }
    }
}

/// Commands and bounds used by the measurement client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub iperf: String,
    pub ping: String,
    pub port: u16,
    pub bandwidth_secs: u64,
    pub jitter_secs: u64,
    pub ping_count: u32,
    pub settle_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            iperf: "iperf".to_string(),
            ping: "ping".to_string(),
            port: 5001,
            bandwidth_secs: 5,
            jitter_secs: 5,
            ping_count: 5,
            settle_secs: 1,       // receiver start-up
            command_timeout_secs: 30,
        }
    }
}

impl ProbeConfig {
    pub fn bandwidth_duration(&self) -> Duration {
        Duration::from_secs(self.bandwidth_secs)
    }

    pub fn jitter_duration(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub topology: TopologySource,
    pub policies: Vec<PolicyKind>,
    pub trials_per_policy: usize,
    pub convergence_secs: u64,
    pub cooldown_secs: u64,
    pub subnet: Ipv4Net,
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub exec_prefix: ExecPrefix,
    pub probe: ProbeConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            topology: TopologySource::default(),
            policies: PolicyKind::ALL.to_vec(),
            trials_per_policy: 3,
            convergence_secs: 10, // 10 seconds
            cooldown_secs: 30,    // 30 seconds
            subnet: default_subnet(),
            output: PathBuf::from("qos_results.csv"),
            seed: None,
            exec_prefix: ExecPrefix::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ExperimentConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn convergence(&self) -> Duration {
        Duration::from_secs(self.convergence_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExperimentConfig::default();
        assert_eq!(
            config.topology,
            TopologySource::Generated {
                switches: 5,
                hosts: 8
            }
        );
        assert_eq!(config.policies, PolicyKind::ALL.to_vec());
        assert_eq!(config.subnet.to_string(), "10.0.0.0/8");
        assert_eq!(config.convergence(), Duration::from_secs(10));
        assert_eq!(config.cooldown(), Duration::from_secs(30));
        assert_eq!(config.probe.port, 5001);
        assert_eq!(config.probe.command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn json_round_trip_keeps_defaults() {
        let config = ExperimentConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let json = r#"{
            "topology": { "kind": "file", "path": "links.json" },
            "policies": ["link-state"],
            "seed": 7,
            "probe": { "port": 5201 }
        }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.topology,
            TopologySource::File {
                path: PathBuf::from("links.json")
            }
        );
        assert_eq!(config.policies, vec![PolicyKind::LinkState]);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.probe.port, 5201);
        assert_eq!(config.probe.iperf, "iperf");
        assert_eq!(config.trials_per_policy, 3);
        assert_eq!(config.exec_prefix, ExecPrefix::default());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("qos-lab-config-{}.json", std::process::id()));
        let mut config = ExperimentConfig::default();
        config.trials_per_policy = 1;
        config.exec_prefix = ExecPrefix::local();
        config.save(&path).unwrap();
        let loaded = ExperimentConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = ExperimentConfig::load("/nonexistent/qos-lab.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

// Traffic Scenario Configuration

use chrono::{DateTime, Duration, Utc};
use cybersim::{FlowFieldMap, GenerateConfig};
use std::path::{Path, PathBuf};

// ============================================================================
// Scenario File (YAML)
// ============================================================================

/// Scenario file format
#[derive(Debug, serde::Deserialize)]
pub struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    pub meta: ScenarioMeta,

    /// Where the seed flows come from
    pub flows: FlowSource,

    #[serde(default)]
    pub topology: TopologySettings,

    /// Replay the seed flows before generating (default: true)
    #[serde(default = "default_true")]
    pub replay: bool,

    #[serde(default)]
    pub generate: GenerateSettings,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct ScenarioMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct FlowSource {
    /// CSV file; relative paths are resolved against the scenario file's directory
    pub path: PathBuf,

    /// Column mapping overrides
    #[serde(default)]
    pub fields: FlowFieldMap,
}

#[derive(Debug, serde::Deserialize)]
pub struct TopologySettings {
    /// Normalize edge volume into per-source transition probabilities
    #[serde(default = "default_true")]
    pub normalize: bool,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self { normalize: true }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
pub struct GenerateSettings {
    /// Length of the generated window in seconds
    pub duration_secs: f64,

    /// Mean spacing between generated events in seconds
    pub average_interval_secs: f64,

    /// RFC 3339 start of the window; wall clock when absent
    pub start_time: Option<DateTime<Utc>>,
}

impl Default for GenerateSettings {
    fn default() -> Self {
        Self {
            duration_secs: 120.0,
            average_interval_secs: 5.0,
            start_time: None,
        }
    }
}

impl GenerateSettings {
    pub fn to_generate_config(&self) -> GenerateConfig {
        GenerateConfig {
            duration: secs_to_duration(self.duration_secs),
            start_time: self.start_time,
            average_interval: secs_to_duration(self.average_interval_secs),
        }
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::microseconds((secs * 1_000_000.0).round() as i64)
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output and logging
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct OutputConfig {
    /// Log every event to the console
    #[serde(default)]
    pub console: bool,

    /// CSV output file path
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

// ============================================================================
// Run Configuration
// ============================================================================

/// Everything a TrafficRunner needs, resolved from a scenario file
#[derive(Debug, Clone)]
pub struct TrafficRunConfig {
    /// Random seed for reproducibility
    pub seed: Option<[u8; 32]>,

    pub flows_path: PathBuf,
    pub fields: FlowFieldMap,
    pub normalize: bool,
    pub replay: bool,
    pub generate: GenerateConfig,
    pub output: OutputConfig,
}

impl TrafficRunConfig {
    pub fn from_scenario(scenario: ScenarioFile, scenario_path: &Path, seed: Option<[u8; 32]>) -> Self {
        let base = scenario_path.parent().unwrap_or_else(|| Path::new("."));
        let flows_path = if scenario.flows.path.is_absolute() {
            scenario.flows.path
        } else {
            base.join(scenario.flows.path)
        };

        Self {
            seed,
            flows_path,
            fields: scenario.flows.fields,
            normalize: scenario.topology.normalize,
            replay: scenario.replay,
            generate: scenario.generate.to_generate_config(),
            output: scenario.output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_scenario() {
        let yaml = "flows:\n  path: flows.csv\n";
        let scenario: ScenarioFile = serde_yaml::from_str(yaml).unwrap();

        assert!(scenario.replay);
        assert!(scenario.topology.normalize);
        assert_eq!(scenario.generate.duration_secs, 120.0);
        assert_eq!(scenario.flows.fields.src_key, "src");

        let config = TrafficRunConfig::from_scenario(scenario, Path::new("scenarios/a.yaml"), None);
        assert_eq!(config.flows_path, PathBuf::from("scenarios/flows.csv"));
        assert_eq!(config.generate.average_interval, Duration::seconds(5));
    }

    #[test]
    fn test_parse_full_scenario() {
        let yaml = r#"
meta:
  name: office
flows:
  path: /data/flows.csv
  fields:
    byte_count_key: octets
    timestamp_format: "%Y-%m-%d %H:%M:%S"
topology:
  normalize: false
replay: false
generate:
  duration_secs: 600
  average_interval_secs: 2.5
  start_time: "2024-01-01T00:00:00Z"
output:
  console: true
  csv_path: out.csv
"#;
        let scenario: ScenarioFile = serde_yaml::from_str(yaml).unwrap();
        let config = TrafficRunConfig::from_scenario(scenario, Path::new("x.yaml"), Some([1; 32]));

        assert_eq!(config.flows_path, PathBuf::from("/data/flows.csv"));
        assert_eq!(config.fields.byte_count_key, "octets");
        assert_eq!(config.fields.protocol_key, "protocol");
        assert!(!config.normalize);
        assert!(!config.replay);
        assert_eq!(config.generate.duration, Duration::minutes(10));
        assert_eq!(config.generate.average_interval, Duration::milliseconds(2500));
        assert!(config.generate.start_time.is_some());
        assert!(config.output.console);
    }
}

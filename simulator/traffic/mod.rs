// Traffic Scenario Simulator Module

pub mod config;
pub mod runner;
pub mod stats;

// Re-export commonly used types
pub use config::{OutputConfig, ScenarioFile, ScenarioMeta, TrafficRunConfig};
pub use runner::TrafficRunner;
pub use stats::{hex, PhaseStats, SimulationResult};

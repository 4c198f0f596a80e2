// Traffic Scenario Runner

use super::config::TrafficRunConfig;
use super::stats::{PhaseStats, SimulationResult};
use cybersim::{
    load_csv_flows, ConsoleSink, CsvSink, FlowRecord, NetworkSimulator, NetworkTopology,
    TrafficEvent, TrafficSink,
};
use log::info;
use rand::Rng;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;

/// Runs one scenario: load, build topology, replay, generate
pub struct TrafficRunner {
    config: TrafficRunConfig,
}

impl TrafficRunner {
    pub fn new(config: TrafficRunConfig) -> Self {
        Self { config }
    }

    /// Load the configured seed flows and run
    pub fn run(self) -> Result<SimulationResult, Box<dyn Error>> {
        let flows = load_csv_flows(&self.config.flows_path, &self.config.fields)?;
        self.run_with_flows(flows)
    }

    /// Run against seed flows that are already loaded
    pub fn run_with_flows(self, flows: Vec<FlowRecord>) -> Result<SimulationResult, Box<dyn Error>> {
        let seed = self.config.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });

        let topology = NetworkTopology::from_flow_records(&flows, self.config.normalize);
        let (nodes, links) = (topology.node_count(), topology.link_count());
        let mut simulator = NetworkSimulator::from_seed(topology, flows, seed);

        let mut console = ConsoleSink::new(self.config.output.console);
        let mut csv: Option<CsvSink<BufWriter<File>>> = match self.config.output.csv_path {
            Some(ref path) => {
                info!("writing events to {}", path.display());
                Some(CsvSink::create(path)?)
            }
            None => None,
        };

        let replay = if self.config.replay {
            let mut stats = PhaseStats::new();
            for event in simulator.replay() {
                emit(&event, &mut console, csv.as_mut(), &mut stats);
            }
            info!("replayed {} seed flows", stats.events);
            Some(stats)
        } else {
            None
        };

        let mut generated = PhaseStats::new();
        for event in simulator.generate(self.config.generate.clone()) {
            emit(&event, &mut console, csv.as_mut(), &mut generated);
        }
        info!("generated {} synthetic events", generated.events);

        if let Some(ref mut csv) = csv {
            csv.flush()?;
            if csv.write_errors() > 0 {
                return Err(format!("{} csv rows failed to write", csv.write_errors()).into());
            }
        }

        Ok(SimulationResult {
            seed_used: seed,
            nodes,
            links,
            replay,
            generated,
        })
    }
}

fn emit(
    event: &TrafficEvent,
    console: &mut ConsoleSink,
    csv: Option<&mut CsvSink<BufWriter<File>>>,
    stats: &mut PhaseStats,
) {
    console.record(event);
    if let Some(csv) = csv {
        csv.record(event);
    }
    stats.record(event);
}

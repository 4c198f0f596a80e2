use std::env;
use std::error::Error;

use chrono::Duration;
use log::info;
use simple_logger::SimpleLogger;

use cybersim::{load_csv_flows, FlowFieldMap, NetworkSimulator, NetworkTopology};

const DEFAULT_FLOWS: &str = "data/sample_flows.csv";

fn main() -> Result<(), Box<dyn Error>> {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_FLOWS.to_string());

    info!("starting");

    let flows = load_csv_flows(&path, &FlowFieldMap::default())?;
    let topology = NetworkTopology::from_flow_records(&flows, true);
    let mut simulator = NetworkSimulator::from_entropy(topology, flows);

    println!("=== Replaying Seed Flows ===");
    for event in simulator.replay() {
        println!("{:?}", event);
    }

    println!("\n=== Generating Synthetic Traffic ===");
    let mut generated = 0;
    for event in simulator.generate_for(Duration::minutes(2)) {
        println!("{:?}", event);
        generated += 1;
    }

    info!("done: {} synthetic events", generated);
    Ok(())
}

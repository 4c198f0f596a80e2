//! # cybersim - Network Flow Traffic Simulator
//!
//! Synthesizes and replays network-flow traffic for exercising downstream
//! monitoring and analysis tools. Historical flow records are aggregated into a
//! weighted directed graph, which then drives either a faithful replay of the
//! records or a biased random walk that produces new, statistically similar
//! traffic.
//!
//! ## Core Components
//!
//! - **NetworkTopology**: weighted directed graph of observed flow volume
//! - **EdgeFlowIndex**: seed flows grouped by directed edge, sampled during the walk
//! - **NetworkSimulator**: replay and generation, driven by an owned RNG
//! - **Loader / Sinks**: CSV ingestion of flow records and consumers for emitted events
//!
//! ## Usage
//!
//! ```no_run
//! use chrono::Duration;
//! use cybersim::{load_csv_flows, FlowFieldMap, NetworkSimulator, NetworkTopology};
//!
//! let flows = load_csv_flows("data/sample_flows.csv", &FlowFieldMap::default()).unwrap();
//! let topology = NetworkTopology::from_flow_records(&flows, true);
//! let mut simulator = NetworkSimulator::from_seed(topology, flows, [7u8; 32]);
//!
//! for event in simulator.replay() {
//!     println!("{:?}", event);
//! }
//! for event in simulator.generate_for(Duration::minutes(2)) {
//!     println!("{:?}", event);
//! }
//! ```
//!
//! All time is simulated; nothing here sleeps or reads the clock except to
//! default the start of a generation window.

pub mod cs_edge_index;
pub mod cs_interface;
pub mod cs_loader;
pub mod cs_simulator;
pub mod cs_sinks;
pub mod cs_topology;

// Re-export commonly used types
pub use cs_edge_index::EdgeFlowIndex;
pub use cs_interface::{FlowRecord, FlowTime, Metadata, NodeId, TrafficEvent};
pub use cs_loader::{
    iter_flow_records, load_csv_flows, parse_csv_flows, FlowFieldMap, LoadError, RawRow, RowError,
};
pub use cs_simulator::{
    choose_link, fallback_byte_count, GenerateConfig, GeneratedTraffic, NetworkSimulator,
};
pub use cs_sinks::{
    drain, CollectorSink, ConsoleSink, CsvSink, DigestSink, MultiSink, NoOpSink, TrafficSink,
};
pub use cs_topology::{Adjacency, Link, NetworkTopology, Node, TopologyError};

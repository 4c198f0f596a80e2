// Traffic Scenario Statistics

use cybersim::{DigestSink, FlowTime, TrafficEvent, TrafficSink};
use std::collections::BTreeMap;

/// Number of busiest edges listed in the summary
const TOP_EDGES: usize = 5;

// ============================================================================
// Per-Phase Statistics
// ============================================================================

/// Aggregates over one event stream (replay or generation)
pub struct PhaseStats {
    pub events: usize,
    pub total_bytes: u64,
    pub by_protocol: BTreeMap<String, usize>,
    pub by_edge: BTreeMap<(String, String), usize>,
    pub first: Option<FlowTime>,
    pub last: Option<FlowTime>,
    digest: DigestSink,
}

impl PhaseStats {
    pub fn new() -> Self {
        Self {
            events: 0,
            total_bytes: 0,
            by_protocol: BTreeMap::new(),
            by_edge: BTreeMap::new(),
            first: None,
            last: None,
            digest: DigestSink::new(),
        }
    }

    /// blake3 fingerprint of the stream seen so far
    pub fn digest(&self) -> String {
        self.digest.finalize_hex()
    }

    /// Busiest edges by event count, ties broken by edge name
    pub fn busiest_edges(&self, n: usize) -> Vec<(&(String, String), usize)> {
        let mut edges: Vec<(&(String, String), usize)> =
            self.by_edge.iter().map(|(edge, count)| (edge, *count)).collect();
        edges.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        edges.truncate(n);
        edges
    }

    fn print(&self, title: &str) {
        println!("{}:", title);
        println!("  Events: {}", self.events);
        println!("  Bytes: {}", self.total_bytes);
        if let (Some(first), Some(last)) = (self.first, self.last) {
            println!("  Span: {} .. {}", first.to_rfc3339(), last.to_rfc3339());
        }
        if !self.by_protocol.is_empty() {
            let protocols: Vec<String> = self
                .by_protocol
                .iter()
                .map(|(protocol, count)| format!("{}={}", protocol, count))
                .collect();
            println!("  Protocols: {}", protocols.join(", "));
        }
        for ((src, dst), count) in self.busiest_edges(TOP_EDGES) {
            println!("    {} -> {}: {}", src, dst, count);
        }
        println!("  Digest: {}", self.digest());
    }
}

impl Default for PhaseStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficSink for PhaseStats {
    fn record(&mut self, event: &TrafficEvent) {
        self.events += 1;
        self.total_bytes += event.byte_count;
        *self.by_protocol.entry(event.protocol.clone()).or_insert(0) += 1;
        *self
            .by_edge
            .entry((event.src.clone(), event.dst.clone()))
            .or_insert(0) += 1;
        if self.first.is_none() {
            self.first = Some(event.timestamp);
        }
        self.last = Some(event.timestamp);
        self.digest.record(event);
    }
}

// ============================================================================
// Simulation Result
// ============================================================================

/// Final result of a scenario run
pub struct SimulationResult {
    pub seed_used: [u8; 32],
    pub nodes: usize,
    pub links: usize,
    pub replay: Option<PhaseStats>,
    pub generated: PhaseStats,
}

impl SimulationResult {
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║  SIMULATION RESULTS                                    ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Seed: 0x{}", hex(&self.seed_used));
        println!("Topology: {} nodes, {} links\n", self.nodes, self.links);

        if let Some(ref replay) = self.replay {
            replay.print("Replay");
            println!();
        }
        self.generated.print("Generated");
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

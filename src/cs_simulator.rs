//! Traffic Simulation Engine
//!
//! Produces time-ordered TrafficEvents either by replaying the seed flows or by
//! a biased random walk over the topology. Both outputs are lazy iterators; the
//! caller cancels by simply not pulling further events.
//!
//! ## Randomness
//!
//! The random source is owned by each simulator instance. Two simulators built
//! from the same seed, topology and seed flows produce identical output for the
//! same `GenerateConfig` (with an explicit `start_time`).

use chrono::{DateTime, Duration, Utc};
use hashbrown::HashSet;
use indexmap::IndexSet;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::Exp1;

use crate::cs_edge_index::EdgeFlowIndex;
use crate::cs_interface::{
    FlowRecord, FlowTime, NodeId, TrafficEvent, DEFAULT_AVERAGE_INTERVAL_SECS,
    FALLBACK_BYTE_OFFSET, FALLBACK_MEAN_BYTES, FALLBACK_PROTOCOL,
};
use crate::cs_topology::{Link, NetworkTopology};

// ============================================================================
// Configuration
// ============================================================================

/// Parameters for one `generate()` run
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Length of the simulated window (default: 2 minutes)
    pub duration: Duration,

    /// Start of the simulated window (default: wall clock at call time)
    pub start_time: Option<FlowTime>,

    /// Mean spacing between events; each step is this times uniform(0.5, 1.5) (default: 5s)
    pub average_interval: Duration,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            duration: Duration::minutes(2),
            start_time: None,
            average_interval: Duration::seconds(DEFAULT_AVERAGE_INTERVAL_SECS),
        }
    }
}

impl GenerateConfig {
    pub fn for_duration(duration: Duration) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Generate network traffic events from a topology and seed flows
pub struct NetworkSimulator<R: Rng = StdRng> {
    topology: NetworkTopology,
    seed_flows: Vec<FlowRecord>,
    edge_index: EdgeFlowIndex,

    /// Every id seen as src or dst in the seed flows, first-seen order
    universe: Vec<NodeId>,

    /// At least one universe node has an outgoing link
    walkable: bool,

    rng: R,
}

impl NetworkSimulator<StdRng> {
    /// Simulator with a reproducible `StdRng`
    pub fn from_seed(
        topology: NetworkTopology,
        seed_flows: impl IntoIterator<Item = FlowRecord>,
        seed: [u8; 32],
    ) -> Self {
        Self::new(topology, seed_flows, StdRng::from_seed(seed))
    }

    /// Simulator seeded from the thread RNG
    pub fn from_entropy(
        topology: NetworkTopology,
        seed_flows: impl IntoIterator<Item = FlowRecord>,
    ) -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill(&mut seed);
        debug!("simulator seed: {:02x?}", seed);
        Self::from_seed(topology, seed_flows, seed)
    }
}

impl<R: Rng> NetworkSimulator<R> {
    pub fn new(
        topology: NetworkTopology,
        seed_flows: impl IntoIterator<Item = FlowRecord>,
        rng: R,
    ) -> Self {
        let seed_flows: Vec<FlowRecord> = seed_flows.into_iter().collect();
        let edge_index = EdgeFlowIndex::build(&seed_flows);

        let mut seen: IndexSet<&str> = IndexSet::new();
        for flow in &seed_flows {
            seen.insert(flow.src());
            seen.insert(flow.dst());
        }
        let universe: Vec<NodeId> = seen.into_iter().map(str::to_string).collect();

        let walkable = {
            let sources: HashSet<&str> = topology.links().map(|link| link.src.as_str()).collect();
            universe.iter().any(|id| sources.contains(id.as_str()))
        };

        info!(
            "simulator ready: {} seed flows, {} nodes, {}",
            seed_flows.len(),
            universe.len(),
            topology
        );

        Self {
            topology,
            seed_flows,
            edge_index,
            universe,
            walkable,
            rng,
        }
    }

    pub fn topology(&self) -> &NetworkTopology {
        &self.topology
    }

    pub fn seed_flows(&self) -> &[FlowRecord] {
        &self.seed_flows
    }

    pub fn edge_index(&self) -> &EdgeFlowIndex {
        &self.edge_index
    }

    /// Nodes the random walk is scoped to
    pub fn node_universe(&self) -> &[NodeId] {
        &self.universe
    }

    /// Yield the seed flows in chronological order
    ///
    /// Ties keep their original relative order. Each call starts over.
    pub fn replay(&self) -> impl Iterator<Item = TrafficEvent> + '_ {
        let mut ordered: Vec<&FlowRecord> = self.seed_flows.iter().collect();
        ordered.sort_by_key(|flow| flow.timestamp());
        ordered.into_iter().map(TrafficEvent::replay_of)
    }

    /// Stochastically generate synthetic events
    ///
    /// Walks the topology starting from a uniformly chosen node, picking each
    /// next edge in proportion to its weight. Protocol and byte count come from
    /// a historical flow on the chosen edge when one exists.
    ///
    /// The returned iterator advances this simulator's RNG as it is consumed.
    pub fn generate(&mut self, config: GenerateConfig) -> GeneratedTraffic<'_, R> {
        let start = config.start_time.unwrap_or_else(Utc::now);
        // windows reaching past the representable range are clamped to it
        let end = start
            .checked_add_signed(config.duration)
            .unwrap_or(if config.duration < Duration::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        let interval_secs = config
            .average_interval
            .to_std()
            .map(|interval| interval.as_secs_f64())
            .unwrap_or(0.0);

        let active = if self.universe.is_empty() {
            debug!("no seed flows, nothing to generate");
            None
        } else if !self.walkable {
            warn!(
                "none of the {} seed nodes has an outgoing link, nothing to generate",
                self.universe.len()
            );
            None
        } else {
            if interval_secs <= 0.0 {
                warn!("non-positive average interval, simulated time will not advance");
            }
            pick_node(&self.universe, &mut self.rng)
        };

        GeneratedTraffic {
            topology: &self.topology,
            edge_index: &self.edge_index,
            universe: &self.universe,
            rng: &mut self.rng,
            interval_secs,
            current: start,
            end,
            active,
            emitted: 0,
        }
    }

    /// `generate()` with default parameters over `duration`
    pub fn generate_for(&mut self, duration: Duration) -> GeneratedTraffic<'_, R> {
        self.generate(GenerateConfig::for_duration(duration))
    }

    /// Weighted choice of one link, using this simulator's RNG
    pub fn choose_link<'l>(&mut self, links: &[&'l Link]) -> Option<&'l Link> {
        choose_link(&mut self.rng, links)
    }
}

// ============================================================================
// Random Walk
// ============================================================================

/// Lazy stream of synthesized events produced by `NetworkSimulator::generate`
pub struct GeneratedTraffic<'a, R: Rng> {
    topology: &'a NetworkTopology,
    edge_index: &'a EdgeFlowIndex,
    universe: &'a [NodeId],
    rng: &'a mut R,
    interval_secs: f64,
    current: FlowTime,
    end: FlowTime,

    /// Current walk position; None once the stream is exhausted
    active: Option<NodeId>,
    emitted: usize,
}

impl<'a, R: Rng> GeneratedTraffic<'a, R> {
    /// Simulated time of the last emitted event (the window start before any)
    pub fn current_time(&self) -> FlowTime {
        self.current
    }

    fn sample_traffic(&mut self, link: &Link) -> (String, u64) {
        match self.edge_index.flows(&link.src, &link.dst).choose(&mut *self.rng) {
            Some(flow) => (flow.protocol().to_string(), flow.byte_count()),
            None => (
                FALLBACK_PROTOCOL.to_string(),
                fallback_byte_count(&mut *self.rng),
            ),
        }
    }
}

impl<'a, R: Rng> Iterator for GeneratedTraffic<'a, R> {
    type Item = TrafficEvent;

    fn next(&mut self) -> Option<TrafficEvent> {
        let mut active = self.active.take()?;
        let topology = self.topology;

        while self.current <= self.end {
            let neighbors = topology.neighbors(&active);
            if neighbors.is_empty() {
                // dead end: jump elsewhere without advancing time
                match pick_node(self.universe, &mut *self.rng) {
                    Some(next) => active = next,
                    None => break,
                }
                continue;
            }

            let link = match choose_link(&mut *self.rng, &neighbors) {
                Some(link) => link,
                None => break,
            };
            let (protocol, byte_count) = self.sample_traffic(link);

            let jitter = self.interval_secs * self.rng.gen_range(0.5..1.5);
            let step = Duration::microseconds((jitter * 1_000_000.0).round() as i64);
            // stepping past the representable range also ends the window
            match self.current.checked_add_signed(step) {
                Some(next) if next <= self.end => self.current = next,
                _ => break,
            }

            self.emitted += 1;
            self.active = Some(link.dst.clone());
            return Some(TrafficEvent {
                timestamp: self.current,
                src: link.src.clone(),
                dst: link.dst.clone(),
                protocol,
                byte_count,
                replayed: false,
            });
        }

        debug!("generation finished after {} events", self.emitted);
        None
    }
}

/// Byte count for an edge with no historical flows: floor(Exp(mean 5000) + 100)
pub fn fallback_byte_count<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    let draw: f64 = rng.sample(Exp1);
    (draw * FALLBACK_MEAN_BYTES + FALLBACK_BYTE_OFFSET) as u64
}

fn pick_node<R: Rng + ?Sized>(universe: &[NodeId], rng: &mut R) -> Option<NodeId> {
    universe.choose(rng).cloned()
}

/// Weighted random choice among `links`
///
/// Draws a threshold in [0, total) and returns the first link whose running
/// weight sum reaches it. Falls back to a uniform choice when the total weight
/// is not positive, and to the last link if rounding leaves nothing selected.
pub fn choose_link<'l, R: Rng + ?Sized>(rng: &mut R, links: &[&'l Link]) -> Option<&'l Link> {
    let last = *links.last()?;

    let total: f64 = links.iter().map(|link| link.weight).sum();
    if total <= 0.0 {
        return links.choose(rng).copied();
    }

    let threshold = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for link in links {
        cumulative += link.weight;
        if cumulative >= threshold {
            return Some(link);
        }
    }

    Some(last)
}

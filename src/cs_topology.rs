//! Network Topology
//!
//! Weighted directed graph over node identifiers, built by aggregating flow
//! volume per ordered (source, destination) pair. Nodes and links are kept in
//! insertion order so iteration (and therefore the random walk) is reproducible.

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::{Equivalent, IndexMap};
use log::debug;

use crate::cs_interface::{FlowRecord, NodeId};

/// A single endpoint in the simulated network
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: NodeId,
}

/// A directional connection between two nodes
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub src: NodeId,
    pub dst: NodeId,
    pub weight: f64,
}

/// Errors that can occur when inserting a link
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyError {
    /// Weight below zero
    NegativeWeight {
        src: NodeId,
        dst: NodeId,
        weight: f64,
    },

    /// Weight is NaN or infinite
    NonFiniteWeight { src: NodeId, dst: NodeId },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyError::NegativeWeight { src, dst, weight } => {
                write!(f, "negative weight {} on link {} -> {}", weight, src, dst)
            }
            TopologyError::NonFiniteWeight { src, dst } => {
                write!(f, "non-finite weight on link {} -> {}", src, dst)
            }
        }
    }
}

impl std::error::Error for TopologyError {}

/// Borrowed form of an (src, dst) edge key
///
/// Hashes exactly like the owned `(NodeId, NodeId)` tuple, so maps keyed by
/// owned pairs can be probed without allocating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EdgeKey<'a>(pub &'a str, pub &'a str);

impl Hash for EdgeKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
        self.1.hash(state);
    }
}

impl Equivalent<(NodeId, NodeId)> for EdgeKey<'_> {
    fn equivalent(&self, key: &(NodeId, NodeId)) -> bool {
        self.0 == key.0 && self.1 == key.1
    }
}

/// Nested {source -> {destination -> weight}} view of a topology
pub type Adjacency = IndexMap<NodeId, IndexMap<NodeId, f64>>;

/// Graph-like structure describing network connectivity
#[derive(Clone, Debug, Default)]
pub struct NetworkTopology {
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<(NodeId, NodeId), Link>,
}

impl NetworkTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, returning the existing one if already present
    pub fn add_node(&mut self, id: &str) -> &Node {
        let index = match self.nodes.get_index_of(id) {
            Some(index) => index,
            None => {
                self.nodes
                    .insert_full(id.to_string(), Node { id: id.to_string() })
                    .0
            }
        };
        &self.nodes[index]
    }

    /// Insert a link, accumulating onto any existing link for the same pair
    ///
    /// Repeated insertion on (src, dst) adds the new weight to the stored one
    /// rather than overwriting it. Both endpoints are registered as nodes.
    ///
    /// # Returns
    /// * `Ok(&Link)` - The link as stored after the merge
    /// * `Err(NegativeWeight)` - Weight below zero
    /// * `Err(NonFiniteWeight)` - Weight is NaN or infinite
    pub fn add_link(&mut self, src: &str, dst: &str, weight: f64) -> Result<&Link, TopologyError> {
        if !weight.is_finite() {
            return Err(TopologyError::NonFiniteWeight {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        if weight < 0.0 {
            return Err(TopologyError::NegativeWeight {
                src: src.to_string(),
                dst: dst.to_string(),
                weight,
            });
        }

        let index = self.insert_link(src, dst, weight);
        Ok(&self.edges[index])
    }

    /// Insert a link with the default weight of 1.0
    pub fn add_link_default(&mut self, src: &str, dst: &str) -> &Link {
        let index = self.insert_link(src, dst, 1.0);
        &self.edges[index]
    }

    // weight already validated by the caller
    fn insert_link(&mut self, src: &str, dst: &str, weight: f64) -> usize {
        let index = match self.edges.get_index_of(&EdgeKey(src, dst)) {
            Some(index) => {
                self.edges[index].weight += weight;
                index
            }
            None => {
                let link = Link {
                    src: src.to_string(),
                    dst: dst.to_string(),
                    weight,
                };
                let key = (src.to_string(), dst.to_string());
                self.edges.insert_full(key, link).0
            }
        };

        self.add_node(src);
        self.add_node(dst);
        index
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn link(&self, src: &str, dst: &str) -> Option<&Link> {
        self.edges.get(&EdgeKey(src, dst))
    }

    /// Outgoing links of `id`, in the order they were inserted into the topology
    ///
    /// Scans every link rather than keeping a per-node index, so the order is
    /// always the global insertion order.
    pub fn neighbors(&self, id: &str) -> Vec<&Link> {
        self.edges.values().filter(|link| link.src == id).collect()
    }

    /// Build a topology by aggregating flow volume per ordered pair
    ///
    /// # Arguments
    /// * `records` - Seed flows
    /// * `normalize` - Rescale each source's outgoing weights to sum to 1.0
    ///
    /// A source whose total outgoing volume is zero gets zero-weight links.
    pub fn from_flow_records<'a, I>(records: I, normalize: bool) -> Self
    where
        I: IntoIterator<Item = &'a FlowRecord>,
    {
        let mut volume_by_edge: IndexMap<(&str, &str), u64> = IndexMap::new();
        for record in records {
            *volume_by_edge.entry(record.edge()).or_insert(0) += record.byte_count();
        }

        let mut topology = Self::new();

        if !normalize {
            for ((src, dst), volume) in &volume_by_edge {
                topology.insert_link(src, dst, *volume as f64);
            }
            debug!("built raw-volume {}", topology);
            return topology;
        }

        let mut volume_by_src: IndexMap<&str, u64> = IndexMap::new();
        for ((src, _), volume) in &volume_by_edge {
            *volume_by_src.entry(*src).or_insert(0) += *volume;
        }

        for ((src, dst), volume) in &volume_by_edge {
            let total = volume_by_src.get(src).copied().unwrap_or(0);
            let weight = if total > 0 {
                *volume as f64 / total as f64
            } else {
                0.0
            };
            topology.insert_link(src, dst, weight);
        }

        debug!("built normalized {}", topology);
        topology
    }

    /// Nested {source -> {destination -> weight}} mapping for export
    pub fn to_adjacency(&self) -> Adjacency {
        let mut adjacency = Adjacency::new();
        for link in self.links() {
            adjacency
                .entry(link.src.clone())
                .or_default()
                .insert(link.dst.clone(), link.weight);
        }
        adjacency
    }
}

impl fmt::Display for NetworkTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NetworkTopology(nodes={}, links={})",
            self.nodes.len(),
            self.edges.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn flow(offset_secs: i64, src: &str, dst: &str, protocol: &str, bytes: u64) -> FlowRecord {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        FlowRecord::new(t0 + Duration::seconds(offset_secs), src, dst, protocol, bytes)
    }

    fn outgoing_sum(topology: &NetworkTopology, id: &str) -> f64 {
        topology.neighbors(id).iter().map(|link| link.weight).sum()
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut topology = NetworkTopology::new();
        topology.add_node("A");
        topology.add_node("B");
        let again = topology.add_node("A").clone();

        assert_eq!(again.id, "A");
        assert_eq!(topology.node_count(), 2);
        let ids: Vec<&str> = topology.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_add_link_accumulates_weight() {
        let mut topology = NetworkTopology::new();
        topology.add_link("a", "b", 1.0).unwrap();
        let merged = topology.add_link("a", "b", 2.0).unwrap().clone();

        assert_eq!(merged.weight, 3.0);
        assert_eq!(topology.link_count(), 1);
        assert_eq!(topology.link("a", "b").unwrap().weight, 3.0);
    }

    #[test]
    fn test_borrowed_edge_key_lookup() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        }

        assert_eq!(
            hash_of(&EdgeKey("a", "bc")),
            hash_of(&("a".to_string(), "bc".to_string()))
        );

        let mut topology = NetworkTopology::new();
        topology.add_link("ab", "c", 1.0).unwrap();
        topology.add_link("a", "bc", 2.0).unwrap();
        topology.add_link("ab", "c", 0.5).unwrap();

        assert_eq!(topology.link_count(), 2);
        assert_eq!(topology.link("ab", "c").unwrap().weight, 1.5);
        assert_eq!(topology.link("a", "bc").unwrap().weight, 2.0);
        assert!(topology.link("a", "b").is_none());
    }

    #[test]
    fn test_add_link_registers_endpoints() {
        let mut topology = NetworkTopology::new();
        topology.add_link_default("x", "y");

        assert!(topology.contains_node("x"));
        assert!(topology.contains_node("y"));
        assert_eq!(topology.link("x", "y").unwrap().weight, 1.0);
    }

    #[test]
    fn test_add_link_rejects_invalid_weights() {
        let mut topology = NetworkTopology::new();

        let negative = topology.add_link("a", "b", -0.5);
        assert!(matches!(negative, Err(TopologyError::NegativeWeight { .. })));

        let nan = topology.add_link("a", "b", f64::NAN);
        assert!(matches!(nan, Err(TopologyError::NonFiniteWeight { .. })));

        let inf = topology.add_link("a", "b", f64::INFINITY);
        assert!(matches!(inf, Err(TopologyError::NonFiniteWeight { .. })));

        // rejected links leave no trace
        assert_eq!(topology.link_count(), 0);
        assert_eq!(topology.node_count(), 0);
    }

    #[test]
    fn test_neighbors_preserve_insertion_order() {
        let mut topology = NetworkTopology::new();
        topology.add_link_default("a", "c");
        topology.add_link_default("b", "a");
        topology.add_link_default("a", "b");
        topology.add_link_default("a", "d");

        let dsts: Vec<&str> = topology
            .neighbors("a")
            .iter()
            .map(|link| link.dst.as_str())
            .collect();
        assert_eq!(dsts, vec!["c", "b", "d"]);
        assert!(topology.neighbors("d").is_empty());
        assert!(topology.neighbors("missing").is_empty());
    }

    #[test]
    fn test_from_flow_records_normalized() {
        let flows = vec![
            flow(0, "A", "B", "tcp", 100),
            flow(1, "B", "C", "udp", 50),
        ];

        let topology = NetworkTopology::from_flow_records(&flows, true);

        assert_eq!(topology.link("A", "B").unwrap().weight, 1.0);
        assert_eq!(topology.link("B", "C").unwrap().weight, 1.0);
        assert_eq!(topology.node_count(), 3);
    }

    #[test]
    fn test_normalized_weights_sum_to_one() {
        let flows = vec![
            flow(0, "A", "B", "tcp", 700),
            flow(1, "A", "C", "tcp", 200),
            flow(2, "A", "B", "udp", 0),
            flow(3, "A", "D", "icmp", 100),
            flow(4, "B", "C", "tcp", 3),
            flow(5, "B", "A", "tcp", 7),
            flow(6, "C", "A", "tcp", 123_456),
        ];

        let topology = NetworkTopology::from_flow_records(&flows, true);

        for node in topology.nodes() {
            if topology.neighbors(&node.id).is_empty() {
                continue;
            }
            let sum = outgoing_sum(&topology, &node.id);
            assert!((sum - 1.0).abs() < 1e-9, "{} sums to {}", node.id, sum);
        }
        assert!((topology.link("A", "B").unwrap().weight - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_zero_volume_source_gets_zero_weights() {
        let flows = vec![flow(0, "A", "B", "tcp", 0), flow(1, "A", "C", "tcp", 0)];

        let topology = NetworkTopology::from_flow_records(&flows, true);

        assert_eq!(topology.link("A", "B").unwrap().weight, 0.0);
        assert_eq!(topology.link("A", "C").unwrap().weight, 0.0);
    }

    #[test]
    fn test_from_flow_records_raw_volume() {
        let flows = vec![
            flow(0, "A", "B", "tcp", 100),
            flow(1, "A", "B", "tcp", 250),
            flow(2, "B", "A", "tcp", 5),
        ];

        let topology = NetworkTopology::from_flow_records(&flows, false);

        assert_eq!(topology.link("A", "B").unwrap().weight, 350.0);
        assert_eq!(topology.link("B", "A").unwrap().weight, 5.0);
        assert_eq!(topology.link_count(), 2);
    }

    #[test]
    fn test_to_adjacency() {
        let mut topology = NetworkTopology::new();
        topology.add_link("a", "b", 0.25).unwrap();
        topology.add_link("a", "c", 0.75).unwrap();
        topology.add_link("c", "a", 1.0).unwrap();

        let adjacency = topology.to_adjacency();

        assert_eq!(adjacency.len(), 2);
        assert_eq!(adjacency["a"]["b"], 0.25);
        assert_eq!(adjacency["a"]["c"], 0.75);
        assert_eq!(adjacency["c"]["a"], 1.0);
        assert!(!adjacency.contains_key("b"));
    }

    #[test]
    fn test_display_summary() {
        let mut topology = NetworkTopology::new();
        topology.add_link_default("a", "b");
        assert_eq!(topology.to_string(), "NetworkTopology(nodes=2, links=1)");
    }
}

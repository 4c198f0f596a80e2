use hashbrown::HashMap;

use crate::cs_interface::{FlowRecord, NodeId};

/// Seed flows grouped by the directed edge they were observed on
///
/// Built once from the full seed sequence and read-only afterwards. Within an
/// edge, flows keep their original relative order.
#[derive(Clone, Debug, Default)]
pub struct EdgeFlowIndex {
    // src -> dst -> flows, so lookups borrow plain &str keys
    flows_by_edge: HashMap<NodeId, HashMap<NodeId, Vec<FlowRecord>>>,
    edge_count: usize,
}

impl EdgeFlowIndex {
    pub fn build<'a, I>(flows: I) -> Self
    where
        I: IntoIterator<Item = &'a FlowRecord>,
    {
        let mut flows_by_edge: HashMap<NodeId, HashMap<NodeId, Vec<FlowRecord>>> = HashMap::new();
        let mut edge_count = 0;
        for flow in flows {
            let by_dst = flows_by_edge
                .entry(flow.src().to_string())
                .or_insert_with(HashMap::new);
            let edge_flows = by_dst
                .entry(flow.dst().to_string())
                .or_insert_with(Vec::new);
            if edge_flows.is_empty() {
                edge_count += 1;
            }
            edge_flows.push(flow.clone());
        }
        Self {
            flows_by_edge,
            edge_count,
        }
    }

    /// Historical flows observed on src -> dst (empty if none)
    pub fn flows(&self, src: &str, dst: &str) -> &[FlowRecord] {
        self.flows_by_edge
            .get(src)
            .and_then(|by_dst| by_dst.get(dst))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct directed edges with at least one flow
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.flows_by_edge.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_groups_by_directed_edge_in_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let flows = vec![
            FlowRecord::new(t0, "A", "B", "tcp", 1),
            FlowRecord::new(t0 + Duration::seconds(1), "B", "A", "tcp", 2),
            FlowRecord::new(t0 + Duration::seconds(2), "A", "B", "udp", 3),
        ];

        let index = EdgeFlowIndex::build(&flows);

        let ab: Vec<u64> = index.flows("A", "B").iter().map(|f| f.byte_count()).collect();
        assert_eq!(ab, vec![1, 3]);
        assert_eq!(index.flows("B", "A").len(), 1);
        assert_eq!(index.edge_count(), 2);
    }

    #[test]
    fn test_edges_sharing_a_source_stay_apart() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let flows = vec![
            FlowRecord::new(t0, "ab", "c", "tcp", 1),
            FlowRecord::new(t0, "a", "bc", "tcp", 2),
            FlowRecord::new(t0, "a", "b", "udp", 3),
        ];

        let index = EdgeFlowIndex::build(&flows);

        assert_eq!(index.edge_count(), 3);
        assert_eq!(index.flows("ab", "c")[0].byte_count(), 1);
        assert_eq!(index.flows("a", "bc")[0].byte_count(), 2);
        assert_eq!(index.flows("a", "b")[0].byte_count(), 3);
        assert!(index.flows("a", "c").is_empty());
        assert!(index.flows("c", "ab").is_empty());
    }

    #[test]
    fn test_missing_edge_is_empty() {
        let flows: Vec<FlowRecord> = Vec::new();
        let index = EdgeFlowIndex::build(&flows);

        assert!(index.is_empty());
        assert!(index.flows("A", "B").is_empty());
    }
}

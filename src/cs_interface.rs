use chrono::{DateTime, Utc};
use indexmap::IndexMap;

// endpoint identifiers are whatever the dataset uses (IP, hostname, ...)
pub type NodeId = String;

/// Residual columns of a flow record, in the order they were read
pub type Metadata = IndexMap<String, String>;

pub type FlowTime = DateTime<Utc>;

/// Protocol used for synthesized events on edges without historical flows
pub const FALLBACK_PROTOCOL: &str = "TCP";

/// Mean of the exponential byte-count draw for edges without historical flows
pub const FALLBACK_MEAN_BYTES: f64 = 5000.0;

/// Constant added to the exponential byte-count draw
pub const FALLBACK_BYTE_OFFSET: f64 = 100.0;

/// Default mean spacing between synthesized events (seconds)
pub const DEFAULT_AVERAGE_INTERVAL_SECS: i64 = 5;

// ============================================================================
// Flow Records
// ============================================================================

/// A single historical observation of traffic between two endpoints
///
/// Constructed once from validated input and never mutated afterwards. The
/// protocol is upper-cased on construction so "tcp" and "TCP" are the same
/// protocol everywhere downstream.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowRecord {
    timestamp: FlowTime,
    src: NodeId,
    dst: NodeId,
    protocol: String,
    byte_count: u64,
    metadata: Metadata,
}

impl FlowRecord {
    pub fn new(
        timestamp: FlowTime,
        src: impl Into<NodeId>,
        dst: impl Into<NodeId>,
        protocol: &str,
        byte_count: u64,
    ) -> Self {
        Self::with_metadata(timestamp, src, dst, protocol, byte_count, Metadata::new())
    }

    pub fn with_metadata(
        timestamp: FlowTime,
        src: impl Into<NodeId>,
        dst: impl Into<NodeId>,
        protocol: &str,
        byte_count: u64,
        metadata: Metadata,
    ) -> Self {
        Self {
            timestamp,
            src: src.into(),
            dst: dst.into(),
            protocol: protocol.to_uppercase(),
            byte_count,
            metadata,
        }
    }

    pub fn timestamp(&self) -> FlowTime {
        self.timestamp
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Ordered (src, dst) pair this flow was observed on
    pub fn edge(&self) -> (&str, &str) {
        (&self.src, &self.dst)
    }
}

// ============================================================================
// Traffic Events
// ============================================================================

/// A single emitted observation, either replayed from seed data or synthesized
#[derive(Clone, Debug, PartialEq)]
pub struct TrafficEvent {
    pub timestamp: FlowTime,
    pub src: NodeId,
    pub dst: NodeId,
    pub protocol: String,
    pub byte_count: u64,
    /// true for events copied from seed flows, false for synthesized ones
    pub replayed: bool,
}

impl TrafficEvent {
    /// Verbatim copy of a seed flow
    pub fn replay_of(flow: &FlowRecord) -> Self {
        Self {
            timestamp: flow.timestamp,
            src: flow.src.clone(),
            dst: flow.dst.clone(),
            protocol: flow.protocol.clone(),
            byte_count: flow.byte_count,
            replayed: true,
        }
    }
}

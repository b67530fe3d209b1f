use std::fmt;

use thiserror::Error;

use crate::constants::NodeId;
use crate::traffic::CongestionLevel;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("Graph has no nodes")]
    EmptyGraph,
    #[error("Node {0} is not part of the graph")]
    InvalidNode(NodeId),
    #[error("No path from {start} to {end}")]
    NoPath { start: NodeId, end: NodeId },
    #[error("Search from {start} to {end} aborted after settling {settled} nodes")]
    Timeout {
        start: NodeId,
        end: NodeId,
        settled: usize,
    },
    #[error("Invalid multiplier {multiplier} for congestion level {level:?}, must be finite and >= 1")]
    InvalidMultiplier {
        level: CongestionLevel,
        multiplier: f64,
    },
}

impl RoutingError {
    /// Query errors leave the graph usable, the caller may retry with new input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RoutingError::InvalidNode(_) | RoutingError::NoPath { .. } | RoutingError::Timeout { .. }
        )
    }
}

/// Where a skipped record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Node,
    Edge,
    Observation,
}

/// A single input record that could not be used
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRecord {
    pub kind: RecordKind,
    /// Position of the record in its input, starting at 0
    pub position: usize,
    pub reason: String,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} #{}: {}", self.kind, self.position, self.reason)
    }
}

/// Non-fatal warnings collected while loading data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub skipped: Vec<MalformedRecord>,
}

impl LoadReport {
    pub(crate) fn skip(&mut self, kind: RecordKind, position: usize, reason: impl Into<String>) {
        let record = MalformedRecord {
            kind,
            position,
            reason: reason.into(),
        };
        log::warn!("Skipping record {}", record);
        self.skipped.push(record);
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        self.skipped.iter().filter(|r| r.kind == kind).count()
    }
}

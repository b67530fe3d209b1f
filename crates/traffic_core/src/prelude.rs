//! Re-exports of the most commonly used items in `traffic_core`.
pub use crate::congestion::{apply_congestion, CongestionParams, CongestionTable, MultiplierPolicy};
pub use crate::error::{LoadReport, RoutingError};
pub use crate::traffic::{CongestionLevel, TrafficObservation, TrafficStore};

pub use crate::search;
pub use crate::search::dijkstra::{Dijkstra, SearchLimits};
pub use crate::search::shortest_path::Route;

pub use crate::graph::{node_index, RoadGraph};
pub use crate::util::test_graphs::generate_diamond_graph;

pub use osm_reader::NetworkType;

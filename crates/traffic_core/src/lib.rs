//! Crate to route over road networks whose edge costs are raised by point
//! observations of traffic congestion.
//!
//! # Basic usage
//! ```no_run
//! use std::path::Path;
//! use traffic_core::prelude::*;
//!
//! // Road network and traffic observations
//! let mut g = RoadGraph::from_pbf(Path::new("path/to/file.osm.pbf"), NetworkType::Drive)
//!     .expect("Failed to create graph from pbf file");
//! let store = TrafficStore::from_csv(Path::new("path/to/traffic.csv"))
//!     .expect("Failed to read traffic observations");
//!
//! // Raise the weights of congested roads
//! let report = apply_congestion(&mut g, &store, &CongestionParams::new());
//! println!("{} edges reweighted", report.edges_reweighted);
//!
//! // Search on the weighted graph
//! let route = search::shortest_path(&g, 1, 2).expect("Failed to find path");
//! println!("Costs: {}", route.cost);
//! ```
//! [`RoadGraph`]: crate::graph::RoadGraph
pub mod congestion;
pub mod constants;
pub mod error;
pub mod graph;
pub mod prelude;
pub(crate) mod priority_queue;
pub mod search;
pub mod statistics;
pub mod traffic;
pub mod util;

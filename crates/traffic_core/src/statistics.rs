use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use crate::graph::{node_index, RoadGraph};

#[derive(Debug, Default)]
pub struct SearchStats {
    pub nodes_settled: usize,
    pub duration: Option<Duration>,
    start_time: Option<Instant>,
}

impl SearchStats {
    pub fn init(&mut self) {
        self.nodes_settled = 0;
        self.duration = None;
        self.start_timer();
    }

    fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Time since `init`, while the search is still running
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|start_time| start_time.elapsed())
    }

    pub fn finish(&mut self) {
        if let Some(start_time) = self.start_time {
            self.duration = Some(start_time.elapsed());
        }
    }
}

impl Display for SearchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stats: {} nodes settled in {:?}",
            self.nodes_settled, self.duration
        )
    }
}

pub fn average_out_degree(g: &RoadGraph) -> f64 {
    let sum: usize = (0..g.num_nodes()).map(|i| g.out_degree(node_index(i))).sum();
    sum as f64 / g.num_nodes() as f64
}

/// Share of edges whose weight was raised by congestion
pub fn congested_share(g: &RoadGraph) -> f64 {
    if g.num_edges() == 0 {
        return 0.0;
    }
    let congested = g
        .edges()
        .filter(|edge| edge.current_weight() > edge.base_length())
        .count();
    congested as f64 / g.num_edges() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::congestion::{apply_congestion, CongestionParams};
    use crate::traffic::{RawObservation, TrafficStore};
    use crate::util::test_graphs::{generate_diamond_graph, generate_simple_graph};

    #[test]
    fn out_degree() {
        //           B
        //           |
        // E -> A -> C
        //      |  /
        //      D
        let g = generate_simple_graph();

        // 7 edges on 5 nodes
        assert_eq!(average_out_degree(&g), 7.0 / 5.0);
    }

    #[test]
    fn congested_share_counts_reweighted_edges() {
        let mut g = generate_diamond_graph();
        assert_eq!(congested_share(&g), 0.0);

        let store = TrafficStore::load(vec![RawObservation::new("0.0", "0.5", "High")]);
        apply_congestion(&mut g, &store, &CongestionParams::default());

        assert_eq!(congested_share(&g), 0.25);
    }

    #[test]
    fn display() {
        let stats = SearchStats::default();
        assert_eq!(stats.to_string(), "Stats: 0 nodes settled in None");
    }
}

use std::time::Duration;

use crate::constants::{NodeId, Weight};
use crate::error::RoutingError;
use crate::graph::*;
use crate::priority_queue::{HeapItem, PriorityQueue};
use crate::search::shortest_path::Route;
use crate::search::Predecessor;
use crate::statistics::SearchStats;
use log::debug;
use rustc_hash::FxHashMap;

/// Bounds for a single search. A search exceeding them fails with
/// `RoutingError::Timeout`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub(crate) max_settled: Option<usize>,
    pub(crate) deadline: Option<Duration>,
}

impl SearchLimits {
    pub fn new() -> Self {
        Default::default()
    }

    /// Maximum number of nodes settled before giving up
    pub fn max_settled(mut self, limit: usize) -> Self {
        self.max_settled = Some(limit);
        self
    }

    /// Maximum wall clock time per search
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Dijkstra search on the current weights of a `RoadGraph`. The graph is only
/// read, any number of searches may run on the same graph.
pub struct Dijkstra<'a> {
    pub stats: SearchStats,
    g: &'a RoadGraph,
    limits: SearchLimits,
}

impl<'a> Dijkstra<'a> {
    pub fn new(graph: &'a RoadGraph) -> Self {
        Dijkstra {
            g: graph,
            stats: SearchStats::default(),
            limits: SearchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn search(&mut self, start: NodeId, end: NodeId) -> Result<Route, RoutingError> {
        let source = self.g.index_of(start).ok_or(RoutingError::InvalidNode(start))?;
        let target = self.g.index_of(end).ok_or(RoutingError::InvalidNode(end))?;

        self.stats.init();

        if source == target {
            self.stats.nodes_settled += 1;
            self.stats.finish();
            return Ok(Route::new(vec![start], Vec::new(), 0.0));
        }

        let mut node_data: FxHashMap<NodeIndex, (Weight, Predecessor)> = FxHashMap::default();
        node_data.insert(source, (0.0, None));

        let mut queue = PriorityQueue::new();
        queue.push(0.0, source);

        let mut found = false;
        while let Some(HeapItem { distance, node, .. }) = queue.pop() {
            // Outdated entry, the node was settled with a smaller distance
            if distance > node_data[&node].0 {
                continue;
            }
            self.stats.nodes_settled += 1;

            if node == target {
                found = true;
                break;
            }

            if self.limit_exceeded() {
                self.stats.finish();
                debug!(
                    "Search {} -> {} aborted: {}",
                    start, end, self.stats
                );
                return Err(RoutingError::Timeout {
                    start,
                    end,
                    settled: self.stats.nodes_settled,
                });
            }

            for (edge_idx, edge) in self.g.neighbors_outgoing(node) {
                let new_distance = distance + edge.current_weight();
                // Strictly smaller, on ties the first discovered path is kept
                if new_distance
                    < node_data
                        .get(&edge.target)
                        .map_or(f64::INFINITY, |(weight, _)| *weight)
                {
                    node_data.insert(edge.target, (new_distance, Some((node, edge_idx))));
                    queue.push(new_distance, edge.target);
                }
            }
        }
        self.stats.finish();

        let route = found
            .then(|| super::reconstruct_path(target, source, &node_data, self.g))
            .flatten();
        match route {
            Some(route) => {
                debug!("Path found: {:?} ({})", route, self.stats);
                Ok(route)
            }
            None => {
                debug!("No path found from {} to {} ({})", start, end, self.stats);
                Err(RoutingError::NoPath { start, end })
            }
        }
    }

    fn limit_exceeded(&self) -> bool {
        let settled = self
            .limits
            .max_settled
            .is_some_and(|max| self.stats.nodes_settled >= max);
        let expired = match (self.limits.deadline, self.stats.elapsed()) {
            (Some(deadline), Some(elapsed)) => elapsed >= deadline,
            _ => false,
        };
        settled || expired
    }
}

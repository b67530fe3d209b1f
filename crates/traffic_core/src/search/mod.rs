use rustc_hash::FxHashMap;

use crate::constants::{NodeId, Weight};
use crate::error::RoutingError;
use crate::graph::{EdgeIndex, NodeIndex, RoadGraph};

use self::dijkstra::Dijkstra;
use self::shortest_path::Route;

pub mod dijkstra;
pub mod shortest_path;

/// Predecessor of a reached node: the node it was reached from and the edge used
pub(crate) type Predecessor = Option<(NodeIndex, EdgeIndex)>;

/// Shortest path from `start` to `end` using the current edge weights.
/// Shorthand for a `Dijkstra` search without limits.
pub fn shortest_path(graph: &RoadGraph, start: NodeId, end: NodeId) -> Result<Route, RoutingError> {
    Dijkstra::new(graph).search(start, end)
}

pub(crate) fn reconstruct_path(
    target: NodeIndex,
    source: NodeIndex,
    node_data: &FxHashMap<NodeIndex, (Weight, Predecessor)>,
    graph: &RoadGraph,
) -> Option<Route> {
    let weight = node_data.get(&target)?.0;

    let mut nodes = vec![target];
    let mut edges = Vec::new();
    let mut current = target;
    while current != source {
        let (prev_node, edge) = node_data.get(&current)?.1?;
        nodes.push(prev_node);
        edges.push(edge);
        current = prev_node;
    }
    nodes.reverse();
    edges.reverse();

    let ids = nodes
        .into_iter()
        .map(|idx| graph.node(idx).map(|node| node.id))
        .collect::<Option<Vec<_>>>()?;
    Some(Route::new(ids, edges, weight))
}

#[cfg(test)]
pub(crate) fn assert_path(
    expected_path: Vec<NodeId>,
    expected_weight: Weight,
    route: Result<Route, RoutingError>,
) {
    let route = route.expect("expected a route");
    assert_eq!(expected_path, route.nodes);
    approx::assert_abs_diff_eq!(expected_weight, route.cost, epsilon = 1e-9);
}

#[cfg(test)]
pub(crate) fn assert_no_path(route: Result<Route, RoutingError>) {
    assert!(
        matches!(route, Err(RoutingError::NoPath { .. })),
        "expected no path, got {:?}",
        route
    );
}

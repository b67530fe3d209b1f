//! Overlay of traffic observations onto the road graph.
//!
//! Every edge whose geometry passes within `tolerance` of an observation gets
//! its weight scaled by the multiplier of the observed congestion level. The
//! weight is always derived from `base_length`, so running the overlay again
//! (with the same or different observations) never compounds multipliers.

use std::time::Instant;

use geo::{BoundingRect, Coord, Distance, Euclidean, Point, Rect};
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::constants::Weight;
use crate::error::RoutingError;
use crate::graph::{Edge, EdgeIndex, RoadGraph};
use crate::traffic::{CongestionLevel, TrafficObservation, TrafficStore};

/// Default match distance in coordinate units (degrees), roughly 11 m
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Multiplier per congestion level. Levels without an entry do not change
/// the cost of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct CongestionTable {
    multipliers: FxHashMap<CongestionLevel, f64>,
}

impl CongestionTable {
    /// Multipliers have to be finite and at least 1, congestion never makes a
    /// road cheaper.
    pub fn new(
        multipliers: impl IntoIterator<Item = (CongestionLevel, f64)>,
    ) -> Result<Self, RoutingError> {
        let multipliers: FxHashMap<CongestionLevel, f64> = multipliers.into_iter().collect();
        for (&level, &multiplier) in multipliers.iter() {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(RoutingError::InvalidMultiplier { level, multiplier });
            }
        }
        Ok(CongestionTable { multipliers })
    }

    /// Table without any entries, every observation is ignored
    pub fn empty() -> Self {
        CongestionTable {
            multipliers: FxHashMap::default(),
        }
    }

    /// `1.0` for unknown levels and levels missing from the table
    pub fn multiplier(&self, level: Option<CongestionLevel>) -> f64 {
        level
            .and_then(|level| self.multipliers.get(&level))
            .copied()
            .unwrap_or(1.0)
    }
}

impl Default for CongestionTable {
    fn default() -> Self {
        CongestionTable {
            multipliers: [
                (CongestionLevel::Low, 1.0),
                (CongestionLevel::Medium, 1.5),
                (CongestionLevel::High, 2.0),
            ]
            .into_iter()
            .collect(),
        }
    }
}

/// How the multipliers of several observations on one edge are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiplierPolicy {
    /// Worst observed congestion wins
    #[default]
    Max,
    /// Every observation scales the edge again
    Product,
}

impl MultiplierPolicy {
    fn combine(&self, multipliers: impl Iterator<Item = f64>) -> f64 {
        match self {
            MultiplierPolicy::Max => multipliers.fold(1.0, f64::max),
            MultiplierPolicy::Product => multipliers.product(),
        }
    }
}

impl std::str::FromStr for MultiplierPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "max" => Ok(MultiplierPolicy::Max),
            "product" => Ok(MultiplierPolicy::Product),
            _ => Err(format!("Unknown multiplier policy '{}'", s)),
        }
    }
}

/// Parameters for the congestion overlay
#[derive(Debug, Clone)]
pub struct CongestionParams {
    pub(crate) table: CongestionTable,
    pub(crate) tolerance: f64,
    pub(crate) policy: MultiplierPolicy,
}

impl CongestionParams {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn table(mut self, table: CongestionTable) -> Self {
        self.table = table;
        self
    }

    /// Maximum distance between an observation and an edge geometry, in
    /// coordinate units. Negative values are treated as 0, non-finite values
    /// are ignored.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        if tolerance.is_finite() {
            self.tolerance = tolerance.max(0.0);
        } else {
            warn!(
                "Ignoring tolerance {}, keeping {}",
                tolerance, self.tolerance
            );
        }
        self
    }

    pub fn policy(mut self, policy: MultiplierPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for CongestionParams {
    fn default() -> Self {
        CongestionParams {
            table: CongestionTable::default(),
            tolerance: DEFAULT_TOLERANCE,
            policy: MultiplierPolicy::default(),
        }
    }
}

/// Outcome of one overlay pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightingReport {
    /// Edges with at least one observation within tolerance
    pub edges_matched: usize,
    /// Edges whose weight now differs from their base length
    pub edges_reweighted: usize,
    /// Edges without geometry, left at their base length
    pub edges_skipped: Vec<EdgeIndex>,
}

enum EdgeOutcome {
    Unmatched,
    Matched(f64),
    Malformed,
}

/// Applies the observations to the weights of `graph`.
///
/// Multipliers are computed in parallel from a shared view of the graph and
/// written back once all of them are known.
pub fn apply_congestion(
    graph: &mut RoadGraph,
    store: &TrafficStore,
    params: &CongestionParams,
) -> WeightingReport {
    let now = Instant::now();
    info!(
        "BEGIN congestion overlay: {} edges, {} observations, tolerance {}",
        graph.num_edges(),
        store.len(),
        params.tolerance
    );

    let outcomes: Vec<EdgeOutcome> = graph
        .edge_slice()
        .par_iter()
        .map(|edge| edge_outcome(edge, store, params))
        .collect();

    // Any simple path stays below `Weight::MAX`, however many multipliers
    // were combined
    let max_weight = Weight::MAX / graph.num_edges().max(1) as Weight;

    let mut report = WeightingReport::default();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        let edge_idx = EdgeIndex::new(i);
        let multiplier = match outcome {
            EdgeOutcome::Unmatched => 1.0,
            EdgeOutcome::Matched(multiplier) => {
                report.edges_matched += 1;
                multiplier
            }
            EdgeOutcome::Malformed => {
                warn!("Edge {:?} has no geometry, weight left unchanged", edge_idx);
                report.edges_skipped.push(edge_idx);
                1.0
            }
        };
        if multiplier != 1.0 {
            report.edges_reweighted += 1;
        }
        let base_length: Weight = graph.edge_slice()[i].base_length();
        graph.set_edge_weight(edge_idx, (base_length * multiplier).min(max_weight));
    }

    info!(
        "FINISHED congestion overlay. Took {:?}. {} edges matched, {} reweighted, {} skipped",
        now.elapsed(),
        report.edges_matched,
        report.edges_reweighted,
        report.edges_skipped.len()
    );
    report
}

fn edge_outcome(edge: &Edge, store: &TrafficStore, params: &CongestionParams) -> EdgeOutcome {
    let Some(bbox) = edge.geometry.bounding_rect() else {
        return EdgeOutcome::Malformed;
    };

    let mut matches = matching_observations(edge, grow(bbox, params.tolerance), store, params)
        .map(|obs| params.table.multiplier(obs.level))
        .peekable();

    if matches.peek().is_none() {
        return EdgeOutcome::Unmatched;
    }
    let multiplier = params.policy.combine(matches);
    debug!(
        "Edge {:?} -> {:?} matched, multiplier {}",
        edge.source, edge.target, multiplier
    );
    EdgeOutcome::Matched(multiplier)
}

fn matching_observations<'a>(
    edge: &'a Edge,
    search_area: Rect<f64>,
    store: &'a TrafficStore,
    params: &'a CongestionParams,
) -> impl Iterator<Item = &'a TrafficObservation> + 'a {
    store
        .candidates_in(search_area)
        .filter(move |obs| distance_to_edge(obs.coord, edge) <= params.tolerance)
}

/// Euclidean distance from `coord` to the edge polyline, in coordinate units
fn distance_to_edge(coord: Coord<f64>, edge: &Edge) -> f64 {
    let point = Point::from(coord);
    match edge.geometry.0.as_slice() {
        [] => f64::INFINITY,
        [single] => Euclidean.distance(&point, &Point::from(*single)),
        _ => Euclidean.distance(&point, &edge.geometry),
    }
}

fn grow(rect: Rect<f64>, by: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: rect.min().x - by,
            y: rect.min().y - by,
        },
        Coord {
            x: rect.max().x + by,
            y: rect.max().y + by,
        },
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use geo::LineString;

    use super::*;
    use crate::graph::{edge_index, Node, RawEdge};
    use crate::traffic::RawObservation;
    use crate::util::test_graphs::{diamond_edge, generate_diamond_graph};

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn observation(lon: f64, lat: f64, level: &str) -> RawObservation {
        RawObservation::new(&lat.to_string(), &lon.to_string(), level)
    }

    fn weight(graph: &RoadGraph, edge: EdgeIndex) -> Weight {
        graph.edge(edge).unwrap().current_weight()
    }

    #[test]
    fn untouched_edges_keep_base_length() {
        init_log();
        let mut g = generate_diamond_graph();
        let store = TrafficStore::load(vec![observation(10.0, 10.0, "High")]);

        let report = apply_congestion(&mut g, &store, &CongestionParams::default());

        assert_eq!(report.edges_matched, 0);
        for edge in g.edges() {
            assert_eq!(edge.current_weight(), edge.base_length());
        }
    }

    #[test]
    fn single_high_observation_doubles_weight() {
        init_log();
        let mut g = generate_diamond_graph();
        let ab = diamond_edge(&g, 0, 1);
        // Middle of A-B
        let store = TrafficStore::load(vec![observation(0.5, 0.0, "High")]);

        let report = apply_congestion(&mut g, &store, &CongestionParams::default());

        assert_eq!(report.edges_matched, 1);
        assert_eq!(report.edges_reweighted, 1);
        assert_abs_diff_eq!(weight(&g, ab), 2.0);
        for (i, edge) in g.edges().enumerate() {
            if edge_index(i) != ab {
                assert_eq!(edge.current_weight(), edge.base_length());
            }
        }
    }

    #[test]
    fn worst_congestion_wins() {
        init_log();
        let mut g = generate_diamond_graph();
        let ab = diamond_edge(&g, 0, 1);
        let store = TrafficStore::load(vec![
            observation(0.3, 0.0, "Low"),
            observation(0.6, 0.0, "High"),
            observation(0.7, 0.00005, "medium"),
        ]);

        apply_congestion(&mut g, &store, &CongestionParams::default());

        // Neither the average nor the sum
        assert_abs_diff_eq!(g.edge(ab).unwrap().multiplier(), 2.0);
    }

    #[test]
    fn product_policy_multiplies() {
        let mut g = generate_diamond_graph();
        let ab = diamond_edge(&g, 0, 1);
        let store = TrafficStore::load(vec![
            observation(0.3, 0.0, "Medium"),
            observation(0.6, 0.0, "High"),
        ]);
        let params = CongestionParams::new().policy(MultiplierPolicy::Product);

        apply_congestion(&mut g, &store, &params);

        assert_abs_diff_eq!(weight(&g, ab), 3.0);
    }

    #[test]
    fn repeated_max_overlay_is_idempotent() {
        let mut g = generate_diamond_graph();
        let store = TrafficStore::load(vec![
            observation(0.5, 0.0, "High"),
            observation(0.6, 0.0, "Medium"),
            observation(1.5, 0.5, "Low"),
        ]);
        let params = CongestionParams::new();

        apply_congestion(&mut g, &store, &params);
        let once: Vec<Weight> = g.edges().map(|e| e.current_weight()).collect();
        apply_congestion(&mut g, &store, &params);
        apply_congestion(&mut g, &store, &params);
        let thrice: Vec<Weight> = g.edges().map(|e| e.current_weight()).collect();

        assert_eq!(once, thrice);
        assert_abs_diff_eq!(weight(&g, diamond_edge(&g, 0, 1)), 2.0);
    }

    #[test]
    fn product_of_many_observations_stays_finite() {
        let mut g = generate_diamond_graph();
        let ab = diamond_edge(&g, 0, 1);
        let store = TrafficStore::load((0..1100).map(|_| observation(0.5, 0.0, "High")));
        let params = CongestionParams::new().policy(MultiplierPolicy::Product);

        apply_congestion(&mut g, &store, &params);

        assert!(weight(&g, ab).is_finite());
        let route = crate::search::shortest_path(&g, 0, 1).unwrap();
        assert_eq!(route.nodes, vec![0, 1]);
        assert!(route.cost.is_finite());

        // Congested on both legs, the detour over C is cheaper
        let store = TrafficStore::load(
            (0..1100).flat_map(|_| [observation(0.5, 0.0, "High"), observation(1.5, 0.0, "High")]),
        );
        apply_congestion(&mut g, &store, &params);
        let route = crate::search::shortest_path(&g, 0, 3).unwrap();
        assert_eq!(route.nodes, vec![0, 2, 3]);
    }

    #[test]
    fn non_finite_tolerance_is_ignored() {
        let mut g = generate_diamond_graph();
        let store = TrafficStore::load(vec![observation(50.0, 50.0, "High")]);
        let params = CongestionParams::new()
            .tolerance(f64::INFINITY)
            .tolerance(f64::NAN);

        let report = apply_congestion(&mut g, &store, &params);

        assert_eq!(report.edges_matched, 0);
        for edge in g.edges() {
            assert_eq!(edge.current_weight(), edge.base_length());
        }
    }

    #[test]
    fn repeated_overlay_does_not_compound() {
        let mut g = generate_diamond_graph();
        let store = TrafficStore::load(vec![
            observation(0.5, 0.0, "High"),
            observation(1.5, 0.0, "Medium"),
        ]);
        let params = CongestionParams::new().policy(MultiplierPolicy::Product);

        apply_congestion(&mut g, &store, &params);
        let once: Vec<Weight> = g.edges().map(|e| e.current_weight()).collect();
        apply_congestion(&mut g, &store, &params);
        let twice: Vec<Weight> = g.edges().map(|e| e.current_weight()).collect();

        assert_eq!(once, twice);
    }

    #[test]
    fn overlay_with_fewer_observations_lowers_weights_again() {
        let mut g = generate_diamond_graph();
        let ab = diamond_edge(&g, 0, 1);

        let store = TrafficStore::load(vec![observation(0.5, 0.0, "High")]);
        apply_congestion(&mut g, &store, &CongestionParams::default());
        assert_abs_diff_eq!(weight(&g, ab), 2.0);

        let store = TrafficStore::load(Vec::new());
        apply_congestion(&mut g, &store, &CongestionParams::default());
        assert_abs_diff_eq!(weight(&g, ab), 1.0);
    }

    #[test]
    fn unknown_levels_and_missing_entries_have_no_effect() {
        let mut g = generate_diamond_graph();
        let ab = diamond_edge(&g, 0, 1);
        let bd = diamond_edge(&g, 1, 3);
        let store = TrafficStore::load(vec![
            observation(0.5, 0.0, "Gridlock"),
            observation(1.5, 0.0, "Medium"),
        ]);
        let table = CongestionTable::new([(CongestionLevel::High, 3.0)]).unwrap();

        let report = apply_congestion(&mut g, &store, &CongestionParams::new().table(table));

        assert_eq!(report.edges_matched, 2);
        assert_eq!(report.edges_reweighted, 0);
        assert_eq!(weight(&g, ab), 1.0);
        assert_eq!(weight(&g, bd), 1.0);
    }

    #[test]
    fn custom_table() {
        let mut g = generate_diamond_graph();
        let ab = diamond_edge(&g, 0, 1);
        let store = TrafficStore::load(vec![observation(0.5, 0.0, "Low")]);
        let table = CongestionTable::new([(CongestionLevel::Low, 4.0)]).unwrap();

        apply_congestion(&mut g, &store, &CongestionParams::new().table(table));

        assert_abs_diff_eq!(weight(&g, ab), 4.0);
    }

    #[test]
    fn table_rejects_discounts() {
        assert_eq!(
            CongestionTable::new([(CongestionLevel::Low, 0.5)]),
            Err(RoutingError::InvalidMultiplier {
                level: CongestionLevel::Low,
                multiplier: 0.5
            })
        );
        assert!(CongestionTable::new([(CongestionLevel::High, f64::INFINITY)]).is_err());
    }

    #[test]
    fn default_table() {
        let table = CongestionTable::default();
        assert_eq!(table.multiplier(Some(CongestionLevel::Low)), 1.0);
        assert_eq!(table.multiplier(Some(CongestionLevel::Medium)), 1.5);
        assert_eq!(table.multiplier(Some(CongestionLevel::High)), 2.0);
        assert_eq!(table.multiplier(None), 1.0);
        assert_eq!(CongestionTable::empty().multiplier(Some(CongestionLevel::High)), 1.0);
    }

    #[test]
    fn tolerance_is_measured_to_the_polyline() {
        // Bent edge, the observation is close to the inner vertex but far from
        // both endpoints and from the straight line between them
        let mut g = RoadGraph::build(
            vec![Node::new(0, 0.0, 0.0), Node::new(1, 2.0, 0.0)],
            vec![RawEdge::new(0, 1, 10.0).with_geometry(LineString::from(vec![
                (0.0, 0.0),
                (1.0, 1.0),
                (2.0, 0.0),
            ]))],
        )
        .unwrap();

        let store = TrafficStore::load(vec![observation(1.0, 0.99, "High")]);

        let params = CongestionParams::new().tolerance(0.001);
        apply_congestion(&mut g, &store, &params);
        assert_eq!(weight(&g, edge_index(0)), 10.0);

        let params = CongestionParams::new().tolerance(0.02);
        apply_congestion(&mut g, &store, &params);
        assert_abs_diff_eq!(weight(&g, edge_index(0)), 20.0);
    }

    #[test]
    fn zero_tolerance_requires_intersection() {
        let mut g = generate_diamond_graph();
        let ab = diamond_edge(&g, 0, 1);
        let store = TrafficStore::load(vec![observation(0.25, 0.0, "High")]);

        apply_congestion(&mut g, &store, &CongestionParams::new().tolerance(0.0));

        assert_abs_diff_eq!(weight(&g, ab), 2.0);
    }

    #[test]
    fn edges_without_geometry_are_skipped() {
        init_log();
        let mut g = RoadGraph::build(
            vec![Node::new(0, 0.0, 0.0), Node::new(1, 1.0, 0.0)],
            vec![
                RawEdge::new(0, 1, 1.0).with_geometry(LineString::new(Vec::new())),
                RawEdge::new(1, 0, 1.0),
            ],
        )
        .unwrap();
        let store = TrafficStore::load(vec![observation(0.5, 0.0, "High")]);

        let report = apply_congestion(&mut g, &store, &CongestionParams::default());

        assert_eq!(report.edges_skipped, vec![edge_index(0)]);
        assert_eq!(weight(&g, edge_index(0)), 1.0);
        assert_abs_diff_eq!(weight(&g, edge_index(1)), 2.0);
    }

    #[test]
    fn single_coordinate_geometry() {
        let mut g = RoadGraph::build(
            vec![Node::new(0, 0.0, 0.0), Node::new(1, 0.0, 0.0)],
            vec![RawEdge::new(0, 1, 1.0).with_geometry(LineString::from(vec![(0.0, 0.0)]))],
        )
        .unwrap();
        let store = TrafficStore::load(vec![observation(0.00005, 0.0, "Medium")]);

        apply_congestion(&mut g, &store, &CongestionParams::default());

        assert_abs_diff_eq!(weight(&g, edge_index(0)), 1.5);
    }

    #[test]
    fn parse_policy() {
        assert_eq!("MAX".parse(), Ok(MultiplierPolicy::Max));
        assert_eq!("product".parse(), Ok(MultiplierPolicy::Product));
        assert!("mean".parse::<MultiplierPolicy>().is_err());
    }
}

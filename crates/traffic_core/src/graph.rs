use crate::constants::{NodeId, Weight};
use crate::error::{LoadReport, RecordKind, RoutingError};
use anyhow::Context;
use geo::{Coord, Haversine, Length, LineString};
use log::{debug, info};
use osm_reader::{NetworkType, RoadNetwork};
use rstar::{primitives::GeomWithData, RTree};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::{fmt, path::Path};
use wkt::TryFromWkt;

/// Default integer type for node and edge indices
/// Needs to be increased for very large graphs > u32::max
pub type DefaultIdx = u32;

/// Dense node index, only valid for the graph it was created by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeIndex(DefaultIdx);

impl NodeIndex {
    #[inline]
    pub fn new(x: usize) -> Self {
        NodeIndex(x as DefaultIdx)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn end() -> Self {
        NodeIndex(DefaultIdx::MAX)
    }
}

impl From<DefaultIdx> for NodeIndex {
    fn from(ix: DefaultIdx) -> Self {
        NodeIndex(ix)
    }
}

/// Short version of `NodeIndex::new`
pub fn node_index(index: usize) -> NodeIndex {
    NodeIndex::new(index)
}

/// Edge identifier. Distinguishes parallel edges between the same pair of
/// nodes.
#[derive(Debug, Copy, Clone, Default, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct EdgeIndex(DefaultIdx);

impl EdgeIndex {
    #[inline]
    pub fn new(x: usize) -> Self {
        EdgeIndex(x as DefaultIdx)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// An invalid `EdgeIndex` used to denote absence of an edge
    #[inline]
    pub fn end() -> Self {
        EdgeIndex(DefaultIdx::MAX)
    }
}

impl From<DefaultIdx> for EdgeIndex {
    fn from(ix: DefaultIdx) -> Self {
        EdgeIndex(ix)
    }
}

/// Short version of `EdgeIndex::new`
pub fn edge_index(index: usize) -> EdgeIndex {
    EdgeIndex::new(index)
}

/// Road intersection or dead end. `coord.x` is the longitude, `coord.y` the
/// latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub coord: Coord<f64>,
}

impl Node {
    pub fn new(id: NodeId, lon: f64, lat: f64) -> Self {
        Node {
            id,
            coord: Coord { x: lon, y: lat },
        }
    }

    pub fn lon(&self) -> f64 {
        self.coord.x
    }

    pub fn lat(&self) -> f64 {
        self.coord.y
    }
}

/// Directed road segment.
///
/// `base_length` never changes after the graph is built. `current_weight`
/// is derived from it by the congestion overlay and is what searches use.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub geometry: LineString<f64>,
    base_length: Weight,
    current_weight: Weight,
}

impl Edge {
    pub fn base_length(&self) -> Weight {
        self.base_length
    }

    pub fn current_weight(&self) -> Weight {
        self.current_weight
    }

    /// Factor by which congestion has increased the cost of this edge
    pub fn multiplier(&self) -> f64 {
        self.current_weight / self.base_length
    }
}

/// Edge as delivered by an input source, endpoints referenced by node id.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Falls back to a straight line between the endpoints
    pub geometry: Option<LineString<f64>>,
    /// Falls back to the haversine length of the geometry in metres
    pub length: Option<Weight>,
}

impl RawEdge {
    pub fn new(source: NodeId, target: NodeId, length: Weight) -> Self {
        RawEdge {
            source,
            target,
            geometry: None,
            length: Some(length),
        }
    }

    pub fn with_geometry(mut self, geometry: LineString<f64>) -> Self {
        self.geometry = Some(geometry);
        self
    }
}

/// Incremental construction of a [`RoadGraph`].
///
/// Unusable records are skipped and collected in a [`LoadReport`] instead of
/// failing the whole load. Nodes have to be added before the edges which
/// reference them.
#[derive(Default)]
pub struct RoadGraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    id_index: FxHashMap<NodeId, NodeIndex>,
    nodes_seen: usize,
    edges_seen: usize,
    report: LoadReport,
}

impl RoadGraphBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_capacity(num_nodes: usize, num_edges: usize) -> Self {
        RoadGraphBuilder {
            nodes: Vec::with_capacity(num_nodes),
            edges: Vec::with_capacity(num_edges),
            id_index: FxHashMap::with_capacity_and_hasher(num_nodes, Default::default()),
            ..Default::default()
        }
    }

    /// Adds a node. Returns `None` if the node was skipped.
    pub fn add_node(&mut self, node: Node) -> Option<NodeIndex> {
        let position = self.nodes_seen;
        self.nodes_seen += 1;

        if !node.coord.x.is_finite() || !node.coord.y.is_finite() {
            self.report.skip(
                RecordKind::Node,
                position,
                format!("node {} has a non-finite coordinate", node.id),
            );
            return None;
        }
        if self.id_index.contains_key(&node.id) {
            self.report.skip(
                RecordKind::Node,
                position,
                format!("duplicate node id {}", node.id),
            );
            return None;
        }

        let node_idx = NodeIndex::new(self.nodes.len());
        assert!(
            NodeIndex::end() != node_idx,
            "Maximum number of nodes for index type {} exceeded",
            std::any::type_name::<DefaultIdx>()
        );
        self.id_index.insert(node.id, node_idx);
        self.nodes.push(node);
        Some(node_idx)
    }

    /// Adds a directed edge. Parallel edges are kept as separate edges.
    /// Returns `None` if the edge was skipped.
    pub fn add_edge(&mut self, raw: RawEdge) -> Option<EdgeIndex> {
        let position = self.edges_seen;
        self.edges_seen += 1;

        let (Some(&source), Some(&target)) =
            (self.id_index.get(&raw.source), self.id_index.get(&raw.target))
        else {
            self.report.skip(
                RecordKind::Edge,
                position,
                format!(
                    "edge {} -> {} references an unknown node",
                    raw.source, raw.target
                ),
            );
            return None;
        };

        let geometry = raw.geometry.unwrap_or_else(|| {
            LineString::from(vec![
                self.nodes[source.index()].coord,
                self.nodes[target.index()].coord,
            ])
        });
        let length = raw.length.unwrap_or_else(|| Haversine.length(&geometry));

        if !length.is_finite() || length <= 0.0 {
            self.report.skip(
                RecordKind::Edge,
                position,
                format!(
                    "edge {} -> {} has invalid length {}",
                    raw.source, raw.target, length
                ),
            );
            return None;
        }

        let edge_idx = EdgeIndex::new(self.edges.len());
        assert!(
            EdgeIndex::end() != edge_idx,
            "Maximum number of edges for index type {} exceeded",
            std::any::type_name::<DefaultIdx>()
        );
        self.edges.push(Edge {
            source,
            target,
            geometry,
            base_length: length,
            current_weight: length,
        });
        Some(edge_idx)
    }

    /// Finishes the graph. Fails if not a single node could be added.
    pub fn build(self) -> Result<RoadGraph, RoutingError> {
        if self.nodes.is_empty() {
            return Err(RoutingError::EmptyGraph);
        }

        let mut edges_out = vec![Vec::new(); self.nodes.len()];
        for (i, edge) in self.edges.iter().enumerate() {
            edges_out[edge.source.index()].push(EdgeIndex::new(i));
        }

        let node_tree = RTree::bulk_load(
            self.nodes
                .iter()
                .enumerate()
                .map(|(i, node)| GeomWithData::new([node.coord.x, node.coord.y], NodeIndex::new(i)))
                .collect(),
        );

        Ok(RoadGraph {
            nodes: self.nodes,
            edges: self.edges,
            edges_out,
            id_index: self.id_index,
            node_tree,
            report: self.report,
        })
    }
}

/// Road network with adjacency lists.
///
/// The structure is fixed once built. Only the edge weights change, and only
/// through the congestion overlay.
#[derive(Clone)]
pub struct RoadGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edges_out: Vec<Vec<EdgeIndex>>,
    id_index: FxHashMap<NodeId, NodeIndex>,
    node_tree: RTree<GeomWithData<[f64; 2], NodeIndex>>,
    report: LoadReport,
}

impl RoadGraph {
    pub fn build(
        nodes: impl IntoIterator<Item = Node>,
        edges: impl IntoIterator<Item = RawEdge>,
    ) -> Result<Self, RoutingError> {
        let mut builder = RoadGraphBuilder::new();
        for node in nodes {
            builder.add_node(node);
        }
        for edge in edges {
            builder.add_edge(edge);
        }
        builder.build()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, node_idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(node_idx.index())
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.index_of(id).and_then(|idx| self.node(idx))
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    /// Returns an iterator over all nodes of the graph
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn edge(&self, edge_idx: EdgeIndex) -> Option<&Edge> {
        self.edges.get(edge_idx.index())
    }

    /// Returns an iterator over all edges of the graph
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub(crate) fn edge_slice(&self) -> &[Edge] {
        &self.edges
    }

    pub fn neighbors_outgoing(
        &self,
        node_idx: NodeIndex,
    ) -> impl Iterator<Item = (EdgeIndex, &Edge)> + '_ {
        self.edges_out[node_idx.index()]
            .iter()
            .map(move |edge_idx| (*edge_idx, &self.edges[edge_idx.index()]))
    }

    pub fn out_degree(&self, node_idx: NodeIndex) -> usize {
        self.edges_out[node_idx.index()].len()
    }

    /// All (parallel) edges from `source` to `target`
    pub fn edges_between(
        &self,
        source: NodeIndex,
        target: NodeIndex,
    ) -> impl Iterator<Item = (EdgeIndex, &Edge)> + '_ {
        self.neighbors_outgoing(source)
            .filter(move |(_, edge)| edge.target == target)
    }

    /// Node closest to `coord`, measured in coordinate units
    pub fn nearest_node(&self, coord: Coord<f64>) -> Option<NodeIndex> {
        self.node_tree
            .nearest_neighbor(&[coord.x, coord.y])
            .map(|entry| entry.data)
    }

    /// Records skipped while the graph was built
    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    /// Sets the weight used by searches. Only the congestion overlay calls
    /// this. Weights below `base_length` are raised to it.
    pub(crate) fn set_edge_weight(&mut self, edge_idx: EdgeIndex, weight: Weight) {
        let edge = &mut self.edges[edge_idx.index()];
        debug_assert!(
            weight >= edge.base_length,
            "weight {} below base length {}",
            weight,
            edge.base_length
        );
        edge.current_weight = weight.max(edge.base_length);
    }

    /// Restores `current_weight = base_length` on every edge
    pub fn reset_weights(&mut self) {
        for edge in self.edges.iter_mut() {
            edge.current_weight = edge.base_length;
        }
    }

    pub fn from_network(network: &RoadNetwork) -> Result<Self, RoutingError> {
        let mut builder =
            RoadGraphBuilder::with_capacity(network.get_nodes().len(), network.get_segments().len());

        // Sort by OSM id so that node indices do not depend on hash order
        let mut nodes: Vec<_> = network.get_nodes().iter().collect();
        nodes.sort_unstable_by_key(|(id, _)| **id);
        for (id, [lat, lon]) in nodes {
            builder.add_node(Node::new(*id, *lon, *lat));
        }

        for segment in network.get_segments() {
            let geometry: LineString<f64> = segment
                .geometry
                .iter()
                .map(|[lat, lon]| Coord { x: *lon, y: *lat })
                .collect();
            builder.add_edge(RawEdge {
                source: segment.source,
                target: segment.target,
                geometry: Some(geometry),
                length: Some(segment.length),
            });
        }

        builder.build()
    }

    pub fn from_pbf(path_to_pbf: &Path, network: NetworkType) -> anyhow::Result<Self> {
        info!("Parsing pbf file: {:?}", path_to_pbf);

        let road_network =
            RoadNetwork::from_pbf(path_to_pbf, network).context("Could not parse pbf file")?;
        let g = RoadGraph::from_network(&road_network)?;

        info!("Finished parsing pbf file");
        info!(
            "Graph has {} nodes and {} edges",
            g.num_nodes(),
            g.num_edges()
        );
        Ok(g)
    }

    /// Reads a graph from a node file (`id,lon,lat`) and an edge file
    /// (`source,target,length,geometry`). `length` and `geometry` may be
    /// empty, `geometry` is a WKT `LINESTRING`. Unusable rows are skipped.
    pub fn from_csv(path_to_nodes: &Path, path_to_edges: &Path) -> anyhow::Result<Self> {
        let nodes = csv_reader(path_to_nodes)?;
        let edges = csv_reader(path_to_edges)?;
        Ok(Self::from_csv_readers(nodes, edges)?)
    }

    pub fn from_csv_readers<N: std::io::Read, E: std::io::Read>(
        mut nodes: csv::Reader<N>,
        mut edges: csv::Reader<E>,
    ) -> Result<Self, RoutingError> {
        let mut builder = RoadGraphBuilder::new();

        debug!("BEGIN reading nodes");
        for result in nodes.deserialize::<NodeRow>() {
            match result {
                Ok(NodeRow {
                    id: Some(id),
                    lon: Some(lon),
                    lat: Some(lat),
                }) => {
                    builder.add_node(Node::new(id, lon, lat));
                }
                Ok(_) => {
                    let position = builder.nodes_seen;
                    builder.nodes_seen += 1;
                    builder
                        .report
                        .skip(RecordKind::Node, position, "missing or non-numeric field");
                }
                Err(e) => {
                    let position = builder.nodes_seen;
                    builder.nodes_seen += 1;
                    builder.report.skip(RecordKind::Node, position, e.to_string());
                }
            }
        }
        debug!("FINISHED reading nodes");

        debug!("BEGIN reading edges");
        for result in edges.deserialize::<EdgeRow>() {
            let raw = result
                .map_err(|e| e.to_string())
                .and_then(|row| row.into_raw_edge());
            match raw {
                Ok(raw) => {
                    builder.add_edge(raw);
                }
                Err(reason) => {
                    let position = builder.edges_seen;
                    builder.edges_seen += 1;
                    builder.report.skip(RecordKind::Edge, position, reason);
                }
            }
        }
        debug!("FINISHED reading edges");

        builder.build()
    }
}

impl fmt::Display for RoadGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RoadGraph:\t#Nodes: {}, #Edges: {}, #Skipped records: {}",
            self.nodes.len(),
            self.edges.len(),
            self.report.skipped.len()
        )
    }
}

pub(crate) fn csv_reader(path: &Path) -> anyhow::Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

#[derive(Debug, Deserialize)]
struct NodeRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    id: Option<NodeId>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    lon: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    lat: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EdgeRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    source: Option<NodeId>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    target: Option<NodeId>,
    #[serde(default)]
    length: Option<String>,
    #[serde(default)]
    geometry: Option<String>,
}

impl EdgeRow {
    fn into_raw_edge(self) -> Result<RawEdge, String> {
        let (Some(source), Some(target)) = (self.source, self.target) else {
            return Err("missing or non-numeric endpoint".to_string());
        };
        let length = match self.length.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                s.parse::<Weight>()
                    .map_err(|e| format!("invalid length '{}': {}", s, e))?,
            ),
        };
        let geometry = match self.geometry.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                LineString::<f64>::try_from_wkt_str(s)
                    .map_err(|e| format!("invalid geometry '{}': {}", s, e))?,
            ),
        };
        Ok(RawEdge {
            source,
            target,
            geometry,
            length,
        })
    }
}

/// Macro to create a raw edge from source id to target id with a length
///
/// edge!(0 , 1, 3.0) Returns edges in both directions
///
/// edge!(0 => 1, 3.0) Returns directed edge
#[macro_export]
macro_rules! edge {
    ($source:expr => $target:expr, $length:expr) => {
        $crate::graph::RawEdge::new($source, $target, $length)
    };
    ($source:expr , $target:expr, $length:expr) => {
        vec![
            $crate::graph::RawEdge::new($source, $target, $length),
            $crate::graph::RawEdge::new($target, $source, $length),
        ]
    };
}

/// Macro to create a node with a given id, lon, lat
/// node!(0, 1.0, 1.0)
#[macro_export]
macro_rules! node {
    ($id:expr, $lon:expr, $lat:expr) => {
        $crate::graph::Node::new($id, $lon, $lat)
    };
}

use geo::{Coord, Haversine, Length, LineString};
use log::{info, warn};
use osmpbf::{Element, IndexedReader};
use rustc_hash::FxHashMap;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    str::FromStr,
};
use wkt::ToWkt;

mod road_types;
pub use road_types::{NetworkType, RoadType};

/// Lower bound for the length of a segment in metres. OSM data contains ways
/// with duplicated coordinates which would otherwise produce zero length
/// segments.
pub const MIN_SEGMENT_LENGTH: f64 = 0.01;

/// A road segment between two junctions.
///
/// `geometry` holds the `[lat, lon]` pairs of all OSM nodes along the
/// segment, including both endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub source: i64,
    pub target: i64,
    pub geometry: Vec<[f64; 2]>,
    /// Length in metres
    pub length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Oneway {
    No,
    Forward,
    Backward,
}

/// A way which passed the road type filter
#[derive(Debug, Clone)]
struct WayRecord {
    refs: Vec<i64>,
    oneway: Oneway,
}

/// Road network as read from OSM, keyed by OSM node ids.
/// Only junctions (nodes referenced by more than one way, plus way endpoints)
/// are kept as nodes; everything in between ends up in the segment geometry.
pub struct RoadNetwork {
    nodes: FxHashMap<i64, [f64; 2]>,
    segments: Vec<Segment>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        RoadNetwork {
            nodes: FxHashMap::default(),
            segments: Vec::new(),
        }
    }

    pub fn add_node(&mut self, id: i64, lat: f64, lon: f64) {
        self.nodes.insert(id, [lat, lon]);
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn get_nodes(&self) -> &FxHashMap<i64, [f64; 2]> {
        &self.nodes
    }

    pub fn get_segments(&self) -> &Vec<Segment> {
        &self.segments
    }

    pub fn from_pbf(pbf_path: &Path, network: NetworkType) -> anyhow::Result<RoadNetwork> {
        let mut reader = IndexedReader::from_path(pbf_path)?;

        let road_filter = |way: &osmpbf::Way| {
            way.tags().any(|(key, value)| {
                key == "highway"
                    && value
                        .parse::<RoadType>()
                        .is_ok_and(|road_type| road_type.allowed_for(network))
            })
        };

        let mut ways = Vec::new();
        let mut coords: FxHashMap<i64, [f64; 2]> = Default::default();

        let now = std::time::Instant::now();
        info!("BEGIN parsing {} ({:?})", pbf_path.display(), network);
        reader.read_ways_and_deps(road_filter, |element| match element {
            Element::Way(way) => {
                let tags = way.tags().collect::<Vec<_>>();
                let Some(road_type) = tags
                    .iter()
                    .find(|(key, _)| *key == "highway")
                    .and_then(|(_, value)| RoadType::from_str(value).ok())
                else {
                    return;
                };
                let oneway_tag = tags
                    .iter()
                    .find(|(key, _)| *key == "oneway")
                    .map(|(_, value)| *value);

                ways.push(WayRecord {
                    refs: way.refs().collect(),
                    oneway: oneway(oneway_tag, road_type, network),
                });
            }
            Element::Node(node) => {
                coords.insert(node.id(), [node.lat(), node.lon()]);
            }
            Element::DenseNode(dense_node) => {
                coords.insert(dense_node.id(), [dense_node.lat(), dense_node.lon()]);
            }
            Element::Relation(_) => {}
        })?;
        info!("FINISHED parsing. Took {:?}", now.elapsed());

        let now = std::time::Instant::now();
        info!("BEGIN simplifying graph");
        let graph = simplify(&ways, &coords);
        info!(
            "FINISHED simplifying graph. Took {:?}. {} nodes, {} segments",
            now.elapsed(),
            graph.nodes.len(),
            graph.segments.len()
        );

        Ok(graph)
    }

    /// Writes `nodes.csv` (`id,lon,lat`) and `edges.csv`
    /// (`source,target,length,geometry`) into `dir`. The geometry column is a
    /// WKT `LINESTRING`.
    pub fn write_csv(&self, dir: &Path) -> anyhow::Result<()> {
        let mut nodes_writer = BufWriter::new(File::create(dir.join("nodes.csv"))?);
        writeln!(nodes_writer, "id,lon,lat")?;
        for (id, [lat, lon]) in self.nodes.iter() {
            writeln!(nodes_writer, "{},{},{}", id, lon, lat)?;
        }
        nodes_writer.flush()?;

        let mut edges_writer = BufWriter::new(File::create(dir.join("edges.csv"))?);
        writeln!(edges_writer, "source,target,length,geometry")?;
        for segment in self.segments.iter() {
            writeln!(
                edges_writer,
                "{},{},{},\"{}\"",
                segment.source,
                segment.target,
                segment.length,
                geometry_wkt(&segment.geometry)
            )?;
        }
        edges_writer.flush()?;

        Ok(())
    }
}

impl Default for RoadNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn oneway(tag: Option<&str>, road_type: RoadType, network: NetworkType) -> Oneway {
    if !network.respects_oneway() {
        return Oneway::No;
    }
    match tag {
        // Tag always has prio if explicitly set
        Some("yes") | Some("true") | Some("1") => Oneway::Forward,
        Some("-1") | Some("reverse") => Oneway::Backward,
        Some("no") | Some("false") | Some("0") => Oneway::No,
        _ if road_type.implies_oneway() => Oneway::Forward,
        _ => Oneway::No,
    }
}

/// Splits ways at junctions. A node is a junction if it is referenced more
/// than once (way endpoints count twice).
fn simplify(ways: &[WayRecord], coords: &FxHashMap<i64, [f64; 2]>) -> RoadNetwork {
    let mut graph = RoadNetwork::new();

    let mut refs_count: FxHashMap<i64, usize> = FxHashMap::default();
    for way in ways {
        for (i, node_id) in way.refs.iter().enumerate() {
            let count = if i == 0 || i == way.refs.len() - 1 { 2 } else { 1 };
            *refs_count.entry(*node_id).or_insert(0) += count;
        }
    }

    graph.segments.reserve(ways.len() * 2);
    for way in ways {
        // Nodes without coordinates are not part of the extract
        let refs: Vec<i64> = way
            .refs
            .iter()
            .copied()
            .filter(|id| coords.contains_key(id))
            .collect();
        if refs.len() < way.refs.len() {
            warn!(
                "Way references {} nodes missing from the extract",
                way.refs.len() - refs.len()
            );
        }
        if refs.len() < 2 {
            continue;
        }

        let junctions: Vec<usize> = (0..refs.len())
            .filter(|&i| i == 0 || i == refs.len() - 1 || refs_count[&refs[i]] > 1)
            .collect();

        for &i in &junctions {
            let [lat, lon] = coords[&refs[i]];
            graph.add_node(refs[i], lat, lon);
        }

        for pair in junctions.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let geometry: Vec<[f64; 2]> = refs[from..=to].iter().map(|id| coords[id]).collect();
            let length = polyline_length(&geometry).max(MIN_SEGMENT_LENGTH);

            if way.oneway != Oneway::Backward {
                graph.add_segment(Segment {
                    source: refs[from],
                    target: refs[to],
                    geometry: geometry.clone(),
                    length,
                });
            }
            if way.oneway != Oneway::Forward {
                let mut reversed = geometry;
                reversed.reverse();
                graph.add_segment(Segment {
                    source: refs[to],
                    target: refs[from],
                    geometry: reversed,
                    length,
                });
            }
        }
    }

    graph
}

/// `[lat, lon]` pairs as a geometry with `x` = longitude
fn to_line_string(geometry: &[[f64; 2]]) -> LineString<f64> {
    geometry
        .iter()
        .map(|[lat, lon]| Coord { x: *lon, y: *lat })
        .collect()
}

fn geometry_wkt(geometry: &[[f64; 2]]) -> String {
    to_line_string(geometry).to_wkt().to_string()
}

/// Length of a `[lat, lon]` polyline in metres
pub fn polyline_length(geometry: &[[f64; 2]]) -> f64 {
    Haversine.length(&to_line_string(geometry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> FxHashMap<i64, [f64; 2]> {
        //  1 --- 2 --- 3
        //        |
        //        4 --- 5
        let mut coords = FxHashMap::default();
        coords.insert(1, [0.0, 0.0]);
        coords.insert(2, [0.0, 0.001]);
        coords.insert(3, [0.0, 0.002]);
        coords.insert(4, [-0.001, 0.001]);
        coords.insert(5, [-0.001, 0.002]);
        coords
    }

    #[test]
    fn split_at_junctions() {
        let ways = vec![
            WayRecord {
                refs: vec![1, 2, 3],
                oneway: Oneway::No,
            },
            WayRecord {
                refs: vec![2, 4, 5],
                oneway: Oneway::Forward,
            },
        ];

        let graph = simplify(&ways, &coords());

        // 4 is only referenced once and not an endpoint
        assert_eq!(graph.get_nodes().len(), 4);
        assert!(!graph.get_nodes().contains_key(&4));
        // 1 <-> 2, 2 <-> 3, 2 -> 5
        assert_eq!(graph.get_segments().len(), 5);

        let bent = graph
            .get_segments()
            .iter()
            .find(|s| s.source == 2 && s.target == 5)
            .unwrap();
        assert_eq!(bent.geometry.len(), 3);
        assert!(
            (bent.length - polyline_length(&[[0.0, 0.001], [-0.001, 0.001], [-0.001, 0.002]]))
                .abs()
                < 1e-9
        );
        assert!(!graph
            .get_segments()
            .iter()
            .any(|s| s.source == 5 && s.target == 2));
    }

    #[test]
    fn backward_oneway_is_reversed() {
        let ways = vec![WayRecord {
            refs: vec![1, 2],
            oneway: Oneway::Backward,
        }];

        let graph = simplify(&ways, &coords());

        assert_eq!(graph.get_segments().len(), 1);
        let segment = &graph.get_segments()[0];
        assert_eq!((segment.source, segment.target), (2, 1));
        assert_eq!(segment.geometry, vec![[0.0, 0.001], [0.0, 0.0]]);
    }

    #[test]
    fn walking_ignores_oneway() {
        assert_eq!(
            oneway(Some("yes"), RoadType::Primary, NetworkType::Walk),
            Oneway::No
        );
        assert_eq!(
            oneway(Some("yes"), RoadType::Primary, NetworkType::Drive),
            Oneway::Forward
        );
        assert_eq!(
            oneway(None, RoadType::Motorway, NetworkType::Drive),
            Oneway::Forward
        );
        assert_eq!(
            oneway(Some("-1"), RoadType::Residential, NetworkType::Drive),
            Oneway::Backward
        );
    }

    #[test]
    fn zero_length_segments_are_clamped() {
        let mut coords = coords();
        coords.insert(6, [0.0, 0.0]);
        let ways = vec![WayRecord {
            refs: vec![1, 6],
            oneway: Oneway::Forward,
        }];

        let graph = simplify(&ways, &coords);

        assert_eq!(graph.get_segments()[0].length, MIN_SEGMENT_LENGTH);
    }

    #[test]
    fn length_of_one_degree() {
        let d = polyline_length(&[[0.0, 0.0], [0.0, 0.5], [0.0, 1.0]]);
        assert!((d - 111_195.0).abs() < 1.0);
        assert_eq!(polyline_length(&[[0.0, 0.0]]), 0.0);
    }

    #[test]
    fn wkt_uses_lon_lat_order() {
        use wkt::TryFromWkt;

        let written = geometry_wkt(&[[1.0, 2.0], [3.0, 4.0]]);
        assert!(written.starts_with("LINESTRING"));

        let read = LineString::<f64>::try_from_wkt_str(&written).unwrap();
        assert_eq!(read, LineString::from(vec![(2.0, 1.0), (4.0, 3.0)]));
    }
}

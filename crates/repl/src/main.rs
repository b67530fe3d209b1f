//! Interactive routing session on a congestion-weighted road graph
use std::{collections::BTreeMap, path::PathBuf};

use anyhow::Context as _;
use geo::Coord;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use reedline_repl_rs::clap::{value_parser, Arg, ArgMatches, Command};
use reedline_repl_rs::{Repl, Result};
use traffic_core::{
    congestion::{apply_congestion, WeightingReport},
    constants::NodeId,
    error::{RecordKind, RoutingError},
    graph::RoadGraph,
    search::{dijkstra::Dijkstra, shortest_path::Route},
    statistics,
    traffic::TrafficStore,
    util::{
        cli::{self, Cfg, GraphSource},
        math::straight_line,
    },
};

struct Context {
    graph: RoadGraph,
    store: Option<TrafficStore>,
    report: Option<WeightingReport>,
    cfg: Cfg,
}

impl Context {
    fn new(cfg: Cfg) -> anyhow::Result<Self> {
        let mut graph = match &cfg.source {
            GraphSource::Pbf(path) => RoadGraph::from_pbf(path, cfg.network)?,
            GraphSource::Csv { nodes, edges } => RoadGraph::from_csv(nodes, edges)?,
        };
        info!("{}", graph);

        let store = cfg
            .traffic
            .as_deref()
            .map(TrafficStore::from_csv)
            .transpose()
            .context("Could not read traffic observations")?;
        let report = store
            .as_ref()
            .map(|store| apply_congestion(&mut graph, store, &cfg.params));

        Ok(Self {
            graph,
            store,
            report,
            cfg,
        })
    }

    fn search(&self, src: NodeId, dst: NodeId) -> (std::result::Result<Route, RoutingError>, Dijkstra) {
        let mut dijkstra = Dijkstra::new(&self.graph).with_limits(self.cfg.limits);
        let result = dijkstra.search(src, dst);
        (result, dijkstra)
    }

    fn format_route(&self, src: NodeId, dst: NodeId) -> String {
        let (result, dijkstra) = self.search(src, dst);
        match result {
            Ok(route) => {
                let mut out = String::new();
                for id in &route.nodes {
                    if let Some(node) = self.graph.node_by_id(*id) {
                        out.push_str(&format!("{}\t({}, {})\n", id, node.lat(), node.lon()));
                    }
                }
                out.push_str(&format!("Costs: {:.2}\n", route.cost));
                out.push_str(&format!("{}", dijkstra.stats));
                out
            }
            Err(e) if e.is_recoverable() => format!("{}, try another query", e),
            Err(e) => format!("Error: {}", e),
        }
    }
}

/// Print graph info
fn info(_args: ArgMatches, context: &mut Context) -> Result<Option<String>> {
    let g = &context.graph;
    let mut out = format!(
        "{}\nAverage out degree: {:.2}\nCongested edges: {:.1}%",
        g,
        statistics::average_out_degree(g),
        statistics::congested_share(g) * 100.0
    );
    for kind in [RecordKind::Node, RecordKind::Edge] {
        let skipped = g.load_report().count(kind);
        if skipped > 0 {
            out.push_str(&format!("\nSkipped {:?} records: {}", kind, skipped));
        }
    }
    Ok(Some(out))
}

/// Print traffic info
fn traffic(_args: ArgMatches, context: &mut Context) -> Result<Option<String>> {
    let Some(store) = &context.store else {
        return Ok(Some("No traffic observations loaded".to_string()));
    };

    let mut levels = BTreeMap::new();
    for observation in store.observations() {
        *levels.entry(observation.level).or_insert(0usize) += 1;
    }

    let mut out = format!(
        "{} observations, {} skipped",
        store.len(),
        store.load_report().skipped.len()
    );
    for (level, count) in levels {
        match level {
            Some(level) => out.push_str(&format!("\n  {}: {}", level, count)),
            None => out.push_str(&format!("\n  unknown: {}", count)),
        }
    }
    if let Some(report) = &context.report {
        out.push_str(&format!(
            "\n{} edges matched, {} reweighted, {} without geometry",
            report.edges_matched,
            report.edges_reweighted,
            report.edges_skipped.len()
        ));
    }
    Ok(Some(out))
}

fn route(args: ArgMatches, context: &mut Context) -> Result<Option<String>> {
    let src = *args.get_one::<NodeId>("src").unwrap();
    let dst = *args.get_one::<NodeId>("dst").unwrap();

    Ok(Some(context.format_route(src, dst)))
}

fn route_at(args: ArgMatches, context: &mut Context) -> Result<Option<String>> {
    let coord = |lat: &str, lon: &str| Coord {
        x: *args.get_one::<f64>(lon).unwrap(),
        y: *args.get_one::<f64>(lat).unwrap(),
    };
    let from = coord("src_lat", "src_lon");
    let to = coord("dst_lat", "dst_lon");

    let mut out = String::new();
    let mut snapped = Vec::with_capacity(2);
    for query in [from, to] {
        let Some(node) = context
            .graph
            .nearest_node(query)
            .and_then(|idx| context.graph.node(idx))
        else {
            return Ok(Some("Error: graph has no nodes".to_string()));
        };
        out.push_str(&format!(
            "({}, {}) -> node {} ({:.1} m away)\n",
            query.y,
            query.x,
            node.id,
            straight_line(query, node.coord)
        ));
        snapped.push(node.id);
    }

    out.push_str(&context.format_route(snapped[0], snapped[1]));
    Ok(Some(out))
}

fn measure_dijkstra(args: ArgMatches, context: &mut Context) -> Result<Option<String>> {
    use rand::seq::IteratorRandom;

    let n = *args.get_one::<usize>("n").unwrap_or(&10);

    // Select n random start and end nodes
    let mut rng = rand::thread_rng();
    let ids: Vec<NodeId> = context.graph.nodes().map(|node| node.id).collect();
    let pairs: Vec<(NodeId, NodeId)> = (0..n)
        .filter_map(|_| {
            let src = *ids.iter().choose(&mut rng)?;
            let dst = *ids.iter().choose(&mut rng)?;
            Some((src, dst))
        })
        .collect();

    let pb = ProgressBar::new(pairs.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {elapsed}") {
        pb.set_style(style);
    }

    let mut res = String::new();
    let mut failed = 0;
    for (src, dst) in pairs {
        let (result, dijkstra) = context.search(src, dst);
        pb.inc(1);
        match result {
            Ok(route) => res.push_str(&format!(
                "{} -> {}: {:.2} in {:?}\n",
                src, dst, route.cost, dijkstra.stats.duration
            )),
            Err(_) => failed += 1,
        }
    }
    pb.finish_and_clear();
    res.push_str(&format!("{} queries without result", failed));

    Ok(Some(res))
}

fn coordinate(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .required(true)
        .help(help)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cfg = cli::parse()?;
    let context = match Context::new(cfg) {
        Ok(context) => context,
        Err(e) => {
            if let Some(RoutingError::EmptyGraph) = e.downcast_ref::<RoutingError>() {
                anyhow::bail!("The graph is empty, check the travel mode and input files");
            }
            return Err(e);
        }
    };

    let mut repl = Repl::new(context)
        .with_name("Pathfinder")
        .with_version("v0.1.0")
        .with_description("Route over a road network with congestion weighted edges")
        .with_banner("Welcome to Pathfinder")
        .with_history(PathBuf::from(".history"), 100)
        .with_command(Command::new("info").about("Print graph info"), info)
        .with_command(
            Command::new("traffic").about("Print traffic observations and their effect"),
            traffic,
        )
        .with_command(
            Command::new("route")
                .arg(
                    Arg::new("src")
                        .value_parser(value_parser!(NodeId))
                        .allow_negative_numbers(true)
                        .required(true)
                        .help("ID of source node"),
                )
                .arg(
                    Arg::new("dst")
                        .value_parser(value_parser!(NodeId))
                        .allow_negative_numbers(true)
                        .required(true)
                        .help("ID of destination node"),
                )
                .about("Calculate the cheapest path between two nodes"),
            route,
        )
        .with_command(
            Command::new("route-at")
                .arg(coordinate("src_lat", "Latitude of the start"))
                .arg(coordinate("src_lon", "Longitude of the start"))
                .arg(coordinate("dst_lat", "Latitude of the destination"))
                .arg(coordinate("dst_lon", "Longitude of the destination"))
                .about("Calculate the cheapest path between the nodes closest to two locations"),
            route_at,
        )
        .with_command(
            Command::new("measure")
                .arg(
                    Arg::new("n")
                        .value_parser(value_parser!(usize))
                        .required(false)
                        .help("Number of random shortest paths to calculate"),
                )
                .about("Measure `n` random shortest path calculations"),
            measure_dijkstra,
        );

    repl.run().map_err(|e| anyhow::anyhow!("{}", e))
}

use std::{path::PathBuf, time::Duration};

use anyhow::bail;
use clap::Parser;
use osm_reader::NetworkType;

use crate::{
    congestion::{CongestionParams, MultiplierPolicy},
    search::dijkstra::SearchLimits,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a .pbf file
    #[arg(long, value_name = "file", conflicts_with_all = ["nodes", "edges"])]
    pbf: Option<PathBuf>,

    /// Path to a node CSV file (id,lon,lat)
    #[arg(long, value_name = "file", requires = "edges")]
    nodes: Option<PathBuf>,

    /// Path to an edge CSV file (source,target,length,geometry)
    #[arg(long, value_name = "file", requires = "nodes")]
    edges: Option<PathBuf>,

    /// Path to a traffic CSV file (latitude,longitude,congestion_level,road_name)
    #[arg(short, long, value_name = "file")]
    traffic: Option<PathBuf>,

    /// Travel mode used when reading a .pbf file. Possible values are "walk" and "drive"
    #[arg(short, long, default_value = "drive")]
    mode: NetworkType,

    /// Maximum distance between an observation and a road, in degrees
    #[arg(long, value_name = "degrees")]
    tolerance: Option<f64>,

    /// How multiple observations on one road combine. Possible values are "max" and "product"
    #[arg(long, default_value = "max")]
    policy: MultiplierPolicy,

    /// Abort a search after settling this many nodes
    #[arg(long, value_name = "n")]
    max_settled: Option<usize>,

    /// Abort a search after this many milliseconds
    #[arg(long, value_name = "ms")]
    timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphSource {
    Pbf(PathBuf),
    Csv { nodes: PathBuf, edges: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Cfg {
    pub source: GraphSource,
    pub network: NetworkType,
    pub traffic: Option<PathBuf>,
    pub params: CongestionParams,
    pub limits: SearchLimits,
}

pub fn parse() -> anyhow::Result<Cfg> {
    into_cfg(Cli::parse())
}

fn into_cfg(cli: Cli) -> anyhow::Result<Cfg> {
    let source = match (cli.pbf, cli.nodes, cli.edges) {
        (Some(pbf), _, _) => GraphSource::Pbf(pbf),
        (None, Some(nodes), Some(edges)) => GraphSource::Csv { nodes, edges },
        _ => bail!("Either --pbf or both --nodes and --edges are required"),
    };

    let mut params = CongestionParams::new().policy(cli.policy);
    if let Some(tolerance) = cli.tolerance {
        if !tolerance.is_finite() {
            bail!("Tolerance must be a finite number, got {}", tolerance);
        }
        params = params.tolerance(tolerance);
    }

    let mut limits = SearchLimits::new();
    if let Some(max_settled) = cli.max_settled {
        limits = limits.max_settled(max_settled);
    }
    if let Some(ms) = cli.timeout {
        limits = limits.deadline(Duration::from_millis(ms));
    }

    Ok(Cfg {
        source,
        network: cli.mode,
        traffic: cli.traffic,
        params,
        limits,
    })
}

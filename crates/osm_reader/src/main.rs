use std::path::Path;

use osm_reader::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let now = std::time::Instant::now();
    // Usage: osm_reader <file.osm.pbf> [walking|driving]
    let pbf_path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("No path to PBF file given"))?;
    let network = match std::env::args().nth(2) {
        Some(mode) => mode.parse::<NetworkType>().map_err(anyhow::Error::msg)?,
        None => NetworkType::default(),
    };

    let graph = RoadNetwork::from_pbf(Path::new(&pbf_path), network)?;
    graph.write_csv(Path::new("."))?;

    let elapsed = now.elapsed();

    println!(
        "Finished reading PBF file in {}.{:03} seconds",
        elapsed.as_secs(),
        elapsed.subsec_millis()
    );
    println!(
        "Graph has {} nodes and {} segments",
        graph.get_nodes().len(),
        graph.get_segments().len()
    );
    Ok(())
}

use traffic_core::prelude::*;

fn print_route(g: &RoadGraph, label: &str) -> anyhow::Result<()> {
    let route = search::shortest_path(g, 0, 3)?;
    println!("{}: {:?} costs {}", label, route.nodes, route.cost);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    //        C (1,1)
    //      /   \
    //  5  /     \ 1
    //    /       \
    //  A ---------B---------D
    // (0,0)   1  (1,0)  1  (2,0)
    let mut g = generate_diamond_graph();
    print_route(&g, "Free flow")?;

    // High congestion on both A-B and B-D
    let store = TrafficStore::from_reader(
        "Latitude,Longitude,Congestion Level,Road Name\n\
         0.0,0.5,High,First Street\n\
         0.0,1.5,High,First Street\n"
            .as_bytes(),
    )?;

    let table = CongestionTable::new([
        (CongestionLevel::Low, 1.0),
        (CongestionLevel::Medium, 2.0),
        (CongestionLevel::High, 4.0),
    ])?;
    let report = apply_congestion(&mut g, &store, &CongestionParams::new().table(table));
    println!("{} edges reweighted", report.edges_reweighted);

    print_route(&g, "Congested")?;
    Ok(())
}

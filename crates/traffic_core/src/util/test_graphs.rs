use crate::{
    edge,
    graph::{EdgeIndex, Node, RawEdge, RoadGraph},
    node,
};

fn build(nodes: Vec<Node>, edges: Vec<RawEdge>) -> RoadGraph {
    RoadGraph::build(nodes, edges).expect("test graph has nodes")
}

pub fn generate_complex_graph() -> RoadGraph {
    let nodes = vec![
        node!(0, 2.0, 6.0),   // A
        node!(1, 3.0, 3.0),   // B
        node!(2, 6.0, 4.0),   // C
        node!(3, 7.0, 2.0),   // D
        node!(4, 10.0, 3.0),  // E
        node!(5, 13.0, 2.0),  // F
        node!(6, 15.0, 7.0),  // G
        node!(7, 12.0, 5.0),  // H
        node!(8, 11.0, 7.0),  // I
        node!(9, 9.0, 5.0),   // J
        node!(10, 7.0, 7.0),  // K
    ];

    let edges = [
        edge!(0, 1, 3.0),  // A <=> B
        edge!(0, 2, 5.0),  // A <=> C
        edge!(0, 10, 3.0), // A <=> K
        edge!(1, 3, 5.0),  // B <=> D
        edge!(1, 2, 3.0),  // B <=> C
        edge!(2, 3, 2.0),  // C <=> D
        edge!(2, 9, 2.0),  // C <=> J
        edge!(3, 9, 4.0),  // D <=> J
        edge!(3, 4, 7.0),  // D <=> E
        edge!(4, 9, 3.0),  // E <=> J
        edge!(4, 5, 6.0),  // E <=> F
        edge!(5, 7, 2.0),  // F <=> H
        edge!(5, 6, 4.0),  // F <=> G
        edge!(6, 7, 3.0),  // G <=> H
        edge!(6, 8, 5.0),  // G <=> I
        edge!(7, 8, 3.0),  // H <=> I
        edge!(7, 9, 2.0),  // H <=> J
        edge!(8, 9, 4.0),  // I <=> J
        edge!(8, 10, 6.0), // I <=> K
        edge!(9, 10, 3.0), // J <=> K
    ]
    .concat();

    build(nodes, edges)
}

pub fn generate_simple_graph() -> RoadGraph {
    //           B
    //           |
    // E -> A -> C
    //      |  /
    //      D
    let nodes = (0..5).map(|i| node!(i, 0.0, 0.0)).collect();

    let (a, b, c, d, e) = (0, 1, 2, 3, 4);
    let mut edges = vec![edge!(a => c, 1.0), edge!(a => d, 1.0), edge!(e => a, 1.0)];
    edges.extend(edge!(c, b, 1.0));
    edges.extend(edge!(c, d, 1.0));

    build(nodes, edges)
}

/// Directed diamond with straight geometries
///
/// ```text
///        C (1,1)
///      /   \
///  5  /     \ 1
///    /       \
///  A ---------B---------D
/// (0,0)   1  (1,0)  1  (2,0)
/// ```
pub fn generate_diamond_graph() -> RoadGraph {
    let (a, b, c, d) = (0, 1, 2, 3);
    let nodes = vec![
        node!(a, 0.0, 0.0),
        node!(b, 1.0, 0.0),
        node!(c, 1.0, 1.0),
        node!(d, 2.0, 0.0),
    ];
    let edges = vec![
        edge!(a => b, 1.0),
        edge!(a => c, 5.0),
        edge!(b => d, 1.0),
        edge!(c => d, 1.0),
    ];

    build(nodes, edges)
}

/// The first edge from node id `source` to node id `target`
pub fn diamond_edge(g: &RoadGraph, source: i64, target: i64) -> EdgeIndex {
    let s = g.index_of(source).expect("source exists");
    let t = g.index_of(target).expect("target exists");
    g.edges_between(s, t)
        .map(|(idx, _)| idx)
        .next()
        .expect("edge exists")
}

/// Square grid of `size * size` nodes `spacing` degrees apart, connected in
/// both directions to their right and upper neighbours. Node ids are
/// `row * size + col`. Lengths vary a little so that shortest paths are
/// mostly unique.
pub fn generate_grid_graph(size: usize, spacing: f64) -> RoadGraph {
    let id = |row: usize, col: usize| (row * size + col) as i64;

    let mut nodes = Vec::with_capacity(size * size);
    let mut edges = Vec::with_capacity(size * size * 4);
    for row in 0..size {
        for col in 0..size {
            nodes.push(node!(id(row, col), col as f64 * spacing, row as f64 * spacing));

            let length = 100.0 + ((row * 7 + col * 13) % 10) as f64;
            if col + 1 < size {
                edges.extend(edge!(id(row, col), id(row, col + 1), length));
            }
            if row + 1 < size {
                edges.extend(edge!(id(row, col), id(row + 1, col), length + 5.0));
            }
        }
    }

    build(nodes, edges)
}

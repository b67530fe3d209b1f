/// Edge weight type
pub type Weight = f64;
/// Opaque node identifier as found in the input data, e.g. an OpenStreetMap ID
/// (<https://wiki.openstreetmap.org/wiki/Node>)
pub type NodeId = i64;

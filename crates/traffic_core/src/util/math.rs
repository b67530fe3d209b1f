use geo::{Coord, Distance, Haversine, Point};

use crate::constants::Weight;

/// Great-circle distance between two coordinates in metres
pub fn straight_line(src: Coord<f64>, dst: Coord<f64>) -> Weight {
    Haversine.distance(Point::from(src), Point::from(dst))
}

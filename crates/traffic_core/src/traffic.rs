//! Point-sampled traffic observations and their spatial index.

use std::{fmt, io::Read, path::Path, str::FromStr};

use geo::{Coord, Rect};
use log::{info, warn};
use rstar::{primitives::GeomWithData, RTree, AABB};
use serde::Deserialize;

use crate::error::{LoadReport, RecordKind};
use crate::graph::csv_reader;

/// Observed traffic severity, ordered from `Low` to `High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
}

impl FromStr for CongestionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(CongestionLevel::Low),
            "medium" => Ok(CongestionLevel::Medium),
            "high" => Ok(CongestionLevel::High),
            _ => Err(format!("Unknown congestion level '{}'", s)),
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficObservation {
    /// `x` is the longitude, `y` the latitude
    pub coord: Coord<f64>,
    /// `None` if the input named a level we do not know
    pub level: Option<CongestionLevel>,
    /// Lower-cased road name. Only a display hint.
    pub road_name: Option<String>,
}

/// One row of traffic input, fields still unparsed. CSV headers are matched
/// after lower-casing and replacing blanks with underscores, so `Latitude`,
/// `Congestion Level` and `Road Name` work as well.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawObservation {
    #[serde(default, alias = "lat")]
    pub latitude: Option<String>,
    #[serde(default, alias = "lon")]
    pub longitude: Option<String>,
    #[serde(default, alias = "level")]
    pub congestion_level: Option<String>,
    #[serde(default)]
    pub road_name: Option<String>,
}

impl RawObservation {
    pub fn new(latitude: &str, longitude: &str, congestion_level: &str) -> Self {
        RawObservation {
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
            congestion_level: Some(congestion_level.to_string()),
            road_name: None,
        }
    }

    fn parse(self) -> Result<TrafficObservation, String> {
        let lat = parse_coordinate("latitude", self.latitude.as_deref())?;
        let lon = parse_coordinate("longitude", self.longitude.as_deref())?;

        let level = match self.congestion_level.as_deref() {
            Some(level) => match level.parse::<CongestionLevel>() {
                Ok(level) => Some(level),
                Err(e) => {
                    log::debug!("{}, treating as uncongested", e);
                    None
                }
            },
            None => None,
        };

        let road_name = self
            .road_name
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty());

        Ok(TrafficObservation {
            coord: Coord { x: lon, y: lat },
            level,
            road_name,
        })
    }
}

fn parse_coordinate(field: &str, value: Option<&str>) -> Result<f64, String> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing {}", field))?;
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("non-numeric {} '{}'", field, value))
}

/// Immutable set of observations with an R-tree over their locations
pub struct TrafficStore {
    observations: Vec<TrafficObservation>,
    tree: RTree<GeomWithData<[f64; 2], usize>>,
    report: LoadReport,
}

impl TrafficStore {
    /// Parses the records, dropping the ones without usable coordinates
    pub fn load(records: impl IntoIterator<Item = RawObservation>) -> Self {
        let mut report = LoadReport::default();
        let observations: Vec<TrafficObservation> = records
            .into_iter()
            .enumerate()
            .filter_map(|(position, record)| match record.parse() {
                Ok(observation) => Some(observation),
                Err(reason) => {
                    report.skip(RecordKind::Observation, position, reason);
                    None
                }
            })
            .collect();

        Self::from_parts(observations, report)
    }

    fn from_parts(observations: Vec<TrafficObservation>, report: LoadReport) -> Self {
        let tree = RTree::bulk_load(
            observations
                .iter()
                .enumerate()
                .map(|(i, obs)| GeomWithData::new([obs.coord.x, obs.coord.y], i))
                .collect(),
        );

        info!(
            "Loaded {} traffic observations, skipped {}",
            observations.len(),
            report.skipped.len()
        );

        TrafficStore {
            observations,
            tree,
            report,
        }
    }

    pub fn from_csv(path: &Path) -> anyhow::Result<Self> {
        Self::from_csv_reader(csv_reader(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        Self::from_csv_reader(
            csv::ReaderBuilder::new()
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(reader),
        )
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Self> {
        normalize_headers(&mut reader)?;

        // A row which cannot be deserialized at all is kept as an empty record
        // so that it gets reported at its position like any other bad row
        let records = reader.deserialize::<RawObservation>().map(|result| {
            result.unwrap_or_else(|e| {
                warn!("Unreadable traffic row: {}", e);
                RawObservation::default()
            })
        });

        Ok(Self::load(records))
    }

    pub fn observations(&self) -> &[TrafficObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Rows dropped while loading
    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    /// Observations located inside `rect` (borders included)
    pub fn candidates_in(&self, rect: Rect<f64>) -> impl Iterator<Item = &TrafficObservation> {
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(move |entry| &self.observations[entry.data])
    }
}

/// Lower-cases the header row and replaces blanks with underscores so that
/// `Congestion Level`, `congestion level` and `congestion_level` all match.
fn normalize_headers<R: Read>(reader: &mut csv::Reader<R>) -> csv::Result<()> {
    let headers: csv::StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase().replace(' ', "_"))
        .collect();
    reader.set_headers(headers);
    Ok(())
}

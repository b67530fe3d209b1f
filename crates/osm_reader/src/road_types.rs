use std::str::FromStr;

/// Which part of the road network gets loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkType {
    Walk,
    #[default]
    Drive,
}

impl NetworkType {
    /// Pedestrians may walk against one-way streets
    pub fn respects_oneway(&self) -> bool {
        matches!(self, NetworkType::Drive)
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "walk" | "walking" => Ok(NetworkType::Walk),
            "drive" | "driving" => Ok(NetworkType::Drive),
            _ => Err(format!(
                "Unknown travel mode '{}', expected 'walking' or 'driving'",
                s
            )),
        }
    }
}

// Only these road types are included in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadType {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    MotorwayLink,
    TrunkLink,
    PrimaryLink,
    SecondaryLink,
    Road,
    Unclassified,
    Residential,
    Unsurfaced,
    LivingStreet,
    Service,
    Pedestrian,
    Footway,
    Path,
    Steps,
    Track,
    Cycleway,
}

impl RoadType {
    /// Whether a way of this type belongs to the network of the given mode
    pub fn allowed_for(&self, network: NetworkType) -> bool {
        use RoadType::*;
        match network {
            NetworkType::Drive => !matches!(
                self,
                Pedestrian | Footway | Path | Steps | Track | Cycleway
            ),
            NetworkType::Walk => !matches!(self, Motorway | Trunk | MotorwayLink | TrunkLink),
        }
    }

    /// Motorways are one-way unless tagged otherwise
    pub fn implies_oneway(&self) -> bool {
        matches!(self, RoadType::Motorway | RoadType::MotorwayLink)
    }
}

impl FromStr for RoadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "motorway" => Ok(RoadType::Motorway),
            "trunk" => Ok(RoadType::Trunk),
            "primary" => Ok(RoadType::Primary),
            "secondary" => Ok(RoadType::Secondary),
            "tertiary" => Ok(RoadType::Tertiary),
            "motorway_link" => Ok(RoadType::MotorwayLink),
            "trunk_link" => Ok(RoadType::TrunkLink),
            "primary_link" => Ok(RoadType::PrimaryLink),
            "secondary_link" => Ok(RoadType::SecondaryLink),
            "road" => Ok(RoadType::Road),
            "unclassified" => Ok(RoadType::Unclassified),
            "residential" => Ok(RoadType::Residential),
            "unsurfaced" => Ok(RoadType::Unsurfaced),
            "living_street" => Ok(RoadType::LivingStreet),
            "service" => Ok(RoadType::Service),
            "pedestrian" => Ok(RoadType::Pedestrian),
            "footway" => Ok(RoadType::Footway),
            "path" => Ok(RoadType::Path),
            "steps" => Ok(RoadType::Steps),
            "track" => Ok(RoadType::Track),
            "cycleway" => Ok(RoadType::Cycleway),
            _ => Err(format!("Failed to parse road type '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_filters_road_types() {
        assert!(RoadType::Footway.allowed_for(NetworkType::Walk));
        assert!(!RoadType::Footway.allowed_for(NetworkType::Drive));
        assert!(!RoadType::Motorway.allowed_for(NetworkType::Walk));
        assert!(RoadType::Residential.allowed_for(NetworkType::Walk));
        assert!(RoadType::Residential.allowed_for(NetworkType::Drive));
    }

    #[test]
    fn parse_mode() {
        assert_eq!(" Walking ".parse(), Ok(NetworkType::Walk));
        assert_eq!("drive".parse(), Ok(NetworkType::Drive));
        assert!("flying".parse::<NetworkType>().is_err());
    }
}

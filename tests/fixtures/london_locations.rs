//! Real London-area locations for realistic test fixtures.
//!
//! Coordinates are postcode centroids, good to about 100 m.

#![allow(dead_code)]

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lon: f64) -> Self {
        Self { name, lat, lon }
    }

    pub fn point(&self) -> fieldteam_finder::geometry::GeoPoint {
        fieldteam_finder::geometry::GeoPoint::new(self.lat, self.lon)
    }
}

/// Charing Cross, the conventional centre of London.
pub const CHARING_CROSS: Location = Location::new("Charing Cross", 51.5074, -0.1278);

// ============================================================================
// Depots within a few kilometres of the centre
// ============================================================================

pub const CENTRAL_DEPOTS: &[Location] = &[
    Location::new("Vauxhall", 51.4861, -0.1230),
    Location::new("Kings Cross", 51.5308, -0.1238),
    Location::new("Bermondsey", 51.4980, -0.0640),
    Location::new("Paddington", 51.5154, -0.1755),
];

// ============================================================================
// Outer depots, beyond a 15 minute drive
// ============================================================================

pub const OUTER_DEPOTS: &[Location] = &[
    Location::new("Croydon", 51.3762, -0.0982),
    Location::new("Watford", 51.6565, -0.3903),
    Location::new("Romford", 51.5750, 0.1820),
    Location::new("Reading", 51.4543, -0.9781),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_in_south_east() {
        for loc in CENTRAL_DEPOTS.iter().chain(OUTER_DEPOTS) {
            assert!(loc.lat > 51.2 && loc.lat < 51.8, "{} lat out of range: {}", loc.name, loc.lat);
            assert!(loc.lon > -1.2 && loc.lon < 0.4, "{} lon out of range: {}", loc.name, loc.lon);
        }
    }
}

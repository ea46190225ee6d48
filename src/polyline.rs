//! Polyline representation for route geometries.
//!
//! Routing services return geometries as GeoJSON `[lon, lat]` pairs. They are
//! decoded once at the boundary into [`GeoPoint`]s so callers never deal with
//! axis order.

use serde::{Deserialize, Serialize};

use crate::geometry::GeoPoint;
use crate::haversine::haversine_km;

/// A route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<GeoPoint>,
}

impl Polyline {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    /// Builds a polyline from GeoJSON LineString coordinates.
    ///
    /// Positions with fewer than two components are dropped.
    pub fn from_lon_lat(coordinates: &[Vec<f64>]) -> Self {
        let points = coordinates
            .iter()
            .filter_map(|pos| match pos.as_slice() {
                [lon, lat, ..] => Some(GeoPoint::new(*lat, *lon)),
                _ => None,
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }

    /// Great-circle length of the path in kilometres.
    pub fn length_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum()
    }
}

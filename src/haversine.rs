//! Great-circle distance and an offline route estimator.
//!
//! Air distance is the cheap proxy used before any routing call. The same
//! formula backs [`HaversineRouter`], which estimates travel time from
//! straight-line distance and an assumed speed. Less accurate than a real
//! router (ignores roads) but always available.

use crate::error::RoutingError;
use crate::geometry::GeoPoint;
use crate::traits::{Route, RouteProvider};

/// Mean earth radius in kilometres (IUGG).
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Haversine distance between two points in kilometres.
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Route estimator based on straight-line distance.
#[derive(Debug, Clone)]
pub struct HaversineRouter {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
    /// Multiplier applied to air distance to approximate road distance.
    pub detour_factor: f64,
}

impl Default for HaversineRouter {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            detour_factor: 1.0,
        }
    }
}

impl HaversineRouter {
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_kmh,
            ..Self::default()
        }
    }

    pub fn with_detour_factor(mut self, factor: f64) -> Self {
        self.detour_factor = factor;
        self
    }

    fn km_to_minutes(&self, km: f64) -> f64 {
        km / self.speed_kmh * 60.0
    }
}

impl RouteProvider for HaversineRouter {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        if !origin.is_valid() || !destination.is_valid() {
            return Err(RoutingError::InvalidRequest {
                status: 0,
                message: "coordinate out of range".to_string(),
            });
        }
        let distance_km = haversine_km(origin, destination) * self.detour_factor;
        Ok(Route {
            duration_min: self.km_to_minutes(distance_km),
            distance_km,
            geometry: None,
        })
    }
}

//! OSRM HTTP adapter for single driving routes.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigurationError, RoutingError};
use crate::geometry::GeoPoint;
use crate::http::{HttpSettings, build_client};
use crate::polyline::Polyline;
use crate::traits::{Route, RouteProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    /// Per-request timeout; every routing call is bounded by it.
    pub timeout_secs: u64,
    /// Request the full route geometry alongside duration and distance.
    pub include_geometry: bool,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
            include_geometry: true,
        }
    }
}

impl OsrmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig, http: &HttpSettings) -> Result<Self, ConfigurationError> {
        let client = build_client(http, config.timeout())?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn route_url(&self, origin: GeoPoint, destination: GeoPoint) -> String {
        format!(
            "{}/route/v1/{}/{};{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            origin.to_lon_lat_string(),
            destination.to_lon_lat_string()
        )
    }
}

impl RouteProvider for OsrmClient {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        let overview = if self.config.include_geometry { "full" } else { "false" };
        let response = self
            .client
            .get(self.route_url(origin, destination))
            .query(&[
                ("overview", overview),
                ("alternatives", "false"),
                ("steps", "false"),
                ("geometries", "geojson"),
            ])
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        debug!(status, bytes = body.len(), "osrm route response");
        parse_route_response(status, &body)
    }
}

/// Interprets an OSRM `route/v1` response.
pub fn parse_route_response(status: u16, body: &str) -> Result<Route, RoutingError> {
    let parsed = serde_json::from_str::<OsrmRouteResponse>(body);

    if !(200..300).contains(&status) {
        // OSRM reports unroutable pairs as 400 with a code.
        if let Ok(OsrmRouteResponse { code, message, .. }) = &parsed {
            if matches!(code.as_str(), "NoRoute" | "NoSegment") {
                return Err(RoutingError::NoRoute(message.clone().unwrap_or_else(|| code.clone())));
            }
        }
        let message = parsed
            .ok()
            .and_then(|r| r.message)
            .unwrap_or_else(|| body.chars().take(200).collect());
        return Err(RoutingError::from_status(status, message));
    }

    let response = parsed.map_err(|e| RoutingError::InvalidResponse(e.to_string()))?;
    if response.code != "Ok" {
        return Err(RoutingError::NoRoute(response.message.unwrap_or(response.code)));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::NoRoute("response contained no routes".to_string()))?;

    Ok(Route {
        duration_min: route.duration / 60.0,
        distance_km: route.distance / 1000.0,
        geometry: route.geometry.map(|g| Polyline::from_lon_lat(&g.coordinates)),
    })
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    #[serde(default)]
    geometry: Option<OsrmGeometry>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Vec<f64>>,
}

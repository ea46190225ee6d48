//! Mapbox Isochrone API adapter.
//!
//! One request returns every contour for a site, so a single call per site
//! is enough to serve any band selection afterwards.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigurationError, IsochroneError};
use crate::geometry::GeoPoint;
use crate::http::{HttpSettings, build_client};
use crate::isochrone::{DEFAULT_CONTOUR_MINUTES, IsochroneSet};
use crate::traits::IsochroneProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapboxConfig {
    pub base_url: String,
    pub profile: String,
    pub access_token: Option<String>,
    pub contour_minutes: Vec<u32>,
    pub timeout_secs: u64,
}

impl Default for MapboxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mapbox.com/isochrone/v1/mapbox".to_string(),
            profile: "driving-traffic".to_string(),
            access_token: None,
            contour_minutes: DEFAULT_CONTOUR_MINUTES.to_vec(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapboxClient {
    config: MapboxConfig,
    client: reqwest::blocking::Client,
}

impl MapboxClient {
    pub fn new(config: MapboxConfig, http: &HttpSettings) -> Result<Self, ConfigurationError> {
        let client = build_client(http, Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, client })
    }

    /// Fetches the configured contours around `site`.
    pub fn fetch(&self, site: GeoPoint) -> Result<IsochroneSet, IsochroneError> {
        self.isochrones(site, &self.config.contour_minutes)
    }
}

impl IsochroneProvider for MapboxClient {
    fn isochrones(&self, site: GeoPoint, minutes: &[u32]) -> Result<IsochroneSet, IsochroneError> {
        let token = self
            .config
            .access_token
            .as_deref()
            .ok_or_else(|| IsochroneError::NotConfigured("Mapbox access token".to_string()))?;
        if minutes.is_empty() {
            return Err(IsochroneError::NotConfigured("contour minutes".to_string()));
        }

        let contours = minutes
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            site.to_lon_lat_string()
        );

        let response = self
            .client
            .get(url)
            .query(&[
                ("contours_minutes", contours.as_str()),
                ("polygons", "true"),
                ("access_token", token),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(IsochroneError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json()?;
        let set = IsochroneSet::from_geojson(&body)?;
        debug!(thresholds = ?set.thresholds(), "fetched isochrones");
        Ok(set)
    }
}

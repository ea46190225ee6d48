//! postcodes.io geocoding adapter.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::{ConfigurationError, GeocodeError};
use crate::geometry::GeoPoint;
use crate::http::{HttpSettings, build_client};
use crate::traits::Geocoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostcodesConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PostcodesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.postcodes.io".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostcodesClient {
    base_url: Url,
    client: reqwest::blocking::Client,
}

impl PostcodesClient {
    pub fn new(config: PostcodesConfig, http: &HttpSettings) -> Result<Self, ConfigurationError> {
        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ConfigurationError::InvalidSetting {
                key: "POSTCODES_BASE".to_string(),
                reason: format!("{:?} is not a usable base URL", config.base_url),
            })?;
        let client = build_client(http, Duration::from_secs(config.timeout_secs))?;
        Ok(Self { base_url, client })
    }

    /// `{base}/postcodes/{postcode}`, with the postcode as one encoded path segment.
    fn lookup_url(&self, postcode: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("postcodes").push(postcode);
        }
        url
    }
}

/// Trims and upper-cases a postcode for display and comparison.
pub fn normalize_postcode(postcode: &str) -> String {
    postcode.trim().to_uppercase()
}

impl Geocoder for PostcodesClient {
    fn geocode(&self, postcode: &str) -> Result<GeoPoint, GeocodeError> {
        let postcode = normalize_postcode(postcode);
        if postcode.is_empty() {
            return Err(GeocodeError::NotFound("Postcode is empty".to_string()));
        }

        let url = self.lookup_url(&postcode.replace(' ', ""));
        let response = self.client.get(url).send()?;
        let status = response.status().as_u16();

        if status == 404 {
            let message = response
                .json::<PostcodesError>()
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("Postcode not found: {postcode}"));
            return Err(GeocodeError::NotFound(message));
        }
        if !(200..300).contains(&status) {
            return Err(GeocodeError::Status { status });
        }

        let body: PostcodesResponse = response
            .json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;
        let result = body
            .result
            .ok_or_else(|| GeocodeError::InvalidResponse("missing result".to_string()))?;
        match (result.latitude, result.longitude) {
            (Some(lat), Some(lon)) => Ok(GeoPoint::new(lat, lon)),
            // Some non-geographic postcodes resolve without coordinates.
            _ => Err(GeocodeError::NotFound(format!("Postcode has no location: {postcode}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostcodesResponse {
    result: Option<PostcodeResult>,
}

#[derive(Debug, Deserialize)]
struct PostcodeResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PostcodesError {
    error: Option<String>,
}

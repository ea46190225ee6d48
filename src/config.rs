//! Configuration for a finder session.
//!
//! Everything the core needs from its environment is gathered into one
//! [`FinderConfig`] when the session is built. Nothing reads the environment
//! after that.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::emissions::DEFAULT_CO2_KG_PER_KM;
use crate::error::ConfigurationError;
use crate::http::HttpSettings;
use crate::mapbox::MapboxConfig;
use crate::osrm::OsrmConfig;
use crate::postcodes::PostcodesConfig;
use crate::ranker::RetryPolicy;

/// Default number of candidates routed per query.
const DEFAULT_PRESELECT_LIMIT: usize = 20;

/// Default number of concurrent routing requests.
const DEFAULT_WORKER_POOL_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct FinderConfig {
    pub osrm: OsrmConfig,
    pub mapbox: MapboxConfig,
    pub postcodes: PostcodesConfig,
    pub http: HttpSettings,

    /// kg CO₂e per driven km.
    pub co2_kg_per_km: f64,

    /// Candidates kept after air-distance preselection.
    pub preselect_limit: usize,

    /// Routing requests in flight at once.
    pub worker_pool_size: usize,

    pub retry: RetryPolicy,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            osrm: OsrmConfig::default(),
            mapbox: MapboxConfig::default(),
            postcodes: PostcodesConfig::default(),
            http: HttpSettings::default(),
            co2_kg_per_km: DEFAULT_CO2_KG_PER_KM,
            preselect_limit: DEFAULT_PRESELECT_LIMIT,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

impl FinderConfig {
    pub fn with_routing_base_url(mut self, url: impl Into<String>) -> Self {
        self.osrm.base_url = url.into();
        self
    }

    pub fn with_co2_factor(mut self, kg_per_km: f64) -> Self {
        self.co2_kg_per_km = kg_per_km;
        self
    }

    pub fn with_preselect_limit(mut self, limit: usize) -> Self {
        self.preselect_limit = limit;
        self
    }

    pub fn with_worker_pool_size(mut self, workers: usize) -> Self {
        self.worker_pool_size = workers;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-request routing timeout.
    pub fn request_timeout(&self) -> Duration {
        self.osrm.timeout()
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.worker_pool_size == 0 {
            return Err(invalid("ROUTING_WORKERS", "must be at least 1"));
        }
        if self.preselect_limit == 0 {
            return Err(invalid("PRESELECT_LIMIT", "must be at least 1"));
        }
        if self.osrm.timeout_secs == 0 {
            return Err(invalid("ROUTING_TIMEOUT_SECS", "must be at least 1"));
        }
        if !self.co2_kg_per_km.is_finite() || self.co2_kg_per_km < 0.0 {
            return Err(invalid("CO2_PER_KM_KG", "must be a non-negative number"));
        }
        Ok(())
    }

    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from `lookup`, starting from the defaults.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get("OSRM_BASE") {
            config.osrm.base_url = url;
        }
        if let Some(profile) = get("OSRM_PROFILE") {
            config.osrm.profile = profile;
        }
        if let Some(secs) = parse(&get, "ROUTING_TIMEOUT_SECS")? {
            config.osrm.timeout_secs = secs;
        }
        if let Some(retries) = parse(&get, "ROUTING_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(workers) = parse(&get, "ROUTING_WORKERS")? {
            config.worker_pool_size = workers;
        }
        if let Some(limit) = parse(&get, "PRESELECT_LIMIT")? {
            config.preselect_limit = limit;
        }
        if let Some(factor) = parse(&get, "CO2_PER_KM_KG")? {
            config.co2_kg_per_km = factor;
        }

        config.mapbox.access_token = get("MAPBOX_TOKEN");
        if let Some(url) = get("MAPBOX_BASE") {
            config.mapbox.base_url = url;
        }
        if let Some(url) = get("POSTCODES_BASE") {
            config.postcodes.base_url = url;
        }

        config.http.proxy = ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"]
            .iter()
            .find_map(|key| get(*key));
        config.http.ca_bundle = get("CA_BUNDLE").map(PathBuf::from);
        if let Some(flag) = get("TLS_VERIFY") {
            config.http.verify_tls = parse_flag("TLS_VERIFY", &flag)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigurationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| raw.parse::<T>().map_err(|e| invalid(key, format!("{raw:?}: {e}"))))
        .transpose()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigurationError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(invalid(key, format!("{raw:?} is not a boolean"))),
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        key: key.to_string(),
        reason: reason.into(),
    }
}

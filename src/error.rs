//! Error types for the selection core and its collaborators.
//!
//! Query-level failures surface as [`PipelineError`]. Everything else is
//! absorbed by the component that detects it: malformed candidate rows are
//! skipped at load time, and routing failures become unrouted entries.

use crate::candidate::CandidateId;

/// Problems with the inputs a query is configured with.
///
/// These are fatal to the query that hits them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// No isochrone polygon was supplied for the requested threshold.
    #[error("no isochrone band for {minutes} minutes")]
    MissingBand { minutes: u32 },

    /// The polygon supplied for a band cannot be used for containment tests.
    #[error("isochrone band for {minutes} minutes is malformed: {reason}")]
    MalformedBand { minutes: u32, reason: String },

    /// A configuration value is out of range or could not be parsed.
    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The routing worker pool could not be started.
    #[error("failed to start routing workers: {0}")]
    WorkerPool(String),
}

/// A candidate row that failed validation at the load boundary.
///
/// The row is skipped; the rest of the pool is unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterInputError {
    #[error("candidate {id}: only one of latitude/longitude is present")]
    PartialCoordinate { id: CandidateId },

    #[error("candidate {id}: coordinate ({lat}, {lon}) is out of range")]
    InvalidCoordinate { id: CandidateId, lat: f64, lon: f64 },

    #[error("candidate {id}: unknown contractor flag {flag:?}")]
    UnknownCategory { id: CandidateId, flag: Option<i64> },

    #[error("candidate {id}: duplicate identifier")]
    DuplicateId { id: CandidateId },
}

/// Failure of a single routing request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    #[error("routing request timed out")]
    Timeout,

    #[error("could not reach routing service: {0}")]
    Connection(String),

    #[error("routing service error {status}")]
    ServerError { status: u16 },

    #[error("rate limited by routing service")]
    RateLimited,

    #[error("routing service returned 404: {0}")]
    NotFound(String),

    #[error("no route found: {0}")]
    NoRoute(String),

    #[error("routing request rejected ({status}): {message}")]
    InvalidRequest { status: u16, message: String },

    #[error("unreadable routing response: {0}")]
    InvalidResponse(String),
}

impl RoutingError {
    /// Whether another attempt may succeed.
    ///
    /// Timeouts, connection failures, 5xx and 429 are transient; everything
    /// else describes the request itself and is not retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RoutingError::Timeout
                | RoutingError::Connection(_)
                | RoutingError::ServerError { .. }
                | RoutingError::RateLimited
        )
    }

    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => RoutingError::NotFound(message),
            429 => RoutingError::RateLimited,
            500..=599 => RoutingError::ServerError { status },
            _ => RoutingError::InvalidRequest { status, message },
        }
    }
}

impl From<reqwest::Error> for RoutingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RoutingError::Timeout
        } else if let Some(status) = err.status() {
            RoutingError::from_status(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            RoutingError::InvalidResponse(err.to_string())
        } else {
            RoutingError::Connection(err.to_string())
        }
    }
}

/// Failure to turn a postcode into a coordinate.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("{0}")]
    NotFound(String),

    #[error("geocoding service error {status}")]
    Status { status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unreadable geocoding response: {0}")]
    InvalidResponse(String),
}

/// Failure to obtain or decode isochrone polygons.
#[derive(Debug, thiserror::Error)]
pub enum IsochroneError {
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("isochrone service error {status}")]
    Status { status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid isochrone GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// The single query-level failure a caller of the pipeline can see.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Nothing survived the filter for the selected band.
    #[error("no field teams match the filters within {band_minutes} minutes")]
    NoCandidates { band_minutes: u32 },

    /// A newer query superseded this one.
    #[error("query superseded by a newer query")]
    Cancelled,
}

impl PipelineError {
    /// Superseded queries are not failures from the user's point of view.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

//! Contracts for the external collaborators the core consumes.
//!
//! These are intentionally minimal. Network-backed implementations live in
//! [`crate::osrm`], [`crate::mapbox`] and [`crate::postcodes`]; tests plug in
//! scripted ones.

use crate::candidate::CandidatePool;
use crate::error::{GeocodeError, IsochroneError, RoutingError};
use crate::geometry::GeoPoint;
use crate::isochrone::IsochroneSet;
use crate::polyline::Polyline;

/// A resolved driving route between two points.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub duration_min: f64,
    pub distance_km: f64,
    pub geometry: Option<Polyline>,
}

/// Computes a single driving route.
///
/// Called concurrently from the routing workers. Implementations must bound
/// every call with a finite timeout and report it as [`RoutingError::Timeout`].
pub trait RouteProvider: Send + Sync {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError>;
}

impl<T: RouteProvider + ?Sized> RouteProvider for &T {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        (**self).route(origin, destination)
    }
}

impl<T: RouteProvider + ?Sized> RouteProvider for std::sync::Arc<T> {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        (**self).route(origin, destination)
    }
}

/// Supplies isochrone polygons around a site for a set of thresholds.
pub trait IsochroneProvider {
    fn isochrones(&self, site: GeoPoint, minutes: &[u32]) -> Result<IsochroneSet, IsochroneError>;
}

/// Resolves a postcode to a coordinate.
pub trait Geocoder {
    fn geocode(&self, postcode: &str) -> Result<GeoPoint, GeocodeError>;
}

/// Loads the candidate pool for a session.
///
/// Exclusion of disabled, test or inactive teams is the loader's job.
pub trait CandidateSource {
    type Error;

    fn load_candidates(&self) -> Result<CandidatePool, Self::Error>;
}

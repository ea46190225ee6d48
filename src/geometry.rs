//! Coordinate frames and reprojection.
//!
//! Geographic coordinates (WGS84 degrees) are what the external services
//! speak and what haversine distances use. Containment tests run in the
//! spherical Web Mercator frame (EPSG:3857), in metres.

use std::f64::consts::FRAC_PI_4;

use geo::Coord;
use serde::{Deserialize, Serialize};

/// Semi-major axis used by EPSG:3857.
const MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// Latitude beyond which Web Mercator diverges; inputs are clamped to it.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// The frame a set of coordinates is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Longitude/latitude in degrees (EPSG:4326).
    Geographic,
    /// Spherical Web Mercator metres (EPSG:3857).
    WebMercator,
}

/// A point in the geographic frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite and within WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn project(&self) -> ProjectedPoint {
        let lat = self.lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
        let x = MERCATOR_RADIUS_M * self.lon.to_radians();
        let y = MERCATOR_RADIUS_M * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
        ProjectedPoint { x, y }
    }

    /// `lon,lat` with six decimals, the order routing URLs expect.
    pub fn to_lon_lat_string(&self) -> String {
        format!("{:.6},{:.6}", self.lon, self.lat)
    }
}

/// A point in the Web Mercator frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    pub fn unproject(&self) -> GeoPoint {
        let lon = (self.x / MERCATOR_RADIUS_M).to_degrees();
        let lat = (2.0 * (self.y / MERCATOR_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
        GeoPoint { lat, lon }
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}

/// Moves a single `geo` coordinate from `from` into the projected frame.
///
/// Geographic coordinates follow the GeoJSON convention of `x = lon, y = lat`.
pub fn coord_to_projected(coord: Coord<f64>, from: Frame) -> Coord<f64> {
    match from {
        Frame::WebMercator => coord,
        Frame::Geographic => GeoPoint::new(coord.y, coord.x).project().coord(),
    }
}

//! Isochrone bands and their containment tests.
//!
//! Bands are always stored in the projected frame, whatever frame they were
//! supplied in, so every containment test runs against Web Mercator
//! coordinates.

use std::collections::BTreeMap;

use geo::coordinate_position::CoordPos;
use geo::{Coord, CoordinatePosition, LineString, MapCoords, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConfigurationError, IsochroneError};
use crate::geometry::{Frame, ProjectedPoint, coord_to_projected};

/// Travel time thresholds the isochrone service is asked for by default.
pub const DEFAULT_CONTOUR_MINUTES: [u32; 4] = [15, 30, 45, 60];

/// The area reachable within `minutes` of a site.
#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneBand {
    minutes: u32,
    area: MultiPolygon<f64>,
}

impl IsochroneBand {
    /// Validates `area` and moves it into the projected frame.
    pub fn new(minutes: u32, area: MultiPolygon<f64>, frame: Frame) -> Result<Self, ConfigurationError> {
        let malformed = |reason: &str| ConfigurationError::MalformedBand {
            minutes,
            reason: reason.to_string(),
        };

        if area.0.is_empty() {
            return Err(malformed("no polygons"));
        }
        for polygon in &area.0 {
            if polygon.exterior().0.len() < 4 {
                return Err(malformed("exterior ring has fewer than three distinct points"));
            }
            let all_finite = std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .flat_map(|ring| ring.coords())
                .all(|c| c.x.is_finite() && c.y.is_finite());
            if !all_finite {
                return Err(malformed("non-finite coordinate"));
            }
        }

        let area = area.map_coords(|c| coord_to_projected(c, frame));
        Ok(Self { minutes, area })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// The band's area in Web Mercator metres.
    pub fn area(&self) -> &MultiPolygon<f64> {
        &self.area
    }

    /// Closed containment: points on the boundary count as inside.
    pub fn contains(&self, point: ProjectedPoint) -> bool {
        let coord = point.coord();
        self.area
            .0
            .iter()
            .any(|polygon| polygon.coordinate_position(&coord) != CoordPos::Outside)
    }

    fn absorb(&mut self, other: IsochroneBand) {
        self.area.0.extend(other.area.0);
    }
}

/// All bands fetched for one site, keyed by threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsochroneSet {
    bands: BTreeMap<u32, IsochroneBand>,
}

impl IsochroneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a band; polygons for an existing threshold are merged into it.
    pub fn insert(&mut self, band: IsochroneBand) {
        match self.bands.get_mut(&band.minutes) {
            Some(existing) => existing.absorb(band),
            None => {
                self.bands.insert(band.minutes, band);
            }
        }
    }

    pub fn with_band(mut self, band: IsochroneBand) -> Self {
        self.insert(band);
        self
    }

    pub fn band(&self, minutes: u32) -> Result<&IsochroneBand, ConfigurationError> {
        self.bands
            .get(&minutes)
            .ok_or(ConfigurationError::MissingBand { minutes })
    }

    /// Thresholds in ascending order.
    pub fn thresholds(&self) -> Vec<u32> {
        self.bands.keys().copied().collect()
    }

    /// The largest threshold, used as the default selection.
    pub fn widest(&self) -> Option<&IsochroneBand> {
        self.bands.values().next_back()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Parses a GeoJSON FeatureCollection in the geographic frame.
    ///
    /// Each feature carries its threshold in a `contour` property (number or
    /// numeric string) and a Polygon or MultiPolygon geometry.
    pub fn from_geojson(value: &Value) -> Result<Self, IsochroneError> {
        let collection = FeatureCollection::deserialize(value)
            .map_err(|e| IsochroneError::InvalidGeoJson(e.to_string()))?;

        let mut set = IsochroneSet::new();
        for feature in collection.features {
            let minutes = contour_minutes(&feature.properties)?;
            let area = match feature.geometry {
                GeoJsonGeometry::Polygon { coordinates } => {
                    MultiPolygon::new(vec![polygon_from_rings(&coordinates)?])
                }
                GeoJsonGeometry::MultiPolygon { coordinates } => MultiPolygon::new(
                    coordinates
                        .iter()
                        .map(|rings| polygon_from_rings(rings))
                        .collect::<Result<_, _>>()?,
                ),
            };
            set.insert(IsochroneBand::new(minutes, area, Frame::Geographic)?);
        }
        Ok(set)
    }

    pub fn from_geojson_str(text: &str) -> Result<Self, IsochroneError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| IsochroneError::InvalidGeoJson(e.to_string()))?;
        Self::from_geojson(&value)
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
    geometry: GeoJsonGeometry,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

fn contour_minutes(properties: &serde_json::Map<String, Value>) -> Result<u32, IsochroneError> {
    let parsed = match properties.get("contour") {
        Some(Value::Number(n)) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| IsochroneError::InvalidGeoJson("feature without a usable contour".into()))
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, IsochroneError> {
    let mut rings = rings.iter().map(|ring| ring_from_positions(ring));
    let exterior = rings
        .next()
        .ok_or_else(|| IsochroneError::InvalidGeoJson("polygon without rings".into()))??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_from_positions(positions: &[Vec<f64>]) -> Result<LineString<f64>, IsochroneError> {
    positions
        .iter()
        .map(|pos| match pos.as_slice() {
            [lon, lat, ..] => Ok(Coord { x: *lon, y: *lat }),
            _ => Err(IsochroneError::InvalidGeoJson("position with fewer than two values".into())),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;
    use crate::geometry::GeoPoint;

    fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: min_lon, y: min_lat),
            (x: max_lon, y: min_lat),
            (x: max_lon, y: max_lat),
            (x: min_lon, y: max_lat),
            (x: min_lon, y: min_lat),
        ]])
    }

    #[test]
    fn test_contains_interior_and_boundary() {
        let band = IsochroneBand::new(15, square(-0.2, 51.4, 0.0, 51.6), Frame::Geographic).unwrap();
        assert!(band.contains(GeoPoint::new(51.5, -0.1).project()));
        // On the southern edge.
        assert!(band.contains(GeoPoint::new(51.4, -0.1).project()));
        // On a vertex.
        assert!(band.contains(GeoPoint::new(51.6, 0.0).project()));
        assert!(!band.contains(GeoPoint::new(51.7, -0.1).project()));
    }

    #[test]
    fn test_projected_input_is_kept() {
        let a = GeoPoint::new(51.4, -0.2).project();
        let b = GeoPoint::new(51.6, 0.0).project();
        let area = square(a.x, a.y, b.x, b.y);
        let band = IsochroneBand::new(30, area.clone(), Frame::WebMercator).unwrap();
        assert_eq!(band.area(), &area);
        assert!(band.contains(GeoPoint::new(51.5, -0.1).project()));
    }

    #[test]
    fn test_hole_excluded() {
        let outer = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)]);
        let area = MultiPolygon::new(vec![Polygon::new(outer, vec![hole])]);
        let band = IsochroneBand::new(60, area, Frame::Geographic).unwrap();
        assert!(band.contains(GeoPoint::new(2.0, 2.0).project()));
        assert!(!band.contains(GeoPoint::new(5.0, 5.0).project()));
    }

    #[test]
    fn test_malformed_band_rejected() {
        let empty = IsochroneBand::new(15, MultiPolygon::new(vec![]), Frame::Geographic);
        assert!(matches!(empty, Err(ConfigurationError::MalformedBand { minutes: 15, .. })));

        let degenerate = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
            vec![],
        )]);
        assert!(IsochroneBand::new(15, degenerate, Frame::Geographic).is_err());

        let nan = square(0.0, 0.0, f64::NAN, 1.0);
        assert!(IsochroneBand::new(15, nan, Frame::Geographic).is_err());
    }

    #[test]
    fn test_missing_band() {
        let set = IsochroneSet::new();
        assert_eq!(
            set.band(45).unwrap_err(),
            ConfigurationError::MissingBand { minutes: 45 }
        );
    }

    #[test]
    fn test_merge_same_threshold() {
        let set = IsochroneSet::new()
            .with_band(IsochroneBand::new(15, square(0.0, 0.0, 1.0, 1.0), Frame::Geographic).unwrap())
            .with_band(IsochroneBand::new(15, square(5.0, 5.0, 6.0, 6.0), Frame::Geographic).unwrap());
        let band = set.band(15).unwrap();
        assert_eq!(band.area().0.len(), 2);
        assert!(band.contains(GeoPoint::new(0.5, 0.5).project()));
        assert!(band.contains(GeoPoint::new(5.5, 5.5).project()));
    }

    #[test]
    fn test_from_geojson() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"contour": 60},
                 "geometry": {"type": "Polygon",
                   "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
                {"type": "Feature", "properties": {"contour": "15"},
                 "geometry": {"type": "MultiPolygon",
                   "coordinates": [[[[0,0],[1,0],[1,1],[0,1],[0,0]]]]}}
            ]
        }"#;
        let set = IsochroneSet::from_geojson_str(text).unwrap();
        assert_eq!(set.thresholds(), vec![15, 60]);
        assert_eq!(set.widest().map(|b| b.minutes()), Some(60));
        assert!(set.band(60).unwrap().contains(GeoPoint::new(1.5, 1.5).project()));
        assert!(!set.band(15).unwrap().contains(GeoPoint::new(1.5, 1.5).project()));
    }

    #[test]
    fn test_from_geojson_without_features() {
        let set = IsochroneSet::from_geojson_str(r#"{"type": "FeatureCollection"}"#).unwrap();
        assert!(set.is_empty());
        assert!(set.widest().is_none());
    }

    #[test]
    fn test_from_geojson_rejects_bad_contour() {
        let text = r#"{"features": [{"properties": {"contour": "soon"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}]}"#;
        assert!(matches!(
            IsochroneSet::from_geojson_str(text),
            Err(IsochroneError::InvalidGeoJson(_))
        ));
    }

    #[test]
    fn test_from_geojson_rejects_line_geometry() {
        let text = r#"{"features": [{"properties": {"contour": 15},
            "geometry": {"type": "LineString", "coordinates": [[0,0],[1,0]]}}]}"#;
        assert!(IsochroneSet::from_geojson_str(text).is_err());
    }
}

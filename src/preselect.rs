//! Air-distance preselection.
//!
//! Routing calls are slow and rate limited, so only the `limit` candidates
//! nearest the site as the crow flies are routed. Straight-line distance
//! tracks driving time closely enough over short to medium ranges that the
//! true nearest team is almost always among them; this is a tuning knob, not
//! a guarantee.

use tracing::debug;

use crate::candidate::Candidate;
use crate::geometry::GeoPoint;
use crate::haversine::haversine_km;

/// A candidate paired with its air distance to the site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preselected<'a> {
    pub candidate: &'a Candidate,
    pub air_km: f64,
}

/// Orders candidates by air distance to `site` and keeps the nearest `limit`.
///
/// The sort is stable, so equidistant candidates keep their input order.
/// Candidates without a location are dropped.
pub fn preselect<'a>(
    candidates: &[&'a Candidate],
    site: GeoPoint,
    limit: usize,
) -> Vec<Preselected<'a>> {
    let mut ranked: Vec<Preselected<'a>> = candidates
        .iter()
        .filter_map(|&candidate| {
            candidate.location.map(|point| Preselected {
                candidate,
                air_km: haversine_km(site, point),
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.air_km.total_cmp(&b.air_km));
    ranked.truncate(limit);

    debug!(
        considered = candidates.len(),
        kept = ranked.len(),
        limit,
        "preselected by air distance"
    );
    ranked
}

//! Exact driving-time ranking of preselected candidates.
//!
//! One routing request is issued per candidate on a fixed-size worker pool.
//! A candidate whose request ultimately fails stays in the output with empty
//! route fields, so callers can tell "could not be routed" apart from
//! "filtered out".

use std::cmp::Ordering;
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::candidate::Candidate;
use crate::config::FinderConfig;
use crate::emissions::estimate_co2_kg;
use crate::error::{ConfigurationError, PipelineError, RoutingError};
use crate::geometry::GeoPoint;
use crate::pipeline::CancelToken;
use crate::polyline::Polyline;
use crate::preselect::Preselected;
use crate::traits::{Route, RouteProvider};

/// Retry budget for transient routing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (zero-based), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// A candidate with its air distance and, when routing succeeded, its route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedCandidate {
    pub candidate: Candidate,
    pub air_km: f64,
    pub duration_min: Option<f64>,
    pub distance_km: Option<f64>,
    pub co2_kg: Option<f64>,
    pub geometry: Option<Polyline>,
    /// Why routing failed, for unrouted entries.
    #[serde(skip)]
    pub failure: Option<RoutingError>,
}

impl RoutedCandidate {
    fn routed(entry: &Preselected<'_>, route: Route, co2_kg_per_km: f64) -> Self {
        Self {
            candidate: entry.candidate.clone(),
            air_km: entry.air_km,
            duration_min: Some(route.duration_min),
            distance_km: Some(route.distance_km),
            co2_kg: Some(estimate_co2_kg(route.distance_km, co2_kg_per_km)),
            geometry: route.geometry,
            failure: None,
        }
    }

    fn unrouted(entry: &Preselected<'_>, failure: RoutingError) -> Self {
        Self {
            candidate: entry.candidate.clone(),
            air_km: entry.air_km,
            duration_min: None,
            distance_km: None,
            co2_kg: None,
            geometry: None,
            failure: Some(failure),
        }
    }

    pub fn is_routed(&self) -> bool {
        self.duration_min.is_some()
    }
}

/// Total order on ranked results: shortest drive first, unrouted last, then
/// nearest by air.
pub fn ranking_order(a: &RoutedCandidate, b: &RoutedCandidate) -> Ordering {
    let by_duration = match (a.duration_min, b.duration_min) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_duration.then_with(|| a.air_km.total_cmp(&b.air_km))
}

enum Attempt {
    Routed(Route),
    Failed(RoutingError),
    Cancelled,
}

/// Routes candidates on a bounded worker pool and orders the results.
#[derive(Debug)]
pub struct RouteRanker {
    pool: rayon::ThreadPool,
    retry: RetryPolicy,
    co2_kg_per_km: f64,
}

impl RouteRanker {
    pub fn new(workers: usize, retry: RetryPolicy, co2_kg_per_km: f64) -> Result<Self, ConfigurationError> {
        if workers == 0 {
            return Err(ConfigurationError::WorkerPool("pool size must be at least 1".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("route-worker-{i}"))
            .build()
            .map_err(|e| ConfigurationError::WorkerPool(e.to_string()))?;
        Ok(Self {
            pool,
            retry,
            co2_kg_per_km,
        })
    }

    pub fn from_config(config: &FinderConfig) -> Result<Self, ConfigurationError> {
        Self::new(config.worker_pool_size, config.retry, config.co2_kg_per_km)
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Routes every entry from `site` and returns them in ranking order.
    ///
    /// Results are only ordered once the whole batch has finished. If `token`
    /// is cancelled at any point the batch is abandoned and nothing is
    /// returned.
    pub fn rank<R>(
        &self,
        router: &R,
        site: GeoPoint,
        candidates: &[Preselected<'_>],
        token: &CancelToken,
    ) -> Result<Vec<RoutedCandidate>, PipelineError>
    where
        R: RouteProvider + ?Sized,
    {
        let outcomes: Vec<Option<RoutedCandidate>> = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|entry| self.route_entry(router, site, entry, token))
                .collect()
        });

        if token.is_cancelled() {
            debug!(generation = token.generation(), "discarding cancelled routing batch");
            return Err(PipelineError::Cancelled);
        }

        let mut ranked = outcomes
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(PipelineError::Cancelled)?;
        ranked.sort_by(ranking_order);
        Ok(ranked)
    }

    fn route_entry<R>(
        &self,
        router: &R,
        site: GeoPoint,
        entry: &Preselected<'_>,
        token: &CancelToken,
    ) -> Option<RoutedCandidate>
    where
        R: RouteProvider + ?Sized,
    {
        let id = entry.candidate.id;
        let Some(destination) = entry.candidate.location else {
            return Some(RoutedCandidate::unrouted(
                entry,
                RoutingError::InvalidRequest {
                    status: 0,
                    message: "candidate has no location".to_string(),
                },
            ));
        };

        match self.route_with_retry(router, site, destination, token) {
            Attempt::Routed(route) => {
                debug!(candidate = %id, duration_min = route.duration_min, "routed");
                Some(RoutedCandidate::routed(entry, route, self.co2_kg_per_km))
            }
            Attempt::Failed(err) => {
                warn!(candidate = %id, error = %err, "routing failed");
                Some(RoutedCandidate::unrouted(entry, err))
            }
            Attempt::Cancelled => None,
        }
    }

    fn route_with_retry<R>(&self, router: &R, site: GeoPoint, destination: GeoPoint, token: &CancelToken) -> Attempt
    where
        R: RouteProvider + ?Sized,
    {
        let mut retry = 0;
        loop {
            if token.is_cancelled() {
                return Attempt::Cancelled;
            }
            let result = router.route(site, destination);
            if token.is_cancelled() {
                return Attempt::Cancelled;
            }

            match result {
                Ok(route) => return Attempt::Routed(route),
                Err(err) if err.is_transient() && retry < self.retry.max_retries => {
                    let wait = self.retry.backoff(retry);
                    retry += 1;
                    debug!(error = %err, attempt = retry, ?wait, "retrying route");
                    if !token.sleep(wait) {
                        return Attempt::Cancelled;
                    }
                }
                Err(err) => return Attempt::Failed(err),
            }
        }
    }
}

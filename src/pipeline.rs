//! One query cycle: filter, preselect, route, rank.
//!
//! A [`Session`] owns the candidate pool and the routing workers for as long
//! as a front end is open. Each query takes a fresh generation number;
//! starting a new query moves the counter on, which cancels whatever the
//! previous query still has in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::candidate::CandidatePool;
use crate::config::FinderConfig;
use crate::error::{ConfigurationError, PipelineError};
use crate::filter::{FilterCriteria, filter_candidates};
use crate::geometry::GeoPoint;
use crate::isochrone::IsochroneSet;
use crate::osrm::OsrmClient;
use crate::preselect::preselect;
use crate::ranker::{RouteRanker, RoutedCandidate};
use crate::traits::RouteProvider;

/// Granularity at which sleeping workers notice cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Where the most recent query is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Filtering,
    Preselecting,
    Routing,
    Ranked,
    Cancelled,
}

/// Marks work as belonging to one query generation.
///
/// The token is cancelled as soon as the shared counter moves past the
/// generation it was issued for.
#[derive(Debug, Clone)]
pub struct CancelToken {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl CancelToken {
    /// A token with its own counter, for use outside a [`Session`].
    pub fn detached() -> Self {
        Self {
            current: Arc::new(AtomicU64::new(0)),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }

    /// Cancels this token and every other token of the same generation.
    pub fn cancel(&self) {
        let _ = self.current.compare_exchange(
            self.generation,
            self.generation + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// Returns `false` if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(CANCEL_POLL));
        }
    }
}

/// The single state slot, always owned by the newest query.
#[derive(Debug)]
struct QueryStatus {
    generation: u64,
    state: PipelineState,
    /// Whether `generation` has yet to reach a terminal state.
    active: bool,
}

/// Explicit session state: candidate pool, routing workers and the active query.
#[derive(Debug)]
pub struct Session<R> {
    config: FinderConfig,
    pool: CandidatePool,
    router: R,
    ranker: RouteRanker,
    generation: Arc<AtomicU64>,
    status: Mutex<QueryStatus>,
}

impl Session<OsrmClient> {
    /// A session routing through the OSRM service named in `config`.
    pub fn with_osrm(config: FinderConfig, pool: CandidatePool) -> Result<Self, ConfigurationError> {
        let router = OsrmClient::new(config.osrm.clone(), &config.http)?;
        Self::new(config, pool, router)
    }
}

impl<R: RouteProvider> Session<R> {
    pub fn new(config: FinderConfig, pool: CandidatePool, router: R) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let ranker = RouteRanker::from_config(&config)?;
        debug!(
            candidates = pool.len(),
            workers = ranker.workers(),
            "session started"
        );
        Ok(Self {
            config,
            pool,
            router,
            ranker,
            generation: Arc::new(AtomicU64::new(0)),
            status: Mutex::new(QueryStatus {
                generation: 0,
                state: PipelineState::Idle,
                active: false,
            }),
        })
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    pub fn candidates(&self) -> &CandidatePool {
        &self.pool
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    /// State of the most recent query.
    pub fn state(&self) -> PipelineState {
        self.lock_status().state
    }

    /// Generation of the most recent query.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cancels the in-flight query, if any, and starts a new generation.
    ///
    /// The superseded query passes through `Cancelled` before the slot is
    /// handed to the new one, which starts at `Idle`.
    pub fn begin_query(&self) -> CancelToken {
        let mut status = self.lock_status();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        if status.active {
            status.state = PipelineState::Cancelled;
            debug!(generation = status.generation, to = ?status.state, "query cancelled by newer query");
        }
        status.generation = generation;
        status.state = PipelineState::Idle;
        status.active = true;

        CancelToken {
            current: Arc::clone(&self.generation),
            generation,
        }
    }

    /// Cancels the current query, unless it already finished, without
    /// starting another one.
    pub fn cancel(&self) {
        let mut status = self.lock_status();
        if status.active {
            self.generation.fetch_add(1, Ordering::AcqRel);
            debug!(generation = status.generation, "query cancelled");
            status.state = PipelineState::Cancelled;
            status.active = false;
        }
    }

    /// Runs a query to completion, superseding any query still in flight.
    pub fn run_query(
        &self,
        site: GeoPoint,
        criteria: &FilterCriteria,
        bands: &IsochroneSet,
    ) -> Result<Vec<RoutedCandidate>, PipelineError> {
        let token = self.begin_query();
        let result = self.run_with_token(&token, site, criteria, bands);

        match &result {
            Ok(ranked) => {
                let unrouted = ranked.iter().filter(|r| !r.is_routed()).count();
                info!(
                    generation = token.generation(),
                    band = criteria.band_minutes,
                    ranked = ranked.len(),
                    unrouted,
                    "query ranked"
                );
            }
            Err(PipelineError::Cancelled) => {
                debug!(generation = token.generation(), "query superseded");
            }
            Err(err) => {
                info!(generation = token.generation(), error = %err, "query failed");
                self.settle(&token, PipelineState::Idle);
            }
        }
        result
    }

    fn run_with_token(
        &self,
        token: &CancelToken,
        site: GeoPoint,
        criteria: &FilterCriteria,
        bands: &IsochroneSet,
    ) -> Result<Vec<RoutedCandidate>, PipelineError> {
        self.transition(token, PipelineState::Filtering)?;
        let filtered = filter_candidates(self.pool.candidates(), criteria, bands)?;
        if filtered.is_empty() {
            return Err(PipelineError::NoCandidates {
                band_minutes: criteria.band_minutes,
            });
        }

        self.transition(token, PipelineState::Preselecting)?;
        let shortlist = preselect(&filtered, site, self.config.preselect_limit);

        self.transition(token, PipelineState::Routing)?;
        let ranked = self.ranker.rank(&self.router, site, &shortlist, token)?;

        self.transition(token, PipelineState::Ranked)?;
        Ok(ranked)
    }

    /// Moves the query owned by `token` to `next`, unless it has been superseded.
    fn transition(&self, token: &CancelToken, next: PipelineState) -> Result<(), PipelineError> {
        let mut status = self.lock_status();
        if token.is_cancelled() || status.generation != token.generation() {
            if status.generation == token.generation() {
                status.state = PipelineState::Cancelled;
                status.active = false;
            }
            return Err(PipelineError::Cancelled);
        }
        debug!(generation = token.generation(), from = ?status.state, to = ?next, "pipeline transition");
        status.state = next;
        status.active = next != PipelineState::Ranked;
        Ok(())
    }

    fn settle(&self, token: &CancelToken, state: PipelineState) {
        let mut status = self.lock_status();
        if status.generation == token.generation() {
            status.state = state;
            status.active = false;
        }
    }

    fn lock_status(&self) -> MutexGuard<'_, QueryStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

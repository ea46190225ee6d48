//! Test fixtures for fieldteam-finder.
//!
//! Provides:
//! - Real London locations
//! - Builders for candidates and isochrone bands
//! - Scripted and gated route providers
//! - A throwaway HTTP server for client tests

#![allow(dead_code)]

pub mod london_locations;

use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use geo::{LineString, MultiPolygon, Polygon};

use fieldteam_finder::candidate::{Candidate, CandidateId, ContractorCategory};
use fieldteam_finder::error::RoutingError;
use fieldteam_finder::geometry::{Frame, GeoPoint};
use fieldteam_finder::haversine::haversine_km;
use fieldteam_finder::isochrone::{IsochroneBand, IsochroneSet};
use fieldteam_finder::ranker::RetryPolicy;
use fieldteam_finder::traits::{Route, RouteProvider};

pub use london_locations::*;

/// Kilometres per degree of latitude on the haversine sphere.
pub const KM_PER_DEGREE_LAT: f64 = 6371.0088 * std::f64::consts::PI / 180.0;

// ============================================================================
// Candidates
// ============================================================================

/// Builder for test candidates with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestCandidate {
    id: i64,
    business_unit: Option<String>,
    category: ContractorCategory,
    location: Option<GeoPoint>,
}

impl TestCandidate {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            business_unit: Some("Grounds".to_string()),
            category: ContractorCategory::Direct,
            location: None,
        }
    }

    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.location = Some(GeoPoint::new(lat, lon));
        self
    }

    pub fn at_point(mut self, point: GeoPoint) -> Self {
        self.location = Some(point);
        self
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.business_unit = Some(unit.to_string());
        self
    }

    pub fn external(mut self) -> Self {
        self.category = ContractorCategory::External;
        self
    }

    pub fn build(self) -> Candidate {
        Candidate {
            id: CandidateId(self.id),
            name: format!("Team {}", self.id),
            business_unit: self.business_unit,
            category: self.category,
            location: self.location,
            postcode: String::new(),
        }
    }
}

/// The point `km` due north of `from` by haversine distance.
pub fn north_of(from: GeoPoint, km: f64) -> GeoPoint {
    GeoPoint::new(from.lat + km / KM_PER_DEGREE_LAT, from.lon)
}

// ============================================================================
// Isochrones
// ============================================================================

/// Axis-aligned box around `centre`, in degrees.
pub fn box_around(centre: GeoPoint, half_lat: f64, half_lon: f64) -> MultiPolygon<f64> {
    let (s, n) = (centre.lat - half_lat, centre.lat + half_lat);
    let (w, e) = (centre.lon - half_lon, centre.lon + half_lon);
    MultiPolygon::new(vec![Polygon::new(
        LineString::from(vec![(w, s), (e, s), (e, n), (w, n), (w, s)]),
        vec![],
    )])
}

/// Nested square bands around `site`, `0.05 * minutes / 15` degrees across.
pub fn nested_bands(site: GeoPoint) -> IsochroneSet {
    let mut set = IsochroneSet::new();
    for minutes in [15, 30, 45, 60] {
        let half = 0.05 * f64::from(minutes) / 15.0;
        let band = IsochroneBand::new(minutes, box_around(site, half, half * 1.6), Frame::Geographic)
            .expect("valid band");
        set.insert(band);
    }
    set
}

pub fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    }
}

// ============================================================================
// Route providers
// ============================================================================

fn estimate(origin: GeoPoint, destination: GeoPoint) -> Route {
    let air = haversine_km(origin, destination);
    Route {
        duration_min: air * 1.5,
        distance_km: air * 1.3,
        geometry: None,
    }
}

fn key(point: GeoPoint) -> String {
    format!("{:.6},{:.6}", point.lat, point.lon)
}

/// Deterministic router: scripted responses per destination, otherwise a
/// fixed multiple of air distance.
#[derive(Default)]
pub struct ScriptedRouter {
    scripts: Mutex<HashMap<String, VecDeque<Result<Route, RoutingError>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, destination: GeoPoint, responses: Vec<Result<Route, RoutingError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(key(destination), responses.into());
        self
    }

    pub fn calls_to(&self, destination: GeoPoint) -> usize {
        self.calls.lock().unwrap().get(&key(destination)).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl RouteProvider for ScriptedRouter {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        *self.calls.lock().unwrap().entry(key(destination)).or_default() += 1;
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key(destination))
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| Ok(estimate(origin, destination)))
    }
}

/// Router whose calls block until the gate is opened.
#[derive(Default)]
pub struct GatedRouter {
    open: Mutex<bool>,
    opened: Condvar,
    in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl GatedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RouteProvider for GatedRouter {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        drop(open);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(estimate(origin, destination))
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ============================================================================
// HTTP
// ============================================================================

/// A canned HTTP response.
#[derive(Clone, Debug)]
pub struct Canned {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Serves the canned responses in order, one per connection, then stops.
///
/// Only GET requests without a body are supported; write errors are ignored.
pub struct TestServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start(responses: Vec<Canned>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let handle = std::thread::spawn(move || {
            for canned in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream);
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                seen.lock().unwrap().push(request_line.trim_end().to_string());
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header) {
                        Ok(0) => break,
                        Ok(_) if header == "\r\n" => break,
                        Ok(_) => continue,
                        Err(_) => break,
                    }
                }

                std::thread::sleep(canned.delay);
                let mut stream = reader.into_inner();
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    canned.status,
                    reason(canned.status),
                    canned.body.len(),
                    canned.body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            base_url,
            requests,
            handle: Some(handle),
        }
    }

    /// Request lines received so far, e.g. `GET /path?query HTTP/1.1`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn join(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.requests()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

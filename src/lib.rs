//! fieldteam-finder core
//!
//! Selects the field teams that can reach a site within a travel-time band
//! and ranks them by exact driving time, issuing only a bounded number of
//! routing calls.

pub mod candidate;
pub mod config;
pub mod emissions;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod haversine;
pub mod http;
pub mod isochrone;
pub mod mapbox;
pub mod osrm;
pub mod pipeline;
pub mod polyline;
pub mod postcodes;
pub mod preselect;
pub mod ranker;
pub mod traits;

//! Third-party geocoding and routing services.
//!
//! # Data Flow
//! ```text
//! navigation::Navigator
//!     → Geocoder::geocode(text)           → nominatim.rs (HTTP + JSON parse)
//!     → RouteProvider::route(from, to)    → osrm.rs (HTTP + JSON parse)
//! ```
//!
//! # Design Decisions
//! - The provider wire formats are only known inside this module
//! - No retries: every failure is reported once to the caller
//! - Timeouts are enforced by the HTTP client, per service

pub mod nominatim;
pub mod osrm;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::geo::Coordinate;

pub use nominatim::NominatimGeocoder;
pub use osrm::OsrmRouter;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The service answered successfully but had nothing for the query.
    #[error("no result")]
    NotFound,

    /// Non-success HTTP status.
    #[error("HTTP {0}")]
    Status(u16),

    /// Success status with a body we cannot use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Connection, timeout, or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl UpstreamError {
    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            UpstreamError::NotFound => "not_found",
            UpstreamError::Status(_) => "status",
            UpstreamError::InvalidResponse(_) => "invalid",
            UpstreamError::Transport(_) => "transport",
        }
    }
}

/// Best match for a free-text address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub coordinate: Coordinate,
    pub display_name: Option<String>,
}

/// A driving route between two points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub distance_km: f64,
    pub duration_min: f64,
    /// Path geometry exactly as the provider returned it.
    pub geometry: serde_json::Value,
}

impl RouteResult {
    pub fn new(distance_meters: f64, duration_seconds: f64, geometry: serde_json::Value) -> Self {
        Self {
            distance_meters,
            duration_seconds,
            distance_km: distance_meters / 1000.0,
            duration_min: duration_seconds / 60.0,
            geometry,
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address_text: &str) -> Result<GeocodeMatch, UpstreamError>;
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteResult, UpstreamError>;
}

/// Shared reqwest client construction for both providers.
pub(crate) fn build_client(user_agent: &str, timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
}

//! Request and result types for the navigation pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo::{Coordinate, CoordinateInput};
use crate::store::SavedAddress;
use crate::navigation::NavResult;
use crate::upstream::RouteResult;

/// A JSON body as received, or why it could not be read. Rate-limited flows
/// only interpret it after admission.
pub type RawBody = NavResult<Value>;

/// Input for a combined resolve-route-report request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateRequest {
    pub address: Option<String>,
    pub from: Option<CoordinateInput>,
    /// Kept loose: a non-numeric speed counts as absent.
    pub speed_mps: Option<Value>,
}

/// Input for a geocode-only request.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeRequest {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRequest {
    pub from: Option<CoordinateInput>,
    pub to: Option<CoordinateInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRequest {
    pub from: Option<CoordinateInput>,
    pub to: Option<CoordinateInput>,
    pub speed_mps: Option<Value>,
}

/// A destination resolved from the cache or the geocoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDestination {
    #[serde(flatten)]
    pub address: SavedAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub cached: bool,
    #[serde(skip)]
    pub coordinate: Coordinate,
}

/// Straight-line remaining distance and optional ETA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMetrics {
    pub remaining_meters: f64,
    pub remaining_km: f64,
    pub eta_seconds: Option<f64>,
    pub eta_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationResult {
    pub destination: ResolvedDestination,
    pub route: RouteResult,
    pub live: LiveMetrics,
}

//! Navigation orchestration.
//!
//! # Data Flow
//! ```text
//! navigate(client, body)
//!     → RateGate::admit            (429 on denial, body untouched)
//!     → parse + validate body      (400, before any I/O)
//!     → resolve_address
//!         → AddressStore::find_resolved   hit → cached = true
//!         → Geocoder::geocode             miss
//!         → AddressStore::save            persisted before routing
//!     → RouteProvider::route(origin, destination)
//!     → live_metrics(origin, destination, speed)
//! ```
//!
//! # Design Decisions
//! - `resolve_address` is the one cache-then-geocode path; `/geocode` and
//!   `/navigate` both go through it
//! - No retries; the first failure ends the request
//! - A saved destination stays saved when routing later fails

pub mod error;
pub mod live;
pub mod types;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::geo::{Coordinate, CoordinateInput};
use crate::observability::metrics;
use crate::security::rate_limit::{Admission, RateGate};
use crate::store::{AddressStore, SavedAddress};
use crate::upstream::{Geocoder, RouteProvider, RouteResult, UpstreamError};

pub use error::{NavError, NavResult};
pub use live::{live_metrics, speed_from, MIN_SPEED_MPS};
pub use types::{
    GeocodeRequest, LiveMetrics, MetricsRequest, NavigateRequest, NavigationResult, RawBody,
    ResolvedDestination, RouteRequest,
};

/// Composes the address store, geocoder and router into request flows.
#[derive(Clone)]
pub struct Navigator {
    store: Arc<dyn AddressStore>,
    geocoder: Arc<dyn Geocoder>,
    router: Arc<dyn RouteProvider>,
    geocode_gate: Option<Arc<RateGate>>,
    navigate_gate: Option<Arc<RateGate>>,
}

impl Navigator {
    pub fn new(
        store: Arc<dyn AddressStore>,
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RouteProvider>,
    ) -> Self {
        Self {
            store,
            geocoder,
            router,
            geocode_gate: None,
            navigate_gate: None,
        }
    }

    /// Install independent admission gates for the two rate-limited flows.
    pub fn with_gates(mut self, geocode: Arc<RateGate>, navigate: Arc<RateGate>) -> Self {
        self.geocode_gate = Some(geocode);
        self.navigate_gate = Some(navigate);
        self
    }

    pub fn store(&self) -> &Arc<dyn AddressStore> {
        &self.store
    }

    /// Cache lookup, falling back to the geocoder and persisting its answer.
    pub async fn resolve_address(&self, address_text: &str) -> NavResult<ResolvedDestination> {
        if let Some(saved) = self.store.find_resolved(address_text).await? {
            if let Some((lat, lng)) = saved.coordinates() {
                let coordinate = Coordinate::new(lat, lng).map_err(|e| {
                    NavError::Internal(format!("stored address {} has bad coordinates: {}", saved.id, e))
                })?;
                metrics::record_cache_lookup(true);
                tracing::debug!(address = %address_text, id = saved.id, "Address cache hit");
                return Ok(ResolvedDestination {
                    address: saved,
                    display_name: None,
                    cached: true,
                    coordinate,
                });
            }
        }

        metrics::record_cache_lookup(false);
        let found = self
            .geocoder
            .geocode(address_text)
            .await
            .map_err(|e| upstream_error("Geocoding", "Address not found.", e))?;

        let coordinate = found.coordinate;
        let saved = self
            .store
            .save(address_text, coordinate.latitude, coordinate.longitude)
            .await?;
        tracing::info!(address = %address_text, id = saved.id, "Saved geocoded address");

        Ok(ResolvedDestination {
            address: saved,
            display_name: found.display_name,
            cached: false,
            coordinate,
        })
    }

    /// Geocode-only flow: admission, validation, resolution.
    ///
    /// The body is only looked at once the client is admitted, so a throttled
    /// client gets 429 whatever it sent.
    pub async fn geocode(&self, client_key: &str, body: RawBody) -> NavResult<ResolvedDestination> {
        admit(self.geocode_gate.as_deref(), client_key)?;
        let request: GeocodeRequest = parse_body(body)?;
        let address = require_address(request.address)?;
        self.resolve_address(&address).await
    }

    /// Resolve the destination, route to it from `from`, and report live metrics.
    pub async fn navigate(&self, client_key: &str, body: RawBody) -> NavResult<NavigationResult> {
        admit(self.navigate_gate.as_deref(), client_key)?;

        let request: NavigateRequest = parse_body(body)?;

        let address = require_address(request.address)?;
        let origin = require_coordinate("from", request.from)?;
        let speed = speed_from(request.speed_mps.as_ref());

        let destination = self.resolve_address(&address).await?;
        let route = self.route_between(origin, destination.coordinate).await?;
        let live = live_metrics(origin, destination.coordinate, speed);

        tracing::info!(
            address = %address,
            cached = destination.cached,
            route_m = route.distance_meters,
            remaining_m = live.remaining_meters,
            "Navigation resolved"
        );

        Ok(NavigationResult {
            destination,
            route,
            live,
        })
    }

    /// Store an address as typed, without resolving it.
    pub async fn record_address(&self, request: GeocodeRequest) -> NavResult<SavedAddress> {
        let address = require_address(request.address)?;
        Ok(self.store.record(&address).await?)
    }

    /// Route between two client-supplied points.
    pub async fn route(&self, request: RouteRequest) -> NavResult<RouteResult> {
        let from = require_coordinate("from", request.from)?;
        let to = require_coordinate("to", request.to)?;
        self.route_between(from, to).await
    }

    async fn route_between(&self, origin: Coordinate, destination: Coordinate) -> NavResult<RouteResult> {
        self.router
            .route(origin, destination)
            .await
            .map_err(|e| upstream_error("Routing", "Route not found.", e))
    }
}

/// Live metrics between two client-supplied points.
pub fn metrics_between(request: MetricsRequest) -> NavResult<LiveMetrics> {
    let from = require_coordinate("from", request.from)?;
    let to = require_coordinate("to", request.to)?;
    Ok(live_metrics(from, to, speed_from(request.speed_mps.as_ref())))
}

fn admit(gate: Option<&RateGate>, client_key: &str) -> NavResult<()> {
    match gate.map(|g| g.admit(client_key)) {
        Some(Admission::Denied { retry_after_secs }) => Err(NavError::RateLimited { retry_after_secs }),
        _ => Ok(()),
    }
}

fn parse_body<T: DeserializeOwned>(body: RawBody) -> NavResult<T> {
    serde_json::from_value(body?).map_err(|e| NavError::Validation(format!("Invalid request body: {e}")))
}

fn require_address(address: Option<String>) -> NavResult<String> {
    let address = address.as_deref().map(str::trim).unwrap_or_default();
    if address.is_empty() {
        return Err(NavError::Validation("Address is required.".to_string()));
    }
    Ok(address.to_string())
}

fn require_coordinate(field: &str, input: Option<CoordinateInput>) -> NavResult<Coordinate> {
    let input = input.ok_or_else(|| {
        NavError::Validation(format!("Body must include {{ {field}:{{lat,lng}} }} as numbers."))
    })?;
    Coordinate::try_from(input).map_err(|e| NavError::Validation(format!("Invalid '{field}': {e}")))
}

fn upstream_error(service: &str, not_found: &str, err: UpstreamError) -> NavError {
    match err {
        UpstreamError::NotFound => NavError::NotFound(not_found.to_string()),
        other => NavError::Upstream(format!("{} failed: {}", service, other)),
    }
}

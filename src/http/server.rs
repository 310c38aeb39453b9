//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the collaborators (store, geocoder, router) from config
//! - Create the Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, body limit, metrics)
//! - Run rate-gate sweepers alongside the server
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::http::{handlers, response};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::navigation::Navigator;
use crate::observability::metrics;
use crate::security::rate_limit::RateGate;
use crate::store::{AddressStore, SqliteAddressStore, StoreError};
use crate::upstream::{Geocoder, NominatimGeocoder, OsrmRouter, RouteProvider};

pub const SERVICE_NAME: &str = "navigation-app-backend";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub navigator: Navigator,
    pub service: &'static str,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("address store: {0}")]
    Store(#[from] StoreError),

    #[error("upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the navigation backend.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    gates: Vec<Arc<RateGate>>,
}

impl HttpServer {
    /// Create a server backed by SQLite, Nominatim and OSRM as configured.
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        let store = Arc::new(SqliteAddressStore::open(&config.database.path)?);
        let geocoder = Arc::new(NominatimGeocoder::new(&config.geocoder)?);
        let router = Arc::new(OsrmRouter::new(&config.router)?);
        Ok(Self::with_collaborators(config, store, geocoder, router))
    }

    /// Create a server over caller-supplied collaborators.
    pub fn with_collaborators(
        config: ServiceConfig,
        store: Arc<dyn AddressStore>,
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RouteProvider>,
    ) -> Self {
        let mut navigator = Navigator::new(store, geocoder, router);
        let mut gates = Vec::new();

        if config.rate_limit.enabled {
            let geocode_gate = Arc::new(RateGate::from_config("geocode", &config.rate_limit));
            let navigate_gate = Arc::new(RateGate::from_config("navigate", &config.rate_limit));
            navigator = navigator.with_gates(geocode_gate.clone(), navigate_gate.clone());
            gates.push(geocode_gate);
            gates.push(navigate_gate);
        }

        let state = AppState {
            navigator,
            service: SERVICE_NAME,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            gates,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let api: Router<AppState> = Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/addresses",
                get(handlers::list_addresses).post(handlers::create_address),
            )
            .route("/geocode", post(handlers::geocode))
            .route("/route", post(handlers::route))
            .route("/nav/metrics", post(handlers::nav_metrics))
            .route("/navigate", post(handlers::navigate));

        Router::new()
            .merge(api.clone())
            .nest("/api", api)
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(middleware::from_fn(track_requests))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::map_response(response::shape_layer_errors))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rate_limit = self.config.rate_limit.enabled,
            "HTTP server starting"
        );

        let sweep_every = Duration::from_secs(self.config.rate_limit.sweep_interval_secs.max(1));
        for gate in &self.gates {
            tokio::spawn(gate.clone().run_sweeper(sweep_every, shutdown.resubscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Per-request metrics keyed by the matched route template.
async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(request).await;
    metrics::record_request(&endpoint, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    fn test_server() -> HttpServer {
        let mut config = ServiceConfig::default();
        config.database.path = ":memory:".into();
        // Nothing listens here; these tests never reach an upstream.
        config.geocoder.base_url = "http://127.0.0.1:9".into();
        config.router.base_url = "http://127.0.0.1:9".into();
        HttpServer::new(config).unwrap()
    }

    async fn send(router: Router, request: axum::http::Request<Body>) -> (StatusCode, serde_json::Value, axum::http::HeaderMap) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json, headers)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_db() {
        let server = test_server();
        for uri in ["/health", "/api/health"] {
            let request = axum::http::Request::get(uri).body(Body::empty()).unwrap();
            let (status, json, headers) = send(server.router(), request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["status"], "ok");
            assert_eq!(json["db"], "ok");
            assert_eq!(json["service"], SERVICE_NAME);
            assert!(json["timestamp"].is_string());
            assert!(headers.contains_key("x-request-id"));
        }
    }

    #[tokio::test]
    async fn test_unknown_path_uses_error_shape() {
        let request = axum::http::Request::get("/nope").body(Body::empty()).unwrap();
        let (status, json, _) = send(test_server().router(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["status"], 404);
    }

    #[tokio::test]
    async fn test_addresses_create_and_list() {
        let server = test_server();

        let (status, json, _) = send(server.router(), post_json("/addresses", serde_json::json!({"address": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["message"], "Address is required.");

        for name in ["A St", "B St", "C St"] {
            let (status, json, _) = send(server.router(), post_json("/api/addresses", serde_json::json!({"address": name}))).await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(json["address"], name);
            assert!(json["latitude"].is_null());
        }

        let request = axum::http::Request::get("/addresses?limit=2").body(Body::empty()).unwrap();
        let (status, json, _) = send(server.router(), request).await;
        assert_eq!(status, StatusCode::OK);
        let items = json["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["address"], "C St");

        let request = axum::http::Request::get("/addresses?limit=abc").body(Body::empty()).unwrap();
        let (_, json, _) = send(server.router(), request).await;
        assert_eq!(json["items"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let body = serde_json::json!({
            "from": {"lat": 47.5615, "lng": -52.7126},
            "to": {"lat": 47.5705, "lng": -52.7126},
            "speedMps": 10
        });
        let (status, json, _) = send(test_server().router(), post_json("/nav/metrics", body)).await;
        assert_eq!(status, StatusCode::OK);
        let remaining = json["remainingMeters"].as_f64().unwrap();
        assert!((remaining - 1000.0).abs() < 10.0);
        // JSON parsing may land one ULP away from the served value.
        let eta = json["etaSeconds"].as_f64().unwrap();
        assert!((eta - remaining / 10.0).abs() < 1e-9);

        let body = serde_json::json!({"from": {"lat": 1.0, "lng": 1.0}});
        let (status, _, _) = send(test_server().router(), post_json("/nav/metrics", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let request = axum::http::Request::post("/navigate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json, _) = send(test_server().router(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["status"], 400);
    }

    #[tokio::test]
    async fn test_invalid_route_coordinates() {
        let body = serde_json::json!({"from": {"lat": 91.0, "lng": 0.0}, "to": {"lat": 0.0, "lng": 0.0}});
        let (status, json, _) = send(test_server().router(), post_json("/route", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]["message"].as_str().unwrap().contains("from"));
    }

    /// Geocoder and router that never answer in time.
    struct Stalled;

    #[async_trait::async_trait]
    impl Geocoder for Stalled {
        async fn geocode(&self, _address_text: &str) -> Result<crate::upstream::GeocodeMatch, crate::upstream::UpstreamError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(crate::upstream::UpstreamError::NotFound)
        }
    }

    #[async_trait::async_trait]
    impl RouteProvider for Stalled {
        async fn route(
            &self,
            _origin: crate::geo::Coordinate,
            _destination: crate::geo::Coordinate,
        ) -> Result<crate::upstream::RouteResult, crate::upstream::UpstreamError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(crate::upstream::UpstreamError::NotFound)
        }
    }

    #[tokio::test]
    async fn test_oversized_body_uses_error_shape() {
        let mut config = ServiceConfig::default();
        config.database.path = ":memory:".into();
        config.security.max_body_size = 64;
        let server = HttpServer::new(config).unwrap();
        let padding = "x".repeat(256);
        let body = serde_json::json!({"address": padding}).to_string();

        // Rejected by the limit layer from Content-Length alone.
        let request = axum::http::Request::post("/api/addresses")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body.clone()))
            .unwrap();
        let (status, json, headers) = send(server.router(), request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"]["status"], 413);
        assert!(headers.contains_key("x-request-id"));

        // Caught while reading a body of unknown length.
        let (status, json, _) = send(server.router(), post_json("/addresses", serde_json::json!({"address": "x".repeat(256)}))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"]["message"], "Request body too large.");
    }

    #[tokio::test]
    async fn test_wrong_method_uses_error_shape() {
        let request = axum::http::Request::get("/navigate").body(Body::empty()).unwrap();
        let (status, json, _) = send(test_server().router(), request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["error"]["status"], 405);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out_with_error_shape() {
        let mut config = ServiceConfig::default();
        config.timeouts.request_secs = 1;
        let store = Arc::new(SqliteAddressStore::in_memory().unwrap());
        let server = HttpServer::with_collaborators(config, store, Arc::new(Stalled), Arc::new(Stalled));

        let body = serde_json::json!({"from": {"lat": 47.56, "lng": -52.71}, "to": {"lat": 47.57, "lng": -52.70}});
        let (status, json, _) = send(server.router(), post_json("/route", body)).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(json["error"]["status"], 408);
    }
}

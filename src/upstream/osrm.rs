//! OSRM route service client.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;

use crate::config::RouterConfig;
use crate::geo::Coordinate;
use crate::observability::metrics;
use crate::upstream::{build_client, RouteProvider, RouteResult, UpstreamError};

#[derive(Clone)]
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
    profile: String,
}

impl OsrmRouter {
    pub fn new(config: &RouterConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(&config.user_agent, config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
        })
    }

    /// OSRM takes `lng,lat` pairs separated by `;`.
    pub fn route_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.base_url,
            self.profile,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude
        )
    }

    async fn fetch(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteResult, UpstreamError> {
        let resp = self
            .client
            .get(self.route_url(origin, destination))
            .header(ACCEPT, "application/json")
            .query(&[("overview", "full"), ("geometries", "geojson"), ("steps", "false")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        parse_route(&body)
    }
}

#[async_trait]
impl RouteProvider for OsrmRouter {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteResult, UpstreamError> {
        let result = self.fetch(origin, destination).await;
        match &result {
            Ok(r) => {
                tracing::debug!(distance_m = r.distance_meters, duration_s = r.duration_seconds, "Route found");
                metrics::record_upstream("router", "ok");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Routing failed");
                metrics::record_upstream("router", e.outcome());
            }
        }
        result
    }
}

/// Extract the first route from a route service response body.
pub fn parse_route(body: &Value) -> Result<RouteResult, UpstreamError> {
    let code = body.get("code").and_then(Value::as_str);
    let first = body
        .get("routes")
        .and_then(Value::as_array)
        .and_then(|routes| routes.first());

    let route = match (code, first) {
        (Some("Ok"), Some(route)) => route,
        _ => return Err(UpstreamError::NotFound),
    };

    let number = |field: &str| {
        route
            .get(field)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("route '{}' is not a number", field)))
    };

    Ok(RouteResult::new(
        number("distance")?,
        number("duration")?,
        route.get("geometry").cloned().unwrap_or(Value::Null),
    ))
}

//! Endpoint handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::request::{ApiJson, ClientKey};
use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::navigation::{self, GeocodeRequest, MetricsRequest, NavError, RouteRequest};
use crate::store::{clamp_limit, SavedAddress, DEFAULT_LIST_LIMIT};

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub db: &'static str,
    pub service: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct ListParams {
    limit: Option<String>,
}

#[derive(Serialize)]
pub struct AddressList {
    pub items: Vec<SavedAddress>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let db = match state.navigator.store().ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "DB ping failed");
            "down"
        }
    };

    Json(HealthStatus {
        status: "ok",
        db,
        service: state.service,
        timestamp: Utc::now(),
    })
}

/// `GET /addresses?limit=N`; unparseable limits fall back to the default.
pub async fn list_addresses(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<AddressList>, NavError> {
    let limit = params
        .limit
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(|n| clamp_limit(n.max(0) as usize))
        .unwrap_or(DEFAULT_LIST_LIMIT);

    let items = state.navigator.store().recent(limit).await?;
    Ok(Json(AddressList { items }))
}

pub async fn create_address(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GeocodeRequest>,
) -> Result<(StatusCode, Json<SavedAddress>), NavError> {
    let saved = state.navigator.record_address(request).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn geocode(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    body: Result<ApiJson<Value>, NavError>,
) -> Result<Response, NavError> {
    let destination = state.navigator.geocode(&client, body.map(|ApiJson(v)| v)).await?;
    Ok((StatusCode::CREATED, Json(destination)).into_response())
}

pub async fn route(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RouteRequest>,
) -> Result<Response, NavError> {
    let route = state.navigator.route(request).await?;
    Ok(Json(route).into_response())
}

pub async fn nav_metrics(ApiJson(request): ApiJson<MetricsRequest>) -> Result<Response, NavError> {
    let live = navigation::metrics_between(request)?;
    Ok(Json(live).into_response())
}

/// 201 when the destination was geocoded and saved by this request, 200 on a cache hit.
pub async fn navigate(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    body: Result<ApiJson<Value>, NavError>,
) -> Result<Response, NavError> {
    let result = state.navigator.navigate(&client, body.map(|ApiJson(v)| v)).await?;
    let status = if result.destination.cached {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(result)).into_response())
}

pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

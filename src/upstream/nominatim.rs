//! Nominatim free-text search client.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;

use crate::config::GeocoderConfig;
use crate::geo::Coordinate;
use crate::observability::metrics;
use crate::upstream::{build_client, GeocodeMatch, Geocoder, UpstreamError};

#[derive(Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    search_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(&config.user_agent, config.timeout_secs)?,
            search_url: format!("{}/search", config.base_url.trim_end_matches('/')),
        })
    }

    async fn search(&self, address_text: &str) -> Result<GeocodeMatch, UpstreamError> {
        let resp = self
            .client
            .get(&self.search_url)
            .header(ACCEPT, "application/json")
            .query(&[("q", address_text), ("format", "json"), ("limit", "1")])
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
        parse_search(&body)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address_text: &str) -> Result<GeocodeMatch, UpstreamError> {
        let result = self.search(address_text).await;
        match &result {
            Ok(m) => {
                tracing::debug!(address = %address_text, lat = m.coordinate.latitude, lng = m.coordinate.longitude, "Geocoded address");
                metrics::record_upstream("geocoder", "ok");
            }
            Err(e) => {
                tracing::warn!(address = %address_text, error = %e, "Geocoding failed");
                metrics::record_upstream("geocoder", e.outcome());
            }
        }
        result
    }
}

/// Extract the first candidate from a search response body.
pub fn parse_search(body: &Value) -> Result<GeocodeMatch, UpstreamError> {
    let first = match body.as_array().and_then(|items| items.first()) {
        Some(first) => first,
        None => return Err(UpstreamError::NotFound),
    };

    let latitude = number_field(first, "lat")?;
    let longitude = number_field(first, "lon")?;
    let coordinate = Coordinate::new(latitude, longitude)
        .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

    Ok(GeocodeMatch {
        coordinate,
        display_name: first
            .get("display_name")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Nominatim sends coordinates as strings; accept plain numbers as well.
fn number_field(item: &Value, field: &str) -> Result<f64, UpstreamError> {
    let value = match item.get(field) {
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| UpstreamError::InvalidResponse(format!("'{}' is not a finite number", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_first_candidate() {
        let body = json!([
            {"lat": "47.5615", "lon": "-52.7126", "display_name": "St. John's, Newfoundland and Labrador, Canada"},
            {"lat": "0", "lon": "0", "display_name": "ignored"}
        ]);
        let m = parse_search(&body).unwrap();
        assert_eq!(m.coordinate, Coordinate::new(47.5615, -52.7126).unwrap());
        assert_eq!(m.display_name.as_deref(), Some("St. John's, Newfoundland and Labrador, Canada"));
    }

    #[test]
    fn test_empty_result_is_not_found() {
        assert!(matches!(parse_search(&json!([])), Err(UpstreamError::NotFound)));
        assert!(matches!(parse_search(&json!({"error": "x"})), Err(UpstreamError::NotFound)));
    }

    #[test]
    fn test_non_numeric_coordinates_rejected() {
        let body = json!([{"lat": "north", "lon": "-52.7", "display_name": "x"}]);
        assert!(matches!(parse_search(&body), Err(UpstreamError::InvalidResponse(_))));

        let body = json!([{"lat": "95.0", "lon": "-52.7"}]);
        assert!(matches!(parse_search(&body), Err(UpstreamError::InvalidResponse(_))));
    }

    #[test]
    fn test_numeric_coordinates_and_missing_name() {
        let body = json!([{"lat": 10.5, "lon": 20.25}]);
        let m = parse_search(&body).unwrap();
        assert_eq!(m.coordinate.longitude, 20.25);
        assert!(m.display_name.is_none());
    }
}

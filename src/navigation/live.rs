//! Live distance and ETA.

use serde_json::Value;

use crate::geo::{distance_meters, Coordinate};
use crate::navigation::types::LiveMetrics;

/// Speeds at or below this are treated as stationary.
pub const MIN_SPEED_MPS: f64 = 0.5;

/// Straight-line remaining distance, plus an ETA when the speed is usable.
pub fn live_metrics(origin: Coordinate, destination: Coordinate, speed_mps: Option<f64>) -> LiveMetrics {
    let remaining_meters = distance_meters(origin, destination);
    let eta_seconds = speed_mps
        .filter(|s| s.is_finite() && *s > MIN_SPEED_MPS)
        .map(|s| remaining_meters / s);

    LiveMetrics {
        remaining_meters,
        remaining_km: remaining_meters / 1000.0,
        eta_seconds,
        eta_minutes: eta_seconds.map(|s| s / 60.0),
    }
}

/// Read a client-supplied speed; anything but a JSON number is ignored.
pub fn speed_from(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn points() -> (Coordinate, Coordinate) {
        (
            Coordinate::new(47.5615, -52.7126).unwrap(),
            Coordinate::new(47.5705, -52.7126).unwrap(),
        )
    }

    #[test]
    fn test_no_speed_no_eta() {
        let (a, b) = points();
        let m = live_metrics(a, b, None);
        assert!(m.remaining_meters > 0.0);
        assert_eq!(m.remaining_km, m.remaining_meters / 1000.0);
        assert!(m.eta_seconds.is_none());
        assert!(m.eta_minutes.is_none());
    }

    #[test]
    fn test_eta_from_speed() {
        let (a, b) = points();
        let m = live_metrics(a, b, Some(10.0));
        assert_eq!(m.eta_seconds, Some(m.remaining_meters / 10.0));
        assert_eq!(m.eta_minutes, Some(m.remaining_meters / 10.0 / 60.0));
    }

    #[test]
    fn test_slow_or_bad_speed_ignored() {
        let (a, b) = points();
        for speed in [0.0, 0.5, -3.0, f64::NAN, f64::INFINITY] {
            assert!(live_metrics(a, b, Some(speed)).eta_seconds.is_none(), "speed {}", speed);
        }
    }

    #[test]
    fn test_speed_from_json() {
        assert_eq!(speed_from(Some(&json!(12.5))), Some(12.5));
        assert_eq!(speed_from(Some(&json!("12.5"))), None);
        assert_eq!(speed_from(None), None);
    }
}

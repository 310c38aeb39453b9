//! Coordinate types and great-circle distance.
//!
//! # Responsibilities
//! - Validated `Coordinate` value used by every other subsystem
//! - Haversine distance in meters
//!
//! # Design Decisions
//! - `distance_meters` does not re-validate ranges; callers build `Coordinate`
//!   through `Coordinate::new` or `TryFrom<CoordinateInput>`

use serde::Deserialize;
use thiserror::Error;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Errors raised when constructing a coordinate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    #[error("coordinate is missing {0}")]
    Missing(&'static str),

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// A WGS84 point. Both components are finite and within range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        check("lat", latitude, 90.0)?;
        check("lng", longitude, 180.0)?;
        Ok(Self { latitude, longitude })
    }
}

fn check(field: &'static str, value: f64, bound: f64) -> Result<(), GeoError> {
    if !value.is_finite() {
        return Err(GeoError::NotFinite { field });
    }
    if !(-bound..=bound).contains(&value) {
        return Err(GeoError::OutOfRange {
            field,
            value,
            min: -bound,
            max: bound,
        });
    }
    Ok(())
}

/// Wire shape `{ "lat": .., "lng": .. }` as sent by clients.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CoordinateInput {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl TryFrom<CoordinateInput> for Coordinate {
    type Error = GeoError;

    fn try_from(input: CoordinateInput) -> Result<Self, Self::Error> {
        let lat = input.lat.ok_or(GeoError::Missing("lat"))?;
        let lng = input.lng.ok_or(GeoError::Missing("lng"))?;
        Coordinate::new(lat, lng)
    }
}

/// Haversine distance between two points in meters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let s = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `s` a hair outside [0, 1].
    let s = s.clamp(0.0, 1.0);

    let c = 2.0 * s.sqrt().atan2((1.0 - s).sqrt());
    EARTH_RADIUS_M * c
}

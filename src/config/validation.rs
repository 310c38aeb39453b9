//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that addresses and upstream URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    BadAddress { field: &'static str, value: String },

    #[error("{field}: '{value}' is not an http(s) URL")]
    BadUrl { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    check_url(&mut errors, "geocoder.base_url", &config.geocoder.base_url);
    check_url(&mut errors, "router.base_url", &config.router.base_url);

    if config.database.path.trim().is_empty() {
        errors.push(ValidationError::Empty("database.path"));
    }
    if config.router.profile.trim().is_empty() {
        errors.push(ValidationError::Empty("router.profile"));
    }

    let positive = [
        ("geocoder.timeout_secs", config.geocoder.timeout_secs),
        ("router.timeout_secs", config.router.timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("security.max_body_size", config.security.max_body_size as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.rate_limit.enabled {
        let rl = &config.rate_limit;
        let positive = [
            ("rate_limit.window_ms", rl.window_ms),
            ("rate_limit.max_requests", rl.max_requests as u64),
            ("rate_limit.max_tracked_clients", rl.max_tracked_clients as u64),
            ("rate_limit.sweep_interval_secs", rl.sweep_interval_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                errors.push(ValidationError::Zero(field));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let ok = url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false);
    if !ok {
        errors.push(ValidationError::BadUrl {
            field,
            value: value.to_string(),
        });
    }
}

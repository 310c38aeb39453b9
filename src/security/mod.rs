//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! /geocode, /navigate request:
//!     → navigation::Navigator consults its RateGate (per-IP fixed window)
//!     → 429 + Retry-After on denial, before the body is read or any I/O
//! Background:
//!     → RateGate::run_sweeper drops expired windows
//! ```
//!
//! # Design Decisions
//! - One gate per rate-limited endpoint; gates never share counters
//! - Memory is bounded: expired windows are swept, and at capacity the
//!   unthrottled window nearest expiry is evicted
//! - Process-local only

pub mod rate_limit;

pub use rate_limit::{Admission, RateGate};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, client key, JSON body)
//!     → handlers.rs (one per endpoint, thin over navigation::Navigator)
//!     → response.rs (error shape, Retry-After)
//!     → Send to client
//! ```
//!
//! Every route is served both at the root and under `/api`.

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{ApiJson, ClientKey};
pub use server::{AppState, HttpServer, ServerError};

//! Navigation backend library.
//!
//! Resolves a destination address (cached or geocoded), routes to it from a
//! client-supplied origin and reports live distance/ETA.

pub mod config;
pub mod geo;
pub mod http;
pub mod lifecycle;
pub mod navigation;
pub mod observability;
pub mod security;
pub mod store;
pub mod upstream;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use navigation::Navigator;

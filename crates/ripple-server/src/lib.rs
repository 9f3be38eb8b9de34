//! # ripple-server
//!
//! The Ripple server binary's library crate: configuration, the axum
//! application, and Prometheus metrics export.

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::Config;
pub use handlers::{app, run_server, AppState};

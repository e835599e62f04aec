//! Axum web UI for StratAI: input form, results view and PDF download.

pub mod config;
pub mod error;
pub mod metrics;
pub mod page;
pub mod routes;
pub mod state;
pub mod telemetry;

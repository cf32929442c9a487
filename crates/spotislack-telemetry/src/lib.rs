//! Spotislack Telemetry - Prometheus metrics
//!
//! Provides:
//! - `MetricsRegistry`: counters, gauges and histograms for the sync loop
//! - `MetricsObserver`: `ISyncObserver` that records into the registry
//! - `MetricsServer`: HTTP server for Prometheus scraping

pub mod metrics;
pub mod observer;
pub mod server;

pub use metrics::MetricsRegistry;
pub use observer::MetricsObserver;
pub use server::MetricsServer;

//! Integration tests for spotislack-sync
//!
//! Drives the orchestrator against in-memory ports to verify per-user
//! isolation, token refresh, stop semantics and tick pacing. Timing tests
//! run on tokio's paused clock.

mod common;

mod test_pacing;
mod test_scenarios;
mod test_stop;

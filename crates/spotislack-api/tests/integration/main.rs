//! Integration tests for spotislack-api
//!
//! Uses wiremock to simulate the Spotify and Slack Web APIs and verifies
//! end-to-end behavior of the player client, the profile client, token
//! refresh, and the shared retry/throttle machinery.


mod test_retry;
mod test_spotify;

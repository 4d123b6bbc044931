//! Health check endpoint
//!
//! `GET /health` reports liveness together with the state of the live
//! anonymity set, so operators can watch rotations happen.

use hyper::{Response, StatusCode};
use serde::Serialize;

use super::{json_response, FullBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Git commit the binary was built from
    pub commit: &'static str,
    /// Seconds since startup
    pub uptime: u64,
    pub anonymity_set_size: usize,
    pub capacity: u64,
    /// Verifications spent on the live set
    pub verifications: u64,
    /// Rotations since startup
    pub generation: u64,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_SHORT"),
        uptime: state.started_at.elapsed().as_secs(),
        anonymity_set_size: state.keyset.anonymity_set_size(),
        capacity: state.keyset.capacity(),
        verifications: state.keyset.verifications(),
        generation: state.keyset.generation(),
    }
}

pub fn health_check(state: &AppState) -> Response<FullBody> {
    json_response(StatusCode::OK, &build_health_response(state))
}

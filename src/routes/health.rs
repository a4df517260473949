//! Liveness endpoint
//!
//! `GET /health` reports the crate version and which store backs the service.
//! It does not touch the store, so it stays 200 while MongoDB is degraded.

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::{json_response, FullBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// `mongodb` or `memory`
    pub store: &'static str,
    /// Operating mode
    pub mode: &'static str,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        store: state.store_kind.as_str(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
    }
}

/// GET /health
pub fn health_check(state: Arc<AppState>) -> Response<FullBody> {
    json_response(StatusCode::OK, &build_health_response(&state))
}

#![allow(dead_code)]

use bson::oid::ObjectId;
use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use profilehub::auth::Role;
use profilehub::db::schemas::ProfileDoc;
use profilehub::server::{route, AppState};
use profilehub::Args;

pub fn dev_args() -> Args {
    Args::parse_from(["profilehub", "--dev-mode"])
}

pub fn memory_state() -> Arc<AppState> {
    Arc::new(AppState::in_memory(dev_args()).unwrap())
}

pub async fn seed_user(state: &AppState, username: &str) -> ObjectId {
    state
        .profiles
        .insert(ProfileDoc::new(
            username.to_uppercase(),
            username,
            format!("{}@example.com", username),
        ))
        .await
        .unwrap()
        .id
}

pub fn token(state: &AppState, user: &ObjectId, role: Role) -> String {
    state.jwt.generate_token(user, role).unwrap()
}

/// Drive the router in-process and decode the JSON envelope
pub async fn call(
    state: &Arc<AppState>,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header("Authorization", format!("Bearer {}", t));
    }
    let body = body.map(|b| b.to_string()).unwrap_or_default();
    let req = builder
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap();

    let resp = route(Arc::clone(state), req).await;
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

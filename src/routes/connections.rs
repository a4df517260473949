//! Connection endpoints
//!
//! - `GET /connections/suggested?limit=N` - Suggestions for the caller
//! - `POST /connections/request/{userId}` - Send a connection request
//! - `PUT /connections/accept/{requestId}` - Accept a request addressed to the caller
//! - `PUT /connections/reject/{requestId}` - Reject a request addressed to the caller
//!
//! All endpoints require a valid bearer token.

use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::connections::RequestResponse;
use crate::db::schemas::{ConnectionRequestDoc, RequestStatus};
use crate::routes::{
    error_response, parse_id, query_param, require_user, respond, success_response, FullBody,
};
use crate::server::AppState;
use crate::types::{ProfileError, Result};

/// Connection request as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequestView {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<String>,
}

impl From<&ConnectionRequestDoc> for ConnectionRequestView {
    fn from(req: &ConnectionRequestDoc) -> Self {
        Self {
            id: req.id.to_hex(),
            sender: req.sender.to_hex(),
            recipient: req.recipient.to_hex(),
            status: req.status,
            created_at: req.metadata.created_at.map(|d| d.to_chrono().to_rfc3339()),
            responded_at: req.responded_at.map(|d| d.to_chrono().to_rfc3339()),
        }
    }
}

/// Main handler for /connections/* routes
pub async fn handle_connections_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/connections").unwrap_or("");

    match (method, subpath) {
        (Method::GET, "/suggested") | (Method::GET, "/suggested/") => {
            respond(handle_suggested(req, state).await)
        }

        (Method::POST, p) if p.starts_with("/request/") => {
            let id = p.strip_prefix("/request/").unwrap_or("");
            respond(handle_send_request(req, state, id).await)
        }

        (Method::PUT, p) if p.starts_with("/accept/") => {
            let id = p.strip_prefix("/accept/").unwrap_or("");
            respond(handle_respond(req, state, id, RequestResponse::Accept).await)
        }

        (Method::PUT, p) if p.starts_with("/reject/") => {
            let id = p.strip_prefix("/reject/").unwrap_or("");
            respond(handle_respond(req, state, id, RequestResponse::Reject).await)
        }

        _ => error_response(&ProfileError::NotFound("Route not found".into())),
    }
}

/// GET /connections/suggested
async fn handle_suggested<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<FullBody>> {
    let viewer = require_user(&req, &state)?;

    let requested = match query_param(req.uri().query(), "limit") {
        Some(raw) => Some(
            raw.parse::<usize>()
                .map_err(|_| ProfileError::BadRequest("limit must be a positive integer".into()))?,
        ),
        None => None,
    };
    let limit = state.args.suggestion_limit_for(requested);

    let suggestions = state.suggestions.suggest(&viewer, limit).await?;
    Ok(success_response(StatusCode::OK, &suggestions, None))
}

/// POST /connections/request/{userId}
async fn handle_send_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    recipient: &str,
) -> Result<Response<FullBody>> {
    let sender = require_user(&req, &state)?;
    let recipient = parse_id(recipient, "user")?;

    let request = state.connection_requests.send(&sender, &recipient).await?;
    Ok(success_response(
        StatusCode::CREATED,
        &ConnectionRequestView::from(&request),
        Some("Connection request sent"),
    ))
}

/// PUT /connections/{accept|reject}/{requestId}
async fn handle_respond<B>(
    req: Request<B>,
    state: Arc<AppState>,
    request_id: &str,
    response: RequestResponse,
) -> Result<Response<FullBody>> {
    let viewer = require_user(&req, &state)?;
    let request_id = parse_id(request_id, "request")?;

    let request = state
        .connection_requests
        .respond(&viewer, &request_id, response)
        .await?;

    let message = match response {
        RequestResponse::Accept => "Connection accepted",
        RequestResponse::Reject => "Connection request rejected",
    };
    info!("{} ({})", message, request.id);

    Ok(success_response(
        StatusCode::OK,
        &ConnectionRequestView::from(&request),
        Some(message),
    ))
}

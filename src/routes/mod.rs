//! HTTP route handlers
//!
//! Every response uses the same envelope:
//! `{"success": true, "data": ..., "message"?}` on success and
//! `{"success": false, "message": ..., "code": ...}` on failure.

pub mod certifications;
pub mod connections;
pub mod health;
pub mod members;

pub use certifications::{
    handle_admin_certifications_request, handle_user_certifications_request, CertificationView,
    PendingProfileView, ProfileView,
};
pub use connections::handle_connections_request;
pub use health::health_check;
pub use members::handle_admin_users_request;

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::auth::{extract_token_from_header, Claims, Role};
use crate::server::AppState;
use crate::types::{ProfileError, Result};

pub(crate) type FullBody = Full<Bytes>;

// =============================================================================
// Response Envelope
// =============================================================================

#[derive(Debug, Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    success: bool,
    data: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    message: &'a str,
    code: &'a str,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub(crate) fn success_response<T: Serialize>(
    status: StatusCode,
    data: &T,
    message: Option<&str>,
) -> Response<FullBody> {
    json_response(
        status,
        &SuccessEnvelope {
            success: true,
            data,
            message,
        },
    )
}

/// Failure envelope for a `ProfileError`.
///
/// Store and internal failures are logged here and reported generically.
pub(crate) fn error_response(err: &ProfileError) -> Response<FullBody> {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request refused: {}", err);
    }

    json_response(
        status,
        &ErrorEnvelope {
            success: false,
            message: &err.public_message(),
            code: err.code(),
        },
    )
}

/// Flatten a handler result into a response
pub(crate) fn respond(result: Result<Response<FullBody>>) -> Response<FullBody> {
    result.unwrap_or_else(|err| error_response(&err))
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Collect and decode a JSON body
pub(crate) async fn read_json<B, T>(req: Request<B>) -> Result<T>
where
    B: Body,
    B::Error: std::fmt::Display,
    T: DeserializeOwned,
{
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ProfileError::BadRequest(format!("Invalid body: {}", e)))?
        .to_bytes();

    if bytes.is_empty() {
        return Err(ProfileError::BadRequest("Request body is required".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| ProfileError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Parse a path segment as an id
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| ProfileError::BadRequest(format!("Invalid {} id", what)))
}

/// Look up a single query parameter
pub(crate) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name {
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

// =============================================================================
// Auth Helpers
// =============================================================================

fn get_auth_header<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Validate the bearer token and require at least `required`
pub(crate) fn require_role<B>(req: &Request<B>, state: &AppState, required: Role) -> Result<Claims> {
    let token = extract_token_from_header(get_auth_header(req))
        .ok_or_else(|| ProfileError::Unauthorized("No token provided".into()))?;
    state.jwt.authorize(token, required)
}

/// Any authenticated caller; returns the caller's profile id
pub(crate) fn require_user<B>(req: &Request<B>, state: &AppState) -> Result<ObjectId> {
    require_role(req, state, Role::User)?.user_id()
}

pub(crate) fn require_admin<B>(req: &Request<B>, state: &AppState) -> Result<Claims> {
    require_role(req, state, Role::Admin)
}

//! Certification endpoints
//!
//! ## Owner endpoints
//!
//! - `POST /users/certifications` - Submit a certification for review
//! - `PUT /users/certifications/{certId}` - Edit descriptive fields
//!
//! ## Admin endpoints
//!
//! - `GET /admin/certifications/pending` - Moderation queue
//! - `PUT /admin/certifications/{userId}/{certId}/approve` - Approve
//! - `PUT /admin/certifications/{userId}/{certId}/reject` - Reject
//!
//! The approve/reject paths are also served without the `/admin` prefix.

use bson::DateTime;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::certifications::{CertificationEdit, Moderation, NewCertification};
use crate::auth::Role;
use crate::db::schemas::{CertificationDoc, CertificationStatus, ProfileDoc, UserType};
use crate::routes::{
    error_response, parse_id, read_json, require_admin, require_user, respond, success_response,
    FullBody,
};
use crate::server::AppState;
use crate::types::{ProfileError, Result};

// =============================================================================
// Response Types
// =============================================================================

fn rfc3339(dt: Option<DateTime>) -> Option<String> {
    dt.map(|d| d.to_chrono().to_rfc3339())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificationView {
    pub id: String,
    pub title: String,
    pub institute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub status: CertificationStatus,
    pub is_verified: bool,
}

impl From<&CertificationDoc> for CertificationView {
    fn from(cert: &CertificationDoc) -> Self {
        Self {
            id: cert.id.to_hex(),
            title: cert.title.clone(),
            institute: cert.institute.clone(),
            start_date: rfc3339(cert.start_date),
            end_date: rfc3339(cert.end_date),
            description: cert.description.clone(),
            file: cert.file.clone(),
            status: cert.status,
            is_verified: cert.is_verified,
        }
    }
}

/// Profile as returned to admins
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub user_type: UserType,
    pub headline: String,
    pub location: String,
    pub profile_picture: String,
    pub banner_img: String,
    pub skills: Vec<String>,
    pub certifications: Vec<CertificationView>,
    pub is_verified: bool,
    pub connections: Vec<String>,
}

impl From<&ProfileDoc> for ProfileView {
    fn from(p: &ProfileDoc) -> Self {
        Self {
            id: p.id.to_hex(),
            name: p.name.clone(),
            username: p.username.clone(),
            email: p.email.clone(),
            role: p.role,
            user_type: p.user_type,
            headline: p.headline.clone(),
            location: p.location.clone(),
            profile_picture: p.profile_picture.clone(),
            banner_img: p.banner_img.clone(),
            skills: p.skills.clone(),
            certifications: p.certifications.iter().map(CertificationView::from).collect(),
            is_verified: p.is_verified,
            connections: p.connections.iter().map(|c| c.to_hex()).collect(),
        }
    }
}

/// Moderation queue entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingProfileView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub skills: Vec<String>,
    pub certifications: Vec<CertificationView>,
}

impl From<&ProfileDoc> for PendingProfileView {
    fn from(p: &ProfileDoc) -> Self {
        Self {
            id: p.id.to_hex(),
            name: p.name.clone(),
            email: p.email.clone(),
            skills: p.skills.clone(),
            certifications: p.certifications.iter().map(CertificationView::from).collect(),
        }
    }
}

fn certification_list(profile: &ProfileDoc) -> Vec<CertificationView> {
    profile
        .certifications
        .iter()
        .map(CertificationView::from)
        .collect()
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Main handler for /users/certifications routes
pub async fn handle_user_certifications_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let subpath = path.strip_prefix("/users/certifications").unwrap_or("");

    match (method, subpath) {
        (Method::POST, "") | (Method::POST, "/") => respond(handle_submit(req, state).await),

        (Method::PUT, p)
            if p
                .strip_prefix('/')
                .is_some_and(|id| !id.is_empty() && !id.contains('/')) =>
        {
            let cert_id = p.trim_start_matches('/');
            respond(handle_edit(req, state, cert_id).await)
        }

        _ => error_response(&ProfileError::NotFound("Route not found".into())),
    }
}

/// Main handler for /admin/certifications and /certifications routes
pub async fn handle_admin_certifications_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path
        .strip_prefix("/admin/certifications")
        .or_else(|| path.strip_prefix("/certifications"))
        .unwrap_or("");

    match (method, subpath) {
        (Method::GET, "/pending") => respond(handle_pending(req, state).await),

        (Method::PUT, p) if p.ends_with("/approve") => {
            let ids = p
                .strip_prefix('/')
                .and_then(|s| s.strip_suffix("/approve"))
                .unwrap_or("");
            respond(handle_moderate(req, state, ids, Moderation::Approve).await)
        }

        (Method::PUT, p) if p.ends_with("/reject") => {
            let ids = p
                .strip_prefix('/')
                .and_then(|s| s.strip_suffix("/reject"))
                .unwrap_or("");
            respond(handle_moderate(req, state, ids, Moderation::Reject).await)
        }

        _ => error_response(&ProfileError::NotFound("Route not found".into())),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// POST /users/certifications
async fn handle_submit<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<FullBody>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let user_id = require_user(&req, &state)?;
    let input: NewCertification = read_json(req).await?;

    let profile = state.certifications.submit(&user_id, input).await?;
    Ok(success_response(
        StatusCode::CREATED,
        &certification_list(&profile),
        Some("Certification submitted for review"),
    ))
}

/// PUT /users/certifications/{certId}
async fn handle_edit<B>(
    req: Request<B>,
    state: Arc<AppState>,
    cert_id: &str,
) -> Result<Response<FullBody>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let user_id = require_user(&req, &state)?;
    let cert_id = parse_id(cert_id, "certification")?;
    let body: serde_json::Value = read_json(req).await?;
    let edit = CertificationEdit::from_json(body)?;

    if edit.is_empty() {
        return Err(ProfileError::Validation("No fields to update".into()));
    }

    let profile = state.certifications.edit(&user_id, &cert_id, &edit).await?;
    Ok(success_response(
        StatusCode::OK,
        &certification_list(&profile),
        Some("Certification updated"),
    ))
}

/// GET /admin/certifications/pending
async fn handle_pending<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<FullBody>> {
    require_admin(&req, &state)?;

    let queue: Vec<PendingProfileView> = state
        .certifications
        .pending()
        .await?
        .iter()
        .map(PendingProfileView::from)
        .collect();

    Ok(success_response(StatusCode::OK, &queue, None))
}

/// PUT /admin/certifications/{userId}/{certId}/{approve|reject}
async fn handle_moderate<B>(
    req: Request<B>,
    state: Arc<AppState>,
    ids: &str,
    action: Moderation,
) -> Result<Response<FullBody>> {
    let admin = require_admin(&req, &state)?;

    let (user_id, cert_id) = ids
        .split_once('/')
        .filter(|(_, cert)| !cert.contains('/'))
        .ok_or_else(|| ProfileError::NotFound("Route not found".into()))?;
    let user_id = parse_id(user_id, "user")?;
    let cert_id = parse_id(cert_id, "certification")?;

    let profile = match action {
        Moderation::Approve => state.certifications.approve(&user_id, &cert_id).await?,
        Moderation::Reject => state.certifications.reject(&user_id, &cert_id).await?,
    };

    info!(
        "Certification {} {} by admin {}",
        cert_id,
        action.verb(),
        admin.sub
    );

    let message = match action {
        Moderation::Approve => "Certification approved",
        Moderation::Reject => "Certification rejected",
    };
    Ok(success_response(
        StatusCode::OK,
        &ProfileView::from(&profile),
        Some(message),
    ))
}

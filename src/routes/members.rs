//! Member administration endpoints
//!
//! - `GET /admin/users` - Every member with the `user` role
//! - `PUT /admin/users/{userId}/assign-head` - Promote a member to head user
//!
//! Both require an admin token.

use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::info;

use crate::routes::{
    error_response, parse_id, require_admin, respond, success_response, FullBody, ProfileView,
};
use crate::server::AppState;
use crate::types::{ProfileError, Result};

/// Main handler for /admin/users routes
pub async fn handle_admin_users_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/admin/users").unwrap_or("");

    match (method, subpath) {
        (Method::GET, "") | (Method::GET, "/") => respond(handle_list(req, state).await),

        (Method::PUT, p) if p.ends_with("/assign-head") => {
            let user_id = p
                .strip_prefix('/')
                .and_then(|s| s.strip_suffix("/assign-head"))
                .filter(|id| !id.is_empty() && !id.contains('/'));
            match user_id {
                Some(id) => respond(handle_assign_head(req, state, id).await),
                None => error_response(&ProfileError::NotFound("Route not found".into())),
            }
        }

        _ => error_response(&ProfileError::NotFound("Route not found".into())),
    }
}

/// GET /admin/users
async fn handle_list<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<FullBody>> {
    require_admin(&req, &state)?;

    let members: Vec<ProfileView> = state
        .members
        .list_members()
        .await?
        .iter()
        .map(ProfileView::from)
        .collect();

    Ok(success_response(StatusCode::OK, &members, None))
}

/// PUT /admin/users/{userId}/assign-head
async fn handle_assign_head<B>(
    req: Request<B>,
    state: Arc<AppState>,
    user_id: &str,
) -> Result<Response<FullBody>> {
    let admin = require_admin(&req, &state)?;
    let user_id = parse_id(user_id, "user")?;

    let profile = state.members.assign_head(&user_id).await?;
    info!("Head user {} assigned by admin {}", user_id, admin.sub);

    Ok(success_response(
        StatusCode::OK,
        &ProfileView::from(&profile),
        Some("User assigned as head user"),
    ))
}

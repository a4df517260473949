//! Connection request writes
//!
//! Keeps at most one pending request per pair of users (either direction) so
//! status resolution never has to choose between two live requests.

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::schemas::{ConnectionRequestDoc, RequestStatus};
use crate::store::{ProfileStore, RequestStore};
use crate::types::{ProfileError, Result};

/// Recipient's answer to a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestResponse {
    Accept,
    Reject,
}

impl RequestResponse {
    fn target_status(self) -> RequestStatus {
        match self {
            RequestResponse::Accept => RequestStatus::Accepted,
            RequestResponse::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Clone)]
pub struct RequestService {
    profiles: Arc<dyn ProfileStore>,
    requests: Arc<dyn RequestStore>,
}

impl RequestService {
    pub fn new(profiles: Arc<dyn ProfileStore>, requests: Arc<dyn RequestStore>) -> Self {
        Self { profiles, requests }
    }

    /// Send a request from `sender` to `recipient`
    pub async fn send(&self, sender: &ObjectId, recipient: &ObjectId) -> Result<ConnectionRequestDoc> {
        if sender == recipient {
            return Err(ProfileError::Validation(
                "You can't send a request to yourself".into(),
            ));
        }

        let sender_profile = self
            .profiles
            .get_by_id(sender)
            .await?
            .ok_or_else(|| ProfileError::NotFound("User not found".into()))?;

        if self.profiles.get_by_id(recipient).await?.is_none() {
            return Err(ProfileError::NotFound("Recipient not found".into()));
        }

        if sender_profile.is_connected_to(recipient) {
            return Err(ProfileError::Conflict("You are already connected".into()));
        }

        let existing = self.requests.find_between(sender, recipient).await?;
        if existing.iter().any(|r| r.status == RequestStatus::Pending) {
            warn!(
                "Duplicate connection request between {} and {} refused",
                sender, recipient
            );
            return Err(ProfileError::Conflict(
                "A pending connection request already exists".into(),
            ));
        }

        let request = self
            .requests
            .insert(ConnectionRequestDoc::new(*sender, *recipient))
            .await?;

        info!("Connection request {} sent from {} to {}", request.id, sender, recipient);
        Ok(request)
    }

    /// Accept or reject a pending request addressed to `viewer`.
    ///
    /// Accepting mirrors the connection into both profiles.
    pub async fn respond(
        &self,
        viewer: &ObjectId,
        request_id: &ObjectId,
        response: RequestResponse,
    ) -> Result<ConnectionRequestDoc> {
        let request = self
            .requests
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| ProfileError::NotFound("Connection request not found".into()))?;

        if &request.recipient != viewer {
            return Err(ProfileError::Forbidden(
                "Not authorized to respond to this request".into(),
            ));
        }

        if request.status != RequestStatus::Pending {
            return Err(ProfileError::Conflict(format!(
                "This request has already been {}",
                request.status
            )));
        }

        if response == RequestResponse::Accept {
            // Both ends must exist before the request leaves pending
            for user in [&request.sender, &request.recipient] {
                if self.profiles.get_by_id(user).await?.is_none() {
                    return Err(ProfileError::NotFound("User not found".into()));
                }
            }
        }

        let updated = self
            .requests
            .transition(request_id, RequestStatus::Pending, response.target_status())
            .await?
            .ok_or_else(|| {
                ProfileError::Conflict("This request has already been processed".into())
            })?;

        if response == RequestResponse::Accept {
            if let Err(err) = self.mirror(&updated).await {
                self.reopen(&updated).await;
                return Err(err);
            }
        }

        info!(
            "Connection request {} {} by {}",
            updated.id, updated.status, viewer
        );
        Ok(updated)
    }

    async fn mirror(&self, request: &ConnectionRequestDoc) -> Result<()> {
        self.profiles
            .add_connection(&request.recipient, &request.sender)
            .await?;
        self.profiles
            .add_connection(&request.sender, &request.recipient)
            .await
    }

    /// Put an accepted request back to pending after a failed mirror so
    /// the recipient can answer it again
    async fn reopen(&self, request: &ConnectionRequestDoc) {
        match self
            .requests
            .transition(&request.id, RequestStatus::Accepted, RequestStatus::Pending)
            .await
        {
            Ok(Some(_)) => warn!(
                "Connection request {} reopened after failed accept",
                request.id
            ),
            Ok(None) => warn!(
                "Connection request {} changed before it could be reopened",
                request.id
            ),
            Err(err) => error!(
                "Connection request {} left accepted after failed accept: {}",
                request.id, err
            ),
        }
    }
}

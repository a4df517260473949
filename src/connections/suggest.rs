//! Connection suggestions
//!
//! Picks people the viewer is not yet connected to and annotates each with
//! the relationship status derived from pending/rejected requests.

use bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::connections::status::{resolve_statuses, ConnectionStatus};
use crate::db::schemas::ProfileDoc;
use crate::store::{ProfileStore, RequestStore};
use crate::types::{ProfileError, Result};

/// One suggested person
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedConnection {
    pub id: String,
    pub name: String,
    pub username: String,
    pub avatar_ref: String,
    pub headline: String,
    pub status: ConnectionStatus,
}

impl SuggestedConnection {
    fn from_profile(profile: &ProfileDoc, status: ConnectionStatus) -> Self {
        Self {
            id: profile.id.to_hex(),
            name: profile.name.clone(),
            username: profile.username.clone(),
            avatar_ref: profile.profile_picture.clone(),
            headline: profile.headline.clone(),
            status,
        }
    }
}

/// Builds suggestion lists from the profile and request stores
#[derive(Clone)]
pub struct SuggestionService {
    profiles: Arc<dyn ProfileStore>,
    requests: Arc<dyn RequestStore>,
}

impl SuggestionService {
    pub fn new(profiles: Arc<dyn ProfileStore>, requests: Arc<dyn RequestStore>) -> Self {
        Self { profiles, requests }
    }

    /// Up to `limit` suggestions for `viewer`, ordered by profile id.
    ///
    /// Never contains the viewer or anyone in the viewer's connections. An
    /// empty list is a valid result.
    pub async fn suggest(&self, viewer: &ObjectId, limit: usize) -> Result<Vec<SuggestedConnection>> {
        let viewer_profile = self
            .profiles
            .get_by_id(viewer)
            .await?
            .ok_or_else(|| ProfileError::NotFound("User not found".into()))?;

        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut exclude = Vec::with_capacity(viewer_profile.connections.len() + 1);
        exclude.push(*viewer);
        exclude.extend(viewer_profile.connections.iter().copied());

        let candidates: Vec<ProfileDoc> = self
            .profiles
            .find_candidates(&exclude, limit)
            .await?
            .into_iter()
            .filter(|p| !exclude.contains(&p.id))
            .take(limit)
            .collect();

        if candidates.is_empty() {
            debug!("No suggestions available for {}", viewer);
            return Ok(Vec::new());
        }

        let requests = self.requests.find_touching(viewer).await?;
        let candidate_ids: Vec<ObjectId> = candidates.iter().map(|p| p.id).collect();
        let labels = resolve_statuses(viewer, &candidate_ids, &requests);

        debug!(
            "Suggesting {} profiles to {} ({} requests considered)",
            candidates.len(),
            viewer,
            requests.len()
        );

        Ok(candidates
            .iter()
            .map(|p| {
                let status = labels.get(&p.id).copied().unwrap_or_default();
                SuggestedConnection::from_profile(p, status)
            })
            .collect())
    }
}

//! Storage collaborators
//!
//! The core only talks to profiles and connection requests through these
//! traits, so the same logic runs against MongoDB in production and against
//! the in-memory store in dev mode and tests.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::oid::ObjectId;
use tracing::{debug, warn};

use crate::auth::Role;
use crate::db::schemas::{ConnectionRequestDoc, ProfileDoc, RequestStatus};
use crate::types::{ProfileError, Result};

pub use memory::{MemoryProfileStore, MemoryRequestStore};
pub use mongo::{MongoProfileStore, MongoRequestStore};

/// Profile persistence
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Point lookup; `None` when the id does not resolve
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<ProfileDoc>>;

    /// Up to `limit` profiles whose id is not in `exclude`, ordered by id
    async fn find_candidates(&self, exclude: &[ObjectId], limit: usize) -> Result<Vec<ProfileDoc>>;

    /// Profiles holding at least one pending certification, newest first
    async fn find_with_pending_certifications(&self) -> Result<Vec<ProfileDoc>>;

    /// Every live profile holding `role`, ordered by id
    async fn find_by_role(&self, role: Role) -> Result<Vec<ProfileDoc>>;

    /// Create a profile; returns it as stored
    async fn insert(&self, profile: ProfileDoc) -> Result<ProfileDoc>;

    /// Whole-document replace guarded by `profile.version`.
    ///
    /// Succeeds only if the stored version still equals `profile.version`;
    /// the stored copy then carries `version + 1` and is returned. A stale
    /// version yields `ProfileError::Conflict`, a missing profile
    /// `ProfileError::NotFound`.
    async fn save(&self, profile: &ProfileDoc) -> Result<ProfileDoc>;

    /// Atomically add `other` to `user`'s connections (set semantics)
    async fn add_connection(&self, user: &ObjectId, other: &ObjectId) -> Result<()>;
}

/// Connection request persistence
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<ConnectionRequestDoc>>;

    /// Every request where `user` is sender or recipient, oldest first
    async fn find_touching(&self, user: &ObjectId) -> Result<Vec<ConnectionRequestDoc>>;

    /// Every request between `a` and `b` in either direction
    async fn find_between(&self, a: &ObjectId, b: &ObjectId) -> Result<Vec<ConnectionRequestDoc>>;

    /// Store a new pending request.
    ///
    /// Fails with `ProfileError::Conflict` when the pair already has a
    /// pending request, whichever direction it points.
    async fn insert(&self, request: ConnectionRequestDoc) -> Result<ConnectionRequestDoc>;

    /// Move a request from `from` to `to`.
    ///
    /// Returns `None` when the request is missing or no longer in `from`.
    /// Moving back to pending fails with `ProfileError::Conflict` if the
    /// pair has meanwhile gained another pending request.
    async fn transition(
        &self,
        id: &ObjectId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<Option<ConnectionRequestDoc>>;
}

/// Version-guarded read-modify-write of one profile.
///
/// `mutate` runs against a freshly read copy and returns whether it changed
/// anything; an unchanged profile is returned without writing. On a version
/// conflict the profile is re-read and `mutate` re-applied, up to `retries`
/// times.
pub async fn update_profile<F>(
    profiles: &dyn ProfileStore,
    user_id: &ObjectId,
    retries: u32,
    mut mutate: F,
) -> Result<ProfileDoc>
where
    F: FnMut(&mut ProfileDoc) -> Result<bool>,
{
    let mut attempt: u32 = 0;

    loop {
        let mut profile = profiles
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| ProfileError::NotFound("User not found".into()))?;

        if !mutate(&mut profile)? {
            debug!("Profile {} already in requested state", user_id);
            return Ok(profile);
        }

        match profiles.save(&profile).await {
            Ok(saved) => return Ok(saved),
            Err(err) if err.is_conflict() && attempt < retries => {
                attempt += 1;
                warn!(
                    "Profile {} changed concurrently, retrying ({}/{})",
                    user_id, attempt, retries
                );
            }
            Err(err) => {
                if err.is_conflict() {
                    warn!("Profile {} still conflicting after {} retries", user_id, retries);
                }
                return Err(err);
            }
        }
    }
}

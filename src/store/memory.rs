//! In-memory stores backed by `DashMap`
//!
//! Used when MongoDB is unavailable in dev mode, and by tests. Per-entry
//! locking gives the same single-document atomicity MongoDB provides.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::auth::Role;
use crate::db::schemas::{CertificationStatus, ConnectionRequestDoc, ProfileDoc, RequestStatus};
use crate::store::{ProfileStore, RequestStore};
use crate::types::{ProfileError, Result};

/// Profiles keyed by id
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: DashMap<ObjectId, ProfileDoc>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<ProfileDoc>> {
        Ok(self
            .profiles
            .get(id)
            .filter(|p| !p.metadata.is_deleted)
            .map(|p| p.value().clone()))
    }

    async fn find_candidates(&self, exclude: &[ObjectId], limit: usize) -> Result<Vec<ProfileDoc>> {
        let mut candidates: Vec<ProfileDoc> = self
            .profiles
            .iter()
            .filter(|p| !p.metadata.is_deleted && !exclude.contains(&p.id))
            .map(|p| p.value().clone())
            .collect();

        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn find_with_pending_certifications(&self) -> Result<Vec<ProfileDoc>> {
        let mut found: Vec<ProfileDoc> = self
            .profiles
            .iter()
            .filter(|p| {
                !p.metadata.is_deleted
                    && p.certifications
                        .iter()
                        .any(|c| c.status == CertificationStatus::Pending)
            })
            .map(|p| p.value().clone())
            .collect();

        found.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then(b.id.cmp(&a.id))
        });
        Ok(found)
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<ProfileDoc>> {
        let mut found: Vec<ProfileDoc> = self
            .profiles
            .iter()
            .filter(|p| !p.metadata.is_deleted && p.role == role)
            .map(|p| p.value().clone())
            .collect();

        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn insert(&self, mut profile: ProfileDoc) -> Result<ProfileDoc> {
        if self.profiles.contains_key(&profile.id) {
            return Err(ProfileError::Conflict(format!(
                "Profile {} already exists",
                profile.id
            )));
        }
        let duplicate = self.profiles.iter().any(|p| {
            p.username == profile.username || (!profile.email.is_empty() && p.email == profile.email)
        });
        if duplicate {
            return Err(ProfileError::Conflict("Username or email already taken".into()));
        }

        profile.metadata.stamp_created();
        self.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn save(&self, profile: &ProfileDoc) -> Result<ProfileDoc> {
        let mut entry = self
            .profiles
            .get_mut(&profile.id)
            .filter(|p| !p.metadata.is_deleted)
            .ok_or_else(|| ProfileError::NotFound("User not found".into()))?;

        if entry.version != profile.version {
            debug!(
                "Version conflict on profile {}: stored {} expected {}",
                profile.id, entry.version, profile.version
            );
            return Err(ProfileError::Conflict(format!(
                "Profile {} was modified concurrently",
                profile.id
            )));
        }

        let mut stored = profile.clone();
        stored.version += 1;
        stored.metadata.touch();
        *entry = stored.clone();
        Ok(stored)
    }

    async fn add_connection(&self, user: &ObjectId, other: &ObjectId) -> Result<()> {
        let mut entry = self
            .profiles
            .get_mut(user)
            .filter(|p| !p.metadata.is_deleted)
            .ok_or_else(|| ProfileError::NotFound("User not found".into()))?;

        if entry.add_connection(*other) {
            entry.version += 1;
            entry.metadata.touch();
        }
        Ok(())
    }
}

/// Connection requests keyed by id.
///
/// `pending` maps a pair key to its one pending request. Writers lock the
/// pair slot before touching `requests`, never the other way round.
#[derive(Default)]
pub struct MemoryRequestStore {
    requests: DashMap<ObjectId, ConnectionRequestDoc>,
    pending: DashMap<String, ObjectId>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_sorted<F>(&self, keep: F) -> Vec<ConnectionRequestDoc>
    where
        F: Fn(&ConnectionRequestDoc) -> bool,
    {
        let mut found: Vec<ConnectionRequestDoc> = self
            .requests
            .iter()
            .filter(|r| !r.metadata.is_deleted && keep(r.value()))
            .map(|r| r.value().clone())
            .collect();

        found.sort_by(|a, b| {
            a.created_millis()
                .cmp(&b.created_millis())
                .then(a.id.cmp(&b.id))
        });
        found
    }

    /// Move a request back to pending, provided its pair has no other
    /// pending request
    fn reopen(&self, id: &ObjectId, from: RequestStatus) -> Result<Option<ConnectionRequestDoc>> {
        let Some(pair) = self.requests.get(id).map(|r| r.pair.clone()) else {
            return Ok(None);
        };

        let slot = match self.pending.entry(pair) {
            Entry::Occupied(held) if held.get() != id => {
                return Err(ProfileError::Conflict(
                    "A pending connection request already exists".into(),
                ))
            }
            Entry::Occupied(_) => return Ok(None),
            Entry::Vacant(slot) => slot,
        };

        let Some(mut entry) = self.requests.get_mut(id) else {
            return Ok(None);
        };
        if entry.status != from {
            return Ok(None);
        }

        entry.status = RequestStatus::Pending;
        entry.responded_at = None;
        entry.metadata.touch();
        let reopened = entry.value().clone();
        drop(entry);

        slot.insert(*id);
        Ok(Some(reopened))
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<ConnectionRequestDoc>> {
        Ok(self.requests.get(id).map(|r| r.value().clone()))
    }

    async fn find_touching(&self, user: &ObjectId) -> Result<Vec<ConnectionRequestDoc>> {
        Ok(self.collect_sorted(|r| &r.sender == user || &r.recipient == user))
    }

    async fn find_between(&self, a: &ObjectId, b: &ObjectId) -> Result<Vec<ConnectionRequestDoc>> {
        Ok(self.collect_sorted(|r| r.joins(a, b)))
    }

    async fn insert(&self, mut request: ConnectionRequestDoc) -> Result<ConnectionRequestDoc> {
        // Holding the pair slot makes check-and-insert one step
        let slot = match self.pending.entry(request.pair.clone()) {
            Entry::Occupied(_) => {
                return Err(ProfileError::Conflict(
                    "A pending connection request already exists".into(),
                ))
            }
            Entry::Vacant(slot) => slot,
        };

        request.metadata.stamp_created();
        self.requests.insert(request.id, request.clone());
        slot.insert(request.id);
        Ok(request)
    }

    async fn transition(
        &self,
        id: &ObjectId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<Option<ConnectionRequestDoc>> {
        if to == RequestStatus::Pending {
            return self.reopen(id, from);
        }

        let updated = {
            let Some(mut entry) = self.requests.get_mut(id) else {
                return Ok(None);
            };
            if entry.status != from {
                return Ok(None);
            }

            entry.status = to;
            entry.responded_at = Some(DateTime::now());
            entry.metadata.touch();
            entry.value().clone()
        };

        if from == RequestStatus::Pending {
            self.pending.remove_if(&updated.pair, |_, holder| holder == id);
        }
        Ok(Some(updated))
    }
}

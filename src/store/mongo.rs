//! MongoDB-backed stores

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use tracing::{debug, info};

use crate::auth::Role;
use crate::db::schemas::{
    CertificationStatus, ConnectionRequestDoc, ProfileDoc, RequestStatus,
    CONNECTION_REQUEST_COLLECTION, PROFILE_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::store::{ProfileStore, RequestStore};
use crate::types::{ProfileError, Result};

/// Profiles in the `users` collection
pub struct MongoProfileStore {
    profiles: MongoCollection<ProfileDoc>,
}

impl MongoProfileStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let profiles = mongo.collection::<ProfileDoc>(PROFILE_COLLECTION).await?;
        info!("Profile store ready on '{}.{}'", mongo.db_name(), PROFILE_COLLECTION);
        Ok(Self { profiles })
    }
}

#[async_trait]
impl ProfileStore for MongoProfileStore {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<ProfileDoc>> {
        self.profiles.find_one(doc! { "_id": *id }).await
    }

    async fn find_candidates(&self, exclude: &[ObjectId], limit: usize) -> Result<Vec<ProfileDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .limit(limit as i64)
            .build();

        self.profiles
            .find_many(doc! { "_id": { "$nin": exclude.to_vec() } }, Some(options))
            .await
    }

    async fn find_with_pending_certifications(&self) -> Result<Vec<ProfileDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "metadata.created_at": -1, "_id": -1 })
            .build();

        self.profiles
            .find_many(
                doc! { "certifications.status": CertificationStatus::Pending.to_string() },
                Some(options),
            )
            .await
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<ProfileDoc>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();

        self.profiles
            .find_many(doc! { "role": role.to_string() }, Some(options))
            .await
    }

    async fn insert(&self, profile: ProfileDoc) -> Result<ProfileDoc> {
        let id = profile.id;
        self.profiles.insert_one(profile).await?;
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| ProfileError::Database("Inserted profile not readable".into()))
    }

    async fn save(&self, profile: &ProfileDoc) -> Result<ProfileDoc> {
        let mut stored = profile.clone();
        stored.version = profile.version + 1;

        let matched = self
            .profiles
            .replace_one(
                doc! { "_id": profile.id, "version": profile.version },
                &mut stored,
            )
            .await?;

        if matched == 1 {
            return Ok(stored);
        }

        // Distinguish a stale version from a missing document
        match self.get_by_id(&profile.id).await? {
            Some(current) => {
                debug!(
                    "Version conflict on profile {}: stored {} expected {}",
                    profile.id, current.version, profile.version
                );
                Err(ProfileError::Conflict(format!(
                    "Profile {} was modified concurrently",
                    profile.id
                )))
            }
            None => Err(ProfileError::NotFound("User not found".into())),
        }
    }

    async fn add_connection(&self, user: &ObjectId, other: &ObjectId) -> Result<()> {
        // $addToSet is a no-op for existing members; bump the version only on change
        let result = self
            .profiles
            .update_one(
                doc! { "_id": *user, "connections": { "$ne": *other } },
                doc! {
                    "$addToSet": { "connections": *other },
                    "$inc": { "version": 1_i64 },
                    "$set": { "metadata.updated_at": DateTime::now() }
                },
            )
            .await?;

        if result.matched_count == 0 && self.get_by_id(user).await?.is_none() {
            return Err(ProfileError::NotFound("User not found".into()));
        }
        Ok(())
    }
}

/// Connection requests in the `connectionrequests` collection
pub struct MongoRequestStore {
    requests: MongoCollection<ConnectionRequestDoc>,
}

impl MongoRequestStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let requests = mongo
            .collection::<ConnectionRequestDoc>(CONNECTION_REQUEST_COLLECTION)
            .await?;
        info!(
            "Request store ready on '{}.{}'",
            mongo.db_name(),
            CONNECTION_REQUEST_COLLECTION
        );
        Ok(Self { requests })
    }

    fn oldest_first() -> FindOptions {
        FindOptions::builder()
            .sort(doc! { "metadata.created_at": 1, "_id": 1 })
            .build()
    }
}

#[async_trait]
impl RequestStore for MongoRequestStore {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<ConnectionRequestDoc>> {
        self.requests.find_one(doc! { "_id": *id }).await
    }

    async fn find_touching(&self, user: &ObjectId) -> Result<Vec<ConnectionRequestDoc>> {
        self.requests
            .find_many(
                doc! { "$or": [ { "sender": *user }, { "recipient": *user } ] },
                Some(Self::oldest_first()),
            )
            .await
    }

    async fn find_between(&self, a: &ObjectId, b: &ObjectId) -> Result<Vec<ConnectionRequestDoc>> {
        self.requests
            .find_many(
                doc! { "$or": [
                    { "sender": *a, "recipient": *b },
                    { "sender": *b, "recipient": *a },
                ] },
                Some(Self::oldest_first()),
            )
            .await
    }

    async fn insert(&self, request: ConnectionRequestDoc) -> Result<ConnectionRequestDoc> {
        let id = request.id;
        // pending_pair_unique turns a concurrent duplicate into a Conflict
        self.requests.insert_one(request).await.map_err(pending_conflict)?;
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| ProfileError::Database("Inserted request not readable".into()))
    }

    async fn transition(
        &self,
        id: &ObjectId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<Option<ConnectionRequestDoc>> {
        let now = DateTime::now();
        let update = if to == RequestStatus::Pending {
            doc! {
                "$set": { "status": to.to_string(), "metadata.updated_at": now },
                "$unset": { "responded_at": "" },
            }
        } else {
            doc! {
                "$set": {
                    "status": to.to_string(),
                    "responded_at": now,
                    "metadata.updated_at": now,
                }
            }
        };

        let result = self
            .requests
            .update_one(doc! { "_id": *id, "status": from.to_string() }, update)
            .await
            .map_err(pending_conflict)?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }
}

fn pending_conflict(err: ProfileError) -> ProfileError {
    match err {
        ProfileError::Conflict(_) => {
            ProfileError::Conflict("A pending connection request already exists".into())
        }
        other => other,
    }
}

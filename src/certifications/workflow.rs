//! Certification workflow
//!
//! Every mutation is a read-modify-write of the owning profile, guarded by the
//! profile version. On a version conflict the profile is re-read and the same
//! change re-applied, up to `save_retries` times, so concurrent moderation of
//! two certifications on one profile never loses either decision.

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::certifications::input::{CertificationEdit, NewCertification};
use crate::certifications::state::{moderate, refresh_aggregate, Moderation};
use crate::db::schemas::{CertificationStatus, ProfileDoc};
use crate::store::{update_profile, ProfileStore};
use crate::types::{ProfileError, Result};

#[derive(Clone)]
pub struct CertificationWorkflow {
    profiles: Arc<dyn ProfileStore>,
    save_retries: u32,
}

impl CertificationWorkflow {
    pub fn new(profiles: Arc<dyn ProfileStore>, save_retries: u32) -> Self {
        Self {
            profiles,
            save_retries,
        }
    }

    /// Run `mutate` against a fresh copy of the profile and persist it.
    ///
    /// The aggregate flag is recomputed after every mutation, so a profile
    /// whose flag had drifted is repaired even when `mutate` changes nothing.
    async fn update<F>(&self, user_id: &ObjectId, mut mutate: F) -> Result<ProfileDoc>
    where
        F: FnMut(&mut ProfileDoc) -> Result<bool>,
    {
        update_profile(self.profiles.as_ref(), user_id, self.save_retries, |profile| {
            let changed = mutate(profile)?;
            let aggregate_changed = refresh_aggregate(profile);
            Ok(changed || aggregate_changed)
        })
        .await
    }

    /// Owner adds a certification; it starts pending and unverified
    pub async fn submit(&self, user_id: &ObjectId, input: NewCertification) -> Result<ProfileDoc> {
        let cert = input.into_doc()?;
        let cert_id = cert.id;

        let profile = self
            .update(user_id, |profile| {
                profile.certifications.push(cert.clone());
                Ok(true)
            })
            .await?;

        info!("Certification {} submitted on profile {}", cert_id, user_id);
        Ok(profile)
    }

    /// Owner edits descriptive fields of one certification
    pub async fn edit(
        &self,
        user_id: &ObjectId,
        cert_id: &ObjectId,
        edit: &CertificationEdit,
    ) -> Result<ProfileDoc> {
        let profile = self
            .update(user_id, |profile| {
                let cert = profile
                    .certification_mut(cert_id)
                    .ok_or_else(|| ProfileError::NotFound("Certification not found".into()))?;
                edit.apply(cert)
            })
            .await?;

        debug!("Certification {} on profile {} edited", cert_id, user_id);
        Ok(profile)
    }

    pub async fn approve(&self, user_id: &ObjectId, cert_id: &ObjectId) -> Result<ProfileDoc> {
        self.moderate(user_id, cert_id, Moderation::Approve).await
    }

    pub async fn reject(&self, user_id: &ObjectId, cert_id: &ObjectId) -> Result<ProfileDoc> {
        self.moderate(user_id, cert_id, Moderation::Reject).await
    }

    async fn moderate(
        &self,
        user_id: &ObjectId,
        cert_id: &ObjectId,
        action: Moderation,
    ) -> Result<ProfileDoc> {
        let profile = self
            .update(user_id, |profile| {
                let cert = profile
                    .certification_mut(cert_id)
                    .ok_or_else(|| ProfileError::NotFound("Certification not found".into()))?;
                moderate(cert, action)
            })
            .await?;

        info!(
            "Certification {} on profile {} {} (profile verified: {})",
            cert_id,
            user_id,
            action.verb(),
            profile.is_verified
        );
        Ok(profile)
    }

    /// Moderation queue: profiles holding pending certifications, each
    /// trimmed to just those entries.
    pub async fn pending(&self) -> Result<Vec<ProfileDoc>> {
        let mut profiles = self.profiles.find_with_pending_certifications().await?;
        for profile in &mut profiles {
            profile
                .certifications
                .retain(|c| c.status == CertificationStatus::Pending);
        }
        profiles.retain(|p| !p.certifications.is_empty());
        Ok(profiles)
    }
}

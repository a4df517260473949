//! Admin operations on member accounts
//!
//! Admins can list regular members and promote a member to head user.
//! Promotion goes through the same version-guarded write as certification
//! moderation.

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::info;

use crate::auth::Role;
use crate::db::schemas::{ProfileDoc, UserType};
use crate::store::{update_profile, ProfileStore};
use crate::types::{ProfileError, Result};

#[derive(Clone)]
pub struct MemberAdmin {
    profiles: Arc<dyn ProfileStore>,
    save_retries: u32,
}

impl MemberAdmin {
    pub fn new(profiles: Arc<dyn ProfileStore>, save_retries: u32) -> Self {
        Self {
            profiles,
            save_retries,
        }
    }

    /// Every profile with the `user` role. An empty directory is `NotFound`.
    pub async fn list_members(&self) -> Result<Vec<ProfileDoc>> {
        let members = self.profiles.find_by_role(Role::User).await?;
        if members.is_empty() {
            return Err(ProfileError::NotFound("No users found".into()));
        }
        Ok(members)
    }

    /// Promote a member to head user.
    ///
    /// Only `user` accounts qualify; an existing head is returned unchanged.
    pub async fn assign_head(&self, user_id: &ObjectId) -> Result<ProfileDoc> {
        let profile = update_profile(self.profiles.as_ref(), user_id, self.save_retries, |profile| {
            if profile.role != Role::User {
                return Err(ProfileError::BadRequest(
                    "Only users can be assigned as head users".into(),
                ));
            }
            if profile.user_type == UserType::Head {
                return Ok(false);
            }
            profile.user_type = UserType::Head;
            Ok(true)
        })
        .await?;

        info!("Profile {} assigned as head user", user_id);
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryProfileStore;

    async fn admin_with(profiles: &[ProfileDoc]) -> (Arc<MemoryProfileStore>, MemberAdmin) {
        let store = Arc::new(MemoryProfileStore::new());
        for profile in profiles {
            store.insert(profile.clone()).await.unwrap();
        }
        let admin = MemberAdmin::new(store.clone(), 3);
        (store, admin)
    }

    #[tokio::test]
    async fn test_assign_head_promotes_member() {
        let member = ProfileDoc::new("Ada", "ada", "ada@example.com");
        let (store, admin) = admin_with(&[member.clone()]).await;

        let promoted = admin.assign_head(&member.id).await.unwrap();
        assert_eq!(promoted.user_type, UserType::Head);
        assert_eq!(promoted.version, 1);

        let stored = store.get_by_id(&member.id).await.unwrap().unwrap();
        assert_eq!(stored.user_type, UserType::Head);
    }

    #[tokio::test]
    async fn test_assign_head_twice_writes_once() {
        let member = ProfileDoc::new("Ada", "ada", "ada@example.com");
        let (_, admin) = admin_with(&[member.clone()]).await;

        admin.assign_head(&member.id).await.unwrap();
        let again = admin.assign_head(&member.id).await.unwrap();
        assert_eq!(again.version, 1);
    }

    #[tokio::test]
    async fn test_admin_cannot_become_head() {
        let mut root = ProfileDoc::new("Root", "root", "root@example.com");
        root.role = Role::Admin;
        let (store, admin) = admin_with(&[root.clone()]).await;

        let err = admin.assign_head(&root.id).await.unwrap_err();
        assert!(matches!(err, ProfileError::BadRequest(_)));

        let stored = store.get_by_id(&root.id).await.unwrap().unwrap();
        assert_eq!(stored.user_type, UserType::Regular);
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let (_, admin) = admin_with(&[]).await;
        let err = admin.assign_head(&ObjectId::new()).await.unwrap_err();
        assert!(matches!(err, ProfileError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_members_excludes_admins() {
        let member = ProfileDoc::new("Ada", "ada", "ada@example.com");
        let mut root = ProfileDoc::new("Root", "root", "root@example.com");
        root.role = Role::Admin;
        let (_, admin) = admin_with(&[member.clone(), root]).await;

        let members = admin.list_members().await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, member.id);
    }

    #[tokio::test]
    async fn test_empty_directory_is_not_found() {
        let mut root = ProfileDoc::new("Root", "root", "root@example.com");
        root.role = Role::Admin;
        let (_, admin) = admin_with(&[root]).await;

        let err = admin.list_members().await.unwrap_err();
        assert!(matches!(err, ProfileError::NotFound(_)));
    }
}

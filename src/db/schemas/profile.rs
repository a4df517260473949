//! Profile document schema
//!
//! One document per user. Skills, experience, education and certifications are
//! embedded and owned exclusively by the profile; `is_verified` is derived from
//! the certifications and only ever written by the certification workflow.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for profiles
pub const PROFILE_COLLECTION: &str = "users";

/// Regular members versus group heads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Regular,
    Head,
}

/// Moderation state of a single certification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CertificationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for CertificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificationStatus::Pending => write!(f, "pending"),
            CertificationStatus::Approved => write!(f, "approved"),
            CertificationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Embedded certification
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CertificationDoc {
    /// Assigned at submission, never changes
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub title: String,

    #[serde(default)]
    pub institute: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime>,

    #[serde(default)]
    pub description: String,

    /// Reference to an uploaded evidence file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default)]
    pub status: CertificationStatus,

    /// Mirrors `status == Approved`
    #[serde(default)]
    pub is_verified: bool,
}

/// Embedded work experience entry
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExperienceDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub company: String,
    pub start_date: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Embedded education entry
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EducationDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub school: String,
    pub field_of_study: String,
    pub start_year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
}

/// Profile document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProfileDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    pub username: String,

    pub email: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub user_type: UserType,

    #[serde(default)]
    pub profile_picture: String,

    #[serde(default)]
    pub banner_img: String,

    #[serde(default = "default_headline")]
    pub headline: String,

    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default)]
    pub about: String,

    #[serde(default)]
    pub skills: Vec<String>,

    #[serde(default)]
    pub experience: Vec<ExperienceDoc>,

    #[serde(default)]
    pub education: Vec<EducationDoc>,

    #[serde(default)]
    pub certifications: Vec<CertificationDoc>,

    /// Aggregate of every certification's `is_verified`
    #[serde(default)]
    pub is_verified: bool,

    /// Confirmed connections (symmetric)
    #[serde(default)]
    pub connections: Vec<ObjectId>,

    /// Optimistic concurrency version, bumped on every save
    #[serde(default)]
    pub version: i64,
}

fn default_headline() -> String {
    "Profilehub member".to_string()
}

fn default_location() -> String {
    "Earth".to_string()
}

impl ProfileDoc {
    /// Create a new profile with a fresh id
    pub fn new(name: impl Into<String>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            name: name.into(),
            username: username.into(),
            email: email.into(),
            role: Role::User,
            user_type: UserType::Regular,
            profile_picture: String::new(),
            banner_img: String::new(),
            headline: default_headline(),
            location: default_location(),
            about: String::new(),
            skills: Vec::new(),
            experience: Vec::new(),
            education: Vec::new(),
            certifications: Vec::new(),
            is_verified: false,
            connections: Vec::new(),
            version: 0,
        }
    }

    /// Locate an embedded certification by id
    pub fn certification(&self, cert_id: &ObjectId) -> Option<&CertificationDoc> {
        self.certifications.iter().find(|c| &c.id == cert_id)
    }

    /// Locate an embedded certification by id for mutation
    pub fn certification_mut(&mut self, cert_id: &ObjectId) -> Option<&mut CertificationDoc> {
        self.certifications.iter_mut().find(|c| &c.id == cert_id)
    }

    pub fn is_connected_to(&self, other: &ObjectId) -> bool {
        self.connections.contains(other)
    }

    /// Add a connection if absent; returns whether the set changed
    pub fn add_connection(&mut self, other: ObjectId) -> bool {
        if self.connections.contains(&other) {
            return false;
        }
        self.connections.push(other);
        true
    }
}

impl Default for ProfileDoc {
    fn default() -> Self {
        Self::new(String::new(), String::new(), String::new())
    }
}

impl IntoIndexes for ProfileDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            // Pending-certification moderation queue
            (
                doc! { "certifications.status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("certification_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ProfileDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_is_unverified() {
        let profile = ProfileDoc::new("Ada", "ada", "ada@example.com");
        assert!(!profile.is_verified);
        assert!(profile.certifications.is_empty());
        assert_eq!(profile.version, 0);
        assert_eq!(profile.headline, "Profilehub member");
    }

    #[test]
    fn test_add_connection_is_set_insert() {
        let mut profile = ProfileDoc::new("Ada", "ada", "ada@example.com");
        let other = ObjectId::new();
        assert!(profile.add_connection(other));
        assert!(!profile.add_connection(other));
        assert_eq!(profile.connections.len(), 1);
        assert!(profile.is_connected_to(&other));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&CertificationStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}

//! Database schemas for Profilehub
//!
//! Profiles own their sub-resources (experience, education, certifications)
//! as embedded arrays addressed by id. Connection requests live in their own
//! collection.

mod connection_request;
mod metadata;
mod profile;

pub use connection_request::{
    pair_key, ConnectionRequestDoc, RequestStatus, CONNECTION_REQUEST_COLLECTION,
};
pub use metadata::Metadata;
pub use profile::{
    CertificationDoc, CertificationStatus, EducationDoc, ExperienceDoc, ProfileDoc, UserType,
    PROFILE_COLLECTION,
};

//! Certification state machine and the profile-level verification flag
//!
//! `pending -> approved` and `pending -> rejected` are the only transitions.
//! Repeating the action that produced the current terminal state is a no-op;
//! crossing from one terminal state to the other is a conflict.

use crate::db::schemas::{CertificationDoc, CertificationStatus, ProfileDoc};
use crate::types::{ProfileError, Result};

/// Administrative decision on a certification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moderation {
    Approve,
    Reject,
}

impl Moderation {
    pub fn target(self) -> CertificationStatus {
        match self {
            Moderation::Approve => CertificationStatus::Approved,
            Moderation::Reject => CertificationStatus::Rejected,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Moderation::Approve => "approved",
            Moderation::Reject => "rejected",
        }
    }
}

/// Profile flag: true only when there is at least one certification and all
/// of them are verified.
pub fn aggregate_verified(certifications: &[CertificationDoc]) -> bool {
    !certifications.is_empty() && certifications.iter().all(|c| c.is_verified)
}

/// Recompute `profile.is_verified`; returns whether it changed
pub fn refresh_aggregate(profile: &mut ProfileDoc) -> bool {
    let verified = aggregate_verified(&profile.certifications);
    let changed = profile.is_verified != verified;
    profile.is_verified = verified;
    changed
}

/// Apply a moderation decision to one certification.
///
/// Returns whether the certification changed. Re-applying the current
/// terminal state only repairs a stale `is_verified` flag.
pub fn moderate(cert: &mut CertificationDoc, action: Moderation) -> Result<bool> {
    let target = action.target();
    let verified = target == CertificationStatus::Approved;

    match cert.status {
        CertificationStatus::Pending => {}
        current if current == target => {
            let changed = cert.is_verified != verified;
            cert.is_verified = verified;
            return Ok(changed);
        }
        current => {
            return Err(ProfileError::Conflict(format!(
                "Certification is already {} and cannot be {}",
                current,
                action.verb()
            )));
        }
    }

    cert.status = target;
    cert.is_verified = verified;
    Ok(true)
}

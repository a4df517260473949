//! Certification moderation: submission, owner edits, admin approve/reject and
//! the derived profile verification flag.

pub mod input;
pub mod state;
pub mod workflow;

pub use input::{parse_date, CertificationEdit, NewCertification};
pub use state::{aggregate_verified, moderate, refresh_aggregate, Moderation};
pub use workflow::CertificationWorkflow;

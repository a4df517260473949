//! Profilehub - professional profile service
//!
//! Serves connection suggestions annotated with relationship status, the
//! connection request lifecycle, and moderation of user certifications with a
//! profile-level verification flag derived from them.
//!
//! ## Services
//!
//! - **Connections**: suggestion assembly and status resolution
//! - **Certifications**: submit/edit by owners, approve/reject by admins
//! - **Members**: admin listing and head-user promotion
//! - **Storage**: MongoDB in production, in-memory in dev mode and tests

pub mod auth;
pub mod certifications;
pub mod config;
pub mod connections;
pub mod db;
pub mod members;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{ProfileError, Result};

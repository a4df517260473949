//! Caller identity for Profilehub
//!
//! Provides:
//! - JWT bearer token validation (who is calling)
//! - Roles for separating owner actions from moderation

pub mod jwt;
pub mod permissions;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
pub use permissions::Role;

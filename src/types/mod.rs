//! Shared types for Profilehub

pub mod error;

pub use error::{ProfileError, Result};

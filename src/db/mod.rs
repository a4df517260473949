//! Database layer for Profilehub
//!
//! MongoDB storage for profiles and connection requests.

pub mod mongo;
pub mod schemas;

pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{CertificationDoc, ConnectionRequestDoc, Metadata, ProfileDoc};

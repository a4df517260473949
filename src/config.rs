//! Configuration for Profilehub
//!
//! CLI arguments with environment variable fallbacks, parsed by clap.

use clap::Parser;
use std::net::SocketAddr;

/// Profilehub - professional profile and connections service
#[derive(Parser, Debug, Clone)]
#[command(name = "profilehub")]
#[command(about = "Profile, connection suggestion and certification moderation service")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "profilehub")]
    pub mongodb_db: String,

    /// Enable development mode (in-memory store fallback, dev JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JWT secret for token validation (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds, used when issuing dev tokens
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Suggestions returned when the request gives no limit
    #[arg(long, env = "SUGGESTION_LIMIT", default_value = "10")]
    pub suggestion_limit: usize,

    /// Upper bound for `?limit=` on suggestions
    #[arg(long, env = "MAX_SUGGESTION_LIMIT", default_value = "50")]
    pub max_suggestion_limit: usize,

    /// Retries after a profile version conflict during moderation writes
    #[arg(long, env = "SAVE_RETRIES", default_value = "3")]
    pub save_retries: u32,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.suggestion_limit == 0 {
            return Err("SUGGESTION_LIMIT must be at least 1".to_string());
        }

        if self.suggestion_limit > self.max_suggestion_limit {
            return Err(
                "SUGGESTION_LIMIT must be less than or equal to MAX_SUGGESTION_LIMIT".to_string(),
            );
        }

        if self.save_retries == 0 {
            return Err("SAVE_RETRIES must be at least 1".to_string());
        }

        Ok(())
    }

    /// Resolve a requested suggestion limit against the configured bounds
    pub fn suggestion_limit_for(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.suggestion_limit)
            .clamp(1, self.max_suggestion_limit)
    }
}

//! JWT bearer token validation
//!
//! Tokens are HS256 signed and carry the profile id (`sub`) and the caller's
//! role. Issuing tokens belongs to the login service; `generate_token` exists
//! for dev tooling and tests.

use bson::oid::ObjectId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::Role;
use crate::types::ProfileError;

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Profile id (hex ObjectId)
    pub sub: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    /// Parse the subject as a profile id
    pub fn user_id(&self) -> Result<ObjectId, ProfileError> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| ProfileError::Unauthorized("Token subject is not a user id".into()))
    }
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Returns an error if the secret is empty or shorter than 32 characters
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, ProfileError> {
        if secret.is_empty() {
            return Err(ProfileError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(ProfileError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Validator for dev mode with a fixed, insecure secret
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            expiry_seconds: 3600,
        }
    }

    pub fn generate_token(&self, user_id: &ObjectId, role: Role) -> Result<String, ProfileError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ProfileError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: user_id.to_hex(),
            role,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::default();

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }

    /// Verify a token and require at least `required` role
    pub fn authorize(&self, token: &str, required: Role) -> Result<Claims, ProfileError> {
        let result = self.verify_token(token);
        let claims = match result.claims {
            Some(c) if result.valid => c,
            _ => {
                return Err(ProfileError::Unauthorized(
                    result.error.unwrap_or_else(|| "Invalid token".into()),
                ))
            }
        };

        if !claims.role.allows(required) {
            return Err(ProfileError::Forbidden(format!("{} role required", required)));
        }

        Ok(claims)
    }
}

/// Extract the bearer token from an `Authorization` header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

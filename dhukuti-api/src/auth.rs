//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the caller's user ID. Handlers never see
//! a request without a verified [`Caller`]; the extractor rejects it first.
//!
//! Registration and login live outside this service. The `token`
//! subcommand issues tokens for operators and tests.

use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use dhukuti_core::circle::UserId;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Minimum secret length outside development.
pub const MIN_SECRET_LEN: usize = 32;

const DEV_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Turns a bearer token into a caller identity.
pub trait Authenticator: Send + Sync {
    /// Verifies `token` and returns the user it was issued to.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the token is invalid or expired.
    fn identify(&self, token: &str) -> ApiResult<UserId>;
}

/// Payload stored in the token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User the token was issued to
    pub user_id: i64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT issuer and validator
#[derive(Clone)]
pub struct JwtAuthenticator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtAuthenticator {
    /// Creates an authenticator.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than [`MIN_SECRET_LEN`].
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, ConfigError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "JWT_SECRET must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Creates an authenticator with a fixed, publicly known secret.
    #[must_use]
    pub fn new_dev(expiry_seconds: u64) -> Self {
        Self {
            secret: DEV_SECRET.to_string(),
            expiry_seconds,
        }
    }

    /// Issues a token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if signing fails.
    pub fn issue_token(&self, user_id: UserId) -> ApiResult<String> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            user_id: user_id.0,
            iat: now,
            exp: now.saturating_add(self.expiry_seconds),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {e}")))
    }

    /// Verifies and decodes a token.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` describing why the token was rejected.
    pub fn verify_token(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| {
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                ErrorKind::InvalidSignature => "invalid signature",
                _ => "invalid token",
            };
            ApiError::Unauthorized(msg.to_string())
        })
    }
}

impl Authenticator for JwtAuthenticator {
    fn identify(&self, token: &str) -> ApiResult<UserId> {
        self.verify_token(token).map(|claims| UserId(claims.user_id))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn extract_bearer(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Authenticated caller of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = extract_bearer(header)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        state.auth.identify(token).map(Self)
    }
}

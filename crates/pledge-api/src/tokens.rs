use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use pledge_types::models::{Actor, RefreshToken, Role};
use pledge_types::store::RefreshTokenStore;

use crate::error::ApiError;

/// Access tokens live for 15 minutes.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh tokens live for 7 days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Serialize)]
struct IssuedClaims<'a> {
    user_id: String,
    role: &'a str,
    exp: i64,
}

/// Claims as read back from a verified JWT. Fields are loosely typed here so
/// that a missing or mistyped one is reported as malformed claims rather than
/// as a generic decode failure.
#[derive(Debug, Deserialize)]
struct WireClaims {
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    role: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Verified access-token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: Role,
    pub exp: i64,
}

impl Claims {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user_id,
            role: self.role,
        }
    }

    fn from_wire(wire: WireClaims) -> Result<Self, ApiError> {
        let user_id = wire
            .user_id
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(|raw| raw.parse::<Uuid>().ok())
            .ok_or(ApiError::AuthClaimsMalformed)?;
        let role = wire
            .role
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(|raw| raw.parse::<Role>().ok())
            .ok_or(ApiError::AuthClaimsMalformed)?;
        let exp = wire.exp.ok_or(ApiError::AuthClaimsMalformed)?;
        Ok(Self { user_id, role, exp })
    }
}

/// Issues and validates HS256 access tokens and opaque, persisted refresh tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    refresh_store: Arc<dyn RefreshTokenStore>,
}

impl TokenService {
    pub fn new(secret: &str, refresh_store: Arc<dyn RefreshTokenStore>) -> Result<Self, ApiError> {
        if secret.is_empty() {
            return Err(ApiError::Internal(anyhow::anyhow!(
                "refusing to sign tokens with an empty secret"
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            refresh_store,
        })
    }

    pub fn issue_access_token(&self, user_id: Uuid, role: Role) -> Result<String, ApiError> {
        self.issue_access_token_at(user_id, role, Utc::now())
    }

    pub(crate) fn issue_access_token_at(
        &self,
        user_id: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        let claims = IssuedClaims {
            user_id: user_id.to_string(),
            role: role.as_str(),
            exp: (issued_at + Duration::seconds(ACCESS_TOKEN_TTL_SECS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("token signing failed: {}", e)))
    }

    /// Generates a random refresh token and persists it with its expiry.
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, ApiError> {
        let bytes: [u8; REFRESH_TOKEN_BYTES] = rand::random();
        let record = RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token: B64.encode(bytes),
            expires_at: Utc::now() + Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        };
        self.refresh_store.insert_refresh_token(&record)?;
        Ok(record.token)
    }

    /// Stateless: checks signature, structure and expiry only.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<WireClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Rejected access token: {}", e);
            match e.kind() {
                JwtErrorKind::ExpiredSignature => ApiError::ExpiredToken,
                JwtErrorKind::MissingRequiredClaim(_) => ApiError::AuthClaimsMalformed,
                _ => ApiError::InvalidToken,
            }
        })?;
        Claims::from_wire(data.claims)
    }

    /// Looks the token up in the store. Expired records are deleted on sight.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshToken, ApiError> {
        let record = self
            .refresh_store
            .refresh_token(token)?
            .ok_or(ApiError::InvalidToken)?;

        if record.is_expired_at(Utc::now()) {
            self.refresh_store.delete_refresh_token(token)?;
            debug!("Evicted expired refresh token for user {}", record.user_id);
            return Err(ApiError::ExpiredToken);
        }

        Ok(record)
    }

    /// Deletes a refresh token. Unknown tokens are not an error.
    pub fn revoke_refresh_token(&self, token: &str) -> Result<bool, ApiError> {
        Ok(self.refresh_store.delete_refresh_token(token)?)
    }
}

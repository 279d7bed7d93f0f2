use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};

use pledge_db::Database;
use pledge_types::api::{
    AccessTokenResponse, LoginRequest, RefreshRequest, SignupRequest, TokenPair, UserResponse,
};
use pledge_types::store::{PromiseStore, RefreshTokenStore, UserStore};

use crate::directory::UserDirectory;
use crate::error::{ApiError, blocking};
use crate::lifecycle::PromiseEngine;
use crate::tokens::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub tokens: TokenService,
    pub users: UserDirectory,
    pub promises: PromiseEngine,
}

impl AppStateInner {
    pub fn from_stores(
        jwt_secret: &str,
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        promises: Arc<dyn PromiseStore>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            tokens: TokenService::new(jwt_secret, refresh_tokens)?,
            users: UserDirectory::new(users),
            promises: PromiseEngine::new(promises),
        })
    }

    /// One SQLite database backing every store.
    pub fn with_database(db: Arc<Database>, jwt_secret: &str) -> Result<Self, ApiError> {
        Self::from_stores(jwt_secret, db.clone(), db.clone(), db)
    }

    /// Verify credentials and hand out a fresh token pair.
    pub fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        let user = self.users.authenticate(email, password)?;
        let access_token = self.tokens.issue_access_token(user.id, user.role)?;
        let refresh_token = self.tokens.issue_refresh_token(user.id)?;
        info!("User {} logged in", user.id);
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// The new access token carries the user's current role, so a role
    /// change takes effect at the next refresh.
    pub fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse, ApiError> {
        let record = self.tokens.validate_refresh_token(refresh_token)?;
        let user = match self.users.get_user(record.user_id) {
            Ok(user) => user,
            Err(ApiError::UserNotFound) => {
                warn!("Refresh token presented for deleted user {}", record.user_id);
                self.tokens.revoke_refresh_token(refresh_token)?;
                return Err(ApiError::InvalidToken);
            }
            Err(e) => return Err(e),
        };
        let access_token = self.tokens.issue_access_token(user.id, user.role)?;
        Ok(AccessTokenResponse { access_token })
    }

    pub fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        if self.tokens.revoke_refresh_token(refresh_token)? {
            info!("Refresh token revoked");
        }
        Ok(())
    }
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(move || state.users.create_user(&req.username, &req.email, &req.password))
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = blocking(move || state.login(&req.email, &req.password)).await?;
    Ok(Json(pair))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let token = blocking(move || state.refresh(&req.refresh_token)).await?;
    Ok(Json(token))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(move || state.logout(&req.refresh_token)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> &'static str {
    "ok"
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use pledge_types::api::ErrorResponse;
use pledge_types::models::PromiseStatus;
use pledge_types::store::StoreError;

use crate::directory::{MAX_USERNAME_LEN, MIN_PASSWORD_LEN, MIN_USERNAME_LEN};
use crate::lifecycle::MIN_TITLE_LEN;

/// Coarse classification of every failure, used at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    InvalidStatusTransition,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // -- Validation --
    #[error("title must be at least {} characters", MIN_TITLE_LEN)]
    InvalidTitle,

    #[error("a root promise needs a deadline")]
    MissingDeadline,

    #[error("progress must be 'in_progress' or 'completed'")]
    InvalidStatus,

    #[error("progress can only be attached to a root promise")]
    InvalidParent,

    #[error("{0} cannot be changed")]
    ImmutableField(&'static str),

    #[error("username must be {} to {} characters", MIN_USERNAME_LEN, MAX_USERNAME_LEN)]
    InvalidUsername,

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    InvalidPassword,

    // -- Authentication --
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    ExpiredToken,

    #[error("token claims are malformed")]
    AuthClaimsMalformed,

    // -- Authorization --
    #[error("you cannot edit this promise")]
    NotAllowedToUpdate,

    #[error("forbidden")]
    Forbidden,

    // -- Not found --
    #[error("user not found")]
    UserNotFound,

    #[error("promise not found")]
    PromiseNotFound,

    #[error("parent promise not found")]
    ParentNotFound,

    /// A private promise the caller may not see. Rendered exactly like
    /// `PromiseNotFound` so its existence does not leak.
    #[error("promise not found")]
    NotVisible,

    // -- Conflict --
    #[error("email is already in use")]
    EmailTaken,

    #[error("username is already taken")]
    UsernameTaken,

    #[error("{0}")]
    Conflict(String),

    #[error("cannot move a promise from {from} to {to}")]
    InvalidStatusTransition {
        from: PromiseStatus,
        to: PromiseStatus,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        use ApiError::*;
        match self {
            InvalidTitle | MissingDeadline | InvalidStatus | InvalidParent | ImmutableField(_)
            | InvalidUsername | InvalidEmail | InvalidPassword => {
                ErrorKind::Validation
            }
            MissingToken | InvalidCredentials | InvalidToken | ExpiredToken
            | AuthClaimsMalformed => ErrorKind::Authentication,
            NotAllowedToUpdate | Forbidden => ErrorKind::Authorization,
            UserNotFound | PromiseNotFound | ParentNotFound | NotVisible => ErrorKind::NotFound,
            EmailTaken | UsernameTaken | Conflict(_) => ErrorKind::Conflict,
            InvalidStatusTransition { .. } => ErrorKind::InvalidStatusTransition,
            Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidStatusTransition => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => ApiError::Conflict(detail),
            StoreError::Backend(e) => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            // Store-level detail names tables and columns
            ApiError::Conflict(_) => "resource already exists".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Run a synchronous service call off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
    })?
}

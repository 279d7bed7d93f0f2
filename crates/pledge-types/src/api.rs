use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Promise, PromiseStatus, Role, User};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

// -- Users --

/// Partial update of a user. `role` is honoured for admins only.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub role: Option<Role>,
}

/// Full view of an account, returned to its owner and to admins.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.audit.created_at,
            updated_at: user.audit.updated_at,
        }
    }
}

/// What any caller may learn about another account.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicUserResponse {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: user.audit.created_at,
        }
    }
}

// -- Promises --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePromiseRequest {
    /// `None` creates a root promise, `Some` a progress entry under that root.
    pub parent_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Required for roots; ignored for progress entries, which inherit the root's.
    pub deadline: Option<DateTime<Utc>>,
    /// Required for progress entries; roots always start pending.
    pub status: Option<PromiseStatus>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePromiseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<PromiseStatus>,
    pub deadline: Option<DateTime<Utc>>,
    pub is_private: Option<bool>,
}

pub type PromiseResponse = Promise;

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

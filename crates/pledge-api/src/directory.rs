use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use pledge_types::api::UpdateUserRequest;
use pledge_types::models::{Actor, AuditFields, Role, User};
use pledge_types::store::{StoreError, UserStore};

use crate::credentials;
use crate::error::ApiError;
use crate::policy;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Accounts: signup, credential checks, self-service and admin edits.
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn create_user(&self, username: &str, email: &str, password: &str) -> Result<User, ApiError> {
        let username = validate_username(username)?;
        let email = email.trim();
        if email.len() < 3 || !email.contains('@') {
            return Err(ApiError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::InvalidPassword);
        }

        if self.store.email_exists(email)? {
            return Err(ApiError::EmailTaken);
        }
        if self.store.username_exists(&username)? {
            return Err(ApiError::UsernameTaken);
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            email: email.to_string(),
            password_hash: credentials::hash_password(password)?,
            role: Role::User,
            audit: AuditFields::new(Utc::now()),
        };

        // A concurrent signup can pass the checks above; the UNIQUE
        // constraints decide the race and the loser gets a conflict.
        self.store.insert_user(&user).map_err(conflict_as_taken)?;

        info!("User {} signed up as {}", user.id, user.username);
        Ok(user)
    }

    /// Unknown email and wrong password produce the same error.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let Some(user) = self.store.user_by_email(email.trim())? else {
            warn!("Login attempt for unknown email");
            return Err(ApiError::InvalidCredentials);
        };

        if !credentials::verify_password(&user.password_hash, password) {
            warn!("Wrong password for user {}", user.id);
            return Err(ApiError::InvalidCredentials);
        }

        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<User, ApiError> {
        self.store.user_by_id(id)?.ok_or(ApiError::UserNotFound)
    }

    pub fn find_by_username(&self, username: &str) -> Result<User, ApiError> {
        self.store
            .user_by_username(username.trim())?
            .ok_or(ApiError::UserNotFound)
    }

    pub fn list_users(&self, actor: &Actor) -> Result<Vec<User>, ApiError> {
        if !policy::can_view_everything(actor) {
            return Err(ApiError::Forbidden);
        }
        Ok(self.store.list_users()?)
    }

    /// A `role` in the patch from a non-admin rejects the whole patch.
    pub fn update_user(
        &self,
        actor: &Actor,
        target_id: Uuid,
        patch: UpdateUserRequest,
    ) -> Result<User, ApiError> {
        if !policy::can_edit_user(actor, target_id) {
            return Err(ApiError::Forbidden);
        }
        if patch.role.is_some() && !policy::can_assign_role(actor) {
            return Err(ApiError::Forbidden);
        }

        let mut user = self.get_user(target_id)?;

        if let Some(requested) = patch.username {
            let username = validate_username(&requested)?;
            if username != user.username {
                if self.store.username_exists(&username)? {
                    return Err(ApiError::UsernameTaken);
                }
                user.username = username;
            }
        }

        if let Some(role) = patch.role {
            if role != user.role {
                info!("User {} role {} -> {} by {}", user.id, user.role, role, actor.id);
            }
            user.role = role;
        }

        user.audit.touch(Utc::now());
        self.store.update_user(&user).map_err(conflict_as_taken)?;
        Ok(user)
    }

    /// Hard delete. The user's promises and refresh tokens are left in place.
    pub fn delete_user(&self, actor: &Actor, target_id: Uuid) -> Result<(), ApiError> {
        if !policy::can_edit_user(actor, target_id) {
            return Err(ApiError::Forbidden);
        }
        if !self.store.delete_user(target_id)? {
            return Err(ApiError::UserNotFound);
        }
        info!("User {} deleted by {}", target_id, actor.id);
        Ok(())
    }
}

fn validate_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ApiError::InvalidUsername);
    }
    Ok(username.to_string())
}

fn conflict_as_taken(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(detail) if detail.contains("users.username") => ApiError::UsernameTaken,
        StoreError::Conflict(detail) if detail.contains("users.email") => ApiError::EmailTaken,
        other => other.into(),
    }
}

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use pledge_types::api::{PublicUserResponse, UpdateUserRequest, UserResponse};
use pledge_types::models::Actor;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn get_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(move || state.users.get_user(actor.id)).await?;
    Ok(Json(user.into()))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(patch): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(move || state.users.update_user(&actor, actor.id, patch)).await?;
    Ok(Json(user.into()))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<StatusCode, ApiError> {
    blocking(move || state.users.delete_user(&actor, actor.id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicUserResponse>, ApiError> {
    let user = blocking(move || state.users.get_user(user_id)).await?;
    Ok(Json(user.into()))
}

pub async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<PublicUserResponse>, ApiError> {
    let user = blocking(move || state.users.find_by_username(&username)).await?;
    Ok(Json(user.into()))
}

// -- Admin --

pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = blocking(move || state.users.list_users(&actor)).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn admin_update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<Uuid>,
    Json(patch): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(move || state.users.update_user(&actor, user_id, patch)).await?;
    Ok(Json(user.into()))
}

pub async fn admin_delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    blocking(move || state.users.delete_user(&actor, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

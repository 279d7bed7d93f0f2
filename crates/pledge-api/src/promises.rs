use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use pledge_types::api::{CreatePromiseRequest, PromiseResponse, UpdatePromiseRequest};
use pledge_types::models::Actor;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn create_promise(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreatePromiseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let promise = blocking(move || state.promises.create(&actor, req)).await?;
    Ok((StatusCode::CREATED, Json(promise)))
}

/// Public promises, or every promise for an admin.
pub async fn list_promises(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<PromiseResponse>>, ApiError> {
    let promises = blocking(move || state.promises.list_all(&actor)).await?;
    Ok(Json(promises))
}

pub async fn get_promise(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(promise_id): Path<Uuid>,
) -> Result<Json<PromiseResponse>, ApiError> {
    let promise = blocking(move || state.promises.get(&actor, promise_id)).await?;
    Ok(Json(promise))
}

pub async fn update_promise(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(promise_id): Path<Uuid>,
    Json(patch): Json<UpdatePromiseRequest>,
) -> Result<Json<PromiseResponse>, ApiError> {
    let promise = blocking(move || state.promises.update(&actor, promise_id, patch)).await?;
    Ok(Json(promise))
}

pub async fn delete_promise(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(promise_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    blocking(move || state.promises.delete(&actor, promise_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_progress(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(promise_id): Path<Uuid>,
) -> Result<Json<Vec<PromiseResponse>>, ApiError> {
    let entries = blocking(move || state.promises.progress(&actor, promise_id)).await?;
    Ok(Json(entries))
}

pub async fn list_user_promises(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<PromiseResponse>>, ApiError> {
    let promises = blocking(move || state.promises.list_by_user(&actor, user_id)).await?;
    Ok(Json(promises))
}

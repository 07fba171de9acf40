//! Account endpoints: registration, login and admin deprovisioning.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{UserId, UserProfile};
use domain::{AccountSession, RegisterAccount};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::AdminUser;
use crate::{AppState, AppStore};

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// -- Handlers --

/// POST /api/users: register a new account and sign it in.
#[tracing::instrument(skip(state, payload))]
pub async fn register<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountSession>), ApiError> {
    let Json(req) = payload?;
    let session = state
        .accounts
        .register(RegisterAccount::new(req.name, req.email, req.password))
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/users/login
#[tracing::instrument(skip(state, payload))]
pub async fn login<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AccountSession>, ApiError> {
    let Json(req) = payload?;
    let session = state.accounts.login(&req.email, &req.password).await?;
    Ok(Json(session))
}

/// DELETE /api/users/:id: remove a user and everything they own.
#[tracing::instrument(skip(state))]
pub async fn remove<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
    state.accounts.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/users/:id/disable
#[tracing::instrument(skip(state))]
pub async fn disable<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<UserId>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.accounts.disable_user(id).await?))
}

/// PATCH /api/users/:id/restore
#[tracing::instrument(skip(state))]
pub async fn restore<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<UserId>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.accounts.restore_user(id).await?))
}

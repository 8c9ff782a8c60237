use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    dtos::{CreateAccountRequest, UpdateAccountRequest},
    middleware::AuthUser,
    services::{CreateAccountInput, ServiceError, UpdateAccountInput},
    utils::{JsonBody, Password},
    AppState,
};

/// POST /users
pub async fn create_account(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateAccountRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state
        .accounts
        .create(CreateAccountInput {
            name: req.name,
            email: req.email,
            password: Password::new(req.password),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /users
pub async fn list_accounts(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    tracing::debug!(caller = %caller.sub, "Listing accounts");
    Ok(Json(state.accounts.list().await?))
}

/// GET /users/:id
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.accounts.get(&id).await?))
}

/// PUT /users/:id
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    tracing::debug!(caller = %caller.sub, account_id = %id, "Updating account");
    let view = state
        .accounts
        .update(
            &id,
            UpdateAccountInput {
                name: req.name,
                email: req.email,
                password: req.password.map(Password::new),
            },
        )
        .await?;

    Ok(Json(view))
}

/// DELETE /users/:id
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    tracing::debug!(caller = %caller.sub, account_id = %id, "Deleting account");
    state.accounts.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

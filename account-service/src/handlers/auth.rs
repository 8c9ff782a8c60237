use axum::{extract::State, Json};

use crate::{
    dtos::{LoginRequest, LoginResponse},
    services::ServiceError,
    utils::{JsonBody, Password},
    AppState,
};

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let outcome = state
        .auth
        .login(&req.email, Password::new(req.password))
        .await?;

    Ok(Json(LoginResponse {
        token: outcome.token,
        token_type: "Bearer".to_string(),
        expires_in: outcome.expires_in,
        user: outcome.account,
    }))
}

use axum::{
    extract::{Path, State},
    response::Json,
};
use validator::Validate;

use crate::{
    models::user::{
        ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
        ResetPasswordRequest, UserResponse,
    },
    services::auth::AuthService,
    utils::errors::AppError,
    AppState,
};

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.config.clone(), state.mailer.clone())
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let user = auth_service(&state).register(payload).await?;
    Ok(Json(user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let response = auth_service(&state).login(payload).await?;
    Ok(Json(response))
}

/// Always answers the same way so callers cannot probe which emails exist.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;

    auth_service(&state).forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse::new(
        "If that email is registered, a reset link has been sent",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;

    auth_service(&state).reset_password(payload).await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    auth_service(&state).verify_email(&token).await?;
    Ok(Json(MessageResponse::new("Email verified")))
}

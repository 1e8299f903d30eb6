use axum::{
    extract::{Extension, State},
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::AuthUser,
    models::user::{ChangePasswordRequest, MessageResponse, UpdateProfileRequest, UserResponse},
    services::auth::AuthService,
    utils::errors::AppError,
    AppState,
};

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.config.clone(), state.mailer.clone())
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    let user = auth_service(&state).get_profile(&auth_user).await?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let user = auth_service(&state).update_profile(&auth_user, payload).await?;
    Ok(Json(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;

    auth_service(&state).change_password(&auth_user, payload).await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, AppError> {
    auth_service(&state).resend_verification(&auth_user).await?;
    Ok(Json(MessageResponse::new("Verification email sent")))
}

use axum::{
    extract::{Extension, Path, State},
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::AuthUser,
    models::{
        analytics::AnalyticsResponse,
        user::{AdminUserResponse, CreateTeacherRequest, MessageResponse, UpdateRoleRequest, UserResponse},
    },
    services::admin::AdminService,
    utils::errors::AppError,
    AppState,
};

pub async fn create_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateTeacherRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let admin_service = AdminService::new(state.db.clone());
    let teacher = admin_service.create_teacher(&auth_user, payload).await?;

    Ok(Json(teacher))
}

pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminUserResponse>>, AppError> {
    let admin_service = AdminService::new(state.db.clone());
    let users = admin_service.list_users().await?;

    Ok(Json(users))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    let admin_service = AdminService::new(state.db.clone());
    admin_service.delete_user(&auth_user, user_id).await?;

    Ok(Json(MessageResponse::new("User deleted")))
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let admin_service = AdminService::new(state.db.clone());
    let user = admin_service.update_role(&auth_user, user_id, payload.role).await?;

    Ok(Json(user))
}

pub async fn toggle_block(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
) -> Result<Json<UserResponse>, AppError> {
    let admin_service = AdminService::new(state.db.clone());
    let user = admin_service.toggle_block(&auth_user, user_id).await?;

    Ok(Json(user))
}

pub async fn get_analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let admin_service = AdminService::new(state.db.clone());
    let analytics = admin_service.analytics().await?;

    Ok(Json(analytics))
}

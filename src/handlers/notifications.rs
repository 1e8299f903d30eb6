use axum::{
    extract::{Extension, Path, State},
    response::Json,
};

use crate::{
    middleware::auth::AuthUser,
    models::notification::Notification,
    services::notification::NotificationService,
    utils::errors::AppError,
    AppState,
};

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notification_service = NotificationService::new(state.db.clone());
    let notifications = notification_service.list_mine(&auth_user).await?;

    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(notification_id): Path<i32>,
) -> Result<Json<Notification>, AppError> {
    let notification_service = NotificationService::new(state.db.clone());
    let notification = notification_service.mark_read(&auth_user, notification_id).await?;

    Ok(Json(notification))
}

use axum::{
    extract::{Extension, Path, State},
    response::Json,
};

use crate::{
    middleware::auth::AuthUser,
    models::enrollment::ProgressResponse,
    services::progress::ProgressService,
    utils::errors::AppError,
    AppState,
};

pub async fn complete_lesson(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((course_id, lesson_id)): Path<(i32, i32)>,
) -> Result<Json<ProgressResponse>, AppError> {
    let progress_service = ProgressService::new(state.db.clone());
    let progress = progress_service
        .mark_lesson_completed(&auth_user, course_id, lesson_id)
        .await?;

    Ok(Json(progress))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<ProgressResponse>, AppError> {
    let progress_service = ProgressService::new(state.db.clone());
    let progress = progress_service.get_progress(&auth_user, course_id).await?;

    Ok(Json(progress))
}

use axum::{
    extract::{Extension, Path, State},
    response::Json,
};

use crate::{
    middleware::auth::AuthUser,
    models::submission::{McqSubmissionResponse, SubmitMcqRequest},
    services::mcq::McqService,
    utils::errors::AppError,
    AppState,
};

pub async fn submit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<SubmitMcqRequest>,
) -> Result<Json<McqSubmissionResponse>, AppError> {
    let mcq_service = McqService::new(state.db.clone());
    let result = mcq_service.submit(&auth_user, payload).await?;

    Ok(Json(result))
}

/// Best attempt so far for the task.
pub async fn get_submission(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> Result<Json<McqSubmissionResponse>, AppError> {
    let mcq_service = McqService::new(state.db.clone());
    let result = mcq_service.best_submission(&auth_user, task_id).await?;

    Ok(Json(result))
}

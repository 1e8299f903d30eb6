use axum::{
    extract::{Extension, Multipart, Path, State},
    response::Json,
};
use validator::Validate;

use super::read_file_field;
use crate::{
    middleware::auth::AuthUser,
    models::submission::{ReviewTheoryRequest, TheorySubmissionResponse},
    services::theory::TheoryService,
    utils::errors::AppError,
    AppState,
};

fn theory_service(state: &AppState) -> TheoryService {
    TheoryService::new(state.db.clone(), state.storage.clone())
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<TheorySubmissionResponse>, AppError> {
    let (file_name, data) = read_file_field(&mut multipart).await?;

    let submission = theory_service(&state)
        .submit(&auth_user, task_id, &file_name, &data)
        .await?;
    Ok(Json(submission))
}

pub async fn my_submission(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> Result<Json<TheorySubmissionResponse>, AppError> {
    let submission = theory_service(&state).my_submission(&auth_user, task_id).await?;
    Ok(Json(submission))
}

pub async fn list_for_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> Result<Json<Vec<TheorySubmissionResponse>>, AppError> {
    let submissions = theory_service(&state).list_for_task(&auth_user, task_id).await?;
    Ok(Json(submissions))
}

pub async fn review(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(submission_id): Path<i32>,
    Json(payload): Json<ReviewTheoryRequest>,
) -> Result<Json<TheorySubmissionResponse>, AppError> {
    payload.validate()?;

    let submission = theory_service(&state)
        .review(&auth_user, submission_id, payload)
        .await?;
    Ok(Json(submission))
}

use axum::{
    extract::{Extension, Path, State},
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::AuthUser,
    models::{
        task::{CreateTaskRequest, TaskResponse},
        user::MessageResponse,
    },
    services::task::TaskService,
    utils::errors::AppError,
    AppState,
};

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    payload.validate()?;

    let task_service = TaskService::new(state.db.clone());
    let task = task_service.create(&auth_user, course_id, payload).await?;

    Ok(Json(task))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<Vec<TaskResponse>>, AppError> {
    let task_service = TaskService::new(state.db.clone());
    let tasks = task_service.list_for_course(&auth_user, course_id).await?;

    Ok(Json(tasks))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    let task_service = TaskService::new(state.db.clone());
    task_service.complete(&auth_user, task_id).await?;

    Ok(Json(MessageResponse::new("Task marked as completed")))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    let task_service = TaskService::new(state.db.clone());
    task_service.delete(&auth_user, task_id).await?;

    Ok(Json(MessageResponse::new("Task deleted")))
}

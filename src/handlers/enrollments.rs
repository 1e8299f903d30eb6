use axum::{
    extract::{Extension, Path, State},
    response::Json,
};

use crate::{
    middleware::auth::AuthUser,
    models::enrollment::{EnrollmentResponse, EnrollmentStatusResponse},
    services::enrollment::EnrollmentService,
    utils::errors::AppError,
    AppState,
};

fn enrollment_service(state: &AppState) -> EnrollmentService {
    EnrollmentService::new(state.db.clone(), state.mailer.clone())
}

pub async fn enroll(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<EnrollmentResponse>, AppError> {
    let enrollment = enrollment_service(&state).enroll(&auth_user, course_id).await?;
    Ok(Json(enrollment))
}

pub async fn my_enrollments(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<EnrollmentResponse>>, AppError> {
    let enrollments = enrollment_service(&state).my_enrollments(&auth_user).await?;
    Ok(Json(enrollments))
}

pub async fn enrollment_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<EnrollmentStatusResponse>, AppError> {
    let enrolled = enrollment_service(&state).is_enrolled(&auth_user, course_id).await?;
    Ok(Json(EnrollmentStatusResponse { course_id, enrolled }))
}

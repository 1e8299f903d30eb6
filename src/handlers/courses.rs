use axum::{
    extract::{Extension, Multipart, Path, State},
    response::Json,
};
use validator::Validate;

use super::read_file_field;
use crate::{
    middleware::auth::AuthUser,
    models::{
        course::{
            CoursePreviewResponse, CourseResponse, CreateCourseRequest, CreateLessonRequest,
            LessonResponse, UpdateCourseRequest, UpdateLessonRequest, VideoUploadResponse,
        },
        enrollment::EnrolledStudentResponse,
        user::MessageResponse,
    },
    services::{course::CourseService, enrollment::EnrollmentService},
    utils::errors::AppError,
    AppState,
};

fn course_service(state: &AppState) -> CourseService {
    CourseService::new(state.db.clone(), state.mailer.clone(), state.storage.clone())
}

pub async fn list_published(
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseResponse>>, AppError> {
    let courses = course_service(&state).list_published().await?;
    Ok(Json(courses))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> Result<Json<CourseResponse>, AppError> {
    let course = course_service(&state).get_published(course_id).await?;
    Ok(Json(course))
}

pub async fn preview(
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> Result<Json<CoursePreviewResponse>, AppError> {
    let preview = course_service(&state).preview(course_id).await?;
    Ok(Json(preview))
}

pub async fn create_course(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    payload.validate()?;

    let course = course_service(&state).create(&auth_user, payload).await?;
    Ok(Json(course))
}

pub async fn update_course(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    payload.validate()?;

    let course = course_service(&state).update(&auth_user, course_id, payload).await?;
    Ok(Json(course))
}

pub async fn delete_course(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    course_service(&state).delete(&auth_user, course_id).await?;
    Ok(Json(MessageResponse::new("Course deleted")))
}

pub async fn toggle_publish(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<CourseResponse>, AppError> {
    let course = course_service(&state).toggle_publish(&auth_user, course_id).await?;
    Ok(Json(course))
}

pub async fn my_courses(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<CourseResponse>>, AppError> {
    let courses = course_service(&state).list_mine(&auth_user).await?;
    Ok(Json(courses))
}

pub async fn course_students(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<Vec<EnrolledStudentResponse>>, AppError> {
    let enrollment_service = EnrollmentService::new(state.db.clone(), state.mailer.clone());
    let students = enrollment_service.students_in_course(&auth_user, course_id).await?;

    Ok(Json(students))
}

pub async fn list_lessons(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<Vec<LessonResponse>>, AppError> {
    let lessons = course_service(&state).list_lessons(&auth_user, course_id).await?;
    Ok(Json(lessons))
}

pub async fn add_lesson(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<Json<LessonResponse>, AppError> {
    payload.validate()?;

    let lesson = course_service(&state).add_lesson(&auth_user, course_id, payload).await?;
    Ok(Json(lesson))
}

pub async fn update_lesson(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((course_id, lesson_id)): Path<(i32, i32)>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<Json<LessonResponse>, AppError> {
    payload.validate()?;

    let lesson = course_service(&state)
        .update_lesson(&auth_user, course_id, lesson_id, payload)
        .await?;
    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((course_id, lesson_id)): Path<(i32, i32)>,
) -> Result<Json<MessageResponse>, AppError> {
    course_service(&state)
        .delete_lesson(&auth_user, course_id, lesson_id)
        .await?;
    Ok(Json(MessageResponse::new("Lesson deleted")))
}

pub async fn upload_video(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<VideoUploadResponse>, AppError> {
    let (file_name, data) = read_file_field(&mut multipart).await?;

    let uploaded = course_service(&state)
        .upload_video(&auth_user, &file_name, &data)
        .await?;
    Ok(Json(uploaded))
}

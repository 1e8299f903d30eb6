use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub teacher_id: i32,
    pub paid: bool,
    pub price: f64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub video_url: Option<String>,
    pub lesson_order: i32,
    pub day_number: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[serde(default)]
    pub paid: bool,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    pub paid: Option<bool>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
}

/// Flat course row joined with the owning teacher's name.
#[derive(Debug, Serialize, FromRow)]
pub struct CourseResponse {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub teacher_id: i32,
    pub teacher_name: String,
    pub paid: bool,
    pub price: f64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct LessonPreview {
    pub id: i32,
    pub title: String,
    pub lesson_order: i32,
    pub day_number: i32,
}

#[derive(Debug, Serialize)]
pub struct CoursePreviewResponse {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub paid: bool,
    pub price: f64,
    pub teacher_name: String,
    pub lessons: Vec<LessonPreview>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub video_url: Option<String>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub lesson_order: i32,
    #[validate(range(min = 1))]
    pub day_number: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub video_url: Option<String>,
    #[validate(range(min = 0))]
    pub lesson_order: Option<i32>,
    #[validate(range(min = 1))]
    pub day_number: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct LessonResponse {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub video_url: Option<String>,
    pub lesson_order: i32,
    pub day_number: i32,
}

impl From<Lesson> for LessonResponse {
    fn from(lesson: Lesson) -> Self {
        Self {
            id: lesson.id,
            course_id: lesson.course_id,
            title: lesson.title,
            video_url: lesson.video_url,
            lesson_order: lesson.lesson_order,
            day_number: lesson.day_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoUploadResponse {
    pub url: String,
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Enrollment {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub enrolled_at: DateTime<Utc>,
    pub current_day: i32,
}

/// One enrollment of the calling student, with counts for the percentage.
#[derive(Debug, FromRow)]
pub struct EnrollmentRow {
    pub course_id: i32,
    pub course_title: String,
    pub teacher_name: String,
    pub enrolled_at: DateTime<Utc>,
    pub current_day: i32,
    pub completed_lessons: i64,
    pub total_lessons: i64,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub course_id: i32,
    pub course_title: String,
    pub enrolled_at: DateTime<Utc>,
    pub teacher_name: String,
    pub current_day: i32,
    pub progress_percentage: i32,
}

#[derive(Debug, FromRow)]
pub struct EnrolledStudentRow {
    pub student_id: i32,
    pub name: String,
    pub email: String,
    pub enrolled_at: DateTime<Utc>,
    pub completed_lessons: i64,
}

#[derive(Debug, Serialize)]
pub struct EnrolledStudentResponse {
    pub student_id: i32,
    pub name: String,
    pub email: String,
    pub enrolled_at: DateTime<Utc>,
    pub progress_percentage: i32,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub course_id: i32,
    pub completed_lessons: i64,
    pub total_lessons: i64,
    pub progress_percentage: i32,
    pub completed_lesson_ids: Vec<i32>,
    pub current_day: i32,
    pub days_since_enrollment: i64,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentStatusResponse {
    pub course_id: i32,
    pub enrolled: bool,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct McqSubmission {
    pub id: i32,
    pub task_id: i32,
    pub student_id: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub percentage: f64,
    pub passed: bool,
    pub answers: String,
    pub attempt_number: i32,
    pub submitted_at: DateTime<Utc>,
}

/// Answers are keyed by question id (as a string) and hold the chosen letter.
#[derive(Debug, Deserialize)]
pub struct SubmitMcqRequest {
    pub task_id: i32,
    #[serde(default)]
    pub answers: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct McqSubmissionResponse {
    pub id: i32,
    pub task_id: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub percentage: f64,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
    pub attempt_number: i32,
    pub remaining_attempts: i32,
}

impl McqSubmissionResponse {
    pub fn new(submission: &McqSubmission, remaining_attempts: i32) -> Self {
        Self {
            id: submission.id,
            task_id: submission.task_id,
            total_questions: submission.total_questions,
            correct_answers: submission.correct_answers,
            percentage: submission.percentage,
            passed: submission.passed,
            submitted_at: submission.submitted_at,
            attempt_number: submission.attempt_number,
            remaining_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "submission_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
    Pending,
    Pass,
    Fail,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Pass => "PASS",
            SubmissionStatus::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TheorySubmission {
    pub id: i32,
    pub task_id: i32,
    pub student_id: i32,
    pub file_name: String,
    pub file_path: String,
    pub status: SubmissionStatus,
    pub percentage: Option<f64>,
    pub teacher_feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewTheoryRequest {
    pub status: SubmissionStatus,
    #[validate(range(min = 0.0, max = 100.0))]
    pub percentage: f64,
    #[validate(length(max = 5000))]
    pub teacher_feedback: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TheorySubmissionResponse {
    pub id: i32,
    pub task_id: i32,
    pub student_name: String,
    pub file_name: String,
    pub status: SubmissionStatus,
    pub percentage: Option<f64>,
    pub teacher_feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

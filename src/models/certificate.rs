use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Certificate {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub certificate_code: String,
    pub completion_percentage: i32,
    pub issued_at: DateTime<Utc>,
}

/// Certificate joined with holder and course names; also the public
/// verification payload.
#[derive(Debug, Serialize, FromRow)]
pub struct CertificateResponse {
    pub id: i32,
    pub student_name: String,
    pub course_title: String,
    pub certificate_code: String,
    pub issued_at: DateTime<Utc>,
    pub completion_percentage: i32,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const SIMULATED_PROVIDER: &str = "SIMULATED";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub amount: f64,
    pub status: PaymentStatus,
    pub provider: String,
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: i32,
    pub course_id: i32,
    pub amount: f64,
    pub status: PaymentStatus,
    pub provider: String,
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            course_id: payment.course_id,
            amount: payment.amount,
            status: payment.status,
            provider: payment.provider,
            provider_reference: payment.provider_reference,
            created_at: payment.created_at,
        }
    }
}

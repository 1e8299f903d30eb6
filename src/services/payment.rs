use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    mailer::{payment_email, Mailer},
    not_found, ServiceError, ServiceResult,
};
use crate::{
    middleware::auth::AuthUser,
    models::{
        course::Course,
        payment::{Payment, PaymentResponse, PaymentStatus, SIMULATED_PROVIDER},
    },
    utils::logger::LOGGER,
};

pub struct PaymentService {
    db: PgPool,
    mailer: Mailer,
}

/// Reference recorded for a simulated charge.
pub fn simulated_reference() -> String {
    format!("SIM-{}", Uuid::new_v4().simple())
}

pub fn ensure_payable(course: &Course) -> ServiceResult<()> {
    if !course.paid {
        return Err(ServiceError::InvalidState("Course is free".to_string()));
    }
    Ok(())
}

impl PaymentService {
    pub fn new(db: PgPool, mailer: Mailer) -> Self {
        Self { db, mailer }
    }

    /// Records an immediately successful charge for the course price.
    pub async fn pay(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<PaymentResponse> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found("Course"))?;
        ensure_payable(&course)?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (student_id, course_id, amount, status, provider, provider_reference)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(actor.user_id)
        .bind(course.id)
        .bind(course.price)
        .bind(PaymentStatus::Success)
        .bind(SIMULATED_PROVIDER)
        .bind(simulated_reference())
        .fetch_one(&self.db)
        .await?;

        LOGGER.log_business_event(
            "payment_succeeded",
            Some(actor.user_id),
            json!({"course_id": course.id, "amount": course.price, "payment_id": payment.id}),
        );
        self.mailer
            .send(payment_email(&actor.email, &course.title, course.price));

        Ok(PaymentResponse::from(payment))
    }
}

use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{completion_percentage, enrollment::find_enrollment, ServiceError, ServiceResult};
use crate::{
    middleware::auth::AuthUser,
    models::certificate::CertificateResponse,
    utils::{database::is_unique_violation, logger::LOGGER},
};

const CODE_PREFIX: &str = "CERT-";
const MAX_CODE_ATTEMPTS: usize = 10;

const RESPONSE_SELECT: &str = r#"
    SELECT cert.id, u.name AS student_name, c.title AS course_title,
           cert.certificate_code, cert.issued_at, cert.completion_percentage
    FROM certificates cert
    JOIN users u ON u.id = cert.student_id
    JOIN courses c ON c.id = cert.course_id
"#;

fn code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^CERT-[0-9A-F]{8}$").ok())
        .as_ref()
}

/// `CERT-` followed by eight uppercase hex digits.
pub fn generate_code() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("{}{}", CODE_PREFIX, raw[..8].to_uppercase())
}

pub fn is_valid_code(code: &str) -> bool {
    code_pattern().map_or(false, |pattern| pattern.is_match(code))
}

#[derive(Debug, Clone, Copy)]
pub struct Eligibility {
    pub already_issued: bool,
    pub enrolled: bool,
    pub completed_lessons: i64,
    pub total_lessons: i64,
}

/// Returns the completion percentage to record, or the reason issuance is
/// refused. Checks run in a fixed order: duplicate, enrollment, lessons.
pub fn check_eligibility(facts: Eligibility) -> ServiceResult<i32> {
    if facts.already_issued {
        return Err(ServiceError::Duplicate(
            "Certificate already issued for this course".to_string(),
        ));
    }
    if !facts.enrolled {
        return Err(ServiceError::InvalidState("Not enrolled in this course".to_string()));
    }
    if facts.total_lessons == 0 {
        return Err(ServiceError::InvalidState("Course has no lessons".to_string()));
    }

    let percentage = completion_percentage(facts.completed_lessons, facts.total_lessons);
    if percentage < 100 {
        return Err(ServiceError::InvalidState(format!(
            "Course not completed. Progress: {}%",
            percentage
        )));
    }
    Ok(percentage)
}

pub struct CertificateService {
    db: PgPool,
}

impl CertificateService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn generate(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<CertificateResponse> {
        let already_issued = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM certificates WHERE student_id = $1 AND course_id = $2)",
        )
        .bind(actor.user_id)
        .bind(course_id)
        .fetch_one(&self.db)
        .await?;

        let enrollment = find_enrollment(&self.db, actor.user_id, course_id).await?;
        let (completed_lessons, total_lessons) = match &enrollment {
            Some(enrollment) => {
                sqlx::query_as::<_, (i64, i64)>(
                    r#"
                    SELECT
                        (SELECT COUNT(*) FROM lesson_progress WHERE enrollment_id = $1),
                        (SELECT COUNT(*) FROM lessons WHERE course_id = $2)
                    "#,
                )
                .bind(enrollment.id)
                .bind(course_id)
                .fetch_one(&self.db)
                .await?
            }
            None => (0, 0),
        };

        let percentage = check_eligibility(Eligibility {
            already_issued,
            enrolled: enrollment.is_some(),
            completed_lessons,
            total_lessons,
        })?;

        let certificate_id = self.insert_with_unique_code(actor.user_id, course_id, percentage).await?;

        LOGGER.log_business_event(
            "certificate_issued",
            Some(actor.user_id),
            json!({"course_id": course_id, "certificate_id": certificate_id}),
        );

        let query = format!("{} WHERE cert.id = $1", RESPONSE_SELECT);
        let certificate = sqlx::query_as::<_, CertificateResponse>(&query)
            .bind(certificate_id)
            .fetch_one(&self.db)
            .await?;

        Ok(certificate)
    }

    /// Retries on a code collision; a collision on (student, course) means a
    /// concurrent request already issued the certificate.
    async fn insert_with_unique_code(
        &self,
        student_id: i32,
        course_id: i32,
        percentage: i32,
    ) -> ServiceResult<i32> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code();
            let taken = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM certificates WHERE certificate_code = $1)",
            )
            .bind(&code)
            .fetch_one(&self.db)
            .await?;
            if taken {
                continue;
            }

            let inserted = sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO certificates (student_id, course_id, certificate_code, completion_percentage)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(student_id)
            .bind(course_id)
            .bind(&code)
            .bind(percentage)
            .fetch_one(&self.db)
            .await;

            match inserted {
                Ok(id) => return Ok(id),
                Err(e) if is_unique_violation(&e) => {
                    let issued = sqlx::query_scalar::<_, bool>(
                        "SELECT EXISTS (SELECT 1 FROM certificates WHERE student_id = $1 AND course_id = $2)",
                    )
                    .bind(student_id)
                    .bind(course_id)
                    .fetch_one(&self.db)
                    .await?;
                    if issued {
                        return Err(ServiceError::Duplicate(
                            "Certificate already issued for this course".to_string(),
                        ));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::Internal(
            "Could not allocate a unique certificate code".to_string(),
        ))
    }

    pub async fn my_certificates(&self, actor: &AuthUser) -> ServiceResult<Vec<CertificateResponse>> {
        let query = format!("{} WHERE cert.student_id = $1 ORDER BY cert.issued_at DESC", RESPONSE_SELECT);
        let certificates = sqlx::query_as::<_, CertificateResponse>(&query)
            .bind(actor.user_id)
            .fetch_all(&self.db)
            .await?;

        Ok(certificates)
    }

    /// Public lookup. Codes that cannot exist are rejected without a query.
    pub async fn verify(&self, code: &str) -> ServiceResult<CertificateResponse> {
        let code = code.trim().to_uppercase();
        if !is_valid_code(&code) {
            return Err(invalid_code());
        }

        let query = format!("{} WHERE cert.certificate_code = $1", RESPONSE_SELECT);
        let certificate = sqlx::query_as::<_, CertificateResponse>(&query)
            .bind(&code)
            .fetch_optional(&self.db)
            .await?;

        certificate.ok_or_else(invalid_code)
    }
}

fn invalid_code() -> ServiceError {
    ServiceError::NotFound("Invalid certificate code".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(already_issued: bool, enrolled: bool, completed: i64, total: i64) -> Eligibility {
        Eligibility {
            already_issued,
            enrolled,
            completed_lessons: completed,
            total_lessons: total,
        }
    }

    fn state_message(result: ServiceResult<i32>) -> String {
        match result {
            Err(ServiceError::InvalidState(msg)) => msg,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_generated_codes_match_format() {
        for _ in 0..50 {
            let code = generate_code();
            assert!(is_valid_code(&code), "bad code {}", code);
            assert_eq!(code.len(), 13);
        }
        assert_ne!(generate_code(), generate_code());
    }

    #[test]
    fn test_code_validation() {
        assert!(is_valid_code("CERT-0A1B2C3D"));
        assert!(!is_valid_code("CERT-0a1b2c3d"));
        assert!(!is_valid_code("CERT-0A1B2C3"));
        assert!(!is_valid_code("CERT-0A1B2C3DE"));
        assert!(!is_valid_code("XERT-0A1B2C3D"));
        assert!(!is_valid_code("CERT-0A1B2C3G"));
    }

    #[test]
    fn test_complete_course_is_eligible() {
        assert_eq!(check_eligibility(facts(false, true, 2, 2)).unwrap(), 100);
    }

    #[test]
    fn test_refusal_reasons_are_distinct() {
        assert!(matches!(
            check_eligibility(facts(true, true, 2, 2)),
            Err(ServiceError::Duplicate(msg)) if msg == "Certificate already issued for this course"
        ));
        assert_eq!(state_message(check_eligibility(facts(false, false, 0, 0))), "Not enrolled in this course");
        assert_eq!(state_message(check_eligibility(facts(false, true, 0, 0))), "Course has no lessons");
        assert_eq!(
            state_message(check_eligibility(facts(false, true, 1, 2))),
            "Course not completed. Progress: 50%"
        );
    }
}

use serde_json::json;
use sqlx::{PgExecutor, PgPool};

use super::{
    completion_percentage, ensure_owner, mailer::{enrollment_email, Mailer}, not_found,
    ServiceError, ServiceResult,
};
use crate::{
    middleware::auth::AuthUser,
    models::{
        course::Course,
        enrollment::{
            EnrolledStudentResponse, EnrolledStudentRow, Enrollment, EnrollmentResponse,
            EnrollmentRow,
        },
    },
    utils::{database::is_unique_violation, logger::LOGGER},
};

pub struct EnrollmentService {
    db: PgPool,
    mailer: Mailer,
}

/// Facts gathered before an enrollment is written.
#[derive(Debug, Clone, Copy)]
pub struct EnrollmentCheck {
    pub already_enrolled: bool,
    pub course_published: bool,
    pub course_paid: bool,
    pub has_successful_payment: bool,
}

/// Decides whether a student may enroll. Duplicates are reported before the
/// payment requirement. An unpublished course only admits students who have
/// already paid for it.
pub fn check_enrollment(check: EnrollmentCheck) -> ServiceResult<()> {
    if check.already_enrolled {
        return Err(ServiceError::Duplicate("Already enrolled".to_string()));
    }
    let paid_for = check.course_paid && check.has_successful_payment;
    if !check.course_published && !paid_for {
        return Err(not_found("Course")());
    }
    if check.course_paid && !check.has_successful_payment {
        return Err(ServiceError::InvalidState("Payment required to enroll".to_string()));
    }
    Ok(())
}

impl EnrollmentService {
    pub fn new(db: PgPool, mailer: Mailer) -> Self {
        Self { db, mailer }
    }

    pub async fn enroll(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<EnrollmentResponse> {
        if !actor.is_student() {
            return Err(ServiceError::Forbidden("Only students can enroll".to_string()));
        }

        let course = sqlx::query_as::<_, Course>(
            "SELECT * FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(not_found("Course"))?;

        let already_enrolled = find_enrollment(&self.db, actor.user_id, course_id)
            .await?
            .is_some();
        let has_successful_payment = if course.paid {
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM payments
                    WHERE student_id = $1 AND course_id = $2 AND status = 'SUCCESS'
                )
                "#,
            )
            .bind(actor.user_id)
            .bind(course_id)
            .fetch_one(&self.db)
            .await?
        } else {
            false
        };

        check_enrollment(EnrollmentCheck {
            already_enrolled,
            course_published: course.published,
            course_paid: course.paid,
            has_successful_payment,
        })?;

        // The unique (student_id, course_id) constraint settles concurrent requests.
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (student_id, course_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(actor.user_id)
        .bind(course_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Duplicate("Already enrolled".to_string())
            } else {
                ServiceError::Database(e)
            }
        })?;

        let teacher_name = sqlx::query_scalar::<_, String>("SELECT name FROM users WHERE id = $1")
            .bind(course.teacher_id)
            .fetch_one(&self.db)
            .await?;

        LOGGER.log_business_event(
            "course_enrolled",
            Some(actor.user_id),
            json!({"course_id": course_id, "paid": course.paid}),
        );
        self.mailer.send(enrollment_email(&actor.email, &course.title));

        Ok(EnrollmentResponse {
            course_id: course.id,
            course_title: course.title,
            enrolled_at: enrollment.enrolled_at,
            teacher_name,
            current_day: enrollment.current_day,
            progress_percentage: 0,
        })
    }

    pub async fn my_enrollments(&self, actor: &AuthUser) -> ServiceResult<Vec<EnrollmentResponse>> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT c.id AS course_id, c.title AS course_title, u.name AS teacher_name,
                   e.enrolled_at, e.current_day,
                   (SELECT COUNT(*) FROM lesson_progress lp WHERE lp.enrollment_id = e.id) AS completed_lessons,
                   (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.id) AS total_lessons
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            JOIN users u ON u.id = c.teacher_id
            WHERE e.student_id = $1
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(actor.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| EnrollmentResponse {
                progress_percentage: completion_percentage(row.completed_lessons, row.total_lessons),
                course_id: row.course_id,
                course_title: row.course_title,
                enrolled_at: row.enrolled_at,
                teacher_name: row.teacher_name,
                current_day: row.current_day,
            })
            .collect())
    }

    pub async fn students_in_course(
        &self,
        actor: &AuthUser,
        course_id: i32,
    ) -> ServiceResult<Vec<EnrolledStudentResponse>> {
        let teacher_id = sqlx::query_scalar::<_, i32>("SELECT teacher_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found("Course"))?;
        ensure_owner(actor, teacher_id, "Not authorized to view enrollees for this course")?;

        let total_lessons =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lessons WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&self.db)
                .await?;

        let rows = sqlx::query_as::<_, EnrolledStudentRow>(
            r#"
            SELECT u.id AS student_id, u.name, u.email, e.enrolled_at,
                   (SELECT COUNT(*) FROM lesson_progress lp WHERE lp.enrollment_id = e.id) AS completed_lessons
            FROM enrollments e
            JOIN users u ON u.id = e.student_id
            WHERE e.course_id = $1
            ORDER BY e.enrolled_at ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| EnrolledStudentResponse {
                progress_percentage: completion_percentage(row.completed_lessons, total_lessons),
                student_id: row.student_id,
                name: row.name,
                email: row.email,
                enrolled_at: row.enrolled_at,
            })
            .collect())
    }

    pub async fn is_enrolled(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<bool> {
        Ok(find_enrollment(&self.db, actor.user_id, course_id)
            .await?
            .is_some())
    }
}

pub async fn find_enrollment<'e, E>(
    executor: E,
    student_id: i32,
    course_id: i32,
) -> ServiceResult<Option<Enrollment>>
where
    E: PgExecutor<'e>,
{
    let enrollment = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE student_id = $1 AND course_id = $2",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await?;

    Ok(enrollment)
}

pub async fn require_enrollment<'e, E>(
    executor: E,
    student_id: i32,
    course_id: i32,
) -> ServiceResult<Enrollment>
where
    E: PgExecutor<'e>,
{
    find_enrollment(executor, student_id, course_id)
        .await?
        .ok_or_else(|| ServiceError::Forbidden("Not enrolled in this course".to_string()))
}

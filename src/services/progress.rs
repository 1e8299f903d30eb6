use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;

use super::{completion_percentage, enrollment::require_enrollment, not_found, ServiceResult};
use crate::{
    middleware::auth::AuthUser,
    models::enrollment::{Enrollment, ProgressResponse},
    utils::logger::LOGGER,
};

pub struct ProgressService {
    db: PgPool,
}

/// Day the enrollment should move to once a lesson is recorded, if any.
/// Advances one step when the current day has lessons and all are done.
pub fn next_day(current_day: i32, day_lessons: &[i32], completed: &[i32]) -> Option<i32> {
    if day_lessons.is_empty() {
        return None;
    }
    day_lessons
        .iter()
        .all(|lesson_id| completed.contains(lesson_id))
        .then_some(current_day + 1)
}

/// Whole days since enrollment, counting the enrollment day itself.
pub fn days_since_enrollment(enrolled_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    ((now - enrolled_at).num_days() + 1).max(1)
}

pub fn build_progress(
    course_id: i32,
    enrollment: &Enrollment,
    total_lessons: i64,
    completed_lesson_ids: Vec<i32>,
    now: DateTime<Utc>,
) -> ProgressResponse {
    let completed_lessons = completed_lesson_ids.len() as i64;
    ProgressResponse {
        course_id,
        completed_lessons,
        total_lessons,
        progress_percentage: completion_percentage(completed_lessons, total_lessons),
        completed_lesson_ids,
        current_day: enrollment.current_day,
        days_since_enrollment: days_since_enrollment(enrollment.enrolled_at, now),
    }
}

impl ProgressService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Records a completed lesson. Repeating the call is a no-op.
    pub async fn mark_lesson_completed(
        &self,
        actor: &AuthUser,
        course_id: i32,
        lesson_id: i32,
    ) -> ServiceResult<ProgressResponse> {
        let mut tx = self.db.begin().await?;

        let enrollment = require_enrollment(&mut *tx, actor.user_id, course_id).await?;

        sqlx::query_scalar::<_, i32>("SELECT id FROM lessons WHERE id = $1 AND course_id = $2")
            .bind(lesson_id)
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(not_found("Lesson"))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO lesson_progress (enrollment_id, lesson_id)
            VALUES ($1, $2)
            ON CONFLICT (enrollment_id, lesson_id) DO NOTHING
            "#,
        )
        .bind(enrollment.id)
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            let day_lessons = sqlx::query_scalar::<_, i32>(
                "SELECT id FROM lessons WHERE course_id = $1 AND day_number = $2",
            )
            .bind(course_id)
            .bind(enrollment.current_day)
            .fetch_all(&mut *tx)
            .await?;
            let completed = completed_lesson_ids(&mut *tx, enrollment.id).await?;

            if let Some(day) = next_day(enrollment.current_day, &day_lessons, &completed) {
                // Guarded so the counter never moves backwards.
                sqlx::query(
                    "UPDATE enrollments SET current_day = $1 WHERE id = $2 AND current_day < $1",
                )
                .bind(day)
                .bind(enrollment.id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        if inserted > 0 {
            LOGGER.log_business_event(
                "lesson_completed",
                Some(actor.user_id),
                json!({"course_id": course_id, "lesson_id": lesson_id}),
            );
        }

        self.get_progress(actor, course_id).await
    }

    pub async fn get_progress(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<ProgressResponse> {
        let enrollment = require_enrollment(&self.db, actor.user_id, course_id).await?;

        let total_lessons =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lessons WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&self.db)
                .await?;
        let completed = completed_lesson_ids(&self.db, enrollment.id).await?;

        Ok(build_progress(course_id, &enrollment, total_lessons, completed, Utc::now()))
    }
}

async fn completed_lesson_ids<'e, E>(executor: E, enrollment_id: i32) -> ServiceResult<Vec<i32>>
where
    E: sqlx::PgExecutor<'e>,
{
    let ids = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT lesson_id FROM lesson_progress
        WHERE enrollment_id = $1 AND completed = TRUE
        ORDER BY lesson_id
        "#,
    )
    .bind(enrollment_id)
    .fetch_all(executor)
    .await?;

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn enrollment(enrolled_at: DateTime<Utc>, current_day: i32) -> Enrollment {
        Enrollment {
            id: 1,
            student_id: 2,
            course_id: 3,
            enrolled_at,
            current_day,
        }
    }

    #[test]
    fn test_day_advances_when_all_day_lessons_done() {
        assert_eq!(next_day(1, &[10, 11], &[10, 11]), Some(2));
        assert_eq!(next_day(1, &[10, 11], &[10, 11, 42]), Some(2));
    }

    #[test]
    fn test_day_holds_while_lessons_remain() {
        assert_eq!(next_day(1, &[10, 11], &[10]), None);
        assert_eq!(next_day(2, &[20], &[10, 11]), None);
    }

    #[test]
    fn test_day_without_lessons_never_advances() {
        assert_eq!(next_day(3, &[], &[1, 2, 3]), None);
    }

    #[test]
    fn test_days_since_enrollment_is_inclusive() {
        let now = Utc::now();
        assert_eq!(days_since_enrollment(now, now), 1);
        assert_eq!(days_since_enrollment(now - Duration::hours(23), now), 1);
        assert_eq!(days_since_enrollment(now - Duration::days(1), now), 2);
        assert_eq!(days_since_enrollment(now - Duration::days(9), now), 10);
        assert_eq!(days_since_enrollment(now + Duration::days(2), now), 1);
    }

    #[test]
    fn test_two_lesson_walkthrough() {
        let now = Utc::now();
        let enrolled = enrollment(now, 1);

        let halfway = build_progress(3, &enrolled, 2, vec![10], now);
        assert_eq!(halfway.completed_lessons, 1);
        assert_eq!(halfway.total_lessons, 2);
        assert_eq!(halfway.progress_percentage, 50);

        let done = build_progress(3, &enrolled, 2, vec![10, 11], now);
        assert_eq!(done.progress_percentage, 100);
        assert_eq!(done.completed_lesson_ids, vec![10, 11]);
    }

    #[test]
    fn test_empty_course_reports_zero() {
        let now = Utc::now();
        let progress = build_progress(3, &enrollment(now, 1), 0, vec![], now);
        assert_eq!(progress.progress_percentage, 0);
        assert_eq!(progress.current_day, 1);
        assert_eq!(progress.days_since_enrollment, 1);
    }
}

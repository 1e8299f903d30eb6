use std::path::PathBuf;

use serde_json::json;
use sqlx::PgPool;

use super::{
    enrollment::require_enrollment, ensure_owner, not_found,
    notification::notify,
    storage::FileStorage,
    ServiceError, ServiceResult,
};
use crate::{
    middleware::auth::AuthUser,
    models::{
        notification::NotificationKind,
        submission::{ReviewTheoryRequest, SubmissionStatus, TheorySubmission, TheorySubmissionResponse},
        task::{Task, TaskType},
    },
    utils::{database::is_unique_violation, logger::LOGGER},
};

const RESPONSE_SELECT: &str = r#"
    SELECT ts.id, ts.task_id, u.name AS student_name, ts.file_name, ts.status,
           ts.percentage, ts.teacher_feedback, ts.submitted_at, ts.reviewed_at
    FROM theory_submissions ts
    JOIN users u ON u.id = ts.student_id
"#;

/// A review moves a pending submission to PASS or FAIL exactly once.
pub fn check_review(current: SubmissionStatus, requested: SubmissionStatus) -> ServiceResult<()> {
    if requested == SubmissionStatus::Pending {
        return Err(ServiceError::InvalidState(
            "Review status must be PASS or FAIL".to_string(),
        ));
    }
    if current != SubmissionStatus::Pending {
        return Err(ServiceError::InvalidState(format!(
            "Submission already reviewed with status {}",
            current.as_str()
        )));
    }
    Ok(())
}

pub struct TheoryService {
    db: PgPool,
    storage: FileStorage,
}

/// Row used to authorize access to a submission.
#[derive(Debug, sqlx::FromRow)]
struct SubmissionScope {
    student_id: i32,
    teacher_id: i32,
    course_id: i32,
    task_title: String,
}

impl TheoryService {
    pub fn new(db: PgPool, storage: FileStorage) -> Self {
        Self { db, storage }
    }

    pub async fn submit(
        &self,
        actor: &AuthUser,
        task_id: i32,
        original_name: &str,
        data: &[u8],
    ) -> ServiceResult<TheorySubmissionResponse> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found("Task"))?;

        if task.task_type != TaskType::Theory {
            return Err(ServiceError::InvalidState("Task is not a theory task".to_string()));
        }
        require_enrollment(&self.db, actor.user_id, task.course_id).await?;

        let already_submitted = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM theory_submissions WHERE task_id = $1 AND student_id = $2)",
        )
        .bind(task_id)
        .bind(actor.user_id)
        .fetch_one(&self.db)
        .await?;
        if already_submitted {
            return Err(ServiceError::Duplicate(
                "Theory assignment already submitted".to_string(),
            ));
        }

        let path = self
            .storage
            .save_theory(task_id, actor.user_id, original_name, data)
            .await?;

        let submission_id = match self.record_submission(actor, &task, original_name, &path).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(io) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Failed to remove orphaned upload {:?}: {}", path, io);
                }
                return Err(e);
            }
        };

        LOGGER.log_business_event(
            "theory_submitted",
            Some(actor.user_id),
            json!({"task_id": task_id, "submission_id": submission_id}),
        );

        self.fetch_response(submission_id).await
    }

    async fn record_submission(
        &self,
        actor: &AuthUser,
        task: &Task,
        original_name: &str,
        path: &std::path::Path,
    ) -> ServiceResult<i32> {
        let mut tx = self.db.begin().await?;

        let submission_id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO theory_submissions (task_id, student_id, file_name, file_path)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(task.id)
        .bind(actor.user_id)
        .bind(original_name)
        .bind(path.to_string_lossy().as_ref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Duplicate("Theory assignment already submitted".to_string())
            } else {
                ServiceError::Database(e)
            }
        })?;

        let (teacher_id, student_name) = sqlx::query_as::<_, (i32, String)>(
            r#"
            SELECT c.teacher_id, u.name
            FROM courses c, users u
            WHERE c.id = $1 AND u.id = $2
            "#,
        )
        .bind(task.course_id)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        notify(
            &mut *tx,
            teacher_id,
            &format!("New submission by {} for task: {}", student_name, task.title),
            NotificationKind::Submission,
            Some(task.id),
        )
        .await?;

        tx.commit().await?;
        Ok(submission_id)
    }

    pub async fn my_submission(
        &self,
        actor: &AuthUser,
        task_id: i32,
    ) -> ServiceResult<TheorySubmissionResponse> {
        let query = format!("{} WHERE ts.task_id = $1 AND ts.student_id = $2", RESPONSE_SELECT);
        let submission = sqlx::query_as::<_, TheorySubmissionResponse>(&query)
            .bind(task_id)
            .bind(actor.user_id)
            .fetch_optional(&self.db)
            .await?;

        submission.ok_or_else(|| ServiceError::NotFound("No submission found".to_string()))
    }

    pub async fn list_for_task(
        &self,
        actor: &AuthUser,
        task_id: i32,
    ) -> ServiceResult<Vec<TheorySubmissionResponse>> {
        let teacher_id = sqlx::query_scalar::<_, i32>(
            "SELECT c.teacher_id FROM tasks t JOIN courses c ON c.id = t.course_id WHERE t.id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(not_found("Task"))?;
        ensure_owner(actor, teacher_id, "You can only view submissions for your own courses")?;

        let query = format!("{} WHERE ts.task_id = $1 ORDER BY ts.submitted_at ASC", RESPONSE_SELECT);
        let submissions = sqlx::query_as::<_, TheorySubmissionResponse>(&query)
            .bind(task_id)
            .fetch_all(&self.db)
            .await?;

        Ok(submissions)
    }

    pub async fn review(
        &self,
        actor: &AuthUser,
        submission_id: i32,
        request: ReviewTheoryRequest,
    ) -> ServiceResult<TheorySubmissionResponse> {
        let mut tx = self.db.begin().await?;

        let submission = sqlx::query_as::<_, TheorySubmission>(
            "SELECT * FROM theory_submissions WHERE id = $1 FOR UPDATE",
        )
        .bind(submission_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(not_found("Submission"))?;

        let scope = self.scope(&mut *tx, &submission).await?;
        ensure_owner(actor, scope.teacher_id, "You can only review submissions for your own courses")?;
        check_review(submission.status, request.status)?;

        sqlx::query(
            r#"
            UPDATE theory_submissions
            SET status = $1, percentage = $2, teacher_feedback = $3, reviewed_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(request.status)
        .bind(request.percentage)
        .bind(&request.teacher_feedback)
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;

        notify(
            &mut *tx,
            scope.student_id,
            &format!(
                "Your assignment for '{}' has been reviewed. Status: {}",
                scope.task_title,
                request.status.as_str()
            ),
            NotificationKind::Review,
            Some(scope.course_id),
        )
        .await?;

        tx.commit().await?;

        LOGGER.log_business_event(
            "theory_reviewed",
            Some(actor.user_id),
            json!({
                "submission_id": submission_id,
                "status": request.status.as_str(),
                "percentage": request.percentage,
            }),
        );

        self.fetch_response(submission_id).await
    }

    /// Path and original name of a stored answer, for the submitting student,
    /// the course's teacher or an admin.
    pub async fn download(&self, actor: &AuthUser, submission_id: i32) -> ServiceResult<(PathBuf, String)> {
        let submission = sqlx::query_as::<_, TheorySubmission>(
            "SELECT * FROM theory_submissions WHERE id = $1",
        )
        .bind(submission_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(not_found("Submission"))?;

        let mut conn = self.db.acquire().await?;
        let scope = self.scope(&mut *conn, &submission).await?;

        if actor.user_id != scope.student_id {
            ensure_owner(actor, scope.teacher_id, "You are not allowed to download this file")?;
        }

        Ok((PathBuf::from(submission.file_path), submission.file_name))
    }

    async fn scope(
        &self,
        conn: &mut sqlx::PgConnection,
        submission: &TheorySubmission,
    ) -> ServiceResult<SubmissionScope> {
        let scope = sqlx::query_as::<_, SubmissionScope>(
            r#"
            SELECT $2::INT AS student_id, c.teacher_id, c.id AS course_id, t.title AS task_title
            FROM tasks t
            JOIN courses c ON c.id = t.course_id
            WHERE t.id = $1
            "#,
        )
        .bind(submission.task_id)
        .bind(submission.student_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(not_found("Task"))?;

        Ok(scope)
    }

    async fn fetch_response(&self, submission_id: i32) -> ServiceResult<TheorySubmissionResponse> {
        let query = format!("{} WHERE ts.id = $1", RESPONSE_SELECT);
        let submission = sqlx::query_as::<_, TheorySubmissionResponse>(&query)
            .bind(submission_id)
            .fetch_optional(&self.db)
            .await?;

        submission.ok_or_else(not_found("Submission"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_pending_submission_can_be_reviewed() {
        assert!(check_review(SubmissionStatus::Pending, SubmissionStatus::Pass).is_ok());
        assert!(check_review(SubmissionStatus::Pending, SubmissionStatus::Fail).is_ok());
    }

    #[test]
    fn test_review_cannot_reset_to_pending() {
        assert!(matches!(
            check_review(SubmissionStatus::Pending, SubmissionStatus::Pending),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[test]
    fn test_second_review_is_rejected() {
        match check_review(SubmissionStatus::Pass, SubmissionStatus::Fail) {
            Err(ServiceError::InvalidState(msg)) => assert!(msg.contains("already reviewed")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_review_percentage_bounds() {
        let request = |percentage: f64| ReviewTheoryRequest {
            status: SubmissionStatus::Pass,
            percentage,
            teacher_feedback: None,
        };
        assert!(request(0.0).validate().is_ok());
        assert!(request(100.0).validate().is_ok());
        assert!(request(100.5).validate().is_err());
        assert!(request(-1.0).validate().is_err());
    }
}

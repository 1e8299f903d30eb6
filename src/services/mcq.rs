use std::collections::HashMap;

use serde_json::json;
use sqlx::PgPool;

use super::{enrollment::require_enrollment, not_found, ServiceError, ServiceResult};
use crate::{
    middleware::auth::AuthUser,
    models::{
        submission::{McqSubmission, McqSubmissionResponse, SubmitMcqRequest},
        task::{McqQuestion, Task, TaskType},
    },
    utils::{database::is_unique_violation, logger::LOGGER},
};

pub const MAX_ATTEMPTS: i32 = 2;
pub const PASS_THRESHOLD: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    pub total_questions: i32,
    pub correct_answers: i32,
    pub percentage: f64,
    pub passed: bool,
}

/// Scores answers keyed by question id. A missing answer counts as wrong.
pub fn grade(questions: &[McqQuestion], answers: &HashMap<String, String>) -> Grade {
    let correct_answers = questions
        .iter()
        .filter(|q| answers.get(&q.id.to_string()) == Some(&q.correct_answer))
        .count() as i32;
    let total_questions = questions.len() as i32;
    let percentage = if total_questions > 0 {
        correct_answers as f64 * 100.0 / total_questions as f64
    } else {
        0.0
    };

    Grade {
        total_questions,
        correct_answers,
        percentage,
        passed: percentage >= PASS_THRESHOLD,
    }
}

/// Attempt number for the next submission given the ones already stored.
pub fn next_attempt(previous_attempts: &[i32]) -> ServiceResult<i32> {
    let last = previous_attempts.iter().copied().max().unwrap_or(0);
    if last >= MAX_ATTEMPTS {
        return Err(ServiceError::InvalidState(format!(
            "Maximum {} attempts allowed. You have already used all attempts.",
            MAX_ATTEMPTS
        )));
    }
    Ok(last + 1)
}

pub fn remaining_attempts(attempts_taken: usize) -> i32 {
    (MAX_ATTEMPTS - attempts_taken as i32).max(0)
}

/// Highest percentage wins; on a tie the latest attempt is kept.
pub fn pick_best(submissions: &[McqSubmission]) -> Option<&McqSubmission> {
    submissions.iter().fold(None, |best: Option<&McqSubmission>, candidate| match best {
        Some(current) if outranks(current, candidate) => Some(current),
        _ => Some(candidate),
    })
}

fn outranks(current: &McqSubmission, candidate: &McqSubmission) -> bool {
    current.percentage > candidate.percentage
        || (current.percentage == candidate.percentage
            && current.attempt_number > candidate.attempt_number)
}

pub struct McqService {
    db: PgPool,
}

impl McqService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn submit(
        &self,
        actor: &AuthUser,
        request: SubmitMcqRequest,
    ) -> ServiceResult<McqSubmissionResponse> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(request.task_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found("Task"))?;

        if task.task_type != TaskType::Mcq {
            return Err(ServiceError::InvalidState("Task is not an MCQ task".to_string()));
        }
        require_enrollment(&self.db, actor.user_id, task.course_id).await?;

        let previous = sqlx::query_scalar::<_, i32>(
            "SELECT attempt_number FROM mcq_submissions WHERE task_id = $1 AND student_id = $2",
        )
        .bind(task.id)
        .bind(actor.user_id)
        .fetch_all(&self.db)
        .await?;
        let attempt_number = next_attempt(&previous)?;

        let questions = sqlx::query_as::<_, McqQuestion>(
            "SELECT * FROM mcq_questions WHERE task_id = $1 ORDER BY question_order, id",
        )
        .bind(task.id)
        .fetch_all(&self.db)
        .await?;

        let result = grade(&questions, &request.answers);
        let raw_answers = serde_json::to_string(&request.answers)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let submission = sqlx::query_as::<_, McqSubmission>(
            r#"
            INSERT INTO mcq_submissions
                (task_id, student_id, total_questions, correct_answers, percentage, passed, answers, attempt_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(task.id)
        .bind(actor.user_id)
        .bind(result.total_questions)
        .bind(result.correct_answers)
        .bind(result.percentage)
        .bind(result.passed)
        .bind(raw_answers)
        .bind(attempt_number)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Duplicate("This attempt was already submitted".to_string())
            } else {
                ServiceError::Database(e)
            }
        })?;

        LOGGER.log_business_event(
            "mcq_submitted",
            Some(actor.user_id),
            json!({
                "task_id": task.id,
                "attempt": attempt_number,
                "percentage": result.percentage,
                "passed": result.passed,
            }),
        );

        Ok(McqSubmissionResponse::new(
            &submission,
            MAX_ATTEMPTS - attempt_number,
        ))
    }

    pub async fn best_submission(
        &self,
        actor: &AuthUser,
        task_id: i32,
    ) -> ServiceResult<McqSubmissionResponse> {
        let submissions = sqlx::query_as::<_, McqSubmission>(
            r#"
            SELECT * FROM mcq_submissions
            WHERE task_id = $1 AND student_id = $2
            ORDER BY attempt_number DESC
            "#,
        )
        .bind(task_id)
        .bind(actor.user_id)
        .fetch_all(&self.db)
        .await?;

        let best = pick_best(&submissions)
            .ok_or_else(|| ServiceError::NotFound("No submission found".to_string()))?;

        Ok(McqSubmissionResponse::new(
            best,
            remaining_attempts(submissions.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn question(id: i32, correct: &str) -> McqQuestion {
        McqQuestion {
            id,
            task_id: 1,
            question: format!("Q{}", id),
            option_a: "a".into(),
            option_b: "b".into(),
            option_c: "c".into(),
            option_d: "d".into(),
            correct_answer: correct.into(),
            question_order: id,
        }
    }

    fn answers(pairs: &[(i32, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(id, letter)| (id.to_string(), letter.to_string()))
            .collect()
    }

    fn submission(id: i32, attempt_number: i32, percentage: f64) -> McqSubmission {
        McqSubmission {
            id,
            task_id: 1,
            student_id: 1,
            total_questions: 5,
            correct_answers: (percentage / 20.0) as i32,
            percentage,
            passed: percentage >= PASS_THRESHOLD,
            answers: "{}".into(),
            attempt_number,
            submitted_at: Utc::now(),
        }
    }

    fn five_questions() -> Vec<McqQuestion> {
        vec![
            question(1, "A"),
            question(2, "B"),
            question(3, "C"),
            question(4, "D"),
            question(5, "A"),
        ]
    }

    #[test]
    fn test_three_of_five_passes_at_threshold() {
        let result = grade(&five_questions(), &answers(&[(1, "A"), (2, "B"), (3, "C"), (4, "A")]));
        assert_eq!(result.total_questions, 5);
        assert_eq!(result.correct_answers, 3);
        assert_eq!(result.percentage, 60.0);
        assert!(result.passed);
    }

    #[test]
    fn test_below_threshold_fails() {
        let result = grade(&five_questions(), &answers(&[(1, "A"), (2, "B")]));
        assert_eq!(result.percentage, 40.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_missing_and_unknown_answers_are_wrong() {
        let result = grade(&five_questions(), &answers(&[(99, "A"), (1, "b")]));
        assert_eq!(result.correct_answers, 0);
        assert_eq!(result.percentage, 0.0);
    }

    #[test]
    fn test_task_without_questions_scores_zero() {
        let result = grade(&[], &answers(&[(1, "A")]));
        assert_eq!(result.total_questions, 0);
        assert_eq!(result.percentage, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_attempt_cap() {
        assert_eq!(next_attempt(&[]).unwrap(), 1);
        assert_eq!(next_attempt(&[1]).unwrap(), 2);
        match next_attempt(&[1, 2]) {
            Err(ServiceError::InvalidState(msg)) => assert!(msg.starts_with("Maximum 2 attempts")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_remaining_attempts() {
        assert_eq!(remaining_attempts(0), 2);
        assert_eq!(remaining_attempts(1), 1);
        assert_eq!(remaining_attempts(2), 0);
        assert_eq!(remaining_attempts(5), 0);
    }

    #[test]
    fn test_best_submission_prefers_higher_score() {
        let subs = vec![submission(10, 1, 60.0), submission(11, 2, 80.0)];
        assert_eq!(pick_best(&subs).map(|s| s.id), Some(11));
    }

    #[test]
    fn test_best_submission_tie_keeps_latest_attempt() {
        let oldest_first = vec![submission(10, 1, 80.0), submission(11, 2, 80.0)];
        assert_eq!(pick_best(&oldest_first).map(|s| s.id), Some(11));

        let newest_first = vec![submission(11, 2, 80.0), submission(10, 1, 80.0)];
        assert_eq!(pick_best(&newest_first).map(|s| s.id), Some(11));

        assert!(pick_best(&[]).is_none());
    }
}

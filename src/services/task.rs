use std::collections::{HashMap, HashSet};

use serde_json::json;
use sqlx::PgPool;

use super::{enrollment::require_enrollment, ensure_owner, not_found, ServiceError, ServiceResult};
use crate::{
    middleware::auth::AuthUser,
    models::{
        course::Course,
        task::{
            CreateTaskRequest, McqQuestion, McqQuestionView, Task, TaskResponse, TaskType, TestCase,
            TestCaseResponse,
        },
    },
    utils::logger::LOGGER,
};

/// Test cases belong to coding tasks, questions to MCQ tasks; an MCQ task
/// needs at least one question.
pub fn check_task_shape(request: &CreateTaskRequest) -> ServiceResult<()> {
    match request.task_type {
        TaskType::Mcq if request.mcq_questions.is_empty() => Err(ServiceError::InvalidState(
            "MCQ tasks need at least one question".to_string(),
        )),
        TaskType::Mcq | TaskType::Theory if !request.test_cases.is_empty() => Err(
            ServiceError::InvalidState("Only coding tasks take test cases".to_string()),
        ),
        TaskType::Coding | TaskType::Theory if !request.mcq_questions.is_empty() => Err(
            ServiceError::InvalidState("Only MCQ tasks take questions".to_string()),
        ),
        _ => Ok(()),
    }
}

/// Joins tasks with their children in memory. Answer keys are included only
/// when `reveal_answers` is set.
pub fn assemble_tasks(
    tasks: Vec<Task>,
    test_cases: Vec<TestCase>,
    questions: Vec<McqQuestion>,
    completed: &HashSet<i32>,
    reveal_answers: bool,
) -> Vec<TaskResponse> {
    let mut cases_by_task: HashMap<i32, Vec<TestCaseResponse>> = HashMap::new();
    for case in test_cases {
        cases_by_task.entry(case.task_id).or_default().push(TestCaseResponse {
            input: case.input,
            expected_output: case.expected_output,
        });
    }

    let mut questions_by_task: HashMap<i32, Vec<McqQuestionView>> = HashMap::new();
    for question in questions {
        questions_by_task
            .entry(question.task_id)
            .or_default()
            .push(McqQuestionView::from_question(question, reveal_answers));
    }

    tasks
        .into_iter()
        .map(|task| TaskResponse {
            completed: completed.contains(&task.id),
            test_cases: cases_by_task.remove(&task.id).unwrap_or_default(),
            mcq_questions: questions_by_task.remove(&task.id).unwrap_or_default(),
            id: task.id,
            course_id: task.course_id,
            title: task.title,
            description: task.description,
            task_type: task.task_type,
            starter_code: task.starter_code,
            day_number: task.day_number,
            created_at: task.created_at,
        })
        .collect()
}

pub struct TaskService {
    db: PgPool,
}

impl TaskService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        actor: &AuthUser,
        course_id: i32,
        request: CreateTaskRequest,
    ) -> ServiceResult<TaskResponse> {
        let teacher_id = sqlx::query_scalar::<_, i32>("SELECT teacher_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found("Course"))?;
        ensure_owner(actor, teacher_id, "You can only add tasks to your own courses")?;
        check_task_shape(&request)?;

        let mut tx = self.db.begin().await?;

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (course_id, title, description, task_type, starter_code, day_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(course_id)
        .bind(request.title.trim())
        .bind(&request.description)
        .bind(request.task_type)
        .bind(&request.starter_code)
        .bind(request.day_number.unwrap_or(1))
        .fetch_one(&mut *tx)
        .await?;

        let mut test_cases = Vec::with_capacity(request.test_cases.len());
        for (order, case) in request.test_cases.iter().enumerate() {
            let stored = sqlx::query_as::<_, TestCase>(
                r#"
                INSERT INTO test_cases (task_id, input, expected_output, case_order)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(task.id)
            .bind(&case.input)
            .bind(&case.expected_output)
            .bind(order as i32)
            .fetch_one(&mut *tx)
            .await?;
            test_cases.push(stored);
        }

        let mut questions = Vec::with_capacity(request.mcq_questions.len());
        for (index, question) in request.mcq_questions.iter().enumerate() {
            let stored = sqlx::query_as::<_, McqQuestion>(
                r#"
                INSERT INTO mcq_questions
                    (task_id, question, option_a, option_b, option_c, option_d, correct_answer, question_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(task.id)
            .bind(&question.question)
            .bind(&question.option_a)
            .bind(&question.option_b)
            .bind(&question.option_c)
            .bind(&question.option_d)
            .bind(&question.correct_answer)
            .bind(question.question_order.unwrap_or(index as i32))
            .fetch_one(&mut *tx)
            .await?;
            questions.push(stored);
        }

        tx.commit().await?;

        LOGGER.log_business_event(
            "task_created",
            Some(actor.user_id),
            json!({"course_id": course_id, "task_id": task.id, "type": request.task_type}),
        );

        let mut assembled = assemble_tasks(vec![task], test_cases, questions, &HashSet::new(), true);
        assembled
            .pop()
            .ok_or_else(|| ServiceError::Internal("Created task vanished".to_string()))
    }

    /// Tasks of a course with the caller's completion flags. Only the owning
    /// teacher or an admin sees the MCQ answer key.
    pub async fn list_for_course(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<Vec<TaskResponse>> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found("Course"))?;

        let is_owner = ensure_owner(actor, course.teacher_id, "").is_ok();
        if !course.published && !is_owner {
            return Err(ServiceError::NotFound("Course not found".to_string()));
        }

        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE course_id = $1 ORDER BY day_number, id",
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;
        let task_ids: Vec<i32> = tasks.iter().map(|task| task.id).collect();

        let (test_cases, questions, completed) = tokio::try_join!(
            sqlx::query_as::<_, TestCase>(
                "SELECT * FROM test_cases WHERE task_id = ANY($1) ORDER BY case_order, id",
            )
            .bind(&task_ids)
            .fetch_all(&self.db),
            sqlx::query_as::<_, McqQuestion>(
                "SELECT * FROM mcq_questions WHERE task_id = ANY($1) ORDER BY question_order, id",
            )
            .bind(&task_ids)
            .fetch_all(&self.db),
            sqlx::query_scalar::<_, i32>(
                "SELECT task_id FROM task_completions WHERE user_id = $1 AND task_id = ANY($2)",
            )
            .bind(actor.user_id)
            .bind(&task_ids)
            .fetch_all(&self.db),
        )?;

        let completed: HashSet<i32> = completed.into_iter().collect();
        Ok(assemble_tasks(tasks, test_cases, questions, &completed, is_owner))
    }

    /// Marks a task done for the caller. Repeating the call is a no-op.
    pub async fn complete(&self, actor: &AuthUser, task_id: i32) -> ServiceResult<()> {
        let course_id = sqlx::query_scalar::<_, i32>("SELECT course_id FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found("Task"))?;
        require_enrollment(&self.db, actor.user_id, course_id).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO task_completions (task_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (task_id, user_id) DO NOTHING
            "#,
        )
        .bind(task_id)
        .bind(actor.user_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        if inserted > 0 {
            LOGGER.log_business_event("task_completed", Some(actor.user_id), json!({"task_id": task_id}));
        }
        Ok(())
    }

    pub async fn delete(&self, actor: &AuthUser, task_id: i32) -> ServiceResult<()> {
        let teacher_id = sqlx::query_scalar::<_, i32>(
            "SELECT c.teacher_id FROM tasks t JOIN courses c ON c.id = t.course_id WHERE t.id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(not_found("Task"))?;
        ensure_owner(actor, teacher_id, "You can only delete tasks from your own courses")?;

        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(task_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{McqQuestionInput, TestCaseInput};
    use chrono::Utc;

    fn request(task_type: TaskType, cases: usize, questions: usize) -> CreateTaskRequest {
        CreateTaskRequest {
            title: "Task".into(),
            description: String::new(),
            task_type,
            starter_code: None,
            day_number: None,
            test_cases: (0..cases)
                .map(|i| TestCaseInput {
                    input: i.to_string(),
                    expected_output: i.to_string(),
                })
                .collect(),
            mcq_questions: (0..questions)
                .map(|_| McqQuestionInput {
                    question: "q".into(),
                    option_a: "a".into(),
                    option_b: "b".into(),
                    option_c: "c".into(),
                    option_d: "d".into(),
                    correct_answer: "A".into(),
                    question_order: None,
                })
                .collect(),
        }
    }

    fn task(id: i32, task_type: TaskType) -> Task {
        Task {
            id,
            course_id: 1,
            title: format!("Task {}", id),
            description: String::new(),
            task_type,
            starter_code: None,
            day_number: 1,
            created_at: Utc::now(),
        }
    }

    fn question(id: i32, task_id: i32) -> McqQuestion {
        McqQuestion {
            id,
            task_id,
            question: "q".into(),
            option_a: "a".into(),
            option_b: "b".into(),
            option_c: "c".into(),
            option_d: "d".into(),
            correct_answer: "D".into(),
            question_order: 0,
        }
    }

    #[test]
    fn test_task_shapes() {
        assert!(check_task_shape(&request(TaskType::Coding, 2, 0)).is_ok());
        assert!(check_task_shape(&request(TaskType::Mcq, 0, 3)).is_ok());
        assert!(check_task_shape(&request(TaskType::Theory, 0, 0)).is_ok());
        assert!(check_task_shape(&request(TaskType::Mcq, 0, 0)).is_err());
        assert!(check_task_shape(&request(TaskType::Theory, 1, 0)).is_err());
        assert!(check_task_shape(&request(TaskType::Coding, 0, 1)).is_err());
    }

    #[test]
    fn test_assembly_groups_children_and_flags_completion() {
        let cases = vec![TestCase {
            id: 1,
            task_id: 10,
            input: "1 2".into(),
            expected_output: "3".into(),
            case_order: 0,
        }];
        let completed: HashSet<i32> = [11].into_iter().collect();

        let tasks = assemble_tasks(
            vec![task(10, TaskType::Coding), task(11, TaskType::Mcq)],
            cases,
            vec![question(5, 11), question(6, 11)],
            &completed,
            false,
        );

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].test_cases.len(), 1);
        assert!(tasks[0].mcq_questions.is_empty());
        assert!(!tasks[0].completed);
        assert_eq!(tasks[1].mcq_questions.len(), 2);
        assert!(tasks[1].completed);
        assert!(tasks[1].mcq_questions.iter().all(|q| q.correct_answer.is_none()));
    }

    #[test]
    fn test_assembly_reveals_answers_for_staff() {
        let tasks = assemble_tasks(
            vec![task(11, TaskType::Mcq)],
            vec![],
            vec![question(5, 11)],
            &HashSet::new(),
            true,
        );
        assert_eq!(tasks[0].mcq_questions[0].correct_answer.as_deref(), Some("D"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Task {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub starter_code: Option<String>,
    pub day_number: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    Coding,
    Mcq,
    Theory,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TestCase {
    pub id: i32,
    pub task_id: i32,
    pub input: String,
    pub expected_output: String,
    pub case_order: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct McqQuestion {
    pub id: i32,
    pub task_id: i32,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: String,
    pub question_order: i32,
}

fn validate_answer_letter(letter: &str) -> Result<(), ValidationError> {
    match letter {
        "A" | "B" | "C" | "D" => Ok(()),
        _ => Err(ValidationError::new("correct_answer_must_be_a_to_d")),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TestCaseInput {
    pub input: String,
    pub expected_output: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct McqQuestionInput {
    #[validate(length(min = 1))]
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    #[validate(custom = "validate_answer_letter")]
    pub correct_answer: String,
    pub question_order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub task_type: TaskType,
    pub starter_code: Option<String>,
    #[validate(range(min = 1))]
    pub day_number: Option<i32>,
    #[validate]
    #[serde(default)]
    pub test_cases: Vec<TestCaseInput>,
    #[validate]
    #[serde(default)]
    pub mcq_questions: Vec<McqQuestionInput>,
}

#[derive(Debug, Serialize)]
pub struct TestCaseResponse {
    pub input: String,
    pub expected_output: String,
}

/// Question as shown to a caller; the answer key is only present for staff.
#[derive(Debug, Serialize)]
pub struct McqQuestionView {
    pub id: i32,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub question_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

impl McqQuestionView {
    pub fn from_question(question: McqQuestion, reveal_answer: bool) -> Self {
        Self {
            id: question.id,
            question: question.question,
            option_a: question.option_a,
            option_b: question.option_b,
            option_c: question.option_c,
            option_d: question.option_d,
            question_order: question.question_order,
            correct_answer: reveal_answer.then_some(question.correct_answer),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub starter_code: Option<String>,
    pub day_number: i32,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
    pub test_cases: Vec<TestCaseResponse>,
    pub mcq_questions: Vec<McqQuestionView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(letter: &str) -> McqQuestionInput {
        McqQuestionInput {
            question: "2 + 2?".into(),
            option_a: "3".into(),
            option_b: "4".into(),
            option_c: "5".into(),
            option_d: "22".into(),
            correct_answer: letter.into(),
            question_order: None,
        }
    }

    #[test]
    fn test_answer_letter_validation() {
        assert!(question("B").validate().is_ok());
        assert!(question("E").validate().is_err());
        assert!(question("b").validate().is_err());
    }

    #[test]
    fn test_nested_questions_are_validated() {
        let request = CreateTaskRequest {
            title: "Quiz".into(),
            description: String::new(),
            task_type: TaskType::Mcq,
            starter_code: None,
            day_number: Some(1),
            test_cases: vec![],
            mcq_questions: vec![question("A"), question("Z")],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_answer_key_hidden_from_students() {
        let stored = McqQuestion {
            id: 1,
            task_id: 1,
            question: "q".into(),
            option_a: "a".into(),
            option_b: "b".into(),
            option_c: "c".into(),
            option_d: "d".into(),
            correct_answer: "C".into(),
            question_order: 0,
        };
        let view = McqQuestionView::from_question(stored.clone(), false);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("correct_answer").is_none());

        let view = McqQuestionView::from_question(stored, true);
        assert_eq!(view.correct_answer.as_deref(), Some("C"));
    }

    #[test]
    fn test_task_type_wire_format() {
        let parsed: TaskType = serde_json::from_str("\"THEORY\"").unwrap();
        assert_eq!(parsed, TaskType::Theory);
        assert_eq!(serde_json::to_string(&TaskType::Mcq).unwrap(), "\"MCQ\"");
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::question::QuestionType;
use crate::errors::{AppError, AppResult};

/// A student's answer, shaped by the question it answers.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(u32),
    Text(String),
}

impl Answer {
    /// Parses a wire value against the declared question type.
    ///
    /// `null` means the question was left unanswered. Free-form questions accept numbers
    /// as text so that math answers like `42` survive.
    pub fn parse(question_type: QuestionType, value: &Value) -> AppResult<Option<Answer>> {
        match (question_type, value) {
            (_, Value::Null) => Ok(None),
            (QuestionType::MultipleChoice, Value::Number(n)) => n
                .as_u64()
                .and_then(|i| u32::try_from(i).ok())
                .map(|i| Some(Answer::Choice(i)))
                .ok_or_else(|| {
                    AppError::ValidationError(format!(
                        "Multiple-choice answer must be a non-negative option index, got {}",
                        n
                    ))
                }),
            (QuestionType::MultipleChoice, other) => Err(AppError::ValidationError(format!(
                "Multiple-choice answer must be an option index, got {}",
                kind_of(other)
            ))),
            (_, Value::String(text)) => Ok(Some(Answer::Text(text.clone()))),
            (_, Value::Number(n)) => Ok(Some(Answer::Text(n.to_string()))),
            (question_type, other) => Err(AppError::ValidationError(format!(
                "Answer to a {} question must be text, got {}",
                question_type.as_str(),
                kind_of(other)
            ))),
        }
    }

    pub fn as_choice(&self) -> Option<u32> {
        match self {
            Answer::Choice(index) => Some(*index),
            Answer::Text(_) => None,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Answer as it arrives from the client, before it is checked against the exam.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnswer {
    pub question_index: u32,
    #[serde(default)]
    pub answer: Value,
}

/// An answer that has been checked against its question's type.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_index: u32,
    pub answer: Answer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_choice_answers_need_an_index() {
        assert_eq!(
            Answer::parse(QuestionType::MultipleChoice, &json!(2)).unwrap(),
            Some(Answer::Choice(2))
        );
        assert!(Answer::parse(QuestionType::MultipleChoice, &json!("B")).is_err());
        assert!(Answer::parse(QuestionType::MultipleChoice, &json!(-1)).is_err());
        assert!(Answer::parse(QuestionType::MultipleChoice, &json!(1.5)).is_err());
    }

    #[test]
    fn test_free_form_answers_are_text() {
        assert_eq!(
            Answer::parse(QuestionType::Essay, &json!("because")).unwrap(),
            Some(Answer::Text("because".to_string()))
        );
        assert_eq!(
            Answer::parse(QuestionType::Math, &json!(42)).unwrap(),
            Some(Answer::Text("42".to_string()))
        );
        let err = Answer::parse(QuestionType::Coding, &json!({"code": "x"})).unwrap_err();
        assert!(err.to_string().contains("coding"));
    }

    #[test]
    fn test_null_is_unanswered() {
        assert_eq!(Answer::parse(QuestionType::MultipleChoice, &Value::Null).unwrap(), None);
        assert_eq!(Answer::parse(QuestionType::Essay, &Value::Null).unwrap(), None);
    }

    #[test]
    fn test_untagged_wire_shape() {
        assert_eq!(serde_json::to_value(Answer::Choice(1)).unwrap(), json!(1));
        assert_eq!(serde_json::to_value(Answer::Text("x".into())).unwrap(), json!("x"));

        let raw: RawAnswer = serde_json::from_str(r#"{ "questionIndex": 0 }"#).unwrap();
        assert!(raw.answer.is_null());
    }
}

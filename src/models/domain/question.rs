use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

pub const DEFAULT_QUESTION_POINTS: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Essay,
    MultipleChoice,
    Math,
    Coding,
}

impl QuestionType {
    /// Essay, math and coding answers are scored by the AI grader.
    pub fn is_free_form(&self) -> bool {
        !matches!(self, QuestionType::MultipleChoice)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Essay => "essay",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Math => "math",
            QuestionType::Coding => "coding",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<u32>,
    #[serde(default = "default_points")]
    pub points: f64,
}

fn default_points() -> f64 {
    DEFAULT_QUESTION_POINTS
}

impl Question {
    pub fn validate(&self, index: usize) -> AppResult<()> {
        let number = index + 1;
        if self.question.trim().is_empty() {
            return Err(AppError::ValidationError(format!(
                "Question {} has no text",
                number
            )));
        }
        if !self.points.is_finite() || self.points <= 0.0 {
            return Err(AppError::ValidationError(format!(
                "Question {} must be worth a positive number of points",
                number
            )));
        }
        if self.question_type == QuestionType::MultipleChoice {
            if self.options.len() < 2 {
                return Err(AppError::ValidationError(format!(
                    "Multiple-choice question {} needs at least two options",
                    number
                )));
            }
            match self.correct_answer {
                Some(correct) if (correct as usize) < self.options.len() => {}
                _ => {
                    return Err(AppError::ValidationError(format!(
                        "Multiple-choice question {} needs a correctAnswer index within its options",
                        number
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn student_view(&self) -> StudentQuestionView {
        StudentQuestionView {
            question_type: self.question_type,
            question: self.question.clone(),
            options: self.options.clone(),
            points: self.points,
        }
    }
}

/// What a student may see of a question: no reference answer, no answer key.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuestionView {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub points: f64,
}

#[cfg(test)]
impl Question {
    pub fn multiple_choice(text: &str, options: &[&str], correct: u32, points: f64) -> Self {
        Question {
            question_type: QuestionType::MultipleChoice,
            question: text.to_string(),
            key_answer: None,
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: Some(correct),
            points,
        }
    }

    pub fn free_form(question_type: QuestionType, text: &str, key: Option<&str>, points: f64) -> Self {
        Question {
            question_type,
            question: text.to_string(),
            key_answer: key.map(str::to_string),
            options: Vec::new(),
            correct_answer: None,
            points,
        }
    }
}

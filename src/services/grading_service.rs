use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::{
    errors::AppResult,
    models::domain::{Answer, GradedAnswer, Question, QuestionType, RawAnswer, SubmittedAnswer},
};

/// Free-form answers at or above this share of the points count as correct.
pub const PASS_THRESHOLD: f64 = 0.6;
/// Share of the points awarded when a free-form answer cannot be assessed.
pub const FALLBACK_CREDIT: f64 = 0.5;

pub const MANUAL_REVIEW_NOTE: &str = "Unscored by AI, needs manual review.";
const NO_FEEDBACK: &str = "No feedback available.";

#[derive(Clone, Debug, PartialEq)]
pub struct AssessmentRequest {
    pub question_type: QuestionType,
    pub question: String,
    pub key_answer: Option<String>,
    pub student_answer: String,
    pub max_score: f64,
}

/// What the assessor returned, before clamping.
#[derive(Clone, Debug, PartialEq)]
pub struct Assessment {
    pub score: f64,
    pub feedback: String,
}

#[derive(Debug, Error)]
pub enum GraderError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty response")]
    Empty,

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FreeformGrader: Send + Sync {
    async fn assess(
        &self,
        api_key: &str,
        request: AssessmentRequest,
    ) -> Result<Assessment, GraderError>;
}

/// Parses raw wire answers against the exam's questions.
///
/// Answers to question indexes the exam doesn't have are dropped, `null` answers count as
/// unanswered and a repeated index keeps the last value. Any type mismatch rejects the whole set.
pub fn parse_answers(questions: &[Question], raw: &[RawAnswer]) -> AppResult<Vec<SubmittedAnswer>> {
    let mut by_index = BTreeMap::new();

    for item in raw {
        let Some(question) = questions.get(item.question_index as usize) else {
            log::debug!("Ignoring answer for unknown question {}", item.question_index);
            continue;
        };
        match Answer::parse(question.question_type, &item.answer)? {
            Some(answer) => {
                by_index.insert(item.question_index, answer);
            }
            None => {
                by_index.remove(&item.question_index);
            }
        }
    }

    Ok(by_index
        .into_iter()
        .map(|(question_index, answer)| SubmittedAnswer {
            question_index,
            answer,
        })
        .collect())
}

pub struct GradingEngine {
    grader: Arc<dyn FreeformGrader>,
    timeout: Duration,
}

impl GradingEngine {
    pub fn new(grader: Arc<dyn FreeformGrader>, timeout: Duration) -> Self {
        Self { grader, timeout }
    }

    /// Scores every answer. Never fails: free-form answers that can't be assessed get partial credit.
    ///
    /// Free-form answers are assessed concurrently; the result keeps the input order.
    pub async fn grade(
        &self,
        questions: &[Question],
        answers: &[SubmittedAnswer],
        credential: Option<&SecretString>,
    ) -> Vec<GradedAnswer> {
        let api_key = credential.map(|c| c.expose_secret());

        let pending = answers.iter().filter_map(|submitted| {
            let question = questions.get(submitted.question_index as usize)?;
            Some(self.grade_one(submitted, question, api_key))
        });

        join_all(pending).await
    }

    async fn grade_one(
        &self,
        submitted: &SubmittedAnswer,
        question: &Question,
        api_key: Option<&str>,
    ) -> GradedAnswer {
        if !question.question_type.is_free_form() {
            return grade_choice(submitted, question);
        }

        let text = match &submitted.answer {
            Answer::Text(text) => text.clone(),
            Answer::Choice(index) => index.to_string(),
        };

        let Some(api_key) = api_key else {
            return fallback(
                submitted.question_index,
                question,
                Answer::Text(text),
                "AI grading not configured.",
            );
        };

        let request = AssessmentRequest {
            question_type: question.question_type,
            question: question.question.clone(),
            key_answer: question.key_answer.clone(),
            student_answer: text.clone(),
            max_score: question.points,
        };

        let outcome = match tokio::time::timeout(self.timeout, self.grader.assess(api_key, request))
            .await
        {
            Ok(result) => result.and_then(checked),
            Err(_) => Err(GraderError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(assessment) => {
                let score = assessment.score.clamp(0.0, question.points);
                let feedback = assessment.feedback.trim();
                GradedAnswer {
                    question_index: submitted.question_index,
                    question_type: question.question_type,
                    answer: Answer::Text(text),
                    is_correct: passes(score, question.points),
                    score,
                    ai_feedback: Some(if feedback.is_empty() {
                        NO_FEEDBACK.to_string()
                    } else {
                        feedback.to_string()
                    }),
                }
            }
            Err(e) => {
                log::warn!(
                    "AI grading failed for question {}: {}",
                    submitted.question_index,
                    e
                );
                fallback(
                    submitted.question_index,
                    question,
                    Answer::Text(text),
                    &format!("Auto-grading unavailable ({}).", e),
                )
            }
        }
    }
}

fn checked(assessment: Assessment) -> Result<Assessment, GraderError> {
    if assessment.score.is_finite() {
        Ok(assessment)
    } else {
        Err(GraderError::Malformed(format!(
            "score is not a number: {}",
            assessment.score
        )))
    }
}

fn passes(score: f64, points: f64) -> bool {
    score >= PASS_THRESHOLD * points
}

fn grade_choice(submitted: &SubmittedAnswer, question: &Question) -> GradedAnswer {
    let is_correct = match (submitted.answer.as_choice(), question.correct_answer) {
        (Some(chosen), Some(correct)) => chosen == correct,
        _ => false,
    };

    GradedAnswer {
        question_index: submitted.question_index,
        question_type: question.question_type,
        answer: submitted.answer.clone(),
        is_correct,
        score: if is_correct { question.points } else { 0.0 },
        ai_feedback: Some(if is_correct { "Correct!" } else { "Incorrect" }.to_string()),
    }
}

fn fallback(question_index: u32, question: &Question, answer: Answer, reason: &str) -> GradedAnswer {
    let score = question.points * FALLBACK_CREDIT;
    GradedAnswer {
        question_index,
        question_type: question.question_type,
        answer,
        is_correct: passes(score, question.points),
        score,
        ai_feedback: Some(format!("{} {}", reason, MANUAL_REVIEW_NOTE)),
    }
}

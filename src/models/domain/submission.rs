use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{answer::{Answer, SubmittedAnswer}, question::QuestionType};
use crate::errors::AppResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Submitted,
    Graded,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Graded => "graded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::InProgress)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_index: u32,
    pub question_type: QuestionType,
    pub answer: Answer,
    pub is_correct: bool,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_feedback: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    pub class_id: String,
    #[serde(default)]
    pub answers: Vec<GradedAnswer>,
    /// Answers saved while the attempt is still open.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub draft_answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub total_score: f64,
    #[serde(default)]
    pub max_score: f64,
    #[serde(default)]
    pub percentage: f64,
    pub status: SubmissionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<DateTime<Utc>>,
    /// Seconds between start and submit.
    #[serde(default)]
    pub time_spent: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn start(exam_id: &str, student_id: &str, class_id: &str, now: DateTime<Utc>) -> Self {
        Submission {
            id: Uuid::new_v4().to_string(),
            exam_id: exam_id.to_string(),
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            answers: Vec::new(),
            draft_answers: Vec::new(),
            total_score: 0.0,
            max_score: 0.0,
            percentage: 0.0,
            status: SubmissionStatus::InProgress,
            started_at: now,
            submitted_at: None,
            graded_at: None,
            time_spent: 0,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn is_owned_by(&self, student_id: &str) -> bool {
        self.student_id == student_id
    }

    pub fn answered_count(&self) -> usize {
        if self.status.is_terminal() {
            self.answers.len()
        } else {
            self.draft_answers.len()
        }
    }
}

/// Aggregate result of grading one attempt.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

impl ScoreSummary {
    pub fn from_scores(answers: &[GradedAnswer], max_score: f64) -> Self {
        let total_score: f64 = answers.iter().map(|a| a.score).sum();
        let percentage = if max_score > 0.0 {
            total_score / max_score * 100.0
        } else {
            0.0
        };
        ScoreSummary {
            total_score,
            max_score,
            percentage,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SubmissionFilter {
    pub exam_id: Option<String>,
    pub student_id: Option<String>,
    pub class_ids: Option<Vec<String>>,
    pub statuses: Option<Vec<SubmissionStatus>>,
}

impl SubmissionFilter {
    pub fn for_student(student_id: &str) -> Self {
        Self {
            student_id: Some(student_id.to_string()),
            ..Default::default()
        }
    }

    pub fn for_exam(exam_id: &str) -> Self {
        Self {
            exam_id: Some(exam_id.to_string()),
            ..Default::default()
        }
    }

    pub fn in_classes(class_ids: Vec<String>) -> Self {
        Self {
            class_ids: Some(class_ids),
            ..Default::default()
        }
    }

    pub fn attempt(exam_id: &str, student_id: &str) -> Self {
        Self {
            exam_id: Some(exam_id.to_string()),
            student_id: Some(student_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[SubmissionStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn to_document(&self) -> Document {
        let mut filter = doc! {};
        if let Some(exam_id) = &self.exam_id {
            filter.insert("examId", exam_id);
        }
        if let Some(student_id) = &self.student_id {
            filter.insert("studentId", student_id);
        }
        if let Some(class_ids) = &self.class_ids {
            filter.insert("classId", doc! { "$in": class_ids.clone() });
        }
        if let Some(statuses) = &self.statuses {
            let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
            filter.insert("status", doc! { "$in": statuses });
        }
        filter
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        self.exam_id.as_deref().map_or(true, |e| submission.exam_id == e)
            && self.student_id.as_deref().map_or(true, |s| submission.student_id == s)
            && self
                .class_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&submission.class_id))
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&submission.status))
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<GradedAnswer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_answers: Option<Vec<SubmittedAnswer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubmissionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<i64>,
}

impl SubmissionPatch {
    /// Final write for an attempt: answers, aggregates, timestamps and the graded status.
    pub fn graded(
        answers: Vec<GradedAnswer>,
        summary: &ScoreSummary,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            answers: Some(answers),
            draft_answers: Some(Vec::new()),
            total_score: Some(summary.total_score),
            max_score: Some(summary.max_score),
            percentage: Some(summary.percentage),
            status: Some(SubmissionStatus::Graded),
            submitted_at: Some(now),
            graded_at: Some(now),
            time_spent: Some((now - started_at).num_seconds().max(0)),
        }
    }

    pub fn draft(answers: Vec<SubmittedAnswer>) -> Self {
        Self {
            draft_answers: Some(answers),
            ..Default::default()
        }
    }

    pub fn to_set_document(&self) -> AppResult<Document> {
        let mut set = mongodb::bson::to_document(self)?;
        set.insert("updatedAt", mongodb::bson::to_bson(&Utc::now())?);
        Ok(doc! { "$set": set })
    }

    pub fn apply(&self, submission: &mut Submission) {
        if let Some(answers) = &self.answers {
            submission.answers = answers.clone();
        }
        if let Some(draft_answers) = &self.draft_answers {
            submission.draft_answers = draft_answers.clone();
        }
        if let Some(total_score) = self.total_score {
            submission.total_score = total_score;
        }
        if let Some(max_score) = self.max_score {
            submission.max_score = max_score;
        }
        if let Some(percentage) = self.percentage {
            submission.percentage = percentage;
        }
        if let Some(status) = self.status {
            submission.status = status;
        }
        if let Some(submitted_at) = self.submitted_at {
            submission.submitted_at = Some(submitted_at);
        }
        if let Some(graded_at) = self.graded_at {
            submission.graded_at = Some(graded_at);
        }
        if let Some(time_spent) = self.time_spent {
            submission.time_spent = time_spent;
        }
        submission.updated_at = Some(Utc::now());
    }
}

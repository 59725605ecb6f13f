use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::question::{Question, StudentQuestionView};
use crate::errors::{AppError, AppResult};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSettings {
    #[serde(default = "enabled")]
    pub shuffle_questions: bool,
    #[serde(default = "enabled")]
    pub shuffle_options: bool,
    #[serde(default = "enabled")]
    pub show_results: bool,
    #[serde(default = "enabled")]
    pub allow_review: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            shuffle_questions: true,
            shuffle_options: true,
            show_results: true,
            allow_review: true,
        }
    }
}

/// Where an exam sits relative to its submission window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamAvailability {
    Upcoming,
    Active,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub class_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Minutes.
    pub duration: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub settings: ExamSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Exam {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        class_id: &str,
        title: &str,
        description: Option<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration: Option<u32>,
        questions: Vec<Question>,
        settings: ExamSettings,
    ) -> AppResult<Self> {
        validate_schedule(start_time, end_time)?;
        validate_questions(&questions)?;

        let now = Utc::now();
        Ok(Exam {
            id: Uuid::new_v4().to_string(),
            class_id: class_id.to_string(),
            title: title.trim().to_string(),
            description,
            start_time,
            end_time,
            duration: duration.unwrap_or_else(|| window_minutes(start_time, end_time)),
            questions,
            is_published: false,
            settings,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// Inclusive at both ends of the window.
    pub fn accepts_attempts_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    pub fn availability_at(&self, now: DateTime<Utc>) -> ExamAvailability {
        if now < self.start_time {
            ExamAvailability::Upcoming
        } else if now > self.end_time {
            ExamAvailability::Completed
        } else {
            ExamAvailability::Active
        }
    }

    pub fn max_score(&self) -> f64 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn student_view(&self) -> StudentExamView {
        StudentExamView {
            id: self.id.clone(),
            class_id: self.class_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration,
            questions: self.questions.iter().map(Question::student_view).collect(),
            settings: self.settings.clone(),
        }
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> ExamSummary {
        ExamSummary {
            id: self.id.clone(),
            class_id: self.class_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration,
            question_count: self.questions.len(),
            status: self.availability_at(now),
        }
    }
}

/// `ceil((end - start) / 60s)`, never below one minute.
pub fn window_minutes(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> u32 {
    let seconds = (end_time - start_time).num_seconds().max(0);
    let minutes = (seconds + 59) / 60;
    u32::try_from(minutes.max(1)).unwrap_or(u32::MAX)
}

pub fn validate_schedule(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> AppResult<()> {
    if end_time <= start_time {
        return Err(AppError::ValidationError(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_questions(questions: &[Question]) -> AppResult<()> {
    if questions.is_empty() {
        return Err(AppError::ValidationError(
            "An exam needs at least one question".to_string(),
        ));
    }
    questions
        .iter()
        .enumerate()
        .try_for_each(|(index, question)| question.validate(index))
}

/// Exam as served to students: answer keys removed.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentExamView {
    pub id: String,
    pub class_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: u32,
    pub questions: Vec<StudentQuestionView>,
    pub settings: ExamSettings,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub id: String,
    pub class_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: u32,
    pub question_count: usize,
    pub status: ExamAvailability,
}

#[derive(Clone, Debug, Default)]
pub struct ExamFilter {
    pub class_ids: Option<Vec<String>>,
    pub is_published: Option<bool>,
}

impl ExamFilter {
    pub fn in_classes(class_ids: Vec<String>) -> Self {
        Self {
            class_ids: Some(class_ids),
            ..Default::default()
        }
    }

    pub fn published(mut self) -> Self {
        self.is_published = Some(true);
        self
    }

    pub fn to_document(&self) -> Document {
        let mut filter = doc! {};
        if let Some(class_ids) = &self.class_ids {
            filter.insert("classId", doc! { "$in": class_ids.clone() });
        }
        if let Some(is_published) = self.is_published {
            filter.insert("isPublished", is_published);
        }
        filter
    }

    pub fn matches(&self, exam: &Exam) -> bool {
        self.class_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&exam.class_id))
            && self.is_published.map_or(true, |p| exam.is_published == p)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<ExamSettings>,
}

impl ExamPatch {
    pub fn publish() -> Self {
        Self {
            is_published: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.duration.is_none()
            && self.questions.is_none()
            && self.is_published.is_none()
            && self.settings.is_none()
    }

    /// Checks the exam that would result from applying this patch to `current`.
    pub fn validate_against(&self, current: &Exam) -> AppResult<()> {
        let mut candidate = current.clone();
        self.apply(&mut candidate);
        validate_schedule(candidate.start_time, candidate.end_time)?;
        validate_questions(&candidate.questions)
    }

    pub fn to_set_document(&self) -> AppResult<Document> {
        let mut set = mongodb::bson::to_document(self)?;
        set.insert("updatedAt", mongodb::bson::to_bson(&Utc::now())?);
        Ok(doc! { "$set": set })
    }

    pub fn apply(&self, exam: &mut Exam) {
        if let Some(title) = &self.title {
            exam.title = title.clone();
        }
        if let Some(description) = &self.description {
            exam.description = Some(description.clone());
        }
        if let Some(start_time) = self.start_time {
            exam.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            exam.end_time = end_time;
        }
        if let Some(duration) = self.duration {
            exam.duration = duration;
        }
        if let Some(questions) = &self.questions {
            exam.questions = questions.clone();
        }
        if let Some(is_published) = self.is_published {
            exam.is_published = is_published;
        }
        if let Some(settings) = &self.settings {
            exam.settings = settings.clone();
        }
        exam.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
impl Exam {
    /// Published exam whose window is `[start, end]`.
    pub fn test_exam(class_id: &str, questions: Vec<Question>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let mut exam = Exam::new(class_id, "Midterm", None, start, end, None, questions, ExamSettings::default())
            .expect("valid test exam");
        exam.is_published = true;
        exam
    }
}

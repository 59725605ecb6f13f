use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;
use validator::Validate;

use crate::models::domain::{
    class::ClassPatch, exam::ExamPatch, ExamSettings, Question, RawAnswer, UserPatch, UserRole,
};

static USERNAME_REGEX: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"^[a-zA-Z0-9_.]+$").expect("USERNAME_REGEX is a valid regex pattern")
});

static NISN_REGEX: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^[0-9]{4,20}$").expect("NISN_REGEX is a valid regex pattern"));

/// Login body; the `role` tag decides which credential is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum LoginRequest {
    #[serde(alias = "siswa")]
    Student { username: String, nisn: String },
    #[serde(alias = "guru")]
    Teacher { username: String, password: String },
    Owner { username: String, password: String },
}

impl LoginRequest {
    pub fn role(&self) -> UserRole {
        match self {
            LoginRequest::Student { .. } => UserRole::Student,
            LoginRequest::Teacher { .. } => UserRole::Teacher,
            LoginRequest::Owner { .. } => UserRole::Owner,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            LoginRequest::Student { username, .. }
            | LoginRequest::Teacher { username, .. }
            | LoginRequest::Owner { username, .. } => username,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStudentRequest {
    #[validate(length(min = 3, max = 50), regex(path = *USERNAME_REGEX, message = "Username may only contain letters, digits, '_' and '.'"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(regex(path = *NISN_REGEX, message = "NISN must be 4 to 20 digits"))]
    pub nisn: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50), regex(path = *USERNAME_REGEX, message = "Username may only contain letters, digits, '_' and '.'"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub role: UserRole,

    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,

    #[validate(regex(path = *NISN_REGEX, message = "NISN must be 4 to 20 digits"))]
    pub nisn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 50), regex(path = *USERNAME_REGEX, message = "Username may only contain letters, digits, '_' and '.'"))]
    pub username: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(regex(path = *NISN_REGEX, message = "NISN must be 4 to 20 digits"))]
    pub nisn: Option<String>,

    pub is_suspended: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(min = 1, max = 100))]
    pub subject: String,

    #[validate(length(max = 20))]
    pub grade: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,

    #[validate(length(max = 20))]
    pub grade: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub is_active: Option<bool>,
}

impl From<UpdateUserRequest> for UserPatch {
    fn from(request: UpdateUserRequest) -> Self {
        UserPatch {
            username: request.username.map(|u| u.trim().to_string()),
            email: request.email.map(|e| e.trim().to_lowercase()),
            nisn: request.nisn.map(|n| n.trim().to_string()),
            is_suspended: request.is_suspended,
            ..Default::default()
        }
    }
}

impl From<UpdateClassRequest> for ClassPatch {
    fn from(request: UpdateClassRequest) -> Self {
        ClassPatch {
            name: request.name.map(|n| n.trim().to_string()),
            subject: request.subject.map(|s| s.trim().to_string()),
            grade: request.grade,
            description: request.description,
            is_active: request.is_active,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinClassRequest {
    #[validate(length(min = 1, max = 32))]
    pub invite_code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(length(min = 1))]
    pub class_id: String,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    #[validate(range(min = 1))]
    pub duration: Option<u32>,

    pub questions: Vec<Question>,

    pub settings: Option<ExamSettings>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    #[validate(range(min = 1))]
    pub duration: Option<u32>,

    pub questions: Option<Vec<Question>>,

    pub settings: Option<ExamSettings>,
}

impl From<UpdateExamRequest> for ExamPatch {
    fn from(request: UpdateExamRequest) -> Self {
        ExamPatch {
            title: request.title.map(|t| t.trim().to_string()),
            description: request.description,
            start_time: request.start_time,
            end_time: request.end_time,
            duration: request.duration,
            questions: request.questions,
            is_published: None,
            settings: request.settings,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartSubmissionRequest {
    #[validate(length(min = 1, message = "Exam ID is required"))]
    pub exam_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswersRequest {
    #[validate(length(min = 1, message = "Submission ID is required"))]
    pub submission_id: String,

    pub answers: Vec<RawAnswer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressRequest {
    pub answers: Vec<RawAnswer>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[validate(length(max = 200))]
    pub gemini_api_key: Option<String>,

    #[validate(length(max = 1000))]
    pub mongodb_url: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub app_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestDatabaseRequest {
    #[validate(length(min = 1, message = "MongoDB URL is required"))]
    pub mongodb_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceQuery {
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub exam_id: Option<String>,
}

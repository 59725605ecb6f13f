use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppResult;

pub const INVITE_CODE_LEN: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub teacher_id: String,
    /// Globally unique, never changed after creation.
    pub invite_code: String,
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub exams: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Class {
    pub fn new(
        name: &str,
        subject: &str,
        grade: Option<String>,
        description: Option<String>,
        teacher_id: &str,
    ) -> Self {
        let now = Utc::now();
        Class {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            subject: subject.trim().to_string(),
            grade,
            description,
            teacher_id: teacher_id.to_string(),
            invite_code: generate_invite_code(),
            students: Vec::new(),
            exams: Vec::new(),
            is_active: true,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn is_taught_by(&self, user_id: &str) -> bool {
        self.teacher_id == user_id
    }

    pub fn has_student(&self, user_id: &str) -> bool {
        self.students.iter().any(|s| s == user_id)
    }
}

pub fn generate_invite_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(INVITE_CODE_LEN)
        .collect::<String>()
        .to_uppercase()
}

#[derive(Clone, Debug, Default)]
pub struct ClassFilter {
    pub teacher_id: Option<String>,
    pub student_id: Option<String>,
}

impl ClassFilter {
    pub fn taught_by(teacher_id: &str) -> Self {
        Self {
            teacher_id: Some(teacher_id.to_string()),
            ..Default::default()
        }
    }

    pub fn joined_by(student_id: &str) -> Self {
        Self {
            student_id: Some(student_id.to_string()),
            ..Default::default()
        }
    }

    pub fn to_document(&self) -> Document {
        let mut filter = doc! {};
        if let Some(teacher_id) = &self.teacher_id {
            filter.insert("teacherId", teacher_id);
        }
        if let Some(student_id) = &self.student_id {
            // array membership
            filter.insert("students", student_id);
        }
        filter
    }

    pub fn matches(&self, class: &Class) -> bool {
        self.teacher_id.as_deref().map_or(true, |t| class.teacher_id == t)
            && self.student_id.as_deref().map_or(true, |s| class.has_student(s))
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ClassPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.subject.is_none()
            && self.grade.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
    }

    pub fn to_set_document(&self) -> AppResult<Document> {
        let mut set = mongodb::bson::to_document(self)?;
        set.insert("updatedAt", mongodb::bson::to_bson(&Utc::now())?);
        Ok(doc! { "$set": set })
    }

    pub fn apply(&self, class: &mut Class) {
        if let Some(name) = &self.name {
            class.name = name.clone();
        }
        if let Some(subject) = &self.subject {
            class.subject = subject.clone();
        }
        if let Some(grade) = &self.grade {
            class.grade = Some(grade.clone());
        }
        if let Some(description) = &self.description {
            class.description = Some(description.clone());
        }
        if let Some(is_active) = self.is_active {
            class.is_active = is_active;
        }
        class.updated_at = Some(Utc::now());
    }
}

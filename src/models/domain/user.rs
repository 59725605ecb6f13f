use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::AppResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    #[serde(alias = "guru")]
    Teacher,
    #[serde(alias = "siswa")]
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        }
    }

    /// Owners and teachers authenticate with a password; students with a NISN.
    pub fn is_privileged(&self) -> bool {
        !matches!(self, UserRole::Student)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nisn: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub is_suspended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new_privileged(username: &str, email: Option<String>, role: UserRole, password_hash: String) -> Self {
        Self::base(username, email, role, Some(password_hash), None)
    }

    pub fn new_student(username: &str, email: Option<String>, nisn: &str) -> Self {
        Self::base(username, email, UserRole::Student, None, Some(nisn.to_string()))
    }

    fn base(
        username: &str,
        email: Option<String>,
        role: UserRole,
        password_hash: Option<String>,
        nisn: Option<String>,
    ) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4().to_string(),
            username: username.trim().to_string(),
            email: email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()),
            role,
            password_hash,
            nisn,
            classes: Vec::new(),
            last_active: None,
            is_online: false,
            is_suspended: false,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }
}

/// Selection criteria for `UserRepository::list`.
#[derive(Clone, Debug, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub ids: Option<Vec<String>>,
}

impl UserFilter {
    pub fn role(role: UserRole) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    pub fn ids(ids: Vec<String>) -> Self {
        Self {
            ids: Some(ids),
            ..Default::default()
        }
    }

    pub fn to_document(&self) -> Document {
        let mut filter = doc! {};
        if let Some(role) = self.role {
            filter.insert("role", role.as_str());
        }
        if let Some(ids) = &self.ids {
            filter.insert("id", doc! { "$in": ids.clone() });
        }
        filter
    }

    pub fn matches(&self, user: &User) -> bool {
        self.role.map_or(true, |role| user.role == role)
            && self.ids.as_ref().map_or(true, |ids| ids.contains(&user.id))
    }
}

/// Partial update for a user; `None` fields are left untouched.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nisn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

impl UserPatch {
    pub fn presence(online: bool, at: DateTime<Utc>) -> Self {
        Self {
            is_online: Some(online),
            last_active: Some(at),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.nisn.is_none()
            && self.is_suspended.is_none()
            && self.is_online.is_none()
            && self.last_active.is_none()
    }

    pub fn to_set_document(&self) -> AppResult<Document> {
        let mut set = mongodb::bson::to_document(self)?;
        set.insert("updatedAt", mongodb::bson::to_bson(&Utc::now())?);
        Ok(doc! { "$set": set })
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(email) = &self.email {
            user.email = Some(email.clone());
        }
        if let Some(nisn) = &self.nisn {
            user.nisn = Some(nisn.clone());
        }
        if let Some(is_suspended) = self.is_suspended {
            user.is_suspended = is_suspended;
        }
        if let Some(is_online) = self.is_online {
            user.is_online = is_online;
        }
        if let Some(last_active) = self.last_active {
            user.last_active = Some(last_active);
        }
        user.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
impl User {
    pub fn test_student(username: &str, nisn: &str) -> Self {
        User::new_student(username, None, nisn)
    }

    pub fn test_teacher(username: &str) -> Self {
        User::new_privileged(
            username,
            Some(format!("{}@example.com", username)),
            UserRole::Teacher,
            "not-a-real-hash".to_string(),
        )
    }

    pub fn test_owner(username: &str) -> Self {
        User::new_privileged(username, None, UserRole::Owner, "not-a-real-hash".to_string())
    }
}

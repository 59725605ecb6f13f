use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};

use crate::{
    auth::require_staff,
    errors::AppResult,
    models::{
        domain::{
            ClassFilter, ExamFilter, SubmissionFilter, SubmissionStatus, User, UserFilter,
            UserPatch, UserRole,
        },
        dto::{
            request::{PresenceQuery, ProgressQuery},
            response::{ExamProgress, StudentPresence},
        },
    },
    repositories::{
        class_repository::class_not_found, ClassRepository, ExamRepository,
        SubmissionRepository, UserRepository,
    },
};

/// A student counts as online for this long after their last heartbeat.
pub const ONLINE_WINDOW_SECS: i64 = 30;

const UNKNOWN: &str = "Unknown";

pub fn is_online_at(user: &User, now: DateTime<Utc>) -> bool {
    user.is_online
        && user
            .last_active
            .is_some_and(|at| now - at <= Duration::seconds(ONLINE_WINDOW_SECS))
}

pub struct PresenceService {
    users: Arc<dyn UserRepository>,
    classes: Arc<dyn ClassRepository>,
    exams: Arc<dyn ExamRepository>,
    submissions: Arc<dyn SubmissionRepository>,
}

impl PresenceService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        classes: Arc<dyn ClassRepository>,
        exams: Arc<dyn ExamRepository>,
        submissions: Arc<dyn SubmissionRepository>,
    ) -> Self {
        Self {
            users,
            classes,
            exams,
            submissions,
        }
    }

    pub async fn heartbeat(&self, actor: &User) -> AppResult<()> {
        self.heartbeat_at(actor, Utc::now()).await
    }

    pub async fn heartbeat_at(&self, actor: &User, now: DateTime<Utc>) -> AppResult<()> {
        self.users
            .update(&actor.id, UserPatch::presence(true, now))
            .await
            .map(|_| ())
    }

    pub async fn status(&self, actor: &User, query: PresenceQuery) -> AppResult<Vec<StudentPresence>> {
        self.status_at(actor, query, Utc::now()).await
    }

    /// Every student with their derived online flag, optionally limited to one class roster.
    pub async fn status_at(
        &self,
        actor: &User,
        query: PresenceQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<StudentPresence>> {
        require_staff(actor)?;

        let filter = match query.class_id.as_deref().filter(|id| !id.is_empty()) {
            Some(class_id) => {
                let class = self
                    .classes
                    .find_by_id(class_id)
                    .await?
                    .ok_or_else(|| class_not_found(class_id))?;
                if class.students.is_empty() {
                    return Ok(Vec::new());
                }
                UserFilter {
                    role: Some(UserRole::Student),
                    ..UserFilter::ids(class.students)
                }
            }
            None => UserFilter::role(UserRole::Student),
        };

        let students = self.users.list(filter).await?;
        Ok(students
            .into_iter()
            .map(|s| StudentPresence {
                is_online: is_online_at(&s, now),
                id: s.id,
                username: s.username,
                nisn: s.nisn,
                last_active: s.last_active,
            })
            .collect())
    }

    /// Open attempts with how many questions each has answered so far.
    ///
    /// Teachers only see attempts in their own classes.
    pub async fn progress(&self, actor: &User, query: ProgressQuery) -> AppResult<Vec<ExamProgress>> {
        require_staff(actor)?;

        let mut filter = SubmissionFilter {
            exam_id: query.exam_id.filter(|id| !id.is_empty()),
            ..Default::default()
        }
        .with_statuses(&[SubmissionStatus::InProgress]);
        if actor.role == UserRole::Teacher {
            let class_ids: Vec<String> = self
                .classes
                .list(ClassFilter::taught_by(&actor.id))
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();
            if class_ids.is_empty() {
                return Ok(Vec::new());
            }
            filter.class_ids = Some(class_ids);
        }

        let attempts = self.submissions.list(filter).await?;
        if attempts.is_empty() {
            return Ok(Vec::new());
        }

        let student_ids: Vec<String> = attempts.iter().map(|s| s.student_id.clone()).collect();
        let names: HashMap<String, String> = self
            .users
            .list(UserFilter::ids(student_ids))
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let class_ids: Vec<String> = attempts.iter().map(|s| s.class_id.clone()).collect();
        let titles: HashMap<String, String> = self
            .exams
            .list(ExamFilter::in_classes(class_ids))
            .await?
            .into_iter()
            .map(|e| (e.id, e.title))
            .collect();

        Ok(attempts
            .into_iter()
            .map(|s| ExamProgress {
                answered_count: s.answered_count(),
                student_name: names
                    .get(&s.student_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                exam_title: titles
                    .get(&s.exam_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                submission_id: s.id,
                student_id: s.student_id,
                exam_id: s.exam_id,
                started_at: s.started_at,
            })
            .collect())
    }
}

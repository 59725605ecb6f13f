use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    config::Config,
    db::backend::Repositories,
    errors::{AppError, AppResult},
    models::domain::{
        Class, ClassFilter, ClassPatch, Exam, ExamFilter, ExamPatch, Settings, SettingsPatch,
        Submission, SubmissionFilter, SubmissionPatch, SubmissionStatus, User, UserFilter,
        UserPatch,
    },
    repositories::{
        class_repository::class_not_found,
        exam_repository::exam_not_found,
        submission_repository::{stale_transition, submission_not_found},
        user_repository::user_not_found,
        ClassRepository, ExamRepository, SettingsRepository, SubmissionRepository,
        UserRepository,
    },
};

/// Decrements `counter` if positive; `true` means "fail this call".
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn injected_failure() -> AppError {
    AppError::DatabaseError("injected failure".to_string())
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
    pub add_class_failures: AtomicUsize,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list(&self, filter: UserFilter) -> AppResult<Vec<User>> {
        let users = self.users.read().await;
        let mut items: Vec<User> = users.values().filter(|u| filter.matches(u)).cloned().collect();
        items.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(items)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let wanted = username.to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_by_nisn(&self, nisn: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.nisn.as_deref() == Some(nisn))
            .cloned())
    }

    async fn create(&self, user: User) -> AppResult<User> {
        let mut users = self.users.write().await;
        let wanted = user.username.to_lowercase();
        let duplicate = users.values().any(|u| {
            u.id == user.id
                || u.username.to_lowercase() == wanted
                || (user.nisn.is_some() && u.nisn == user.nisn)
        });
        if duplicate {
            return Err(AppError::Conflict("Duplicate key: user".to_string()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> AppResult<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or_else(|| user_not_found(id))?;
        patch.apply(user);
        Ok(user.clone())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.users
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| user_not_found(id))
    }

    async fn add_class(&self, user_id: &str, class_id: &str) -> AppResult<()> {
        if take_failure(&self.add_class_failures) {
            return Err(injected_failure());
        }
        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or_else(|| user_not_found(user_id))?;
        if !user.classes.iter().any(|c| c == class_id) {
            user.classes.push(class_id.to_string());
        }
        Ok(())
    }

    async fn remove_class(&self, user_id: &str, class_id: &str) -> AppResult<()> {
        if let Some(user) = self.users.write().await.get_mut(user_id) {
            user.classes.retain(|c| c != class_id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryClassRepository {
    classes: RwLock<HashMap<String, Class>>,
    pub add_exam_failures: AtomicUsize,
}

impl InMemoryClassRepository {
    async fn modify(&self, id: &str, change: impl FnOnce(&mut Class)) -> AppResult<()> {
        let mut classes = self.classes.write().await;
        let class = classes.get_mut(id).ok_or_else(|| class_not_found(id))?;
        change(class);
        Ok(())
    }
}

#[async_trait]
impl ClassRepository for InMemoryClassRepository {
    async fn list(&self, filter: ClassFilter) -> AppResult<Vec<Class>> {
        let classes = self.classes.read().await;
        Ok(classes.values().filter(|c| filter.matches(c)).cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Class>> {
        Ok(self.classes.read().await.get(id).cloned())
    }

    async fn find_by_invite_code(&self, code: &str) -> AppResult<Option<Class>> {
        let code = code.trim().to_uppercase();
        Ok(self
            .classes
            .read()
            .await
            .values()
            .find(|c| c.invite_code == code)
            .cloned())
    }

    async fn create(&self, class: Class) -> AppResult<Class> {
        let mut classes = self.classes.write().await;
        if classes
            .values()
            .any(|c| c.id == class.id || c.invite_code == class.invite_code)
        {
            return Err(AppError::Conflict("Duplicate key: class".to_string()));
        }
        classes.insert(class.id.clone(), class.clone());
        Ok(class)
    }

    async fn update(&self, id: &str, patch: ClassPatch) -> AppResult<Class> {
        let mut classes = self.classes.write().await;
        let class = classes.get_mut(id).ok_or_else(|| class_not_found(id))?;
        patch.apply(class);
        Ok(class.clone())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.classes
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| class_not_found(id))
    }

    async fn add_student(&self, class_id: &str, student_id: &str) -> AppResult<()> {
        self.modify(class_id, |c| {
            if !c.has_student(student_id) {
                c.students.push(student_id.to_string());
            }
        })
        .await
    }

    async fn remove_student(&self, class_id: &str, student_id: &str) -> AppResult<()> {
        self.modify(class_id, |c| c.students.retain(|s| s != student_id)).await
    }

    async fn add_exam(&self, class_id: &str, exam_id: &str) -> AppResult<()> {
        if take_failure(&self.add_exam_failures) {
            return Err(injected_failure());
        }
        self.modify(class_id, |c| {
            if !c.exams.iter().any(|e| e == exam_id) {
                c.exams.push(exam_id.to_string());
            }
        })
        .await
    }

    async fn remove_exam(&self, class_id: &str, exam_id: &str) -> AppResult<()> {
        self.modify(class_id, |c| c.exams.retain(|e| e != exam_id)).await
    }
}

#[derive(Default)]
pub struct InMemoryExamRepository {
    exams: RwLock<HashMap<String, Exam>>,
}

#[async_trait]
impl ExamRepository for InMemoryExamRepository {
    async fn list(&self, filter: ExamFilter) -> AppResult<Vec<Exam>> {
        let exams = self.exams.read().await;
        Ok(exams.values().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Exam>> {
        Ok(self.exams.read().await.get(id).cloned())
    }

    async fn create(&self, exam: Exam) -> AppResult<Exam> {
        self.exams.write().await.insert(exam.id.clone(), exam.clone());
        Ok(exam)
    }

    async fn update(&self, id: &str, patch: ExamPatch) -> AppResult<Exam> {
        let mut exams = self.exams.write().await;
        let exam = exams.get_mut(id).ok_or_else(|| exam_not_found(id))?;
        patch.apply(exam);
        Ok(exam.clone())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.exams
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| exam_not_found(id))
    }
}

/// Enforces the same open-attempt uniqueness as the MongoDB partial index.
#[derive(Default)]
pub struct InMemorySubmissionRepository {
    submissions: RwLock<HashMap<String, Submission>>,
    /// While positive, `create` first stores a rival open attempt for the same student.
    pub rival_starts: AtomicUsize,
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn list(&self, filter: SubmissionFilter) -> AppResult<Vec<Submission>> {
        let submissions = self.submissions.read().await;
        Ok(submissions.values().filter(|s| filter.matches(s)).cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Submission>> {
        Ok(self.submissions.read().await.get(id).cloned())
    }

    async fn create(&self, submission: Submission) -> AppResult<Submission> {
        let mut submissions = self.submissions.write().await;
        if take_failure(&self.rival_starts) {
            let rival = Submission::start(
                &submission.exam_id,
                &submission.student_id,
                &submission.class_id,
                submission.started_at,
            );
            submissions.insert(rival.id.clone(), rival);
        }
        let open_attempt_exists = submissions.values().any(|s| {
            s.exam_id == submission.exam_id
                && s.student_id == submission.student_id
                && s.status == SubmissionStatus::InProgress
                && submission.status == SubmissionStatus::InProgress
        });
        if open_attempt_exists {
            return Err(AppError::Conflict("Duplicate key: open attempt".to_string()));
        }
        submissions.insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    async fn update(&self, id: &str, patch: SubmissionPatch) -> AppResult<Submission> {
        let mut submissions = self.submissions.write().await;
        let submission = submissions.get_mut(id).ok_or_else(|| submission_not_found(id))?;
        patch.apply(submission);
        Ok(submission.clone())
    }

    async fn transition(
        &self,
        id: &str,
        expected: SubmissionStatus,
        patch: SubmissionPatch,
    ) -> AppResult<Submission> {
        let mut submissions = self.submissions.write().await;
        let submission = submissions.get_mut(id).ok_or_else(|| submission_not_found(id))?;
        if submission.status != expected {
            return Err(stale_transition(id, expected));
        }
        patch.apply(submission);
        Ok(submission.clone())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.submissions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| submission_not_found(id))
    }
}

pub struct InMemorySettingsRepository {
    defaults: Settings,
    stored: RwLock<Option<Settings>>,
}

impl InMemorySettingsRepository {
    pub fn new(defaults: Settings) -> Self {
        Self {
            defaults,
            stored: RwLock::new(None),
        }
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get(&self) -> AppResult<Settings> {
        Ok(self
            .stored
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.defaults.clone()))
    }

    async fn update(&self, patch: SettingsPatch) -> AppResult<Settings> {
        let mut stored = self.stored.write().await;
        let mut settings = stored.clone().unwrap_or_else(|| self.defaults.clone());
        patch.apply(&mut settings);
        *stored = Some(settings.clone());
        Ok(settings)
    }

    async fn reset(&self) -> AppResult<Settings> {
        *self.stored.write().await = None;
        Ok(self.defaults.clone())
    }
}

/// Concrete in-memory repositories, kept typed so tests can inject failures.
pub struct InMemoryStore {
    pub users: Arc<InMemoryUserRepository>,
    pub classes: Arc<InMemoryClassRepository>,
    pub exams: Arc<InMemoryExamRepository>,
    pub submissions: Arc<InMemorySubmissionRepository>,
    pub settings: Arc<InMemorySettingsRepository>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::default()),
            classes: Arc::new(InMemoryClassRepository::default()),
            exams: Arc::new(InMemoryExamRepository::default()),
            submissions: Arc::new(InMemorySubmissionRepository::default()),
            settings: Arc::new(InMemorySettingsRepository::new(Settings::from_config(
                &Config::test_config(),
            ))),
        }
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            users: self.users.clone(),
            classes: self.classes.clone(),
            exams: self.exams.clone(),
            submissions: self.submissions.clone(),
            settings: self.settings.clone(),
        }
    }
}

pub fn in_memory_repositories() -> Repositories {
    InMemoryStore::new().repositories()
}

pub mod test_helpers {
    use actix_web::http::StatusCode;

    /// Asserts that a status code represents an error (4xx or 5xx)
    pub fn assert_error_status(status: StatusCode) {
        assert!(
            status.is_client_error() || status.is_server_error(),
            "Expected error status, got: {}",
            status
        );
    }

    /// Asserts that a status code represents success (2xx)
    pub fn assert_success_status(status: StatusCode) {
        assert!(
            status.is_success(),
            "Expected success status, got: {}",
            status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_open_attempt_uniqueness() {
        let repo = InMemorySubmissionRepository::default();
        repo.create(Submission::start("e1", "s1", "c1", Utc::now())).await.unwrap();

        let second = repo.create(Submission::start("e1", "s1", "c1", Utc::now())).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        repo.create(Submission::start("e1", "s2", "c1", Utc::now())).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let repo = InMemoryUserRepository::default();
        let user = repo.create(User::test_student("ani", "1")).await.unwrap();
        repo.add_class_failures.store(1, Ordering::SeqCst);

        assert!(repo.add_class(&user.id, "c1").await.is_err());
        assert!(repo.add_class(&user.id, "c1").await.is_ok());
    }
}

//! Repositories that route every call to MongoDB or to local storage depending on the
//! current storage mode. Only users have a local representation; the other aggregates read
//! as empty and refuse writes while the server is in local mode.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    db::backend::StorageBackend,
    errors::{AppError, AppResult},
    models::domain::{
        Class, ClassFilter, ClassPatch, Exam, ExamFilter, ExamPatch, Settings, SettingsPatch,
        Submission, SubmissionFilter, SubmissionPatch, SubmissionStatus, User, UserFilter,
        UserPatch,
    },
    repositories::{
        ClassRepository, ExamRepository, SettingsRepository, SubmissionRepository,
        UserRepository,
    },
};

pub struct HybridUserRepository {
    backend: Arc<StorageBackend>,
}

impl HybridUserRepository {
    pub fn new(backend: Arc<StorageBackend>) -> Self {
        Self { backend }
    }

    async fn target(&self) -> Arc<dyn UserRepository> {
        match self.backend.remote().await {
            Some(remote) => remote.users,
            None => self.backend.local_users(),
        }
    }
}

#[async_trait]
impl UserRepository for HybridUserRepository {
    async fn list(&self, filter: UserFilter) -> AppResult<Vec<User>> {
        self.target().await.list(filter).await
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        self.target().await.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.target().await.find_by_username(username).await
    }

    async fn find_by_nisn(&self, nisn: &str) -> AppResult<Option<User>> {
        self.target().await.find_by_nisn(nisn).await
    }

    async fn create(&self, user: User) -> AppResult<User> {
        self.target().await.create(user).await
    }

    async fn update(&self, id: &str, patch: UserPatch) -> AppResult<User> {
        self.target().await.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.target().await.delete(id).await
    }

    async fn add_class(&self, user_id: &str, class_id: &str) -> AppResult<()> {
        self.target().await.add_class(user_id, class_id).await
    }

    async fn remove_class(&self, user_id: &str, class_id: &str) -> AppResult<()> {
        self.target().await.remove_class(user_id, class_id).await
    }
}

const CLASSES: &str = "Classes";
const EXAMS: &str = "Exams";
const SUBMISSIONS: &str = "Submissions";
const SETTINGS: &str = "Settings changes";

pub struct HybridClassRepository {
    backend: Arc<StorageBackend>,
}

impl HybridClassRepository {
    pub fn new(backend: Arc<StorageBackend>) -> Self {
        Self { backend }
    }

    async fn durable(&self) -> AppResult<Arc<dyn ClassRepository>> {
        self.backend
            .remote()
            .await
            .map(|r| r.classes)
            .ok_or_else(|| AppError::requires_durable_backend(CLASSES))
    }
}

#[async_trait]
impl ClassRepository for HybridClassRepository {
    async fn list(&self, filter: ClassFilter) -> AppResult<Vec<Class>> {
        match self.backend.remote().await {
            Some(remote) => remote.classes.list(filter).await,
            None => Ok(Vec::new()),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Class>> {
        match self.backend.remote().await {
            Some(remote) => remote.classes.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn find_by_invite_code(&self, code: &str) -> AppResult<Option<Class>> {
        match self.backend.remote().await {
            Some(remote) => remote.classes.find_by_invite_code(code).await,
            None => Ok(None),
        }
    }

    async fn create(&self, class: Class) -> AppResult<Class> {
        self.durable().await?.create(class).await
    }

    async fn update(&self, id: &str, patch: ClassPatch) -> AppResult<Class> {
        self.durable().await?.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.durable().await?.delete(id).await
    }

    async fn add_student(&self, class_id: &str, student_id: &str) -> AppResult<()> {
        self.durable().await?.add_student(class_id, student_id).await
    }

    async fn remove_student(&self, class_id: &str, student_id: &str) -> AppResult<()> {
        self.durable().await?.remove_student(class_id, student_id).await
    }

    async fn add_exam(&self, class_id: &str, exam_id: &str) -> AppResult<()> {
        self.durable().await?.add_exam(class_id, exam_id).await
    }

    async fn remove_exam(&self, class_id: &str, exam_id: &str) -> AppResult<()> {
        self.durable().await?.remove_exam(class_id, exam_id).await
    }
}

pub struct HybridExamRepository {
    backend: Arc<StorageBackend>,
}

impl HybridExamRepository {
    pub fn new(backend: Arc<StorageBackend>) -> Self {
        Self { backend }
    }

    async fn durable(&self) -> AppResult<Arc<dyn ExamRepository>> {
        self.backend
            .remote()
            .await
            .map(|r| r.exams)
            .ok_or_else(|| AppError::requires_durable_backend(EXAMS))
    }
}

#[async_trait]
impl ExamRepository for HybridExamRepository {
    async fn list(&self, filter: ExamFilter) -> AppResult<Vec<Exam>> {
        match self.backend.remote().await {
            Some(remote) => remote.exams.list(filter).await,
            None => Ok(Vec::new()),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Exam>> {
        match self.backend.remote().await {
            Some(remote) => remote.exams.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn create(&self, exam: Exam) -> AppResult<Exam> {
        self.durable().await?.create(exam).await
    }

    async fn update(&self, id: &str, patch: ExamPatch) -> AppResult<Exam> {
        self.durable().await?.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.durable().await?.delete(id).await
    }
}

pub struct HybridSubmissionRepository {
    backend: Arc<StorageBackend>,
}

impl HybridSubmissionRepository {
    pub fn new(backend: Arc<StorageBackend>) -> Self {
        Self { backend }
    }

    async fn durable(&self) -> AppResult<Arc<dyn SubmissionRepository>> {
        self.backend
            .remote()
            .await
            .map(|r| r.submissions)
            .ok_or_else(|| AppError::requires_durable_backend(SUBMISSIONS))
    }
}

#[async_trait]
impl SubmissionRepository for HybridSubmissionRepository {
    async fn list(&self, filter: SubmissionFilter) -> AppResult<Vec<Submission>> {
        match self.backend.remote().await {
            Some(remote) => remote.submissions.list(filter).await,
            None => Ok(Vec::new()),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Submission>> {
        match self.backend.remote().await {
            Some(remote) => remote.submissions.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn create(&self, submission: Submission) -> AppResult<Submission> {
        self.durable().await?.create(submission).await
    }

    async fn update(&self, id: &str, patch: SubmissionPatch) -> AppResult<Submission> {
        self.durable().await?.update(id, patch).await
    }

    async fn transition(
        &self,
        id: &str,
        expected: SubmissionStatus,
        patch: SubmissionPatch,
    ) -> AppResult<Submission> {
        self.durable().await?.transition(id, expected, patch).await
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.durable().await?.delete(id).await
    }
}

pub struct HybridSettingsRepository {
    backend: Arc<StorageBackend>,
}

impl HybridSettingsRepository {
    pub fn new(backend: Arc<StorageBackend>) -> Self {
        Self { backend }
    }

    async fn durable(&self) -> AppResult<Arc<dyn SettingsRepository>> {
        self.backend
            .remote()
            .await
            .map(|r| r.settings)
            .ok_or_else(|| AppError::requires_durable_backend(SETTINGS))
    }
}

#[async_trait]
impl SettingsRepository for HybridSettingsRepository {
    async fn get(&self) -> AppResult<Settings> {
        match self.backend.remote().await {
            Some(remote) => remote.settings.get().await,
            None => Ok(self.backend.defaults().clone()),
        }
    }

    async fn update(&self, patch: SettingsPatch) -> AppResult<Settings> {
        self.durable().await?.update(patch).await
    }

    async fn reset(&self) -> AppResult<Settings> {
        self.durable().await?.reset().await
    }
}

/// All five hybrid repositories over one backend.
pub fn hybrid_repositories(backend: &Arc<StorageBackend>) -> crate::db::backend::Repositories {
    crate::db::backend::Repositories {
        users: Arc::new(HybridUserRepository::new(Arc::clone(backend))),
        classes: Arc::new(HybridClassRepository::new(Arc::clone(backend))),
        exams: Arc::new(HybridExamRepository::new(Arc::clone(backend))),
        submissions: Arc::new(HybridSubmissionRepository::new(Arc::clone(backend))),
        settings: Arc::new(HybridSettingsRepository::new(Arc::clone(backend))),
    }
}

use std::{sync::Arc, time::Duration};

use crate::{
    auth::JwtService,
    config::Config,
    db::backend::StorageBackend,
    errors::AppResult,
    repositories::hybrid_repositories,
    services::{
        AuthService, ClassService, ExamService, FreeformGrader, GeminiGrader, GradingEngine,
        PresenceService, SettingsService, SubmissionService, UserService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub class_service: Arc<ClassService>,
    pub exam_service: Arc<ExamService>,
    pub submission_service: Arc<SubmissionService>,
    pub settings_service: Arc<SettingsService>,
    pub presence_service: Arc<PresenceService>,
    pub backend: Arc<StorageBackend>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let backend = Arc::new(StorageBackend::connect(&config).await);
        let grader = Arc::new(GeminiGrader::from_config(&config)?);
        Ok(Self::with_backend(config, backend, grader))
    }

    /// Wires every service over the hybrid repositories of `backend`.
    pub fn with_backend(
        config: Config,
        backend: Arc<StorageBackend>,
        grader: Arc<dyn FreeformGrader>,
    ) -> Self {
        let repos = hybrid_repositories(&backend);
        let jwt = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_expiration_hours));

        let settings_service = Arc::new(SettingsService::new(
            repos.settings.clone(),
            Arc::clone(&backend),
            config.gemini_api_key.clone(),
        ));
        let grading = Arc::new(GradingEngine::new(
            grader,
            Duration::from_secs(config.ai_grading_timeout_secs),
        ));

        Self {
            auth_service: Arc::new(AuthService::new(repos.users.clone(), jwt)),
            user_service: Arc::new(UserService::new(repos.users.clone(), repos.classes.clone())),
            class_service: Arc::new(ClassService::new(repos.classes.clone(), repos.users.clone())),
            exam_service: Arc::new(ExamService::new(repos.exams.clone(), repos.classes.clone())),
            submission_service: Arc::new(SubmissionService::new(
                repos.submissions.clone(),
                repos.exams.clone(),
                repos.classes.clone(),
                Arc::clone(&settings_service),
                grading,
            )),
            presence_service: Arc::new(PresenceService::new(
                repos.users,
                repos.classes,
                repos.exams,
                repos.submissions,
            )),
            settings_service,
            backend,
            config: Arc::new(config),
        }
    }
}

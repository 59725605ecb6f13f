use std::sync::Arc;

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    auth::{require_role, require_staff},
    errors::{AppError, AppResult},
    models::{
        domain::{
            ClassFilter, Exam, ScoreSummary, Submission, SubmissionFilter, SubmissionPatch,
            SubmissionStatus, User, UserRole,
        },
        dto::{
            request::{SaveProgressRequest, StartSubmissionRequest, SubmitAnswersRequest},
            response::SubmitResponse,
        },
    },
    repositories::{
        exam_repository::exam_not_found, submission_repository::submission_not_found,
        ClassRepository, ExamRepository, SubmissionRepository,
    },
    services::{
        grading_service::{parse_answers, GradingEngine},
        settings_service::SettingsService,
    },
};

const TERMINAL: [SubmissionStatus; 2] = [SubmissionStatus::Submitted, SubmissionStatus::Graded];

fn already_submitted() -> AppError {
    AppError::Conflict("You have already submitted this exam".to_string())
}

fn exam_closed() -> AppError {
    AppError::ValidationError("Exam is not currently active".to_string())
}

fn access_denied() -> AppError {
    AppError::Forbidden("Access denied".to_string())
}

/// Result of `start`: the open attempt and whether it existed already.
#[derive(Debug)]
pub struct StartedAttempt {
    pub submission: Submission,
    pub resumed: bool,
}

pub struct SubmissionService {
    submissions: Arc<dyn SubmissionRepository>,
    exams: Arc<dyn ExamRepository>,
    classes: Arc<dyn ClassRepository>,
    settings: Arc<SettingsService>,
    grading: Arc<GradingEngine>,
}

impl SubmissionService {
    pub fn new(
        submissions: Arc<dyn SubmissionRepository>,
        exams: Arc<dyn ExamRepository>,
        classes: Arc<dyn ClassRepository>,
        settings: Arc<SettingsService>,
        grading: Arc<GradingEngine>,
    ) -> Self {
        Self {
            submissions,
            exams,
            classes,
            settings,
            grading,
        }
    }

    pub async fn start(&self, actor: &User, request: StartSubmissionRequest) -> AppResult<StartedAttempt> {
        self.start_at(actor, request, Utc::now()).await
    }

    /// Opens an attempt for a published exam whose window contains `now`.
    ///
    /// An existing open attempt is handed back instead of creating a second one; a finished
    /// attempt blocks any new start.
    pub async fn start_at(
        &self,
        actor: &User,
        request: StartSubmissionRequest,
        now: DateTime<Utc>,
    ) -> AppResult<StartedAttempt> {
        require_role(actor, &[UserRole::Student])?;
        request.validate()?;

        let exam = self.find_exam(&request.exam_id).await?;
        if !exam.is_published {
            return Err(exam_not_found(&exam.id));
        }
        self.ensure_enrolled(actor, &exam).await?;
        if !exam.accepts_attempts_at(now) {
            return Err(exam_closed());
        }

        let finished = self
            .submissions
            .list(SubmissionFilter::attempt(&exam.id, &actor.id).with_statuses(&TERMINAL))
            .await?;
        if !finished.is_empty() {
            return Err(already_submitted());
        }

        if let Some(open) = self.open_attempt(&exam.id, &actor.id).await? {
            return Ok(StartedAttempt {
                submission: open,
                resumed: true,
            });
        }

        match self
            .submissions
            .create(Submission::start(&exam.id, &actor.id, &exam.class_id, now))
            .await
        {
            Ok(submission) => {
                log::info!(
                    "Student '{}' started exam '{}' ({})",
                    actor.username,
                    exam.title,
                    submission.id
                );
                Ok(StartedAttempt {
                    submission,
                    resumed: false,
                })
            }
            // Lost a race against a concurrent start; the unique open-attempt index let only one through.
            Err(AppError::Conflict(_)) => self
                .open_attempt(&exam.id, &actor.id)
                .await?
                .map(|submission| StartedAttempt {
                    submission,
                    resumed: true,
                })
                .ok_or_else(already_submitted),
            Err(e) => Err(e),
        }
    }

    pub async fn submit(&self, actor: &User, request: SubmitAnswersRequest) -> AppResult<SubmitResponse> {
        self.submit_at(actor, request, Utc::now()).await
    }

    /// Grades the answers and closes the attempt in one compare-and-set write.
    ///
    /// Malformed answers fail the call before anything is graded. Two concurrent submits of the
    /// same attempt cannot both win: the loser gets `Conflict`.
    pub async fn submit_at(
        &self,
        actor: &User,
        request: SubmitAnswersRequest,
        now: DateTime<Utc>,
    ) -> AppResult<SubmitResponse> {
        require_role(actor, &[UserRole::Student])?;
        request.validate()?;

        let submission = self.find(&request.submission_id).await?;
        if !submission.is_owned_by(&actor.id) {
            return Err(access_denied());
        }
        if submission.status.is_terminal() {
            return Err(already_submitted());
        }

        let exam = self.find_exam(&submission.exam_id).await?;
        let answers = parse_answers(&exam.questions, &request.answers)?;

        let credential = self.settings.grading_credential().await;
        let graded = self
            .grading
            .grade(&exam.questions, &answers, credential.as_ref())
            .await;
        let summary = ScoreSummary::from_scores(&graded, exam.max_score());

        let patch = SubmissionPatch::graded(graded.clone(), &summary, submission.started_at, now);
        self.submissions
            .transition(&submission.id, SubmissionStatus::InProgress, patch)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => already_submitted(),
                other => other,
            })?;

        log::info!(
            "Graded submission {} for '{}': {}/{}",
            submission.id,
            actor.username,
            summary.total_score,
            summary.max_score
        );
        Ok(SubmitResponse {
            submission_id: submission.id,
            score: summary.total_score,
            max_score: summary.max_score,
            percentage: summary.percentage,
            answers: graded,
        })
    }

    pub async fn save_progress(
        &self,
        actor: &User,
        id: &str,
        request: SaveProgressRequest,
    ) -> AppResult<Submission> {
        self.save_progress_at(actor, id, request, Utc::now()).await
    }

    /// Stores draft answers on an open attempt while its exam window is open.
    pub async fn save_progress_at(
        &self,
        actor: &User,
        id: &str,
        request: SaveProgressRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Submission> {
        require_role(actor, &[UserRole::Student])?;

        let submission = self.find(id).await?;
        if !submission.is_owned_by(&actor.id) {
            return Err(access_denied());
        }
        if submission.status.is_terminal() {
            return Err(already_submitted());
        }

        let exam = self.find_exam(&submission.exam_id).await?;
        if !exam.accepts_attempts_at(now) {
            return Err(exam_closed());
        }
        let drafts = parse_answers(&exam.questions, &request.answers)?;

        self.submissions
            .transition(id, SubmissionStatus::InProgress, SubmissionPatch::draft(drafts))
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => already_submitted(),
                other => other,
            })
    }

    /// Students see their own attempts, teachers those in their classes, the owner all.
    pub async fn list_submissions(&self, actor: &User) -> AppResult<Vec<Submission>> {
        let filter = match actor.role {
            UserRole::Owner => SubmissionFilter::default(),
            UserRole::Student => SubmissionFilter::for_student(&actor.id),
            UserRole::Teacher => {
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
                SubmissionFilter::in_classes(class_ids)
            }
        };
        self.submissions.list(filter).await
    }

    pub async fn get_submission(&self, actor: &User, id: &str) -> AppResult<Submission> {
        let submission = self.find(id).await?;
        let allowed = match actor.role {
            UserRole::Owner => true,
            UserRole::Student => submission.is_owned_by(&actor.id),
            UserRole::Teacher => self.teaches(actor, &submission.class_id).await?,
        };
        if !allowed {
            return Err(access_denied());
        }
        Ok(submission)
    }

    pub async fn list_for_exam(&self, actor: &User, exam_id: &str) -> AppResult<Vec<Submission>> {
        require_staff(actor)?;
        let exam = self.find_exam(exam_id).await?;
        if actor.role != UserRole::Owner && !self.teaches(actor, &exam.class_id).await? {
            return Err(access_denied());
        }
        self.submissions.list(SubmissionFilter::for_exam(exam_id)).await
    }

    async fn open_attempt(&self, exam_id: &str, student_id: &str) -> AppResult<Option<Submission>> {
        Ok(self
            .submissions
            .list(
                SubmissionFilter::attempt(exam_id, student_id)
                    .with_statuses(&[SubmissionStatus::InProgress]),
            )
            .await?
            .into_iter()
            .next())
    }

    async fn ensure_enrolled(&self, actor: &User, exam: &Exam) -> AppResult<()> {
        let enrolled = self
            .classes
            .find_by_id(&exam.class_id)
            .await?
            .map(|c| c.has_student(&actor.id))
            .unwrap_or(false);
        if enrolled {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You are not enrolled in this exam's class".to_string(),
            ))
        }
    }

    async fn teaches(&self, actor: &User, class_id: &str) -> AppResult<bool> {
        Ok(self
            .classes
            .find_by_id(class_id)
            .await?
            .map(|c| c.is_taught_by(&actor.id))
            .unwrap_or(false))
    }

    async fn find(&self, id: &str) -> AppResult<Submission> {
        self.submissions
            .find_by_id(id)
            .await?
            .ok_or_else(|| submission_not_found(id))
    }

    async fn find_exam(&self, id: &str) -> AppResult<Exam> {
        self.exams
            .find_by_id(id)
            .await?
            .ok_or_else(|| exam_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::backend::StorageBackend,
        models::domain::{Class, Question, QuestionType, RawAnswer},
        repositories::{SettingsRepository, UserRepository},
        services::grading_service::{Assessment, MockFreeformGrader},
        test_utils::InMemoryStore,
    };
    use chrono::Duration;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    struct Fixture {
        store: InMemoryStore,
        service: SubmissionService,
        student: User,
        teacher: User,
        exam: Exam,
    }

    fn questions() -> Vec<Question> {
        vec![
            Question::multiple_choice("Pick B", &["A", "B"], 1, 10.0),
            Question::free_form(QuestionType::Essay, "Explain", Some("Because"), 10.0),
        ]
    }

    async fn fixture_with(grader: MockFreeformGrader) -> Fixture {
        let store = InMemoryStore::new();
        let teacher = store.users.create(User::test_teacher("budi")).await.unwrap();
        let student = store
            .users
            .create(User::test_student("ani", "0012345"))
            .await
            .unwrap();
        let class = store
            .classes
            .create(Class::new("10A", "Math", None, None, &teacher.id))
            .await
            .unwrap();
        store.classes.add_student(&class.id, &student.id).await.unwrap();

        let start = Utc::now() - Duration::minutes(5);
        let exam = store
            .exams
            .create(Exam::test_exam(
                &class.id,
                questions(),
                start,
                start + Duration::hours(1),
            ))
            .await
            .unwrap();

        let config = Config::test_config();
        let backend = Arc::new(StorageBackend::with_repositories(&config, store.repositories()));
        let settings = Arc::new(SettingsService::new(store.settings.clone(), backend, None));
        let grading = Arc::new(GradingEngine::new(
            Arc::new(grader),
            std::time::Duration::from_secs(1),
        ));
        let service = SubmissionService::new(
            store.submissions.clone(),
            store.exams.clone(),
            store.classes.clone(),
            settings,
            grading,
        );

        Fixture {
            store,
            service,
            student,
            teacher,
            exam,
        }
    }

    async fn fixture() -> Fixture {
        let mut grader = MockFreeformGrader::new();
        grader.expect_assess().never();
        fixture_with(grader).await
    }

    fn start_request(exam: &Exam) -> StartSubmissionRequest {
        StartSubmissionRequest {
            exam_id: exam.id.clone(),
        }
    }

    fn submit_request(submission_id: &str) -> SubmitAnswersRequest {
        SubmitAnswersRequest {
            submission_id: submission_id.to_string(),
            answers: vec![
                RawAnswer {
                    question_index: 0,
                    answer: json!(1),
                },
                RawAnswer {
                    question_index: 1,
                    answer: json!("x"),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_start_window_is_inclusive() {
        let f = fixture().await;

        let before = f.exam.start_time - Duration::milliseconds(1);
        assert!(matches!(
            f.service.start_at(&f.student, start_request(&f.exam), before).await,
            Err(AppError::ValidationError(_))
        ));
        let after = f.exam.end_time + Duration::milliseconds(1);
        assert!(matches!(
            f.service.start_at(&f.student, start_request(&f.exam), after).await,
            Err(AppError::ValidationError(_))
        ));

        let started = f
            .service
            .start_at(&f.student, start_request(&f.exam), f.exam.start_time)
            .await
            .unwrap();
        assert!(!started.resumed);
        assert_eq!(started.submission.status, SubmissionStatus::InProgress);
        assert_eq!(started.submission.started_at, f.exam.start_time);
    }

    #[tokio::test]
    async fn test_start_twice_resumes_open_attempt() {
        let f = fixture().await;

        let first = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();
        let second = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();

        assert!(second.resumed);
        assert_eq!(first.submission.id, second.submission.id);
    }

    #[tokio::test]
    async fn test_start_after_losing_create_race_returns_winner() {
        let f = fixture().await;
        f.store.submissions.rival_starts.store(1, Ordering::SeqCst);

        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();
        assert!(started.resumed);

        let open = f
            .store
            .submissions
            .list(SubmissionFilter::attempt(&f.exam.id, &f.student.id))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, started.submission.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_share_one_attempt() {
        let f = fixture().await;
        let service = Arc::new(f.service);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let student = f.student.clone();
                let request = start_request(&f.exam);
                tokio::spawn(async move { service.start(&student, request).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().submission.id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_have_one_winner() {
        let f = fixture().await;
        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();
        let service = Arc::new(f.service);

        let submit = |service: Arc<SubmissionService>| {
            let student = f.student.clone();
            let request = submit_request(&started.submission.id);
            tokio::spawn(async move { service.submit(&student, request).await })
        };
        let first = submit(Arc::clone(&service));
        let second = submit(Arc::clone(&service));
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
    }

    #[tokio::test]
    async fn test_scenario_submit_without_ai_credential() {
        let f = fixture().await;
        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();

        let result = f
            .service
            .submit(&f.student, submit_request(&started.submission.id))
            .await
            .unwrap();

        assert_eq!(result.score, 15.0);
        assert_eq!(result.max_score, 20.0);
        assert!((result.percentage - 75.0).abs() < 1e-9);
        assert!(result.answers[0].is_correct);
        assert!(!result.answers[1].is_correct);

        let stored = f
            .store
            .submissions
            .find_by_id(&started.submission.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubmissionStatus::Graded);
        assert!(stored.submitted_at.is_some());
        assert!(stored.graded_at.is_some());
    }

    #[tokio::test]
    async fn test_resubmit_and_restart_are_conflicts() {
        let f = fixture().await;
        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();
        f.service
            .submit(&f.student, submit_request(&started.submission.id))
            .await
            .unwrap();

        let resubmit = f
            .service
            .submit(&f.student, submit_request(&started.submission.id))
            .await
            .unwrap_err();
        assert!(matches!(resubmit, AppError::Conflict(_)));

        let restart = f
            .service
            .start(&f.student, start_request(&f.exam))
            .await
            .unwrap_err();
        assert_eq!(
            restart.to_string(),
            "Conflict: You have already submitted this exam"
        );
    }

    #[tokio::test]
    async fn test_closed_attempt_rejects_compare_and_set() {
        let f = fixture().await;
        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();

        // A concurrent submit finished the attempt first.
        f.store
            .submissions
            .update(
                &started.submission.id,
                SubmissionPatch {
                    status: Some(SubmissionStatus::Graded),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = f
            .store
            .submissions
            .transition(
                &started.submission.id,
                SubmissionStatus::InProgress,
                SubmissionPatch::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_type_mismatch_fails_before_grading() {
        let f = fixture().await;
        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();

        let mut request = submit_request(&started.submission.id);
        request.answers[0].answer = json!("B");
        let err = f.service.submit(&f.student, request).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let stored = f
            .store
            .submissions
            .find_by_id(&started.submission.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubmissionStatus::InProgress);
    }

    #[tokio::test]
    async fn test_only_owner_can_submit() {
        let f = fixture().await;
        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();
        let other = f
            .store
            .users
            .create(User::test_student("citra", "0099999"))
            .await
            .unwrap();

        assert!(matches!(
            f.service
                .submit(&other, submit_request(&started.submission.id))
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_unenrolled_and_unpublished() {
        let f = fixture().await;
        let outsider = f
            .store
            .users
            .create(User::test_student("dodi", "0077777"))
            .await
            .unwrap();
        assert!(matches!(
            f.service.start(&outsider, start_request(&f.exam)).await,
            Err(AppError::Forbidden(_))
        ));

        f.store
            .exams
            .update(
                &f.exam.id,
                crate::models::domain::ExamPatch {
                    is_published: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            f.service.start(&f.student, start_request(&f.exam)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ai_grading_uses_stored_credential() {
        let mut grader = MockFreeformGrader::new();
        grader
            .expect_assess()
            .withf(|api_key, _| api_key == "stored-key")
            .times(1)
            .returning(|_, _| {
                Ok(Assessment {
                    score: 9.0,
                    feedback: "Well argued".to_string(),
                })
            });
        let f = fixture_with(grader).await;
        f.store
            .settings
            .update(crate::models::domain::SettingsPatch {
                gemini_api_key: Some("stored-key".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();
        let result = f
            .service
            .submit(&f.student, submit_request(&started.submission.id))
            .await
            .unwrap();

        assert_eq!(result.score, 19.0);
        assert!(result.answers[1].is_correct);
        assert_eq!(result.answers[1].ai_feedback.as_deref(), Some("Well argued"));
    }

    #[tokio::test]
    async fn test_save_progress_then_submit_clears_drafts() {
        let f = fixture().await;
        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();

        let saved = f
            .service
            .save_progress(
                &f.student,
                &started.submission.id,
                SaveProgressRequest {
                    answers: vec![RawAnswer {
                        question_index: 0,
                        answer: json!(0),
                    }],
                },
            )
            .await
            .unwrap();
        assert_eq!(saved.answered_count(), 1);

        f.service
            .submit(&f.student, submit_request(&started.submission.id))
            .await
            .unwrap();
        let stored = f
            .store
            .submissions
            .find_by_id(&started.submission.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.draft_answers.is_empty());

        let late = f
            .service
            .save_progress(
                &f.student,
                &started.submission.id,
                SaveProgressRequest { answers: vec![] },
            )
            .await
            .unwrap_err();
        assert!(matches!(late, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_visibility_by_role() {
        let f = fixture().await;
        let started = f.service.start(&f.student, start_request(&f.exam)).await.unwrap();
        let other_teacher = f
            .store
            .users
            .create(User::test_teacher("citra"))
            .await
            .unwrap();

        assert_eq!(f.service.list_submissions(&f.student).await.unwrap().len(), 1);
        assert_eq!(f.service.list_submissions(&f.teacher).await.unwrap().len(), 1);
        assert!(f
            .service
            .list_submissions(&other_teacher)
            .await
            .unwrap()
            .is_empty());

        assert!(f
            .service
            .get_submission(&f.teacher, &started.submission.id)
            .await
            .is_ok());
        assert!(matches!(
            f.service
                .get_submission(&other_teacher, &started.submission.id)
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.list_for_exam(&other_teacher, &f.exam.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(
            f.service
                .list_for_exam(&f.teacher, &f.exam.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}

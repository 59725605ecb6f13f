use std::sync::Arc;

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    auth::require_staff,
    errors::{AppError, AppResult},
    models::{
        domain::{Class, ClassFilter, Exam, ExamFilter, ExamPatch, User, UserRole},
        dto::{
            request::{CreateExamRequest, UpdateExamRequest},
            response::{ExamDetailResponse, ExamListResponse, PublishExamResponse},
        },
    },
    repositories::{
        class_repository::class_not_found, exam_repository::exam_not_found, ClassRepository,
        ExamRepository,
    },
};

pub struct ExamService {
    exams: Arc<dyn ExamRepository>,
    classes: Arc<dyn ClassRepository>,
}

impl ExamService {
    pub fn new(exams: Arc<dyn ExamRepository>, classes: Arc<dyn ClassRepository>) -> Self {
        Self { exams, classes }
    }

    pub async fn list_exams(&self, actor: &User) -> AppResult<ExamListResponse> {
        self.list_exams_at(actor, Utc::now()).await
    }

    pub async fn list_exams_at(&self, actor: &User, now: DateTime<Utc>) -> AppResult<ExamListResponse> {
        match actor.role {
            UserRole::Owner => Ok(ExamListResponse::Exams(
                self.exams.list(ExamFilter::default()).await?,
            )),
            UserRole::Teacher => {
                let class_ids = self.class_ids(ClassFilter::taught_by(&actor.id)).await?;
                if class_ids.is_empty() {
                    return Ok(ExamListResponse::Exams(Vec::new()));
                }
                Ok(ExamListResponse::Exams(
                    self.exams.list(ExamFilter::in_classes(class_ids)).await?,
                ))
            }
            UserRole::Student => {
                let class_ids = self.class_ids(ClassFilter::joined_by(&actor.id)).await?;
                if class_ids.is_empty() {
                    return Ok(ExamListResponse::Summaries(Vec::new()));
                }
                let exams = self
                    .exams
                    .list(ExamFilter::in_classes(class_ids).published())
                    .await?;
                Ok(ExamListResponse::Summaries(
                    exams.iter().map(|e| e.summary_at(now)).collect(),
                ))
            }
        }
    }

    /// Creates an unpublished exam and links it into its class.
    ///
    /// The class link is retried once; if it still fails the exam is removed again.
    pub async fn create_exam(&self, actor: &User, request: CreateExamRequest) -> AppResult<Exam> {
        require_staff(actor)?;
        request.validate()?;

        let class = self.find_class(&request.class_id).await?;
        if actor.role != UserRole::Owner && !class.is_taught_by(&actor.id) {
            return Err(AppError::Forbidden(
                "You can only create exams for your own classes".to_string(),
            ));
        }

        let exam = Exam::new(
            &class.id,
            &request.title,
            request.description,
            request.start_time,
            request.end_time,
            request.duration,
            request.questions,
            request.settings.unwrap_or_default(),
        )?;
        let exam = self.exams.create(exam).await?;

        if let Err(first) = self.classes.add_exam(&class.id, &exam.id).await {
            log::warn!(
                "Linking exam {} into class {} failed, retrying: {}",
                exam.id,
                class.id,
                first
            );
            if let Err(second) = self.classes.add_exam(&class.id, &exam.id).await {
                if let Err(e) = self.exams.delete(&exam.id).await {
                    log::error!("Could not roll back unlinked exam {}: {}", exam.id, e);
                }
                return Err(second);
            }
        }

        log::info!(
            "Created exam '{}' with {} questions in class {}",
            exam.title,
            exam.questions.len(),
            class.id
        );
        Ok(exam)
    }

    pub async fn get_exam(&self, actor: &User, id: &str) -> AppResult<ExamDetailResponse> {
        self.get_exam_at(actor, id, Utc::now()).await
    }

    /// Staff who manage the exam see it whole. Students get the answer-free view, and only
    /// while the exam is published and open.
    pub async fn get_exam_at(
        &self,
        actor: &User,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ExamDetailResponse> {
        let exam = self.find(id).await?;

        if actor.role != UserRole::Student {
            self.ensure_manages(actor, &exam).await?;
            return Ok(ExamDetailResponse::Full(exam));
        }

        let enrolled = self
            .classes
            .find_by_id(&exam.class_id)
            .await?
            .map(|c| c.has_student(&actor.id))
            .unwrap_or(false);
        if !enrolled {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }
        if !exam.is_published {
            return Err(exam_not_found(id));
        }
        if !exam.accepts_attempts_at(now) {
            return Err(AppError::ValidationError(
                "Exam is not currently active".to_string(),
            ));
        }
        Ok(ExamDetailResponse::Student(exam.student_view()))
    }

    pub async fn update_exam(
        &self,
        actor: &User,
        id: &str,
        request: UpdateExamRequest,
    ) -> AppResult<Exam> {
        request.validate()?;
        let exam = self.managed(actor, id).await?;

        let patch = ExamPatch::from(request);
        if patch.is_empty() {
            return Ok(exam);
        }
        patch.validate_against(&exam)?;
        self.exams.update(id, patch).await
    }

    pub async fn delete_exam(&self, actor: &User, id: &str) -> AppResult<()> {
        let exam = self.managed(actor, id).await?;

        self.exams.delete(id).await?;
        if let Err(e) = self.classes.remove_exam(&exam.class_id, id).await {
            log::warn!(
                "Deleted exam {} but class {} still references it: {}",
                id,
                exam.class_id,
                e
            );
        }

        log::info!("Deleted exam '{}' ({})", exam.title, exam.id);
        Ok(())
    }

    pub async fn publish_exam(&self, actor: &User, id: &str) -> AppResult<PublishExamResponse> {
        self.managed(actor, id).await?;
        let exam = self.exams.update(id, ExamPatch::publish()).await?;

        log::info!("Published exam '{}' ({})", exam.title, exam.id);
        Ok(PublishExamResponse {
            message: "Exam published".to_string(),
            exam,
        })
    }

    async fn find(&self, id: &str) -> AppResult<Exam> {
        self.exams
            .find_by_id(id)
            .await?
            .ok_or_else(|| exam_not_found(id))
    }

    async fn find_class(&self, id: &str) -> AppResult<Class> {
        self.classes
            .find_by_id(id)
            .await?
            .ok_or_else(|| class_not_found(id))
    }

    async fn class_ids(&self, filter: ClassFilter) -> AppResult<Vec<String>> {
        Ok(self
            .classes
            .list(filter)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }

    async fn managed(&self, actor: &User, id: &str) -> AppResult<Exam> {
        require_staff(actor)?;
        let exam = self.find(id).await?;
        self.ensure_manages(actor, &exam).await?;
        Ok(exam)
    }

    /// Owner always; a teacher only for exams of their own classes.
    async fn ensure_manages(&self, actor: &User, exam: &Exam) -> AppResult<()> {
        if actor.role == UserRole::Owner {
            return Ok(());
        }
        let teaches = self
            .classes
            .find_by_id(&exam.class_id)
            .await?
            .map(|c| c.is_taught_by(&actor.id))
            .unwrap_or(false);
        if teaches {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }
}

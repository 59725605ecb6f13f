use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::{Submission, SubmissionFilter, SubmissionPatch, SubmissionStatus},
};

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn list(&self, filter: SubmissionFilter) -> AppResult<Vec<Submission>>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Submission>>;
    /// Fails with `Conflict` if the student already has an open attempt at the exam.
    async fn create(&self, submission: Submission) -> AppResult<Submission>;
    async fn update(&self, id: &str, patch: SubmissionPatch) -> AppResult<Submission>;
    /// Applies `patch` only while the stored status is still `expected`.
    async fn transition(
        &self,
        id: &str,
        expected: SubmissionStatus,
        patch: SubmissionPatch,
    ) -> AppResult<Submission>;
    async fn delete(&self, id: &str) -> AppResult<()>;
}

pub fn submission_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Submission with id '{}' not found", id))
}

pub fn stale_transition(id: &str, expected: SubmissionStatus) -> AppError {
    AppError::Conflict(format!(
        "Submission '{}' is no longer {}; it has already been submitted",
        id,
        expected.as_str()
    ))
}

pub struct MongoSubmissionRepository {
    collection: Collection<Submission>,
}

impl MongoSubmissionRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("submissions");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for submissions collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        // At most one open attempt per (exam, student).
        let open_attempt_index = IndexModel::builder()
            .keys(doc! { "examId": 1, "studentId": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "status": "in_progress" })
                    .name("open_attempt_unique".to_string())
                    .build(),
            )
            .build();

        let attempt_index = IndexModel::builder()
            .keys(doc! { "examId": 1, "studentId": 1, "status": 1 })
            .options(IndexOptions::builder().name("exam_student_status".to_string()).build())
            .build();

        let class_index = IndexModel::builder()
            .keys(doc! { "classId": 1 })
            .options(IndexOptions::builder().name("class_id".to_string()).build())
            .build();

        let status_index = IndexModel::builder()
            .keys(doc! { "status": 1 })
            .options(IndexOptions::builder().name("status".to_string()).build())
            .build();

        self.collection
            .create_indexes(vec![
                id_index,
                open_attempt_index,
                attempt_index,
                class_index,
                status_index,
            ])
            .await?;

        log::info!("Successfully created indexes for submissions collection");
        Ok(())
    }
}

#[async_trait]
impl SubmissionRepository for MongoSubmissionRepository {
    async fn list(&self, filter: SubmissionFilter) -> AppResult<Vec<Submission>> {
        let cursor = self
            .collection
            .find(filter.to_document())
            .sort(doc! { "startedAt": -1 })
            .await?;
        let submissions: Vec<Submission> = cursor.try_collect().await?;
        Ok(submissions)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Submission>> {
        let submission = self.collection.find_one(doc! { "id": id }).await?;
        Ok(submission)
    }

    async fn create(&self, submission: Submission) -> AppResult<Submission> {
        self.collection.insert_one(&submission).await?;
        Ok(submission)
    }

    async fn update(&self, id: &str, patch: SubmissionPatch) -> AppResult<Submission> {
        self.collection
            .find_one_and_update(doc! { "id": id }, patch.to_set_document()?)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| submission_not_found(id))
    }

    async fn transition(
        &self,
        id: &str,
        expected: SubmissionStatus,
        patch: SubmissionPatch,
    ) -> AppResult<Submission> {
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "id": id, "status": expected.as_str() },
                patch.to_set_document()?,
            )
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(submission) => Ok(submission),
            None => match self.find_by_id(id).await? {
                Some(_) => Err(stale_transition(id, expected)),
                None => Err(submission_not_found(id)),
            },
        }
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let result = self.collection.delete_one(doc! { "id": id }).await?;

        if result.deleted_count == 0 {
            return Err(submission_not_found(id));
        }
        Ok(())
    }
}

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
    models::domain::{Exam, ExamFilter, ExamPatch},
};

#[async_trait]
pub trait ExamRepository: Send + Sync {
    async fn list(&self, filter: ExamFilter) -> AppResult<Vec<Exam>>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Exam>>;
    async fn create(&self, exam: Exam) -> AppResult<Exam>;
    async fn update(&self, id: &str, patch: ExamPatch) -> AppResult<Exam>;
    async fn delete(&self, id: &str) -> AppResult<()>;
}

pub fn exam_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Exam with id '{}' not found", id))
}

pub struct MongoExamRepository {
    collection: Collection<Exam>,
}

impl MongoExamRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("exams");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for exams collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let class_index = IndexModel::builder()
            .keys(doc! { "classId": 1 })
            .options(IndexOptions::builder().name("class_id".to_string()).build())
            .build();

        let window_index = IndexModel::builder()
            .keys(doc! { "startTime": 1, "endTime": 1 })
            .options(IndexOptions::builder().name("window".to_string()).build())
            .build();

        self.collection
            .create_indexes(vec![id_index, class_index, window_index])
            .await?;

        log::info!("Successfully created indexes for exams collection");
        Ok(())
    }
}

#[async_trait]
impl ExamRepository for MongoExamRepository {
    async fn list(&self, filter: ExamFilter) -> AppResult<Vec<Exam>> {
        let cursor = self
            .collection
            .find(filter.to_document())
            .sort(doc! { "startTime": -1 })
            .await?;
        let exams: Vec<Exam> = cursor.try_collect().await?;
        Ok(exams)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Exam>> {
        let exam = self.collection.find_one(doc! { "id": id }).await?;
        Ok(exam)
    }

    async fn create(&self, exam: Exam) -> AppResult<Exam> {
        self.collection.insert_one(&exam).await?;
        Ok(exam)
    }

    async fn update(&self, id: &str, patch: ExamPatch) -> AppResult<Exam> {
        self.collection
            .find_one_and_update(doc! { "id": id }, patch.to_set_document()?)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| exam_not_found(id))
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let result = self.collection.delete_one(doc! { "id": id }).await?;

        if result.deleted_count == 0 {
            return Err(exam_not_found(id));
        }
        Ok(())
    }
}

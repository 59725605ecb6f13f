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
    models::domain::{Class, ClassFilter, ClassPatch},
};

#[async_trait]
pub trait ClassRepository: Send + Sync {
    async fn list(&self, filter: ClassFilter) -> AppResult<Vec<Class>>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Class>>;
    async fn find_by_invite_code(&self, code: &str) -> AppResult<Option<Class>>;
    async fn create(&self, class: Class) -> AppResult<Class>;
    async fn update(&self, id: &str, patch: ClassPatch) -> AppResult<Class>;
    async fn delete(&self, id: &str) -> AppResult<()>;
    async fn add_student(&self, class_id: &str, student_id: &str) -> AppResult<()>;
    async fn remove_student(&self, class_id: &str, student_id: &str) -> AppResult<()>;
    async fn add_exam(&self, class_id: &str, exam_id: &str) -> AppResult<()>;
    async fn remove_exam(&self, class_id: &str, exam_id: &str) -> AppResult<()>;
}

pub fn class_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Class with id '{}' not found", id))
}

pub struct MongoClassRepository {
    collection: Collection<Class>,
}

impl MongoClassRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("classes");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for classes collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let invite_code_index = IndexModel::builder()
            .keys(doc! { "inviteCode": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("invite_code_unique".to_string())
                    .build(),
            )
            .build();

        let teacher_index = IndexModel::builder()
            .keys(doc! { "teacherId": 1 })
            .options(IndexOptions::builder().name("teacher_id".to_string()).build())
            .build();

        let students_index = IndexModel::builder()
            .keys(doc! { "students": 1 })
            .options(IndexOptions::builder().name("students".to_string()).build())
            .build();

        self.collection
            .create_indexes(vec![id_index, invite_code_index, teacher_index, students_index])
            .await?;

        log::info!("Successfully created indexes for classes collection");
        Ok(())
    }

    async fn update_array(&self, class_id: &str, update: mongodb::bson::Document) -> AppResult<()> {
        let result = self
            .collection
            .update_one(doc! { "id": class_id }, update)
            .await?;

        if result.matched_count == 0 {
            return Err(class_not_found(class_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ClassRepository for MongoClassRepository {
    async fn list(&self, filter: ClassFilter) -> AppResult<Vec<Class>> {
        let cursor = self
            .collection
            .find(filter.to_document())
            .sort(doc! { "createdAt": -1 })
            .await?;
        let classes: Vec<Class> = cursor.try_collect().await?;
        Ok(classes)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Class>> {
        let class = self.collection.find_one(doc! { "id": id }).await?;
        Ok(class)
    }

    async fn find_by_invite_code(&self, code: &str) -> AppResult<Option<Class>> {
        let class = self
            .collection
            .find_one(doc! { "inviteCode": code.trim().to_uppercase() })
            .await?;
        Ok(class)
    }

    async fn create(&self, class: Class) -> AppResult<Class> {
        self.collection.insert_one(&class).await?;
        Ok(class)
    }

    async fn update(&self, id: &str, patch: ClassPatch) -> AppResult<Class> {
        self.collection
            .find_one_and_update(doc! { "id": id }, patch.to_set_document()?)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| class_not_found(id))
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let result = self.collection.delete_one(doc! { "id": id }).await?;

        if result.deleted_count == 0 {
            return Err(class_not_found(id));
        }
        Ok(())
    }

    async fn add_student(&self, class_id: &str, student_id: &str) -> AppResult<()> {
        self.update_array(class_id, doc! { "$addToSet": { "students": student_id } })
            .await
    }

    async fn remove_student(&self, class_id: &str, student_id: &str) -> AppResult<()> {
        self.update_array(class_id, doc! { "$pull": { "students": student_id } })
            .await
    }

    async fn add_exam(&self, class_id: &str, exam_id: &str) -> AppResult<()> {
        self.update_array(class_id, doc! { "$addToSet": { "exams": exam_id } })
            .await
    }

    async fn remove_exam(&self, class_id: &str, exam_id: &str) -> AppResult<()> {
        self.update_array(class_id, doc! { "$pull": { "exams": exam_id } })
            .await
    }
}

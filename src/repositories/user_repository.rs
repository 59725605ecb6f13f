use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{Collation, CollationStrength, IndexOptions, ReturnDocument},
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::{User, UserFilter, UserPatch},
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list(&self, filter: UserFilter) -> AppResult<Vec<User>>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>>;
    /// Case-insensitive.
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn find_by_nisn(&self, nisn: &str) -> AppResult<Option<User>>;
    async fn create(&self, user: User) -> AppResult<User>;
    async fn update(&self, id: &str, patch: UserPatch) -> AppResult<User>;
    async fn delete(&self, id: &str) -> AppResult<()>;
    async fn add_class(&self, user_id: &str, class_id: &str) -> AppResult<()>;
    async fn remove_class(&self, user_id: &str, class_id: &str) -> AppResult<()>;
}

pub fn user_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("User with id '{}' not found", id))
}

fn username_collation() -> Collation {
    Collation::builder()
        .locale("en".to_string())
        .strength(CollationStrength::Secondary)
        .build()
}

pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("users");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for users collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let username_index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .collation(username_collation())
                    .name("username_unique_ci".to_string())
                    .build(),
            )
            .build();

        let nisn_index = IndexModel::builder()
            .keys(doc! { "nisn": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "nisn": { "$type": "string" } })
                    .name("nisn_unique".to_string())
                    .build(),
            )
            .build();

        let role_index = IndexModel::builder()
            .keys(doc! { "role": 1 })
            .options(IndexOptions::builder().name("role".to_string()).build())
            .build();

        self.collection
            .create_indexes(vec![id_index, username_index, nisn_index, role_index])
            .await?;

        log::info!("Successfully created indexes for users collection");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn list(&self, filter: UserFilter) -> AppResult<Vec<User>> {
        let cursor = self
            .collection
            .find(filter.to_document())
            .sort(doc! { "username": 1 })
            .await?;
        let users: Vec<User> = cursor.try_collect().await?;
        Ok(users)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        let user = self.collection.find_one(doc! { "id": id }).await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = self
            .collection
            .find_one(doc! { "username": username })
            .collation(username_collation())
            .await?;
        Ok(user)
    }

    async fn find_by_nisn(&self, nisn: &str) -> AppResult<Option<User>> {
        let user = self.collection.find_one(doc! { "nisn": nisn }).await?;
        Ok(user)
    }

    async fn create(&self, user: User) -> AppResult<User> {
        self.collection.insert_one(&user).await?;
        Ok(user)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> AppResult<User> {
        self.collection
            .find_one_and_update(doc! { "id": id }, patch.to_set_document()?)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| user_not_found(id))
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let result = self.collection.delete_one(doc! { "id": id }).await?;

        if result.deleted_count == 0 {
            return Err(user_not_found(id));
        }

        Ok(())
    }

    async fn add_class(&self, user_id: &str, class_id: &str) -> AppResult<()> {
        let result = self
            .collection
            .update_one(
                doc! { "id": user_id },
                doc! { "$addToSet": { "classes": class_id } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(user_not_found(user_id));
        }
        Ok(())
    }

    async fn remove_class(&self, user_id: &str, class_id: &str) -> AppResult<()> {
        self.collection
            .update_one(
                doc! { "id": user_id },
                doc! { "$pull": { "classes": class_id } },
            )
            .await?;
        Ok(())
    }
}

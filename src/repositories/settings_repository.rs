use async_trait::async_trait;
use mongodb::{bson::doc, options::ReturnDocument, Collection};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::{settings::SETTINGS_ID, Settings, SettingsPatch},
};

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Returns the stored settings, or the defaults if none were saved yet.
    async fn get(&self) -> AppResult<Settings>;
    async fn update(&self, patch: SettingsPatch) -> AppResult<Settings>;
    async fn reset(&self) -> AppResult<Settings>;
}

pub struct MongoSettingsRepository {
    collection: Collection<Settings>,
    defaults: Settings,
}

impl MongoSettingsRepository {
    pub fn new(db: &Database, defaults: Settings) -> Self {
        let collection = db.get_collection("settings");
        Self {
            collection,
            defaults,
        }
    }
}

#[async_trait]
impl SettingsRepository for MongoSettingsRepository {
    async fn get(&self) -> AppResult<Settings> {
        let stored = self.collection.find_one(doc! { "id": SETTINGS_ID }).await?;
        Ok(stored.unwrap_or_else(|| self.defaults.clone()))
    }

    async fn update(&self, patch: SettingsPatch) -> AppResult<Settings> {
        self.collection
            .find_one_and_update(
                doc! { "id": SETTINGS_ID },
                patch.to_upsert_document(&self.defaults)?,
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| AppError::DatabaseError("Settings upsert returned no document".to_string()))
    }

    async fn reset(&self) -> AppResult<Settings> {
        self.collection.delete_one(doc! { "id": SETTINGS_ID }).await?;
        Ok(self.defaults.clone())
    }
}

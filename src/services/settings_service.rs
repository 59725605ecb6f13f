use std::sync::Arc;

use secrecy::SecretString;
use validator::Validate;

use crate::{
    auth::require_owner,
    db::backend::{StorageBackend, StorageMode},
    errors::AppResult,
    models::{
        domain::{SettingsPatch, User},
        dto::{
            request::{TestDatabaseRequest, UpdateSettingsRequest},
            response::{SettingsResponse, SettingsUpdatedResponse, TestDatabaseResponse},
        },
    },
    repositories::SettingsRepository,
};

pub struct SettingsService {
    settings: Arc<dyn SettingsRepository>,
    backend: Arc<StorageBackend>,
    fallback_key: Option<SecretString>,
}

impl SettingsService {
    pub fn new(
        settings: Arc<dyn SettingsRepository>,
        backend: Arc<StorageBackend>,
        fallback_key: Option<SecretString>,
    ) -> Self {
        Self {
            settings,
            backend,
            fallback_key,
        }
    }

    pub async fn get_settings(&self, actor: &User) -> AppResult<SettingsResponse> {
        require_owner(actor)?;
        let settings = self.settings.get().await?;
        Ok(SettingsResponse::new(settings, self.backend.mode().await))
    }

    pub async fn update_settings(
        &self,
        actor: &User,
        request: UpdateSettingsRequest,
    ) -> AppResult<SettingsUpdatedResponse> {
        require_owner(actor)?;
        request.validate()?;

        let patch = SettingsPatch {
            gemini_api_key: request.gemini_api_key.map(|k| k.trim().to_string()),
            mongodb_url: request.mongodb_url.map(|u| u.trim().to_string()),
            app_name: request.app_name.map(|n| n.trim().to_string()),
            updated_by: None,
        };
        let settings = if patch.is_empty() {
            self.settings.get().await?
        } else {
            let settings = self
                .settings
                .update(SettingsPatch {
                    updated_by: Some(actor.id.clone()),
                    ..patch
                })
                .await?;
            log::info!("Settings updated by '{}'", actor.username);
            settings
        };

        Ok(SettingsUpdatedResponse {
            message: "Settings updated".to_string(),
            settings: SettingsResponse::new(settings, self.backend.mode().await),
        })
    }

    /// Drops the stored settings so the environment defaults apply again.
    pub async fn reset_settings(&self, actor: &User) -> AppResult<SettingsResponse> {
        require_owner(actor)?;
        let settings = self.settings.reset().await?;
        log::info!("Settings reset to defaults by '{}'", actor.username);
        Ok(SettingsResponse::new(settings, self.backend.mode().await))
    }

    /// Tries to switch storage to the given MongoDB URL. On failure the current mode stays.
    pub async fn test_database(
        &self,
        actor: &User,
        request: TestDatabaseRequest,
    ) -> AppResult<TestDatabaseResponse> {
        require_owner(actor)?;
        request.validate()?;

        match self.backend.attach(request.mongodb_url.trim()).await {
            Ok(()) => Ok(TestDatabaseResponse {
                success: true,
                mode: StorageMode::Remote,
                message: "Connected successfully".to_string(),
            }),
            Err(e) => {
                log::warn!("Database connection test failed: {}", e);
                let mode = self.backend.mode().await;
                Ok(TestDatabaseResponse {
                    success: false,
                    mode,
                    message: match mode {
                        StorageMode::Local => {
                            format!("Connection failed, using local storage: {}", e)
                        }
                        StorageMode::Remote => {
                            format!("Connection failed, keeping the current database: {}", e)
                        }
                    },
                })
            }
        }
    }

    /// The stored key if set, else the one from the environment.
    pub async fn grading_credential(&self) -> Option<SecretString> {
        match self.settings.get().await {
            Ok(settings) => settings
                .grading_credential()
                .or_else(|| self.fallback_key.clone()),
            Err(e) => {
                log::warn!("Could not read settings, using the configured API key: {}", e);
                self.fallback_key.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        errors::AppError,
        test_utils::InMemoryStore,
    };
    use secrecy::ExposeSecret;

    fn service(store: &InMemoryStore, fallback: Option<&str>) -> SettingsService {
        let config = Config::test_config();
        let backend = Arc::new(StorageBackend::with_repositories(&config, store.repositories()));
        SettingsService::new(
            store.settings.clone(),
            backend,
            fallback.map(|k| SecretString::from(k.to_string())),
        )
    }

    #[tokio::test]
    async fn test_settings_are_owner_only() {
        let store = InMemoryStore::new();
        let service = service(&store, None);

        assert!(matches!(
            service.get_settings(&User::test_teacher("budi")).await,
            Err(AppError::Forbidden(_))
        ));
        let response = service.get_settings(&User::test_owner("root")).await.unwrap();
        assert_eq!(response.current_storage_mode, StorageMode::Remote);
        assert!(!response.has_gemini_api_key);
    }

    #[tokio::test]
    async fn test_update_records_actor_and_masks_key() {
        let store = InMemoryStore::new();
        let service = service(&store, None);
        let owner = User::test_owner("root");

        let response = service
            .update_settings(
                &owner,
                UpdateSettingsRequest {
                    gemini_api_key: Some("  AIzaSyLONGSECRETKEY  ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(response.settings.has_gemini_api_key);
        assert!(!response.settings.gemini_api_key.contains("LONGSECRET"));
        assert_eq!(response.settings.updated_by.as_deref(), Some(owner.id.as_str()));
    }

    #[tokio::test]
    async fn test_credential_prefers_stored_key() {
        let store = InMemoryStore::new();
        let service = service(&store, Some("env-key"));
        let owner = User::test_owner("root");

        let key = service.grading_credential().await.unwrap();
        assert_eq!(key.expose_secret(), "env-key");

        service
            .update_settings(
                &owner,
                UpdateSettingsRequest {
                    gemini_api_key: Some("stored-key".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let key = service.grading_credential().await.unwrap();
        assert_eq!(key.expose_secret(), "stored-key");

        service
            .update_settings(
                &owner,
                UpdateSettingsRequest {
                    gemini_api_key: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let key = service.grading_credential().await.unwrap();
        assert_eq!(key.expose_secret(), "env-key");
    }

    #[tokio::test]
    async fn test_reset_restores_environment_key() {
        let store = InMemoryStore::new();
        let service = service(&store, Some("env-key"));
        let owner = User::test_owner("root");

        service
            .update_settings(
                &owner,
                UpdateSettingsRequest {
                    gemini_api_key: Some("stored-key".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            service.reset_settings(&User::test_teacher("budi")).await,
            Err(AppError::Forbidden(_))
        ));
        let response = service.reset_settings(&owner).await.unwrap();
        assert!(response.updated_by.is_none());

        let key = service.grading_credential().await.unwrap();
        assert_eq!(key.expose_secret(), "env-key");
    }

    #[tokio::test]
    async fn test_no_credential_anywhere() {
        let store = InMemoryStore::new();
        let service = service(&store, None);
        assert!(service.grading_credential().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_database_test_keeps_mode() {
        let store = InMemoryStore::new();
        let service = service(&store, None);

        let response = service
            .test_database(
                &User::test_owner("root"),
                TestDatabaseRequest {
                    mongodb_url: "not-a-mongodb-url".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.mode, StorageMode::Remote);
    }
}

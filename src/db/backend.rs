use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::RwLock, task::JoinHandle};

use crate::{
    config::Config,
    db::Database,
    errors::AppResult,
    models::domain::Settings,
    repositories::{
        ClassRepository, ExamRepository, LocalUserRepository, MongoClassRepository,
        MongoExamRepository, MongoSettingsRepository, MongoSubmissionRepository,
        MongoUserRepository, SettingsRepository, SubmissionRepository, UserRepository,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StorageMode {
    #[serde(rename = "mongodb")]
    Remote,
    #[serde(rename = "local")]
    Local,
}

/// The durable repository set.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub classes: Arc<dyn ClassRepository>,
    pub exams: Arc<dyn ExamRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Repositories {
    pub async fn mongo(db: &Database, defaults: Settings) -> AppResult<Self> {
        let users = MongoUserRepository::new(db);
        users.ensure_indexes().await?;
        let classes = MongoClassRepository::new(db);
        classes.ensure_indexes().await?;
        let exams = MongoExamRepository::new(db);
        exams.ensure_indexes().await?;
        let submissions = MongoSubmissionRepository::new(db);
        submissions.ensure_indexes().await?;

        Ok(Self {
            users: Arc::new(users),
            classes: Arc::new(classes),
            exams: Arc::new(exams),
            submissions: Arc::new(submissions),
            settings: Arc::new(MongoSettingsRepository::new(db, defaults)),
        })
    }
}

struct Remote {
    database: Option<Database>,
    repositories: Repositories,
}

/// Decides which physical store serves persistence calls.
///
/// Built once at startup and shared. Only bootstrap, the owner-triggered reconnect and the
/// health monitor change the mode; everything else just reads it.
pub struct StorageBackend {
    remote: RwLock<Option<Remote>>,
    local_users: Arc<LocalUserRepository>,
    defaults: Settings,
    db_name: String,
}

impl StorageBackend {
    pub fn local(config: &Config) -> Self {
        Self {
            remote: RwLock::new(None),
            local_users: Arc::new(LocalUserRepository::new(config.local_data_dir.clone())),
            defaults: Settings::from_config(config),
            db_name: config.mongo_db_name.clone(),
        }
    }

    /// Connects to MongoDB if a URL is configured; otherwise, or on failure, starts in local mode.
    pub async fn connect(config: &Config) -> Self {
        let backend = Self::local(config);

        if !config.has_mongodb_url() {
            log::info!(
                "No MONGODB_URL configured; using local storage in {}",
                config.local_data_dir.display()
            );
            return backend;
        }

        if let Err(e) = backend.attach(&config.mongodb_url).await {
            log::warn!("MongoDB connection failed, falling back to local storage: {}", e);
        }
        backend
    }

    /// Backend already attached to the given repositories (no live database to monitor).
    pub fn with_repositories(config: &Config, repositories: Repositories) -> Self {
        let backend = Self::local(config);
        Self {
            remote: RwLock::new(Some(Remote {
                database: None,
                repositories,
            })),
            ..backend
        }
    }

    /// Opens a new MongoDB connection and switches to it. The current mode is kept on failure.
    pub async fn attach(&self, conn_string: &str) -> AppResult<()> {
        let database = Database::connect(conn_string, &self.db_name).await?;
        let repositories = Repositories::mongo(&database, self.defaults.clone()).await?;

        *self.remote.write().await = Some(Remote {
            database: Some(database),
            repositories,
        });
        log::info!("Storage mode: mongodb");
        Ok(())
    }

    pub async fn downgrade(&self, reason: &str) {
        let mut remote = self.remote.write().await;
        if remote.take().is_some() {
            log::warn!("Storage downgraded to local mode: {}", reason);
        }
    }

    pub async fn mode(&self) -> StorageMode {
        if self.remote.read().await.is_some() {
            StorageMode::Remote
        } else {
            StorageMode::Local
        }
    }

    pub async fn remote(&self) -> Option<Repositories> {
        self.remote
            .read()
            .await
            .as_ref()
            .map(|r| r.repositories.clone())
    }

    pub fn local_users(&self) -> Arc<LocalUserRepository> {
        Arc::clone(&self.local_users)
    }

    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    /// Pings the live database, downgrading on failure. `true` while the remote store is usable.
    pub async fn check_health(&self) -> bool {
        let database = match self.remote.read().await.as_ref() {
            Some(Remote {
                database: Some(db), ..
            }) => db.clone(),
            Some(Remote { database: None, .. }) => return true,
            None => return false,
        };

        match database.health_check().await {
            Ok(()) => true,
            Err(e) => {
                self.downgrade(&format!("health check failed: {}", e)).await;
                false
            }
        }
    }

    pub fn spawn_health_monitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let backend = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if backend.mode().await == StorageMode::Remote {
                    backend.check_health().await;
                }
            }
        })
    }
}

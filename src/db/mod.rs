pub mod backend;

use mongodb::{
    bson::doc,
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection,
};
use std::time::Duration;

use crate::errors::AppResult;

/// Kept short so a dead server demotes the process to local mode quickly.
const SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    client: Client,
    db_name: String,
}

impl Database {
    /// Parses `conn_string`, then pings before returning. A malformed URL fails without I/O.
    pub async fn connect(conn_string: &str, db_name: &str) -> AppResult<Self> {
        let mut options = ClientOptions::parse(conn_string).await?;
        options.app_name = Some("exam-server".to_string());
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        options.max_pool_size = Some(10);
        options.connect_timeout = Some(SELECTION_TIMEOUT);
        options.server_selection_timeout = Some(SELECTION_TIMEOUT);

        let database = Self {
            client: Client::with_options(options)?,
            db_name: db_name.to_string(),
        };
        database.health_check().await?;

        log::info!("Connected to MongoDB database '{}'", db_name);
        Ok(database)
    }

    pub fn get_collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.client.database(&self.db_name).collection(name)
    }

    pub async fn health_check(&self) -> AppResult<()> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

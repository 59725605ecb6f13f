use secrecy::SecretString;
use std::{env, path::PathBuf};

const DEFAULT_JWT_SECRET: &str = "dev_secret_key_change_in_production";

#[derive(Clone, Debug)]
pub struct Config {
    /// Empty means "run on local flat files".
    pub mongodb_url: String,
    pub mongo_db_name: String,
    pub local_data_dir: PathBuf,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub client_url: String,
    pub jwt_secret: SecretString,
    pub jwt_expiration_hours: i64,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub ai_grading_timeout_secs: u64,
    pub storage_health_interval_secs: u64,
    pub owner_username: Option<String>,
    pub owner_password: Option<SecretString>,
    pub app_name: String,
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mongodb_url: env::var("MONGODB_URL").unwrap_or_default(),
            mongo_db_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "exam-local".to_string()),
            local_data_dir: env::var("LOCAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("database")),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: env::var("WEB_SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            client_url: env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            jwt_secret: SecretString::from(
                env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            ),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(24 * 7),
            gemini_api_key: non_empty_var("GEMINI_API_KEY").map(SecretString::from),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            ai_grading_timeout_secs: env::var("AI_GRADING_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            storage_health_interval_secs: env::var("STORAGE_HEALTH_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15),
            owner_username: non_empty_var("OWNER_USERNAME"),
            owner_password: non_empty_var("OWNER_PASSWORD").map(SecretString::from),
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Exam Platform".to_string()),
        }
    }

    pub fn has_mongodb_url(&self) -> bool {
        !self.mongodb_url.trim().is_empty()
    }

    /// Validate that production-critical configuration is set
    /// Panics if required secrets are using default values
    pub fn validate_for_production(&self) {
        use secrecy::ExposeSecret;

        let jwt_secret = self.jwt_secret.expose_secret();

        if jwt_secret == DEFAULT_JWT_SECRET {
            panic!(
                "FATAL: JWT_SECRET is using default value! Set JWT_SECRET environment variable to a secure random string."
            );
        }

        if jwt_secret.len() < 32 {
            panic!(
                "FATAL: JWT_SECRET is too short ({}). Must be at least 32 characters for security.",
                jwt_secret.len()
            );
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            mongodb_url: String::new(),
            mongo_db_name: "exam-test".to_string(),
            local_data_dir: PathBuf::from("target/test-database"),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 5000,
            client_url: "http://localhost:3000".to_string(),
            jwt_secret: SecretString::from("test_jwt_secret_key".to_string()),
            jwt_expiration_hours: 1,
            gemini_api_key: None,
            gemini_model: "gemini-test".to_string(),
            gemini_base_url: "http://127.0.0.1:9".to_string(),
            ai_grading_timeout_secs: 1,
            storage_health_interval_secs: 15,
            owner_username: None,
            owner_password: None,
            app_name: "Exam Platform".to_string(),
        }
    }
}

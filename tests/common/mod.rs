use std::path::Path;

use exam_server::config::Config;
use secrecy::SecretString;

/// Local-mode configuration writing its flat files under `dir`.
pub fn local_config(dir: &Path) -> Config {
    Config {
        mongodb_url: String::new(),
        mongo_db_name: "exam-it".to_string(),
        local_data_dir: dir.to_path_buf(),
        web_server_host: "127.0.0.1".to_string(),
        web_server_port: 0,
        client_url: "http://localhost:3000".to_string(),
        jwt_secret: SecretString::from("integration_test_jwt_secret".to_string()),
        jwt_expiration_hours: 1,
        gemini_api_key: None,
        gemini_model: "gemini-test".to_string(),
        gemini_base_url: "http://127.0.0.1:9".to_string(),
        ai_grading_timeout_secs: 2,
        storage_health_interval_secs: 60,
        owner_username: None,
        owner_password: None,
        app_name: "Exam Platform".to_string(),
    }
}

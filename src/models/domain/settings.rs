use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{config::Config, errors::AppResult};

/// Fixed id of the one settings document.
pub const SETTINGS_ID: &str = "app-settings";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub mongodb_url: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Settings {
    /// Settings as they stand before the owner has saved anything.
    pub fn from_config(config: &Config) -> Self {
        Settings {
            id: SETTINGS_ID.to_string(),
            gemini_api_key: config
                .gemini_api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string())
                .unwrap_or_default(),
            mongodb_url: config.mongodb_url.clone(),
            app_name: config.app_name.clone(),
            updated_by: None,
            updated_at: None,
        }
    }

    pub fn grading_credential(&self) -> Option<SecretString> {
        let key = self.gemini_api_key.trim();
        (!key.is_empty()).then(|| SecretString::from(key.to_string()))
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mongodb_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.gemini_api_key.is_none() && self.mongodb_url.is_none() && self.app_name.is_none()
    }

    /// `$set` for the patched fields, `$setOnInsert` for the rest of `defaults`, so an
    /// upsert creates a complete document.
    pub fn to_upsert_document(&self, defaults: &Settings) -> AppResult<Document> {
        let mut set = mongodb::bson::to_document(self)?;
        set.insert("updatedAt", mongodb::bson::to_bson(&Utc::now())?);

        let mut on_insert = doc! {};
        let defaults_doc = mongodb::bson::to_document(defaults)?;
        for (key, value) in defaults_doc {
            if !set.contains_key(&key) {
                on_insert.insert(key, value);
            }
        }

        Ok(doc! { "$set": set, "$setOnInsert": on_insert })
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(key) = &self.gemini_api_key {
            settings.gemini_api_key = key.clone();
        }
        if let Some(url) = &self.mongodb_url {
            settings.mongodb_url = url.clone();
        }
        if let Some(app_name) = &self.app_name {
            settings.app_name = app_name.clone();
        }
        if let Some(updated_by) = &self.updated_by {
            settings.updated_by = Some(updated_by.clone());
        }
        settings.updated_at = Some(Utc::now());
    }
}

/// Shows the first and last four characters of a key.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_come_from_config() {
        let mut config = Config::test_config();
        config.gemini_api_key = Some(SecretString::from("env-key".to_string()));

        let settings = Settings::from_config(&config);
        assert_eq!(settings.id, SETTINGS_ID);
        assert_eq!(settings.gemini_api_key, "env-key");
        assert!(settings.grading_credential().is_some());
    }

    #[test]
    fn test_blank_key_is_no_credential() {
        let mut settings = Settings::from_config(&Config::test_config());
        settings.gemini_api_key = "   ".to_string();
        assert!(settings.grading_credential().is_none());
    }

    #[test]
    fn test_upsert_document_does_not_overlap() {
        let defaults = Settings::from_config(&Config::test_config());
        let patch = SettingsPatch {
            app_name: Some("Ujian".to_string()),
            ..Default::default()
        };
        let update = patch.to_upsert_document(&defaults).unwrap();

        let set = update.get_document("$set").unwrap();
        let on_insert = update.get_document("$setOnInsert").unwrap();
        assert_eq!(set.get_str("appName").unwrap(), "Ujian");
        assert!(!on_insert.contains_key("appName"));
        assert_eq!(on_insert.get_str("id").unwrap(), SETTINGS_ID);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret("AIzaSyABCDEFGH1234"), "AIza**********1234");
    }
}

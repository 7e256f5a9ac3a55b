//! Saved deployment configurations
//!
//! Named, reusable configs persisted as one JSON file with `0600`
//! permissions. Password-typed fields are run through the credential
//! codec on the way in and out, so the file never holds plaintext
//! secrets. At most one config is the default at a time.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::warn;

use crate::adapters::registry::AdapterRegistry;
use crate::errors::DeployError;
use crate::fields::FieldType;
use crate::filesys::file::File;
use crate::models::{DeployConfig, Platform, SavedDeployConfig};
use crate::storage::codec::CredentialCodec;

pub struct ConfigStore {
    file: File,
    codec: CredentialCodec,
    registry: Arc<AdapterRegistry>,
}

impl ConfigStore {
    pub fn new(file: File, codec: CredentialCodec, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            file,
            codec,
            registry,
        }
    }

    /// Names of Password-typed fields for a platform
    async fn secret_fields(&self, platform: Platform) -> Vec<&'static str> {
        match self.registry.platform_info(platform).await {
            Some(info) => info
                .fields
                .iter()
                .filter(|f| f.field_type == FieldType::Password)
                .map(|f| f.name)
                .collect(),
            None => Vec::new(),
        }
    }

    async fn transform_secrets(
        &self,
        config: &DeployConfig,
        apply: impl Fn(&CredentialCodec, &str) -> String,
    ) -> DeployConfig {
        let mut copy = config.clone();
        for name in self.secret_fields(config.platform).await {
            if let Some(Value::String(s)) = copy.options.get(name) {
                if !s.is_empty() {
                    let transformed = apply(&self.codec, s);
                    copy.options
                        .insert(name.to_string(), Value::String(transformed));
                }
            }
        }
        copy
    }

    async fn encrypt_config(&self, config: &DeployConfig) -> DeployConfig {
        self.transform_secrets(config, |codec, s| {
            if CredentialCodec::is_encrypted(s) {
                s.to_string()
            } else {
                codec.encrypt(s)
            }
        })
        .await
    }

    async fn decrypt_config(&self, config: &DeployConfig) -> DeployConfig {
        self.transform_secrets(config, |codec, s| codec.decrypt(s))
            .await
    }

    /// All saved configs as stored, secrets still encrypted
    pub async fn list(&self) -> Vec<SavedDeployConfig> {
        if !self.file.exists().await {
            return Vec::new();
        }
        match self.file.read_json().await {
            Ok(configs) => configs,
            Err(e) => {
                warn!(
                    path = %self.file.path().display(),
                    error = %e,
                    "Discarding unreadable configs file"
                );
                Vec::new()
            }
        }
    }

    async fn persist(&self, configs: &[SavedDeployConfig]) -> Result<(), DeployError> {
        self.file.write_json_atomic(&configs).await?;
        self.file.set_permissions_600().await
    }

    /// Insert or update a named config.
    ///
    /// Secrets are encrypted before the write. Setting `is_default` clears
    /// the flag on every other config.
    pub async fn save(
        &self,
        name: &str,
        config: &DeployConfig,
        is_default: bool,
    ) -> Result<SavedDeployConfig, DeployError> {
        if name.trim().is_empty() {
            return Err(DeployError::ConfigError(
                "Config name must not be empty".to_string(),
            ));
        }

        let encrypted = self.encrypt_config(config).await;
        let now = Utc::now();
        let mut configs = self.list().await;

        if is_default {
            for existing in configs.iter_mut() {
                existing.is_default = false;
            }
        }

        let saved = match configs.iter_mut().find(|c| c.name == name) {
            Some(existing) => {
                existing.platform = config.platform;
                existing.config = encrypted;
                existing.is_default = is_default;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let entry = SavedDeployConfig {
                    name: name.to_string(),
                    platform: config.platform,
                    config: encrypted,
                    is_default,
                    created_at: now,
                    updated_at: now,
                    last_deploy_at: None,
                };
                configs.push(entry.clone());
                entry
            }
        };

        self.persist(&configs).await?;
        Ok(saved)
    }

    /// A saved config by name, secrets decrypted
    pub async fn get(&self, name: &str) -> Option<SavedDeployConfig> {
        let mut saved = self.list().await.into_iter().find(|c| c.name == name)?;
        saved.config = self.decrypt_config(&saved.config).await;
        Some(saved)
    }

    /// The default config, if one is set, secrets decrypted
    pub async fn get_default(&self) -> Option<SavedDeployConfig> {
        let mut saved = self.list().await.into_iter().find(|c| c.is_default)?;
        saved.config = self.decrypt_config(&saved.config).await;
        Some(saved)
    }

    pub async fn delete(&self, name: &str) -> Result<(), DeployError> {
        let mut configs = self.list().await;
        let before = configs.len();
        configs.retain(|c| c.name != name);
        if configs.len() == before {
            return Err(DeployError::NotFound(format!("No saved config '{}'", name)));
        }
        self.persist(&configs).await
    }

    /// Mark one config as the default, clearing the flag everywhere else
    pub async fn set_default(&self, name: &str) -> Result<(), DeployError> {
        let mut configs = self.list().await;
        if !configs.iter().any(|c| c.name == name) {
            return Err(DeployError::NotFound(format!("No saved config '{}'", name)));
        }
        for config in configs.iter_mut() {
            config.is_default = config.name == name;
        }
        self.persist(&configs).await
    }

    /// Record that a saved config was just used for a deployment.
    ///
    /// Missing names are ignored; the deployment already happened.
    pub async fn touch_last_deploy(&self, name: &str) -> Result<(), DeployError> {
        let mut configs = self.list().await;
        match configs.iter_mut().find(|c| c.name == name) {
            Some(config) => {
                config.last_deploy_at = Some(Utc::now());
                self.persist(&configs).await
            }
            None => Ok(()),
        }
    }

    /// Credential values found in the environment for a platform's fields
    pub async fn credentials_from_env(&self, platform: Platform) -> Map<String, Value> {
        let mut found = Map::new();
        if let Some(info) = self.registry.platform_info(platform).await {
            for field in info.fields {
                let Some(env_var) = field.env_var else {
                    continue;
                };
                if let Ok(value) = std::env::var(env_var) {
                    if !value.is_empty() {
                        found.insert(field.name.to_string(), Value::String(value));
                    }
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::new(
            File::new(dir.path().join("configs.json")),
            CredentialCodec::default(),
            Arc::new(AdapterRegistry::new()),
        )
    }

    fn netlify_config(token: &str) -> DeployConfig {
        let mut config = DeployConfig::new(Platform::Netlify);
        config.set_option("authToken", token);
        config.set_option("siteId", "site-1");
        config
    }

    #[tokio::test]
    async fn test_secrets_encrypted_at_rest_and_decrypted_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store
            .save("prod", &netlify_config("tok_secret"), false)
            .await
            .unwrap();

        // At rest: encrypted
        let raw = store.list().await;
        let stored = raw[0].config.option_str("authToken").unwrap();
        assert!(CredentialCodec::is_encrypted(stored));
        assert_ne!(stored, "tok_secret");
        // Non-secret fields untouched
        assert_eq!(raw[0].config.option_str("siteId"), Some("site-1"));

        // On read: decrypted
        let loaded = store.get("prod").await.unwrap();
        assert_eq!(loaded.config.option_str("authToken"), Some("tok_secret"));
    }

    #[tokio::test]
    async fn test_default_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store
            .save("a", &netlify_config("t1"), true)
            .await
            .unwrap();
        store
            .save("b", &netlify_config("t2"), true)
            .await
            .unwrap();

        let configs = store.list().await;
        let defaults: Vec<_> = configs.iter().filter(|c| c.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].name, "b");
        assert_eq!(store.get_default().await.unwrap().name, "b");

        store.set_default("a").await.unwrap();
        assert_eq!(store.get_default().await.unwrap().name, "a");
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let first = store
            .save("prod", &netlify_config("t1"), false)
            .await
            .unwrap();
        let second = store
            .save("prod", &netlify_config("t2"), false)
            .await
            .unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store
            .save("prod", &netlify_config("t"), false)
            .await
            .unwrap();
        store.delete("prod").await.unwrap();
        assert!(store.get("prod").await.is_none());
        assert!(matches!(
            store.delete("prod").await,
            Err(DeployError::NotFound(_))
        ));
        assert!(matches!(
            store.set_default("prod").await,
            Err(DeployError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_touch_last_deploy() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store
            .save("prod", &netlify_config("t"), false)
            .await
            .unwrap();
        assert!(store.get("prod").await.unwrap().last_deploy_at.is_none());

        store.touch_last_deploy("prod").await.unwrap();
        assert!(store.get("prod").await.unwrap().last_deploy_at.is_some());

        // Unknown names are a no-op
        store.touch_last_deploy("missing").await.unwrap();
    }
}

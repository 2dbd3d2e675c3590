use async_trait::async_trait;
use serde_json::Value;
use std::sync::RwLock;
use title_core::settings::{Settings, SettingsChange};
use tokio::sync::Mutex;

/// The host's persisted key-value store for this plugin's settings blob.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// `None` when nothing has been saved yet.
    async fn load(&self) -> anyhow::Result<Option<Value>>;
    async fn save(&self, value: &Value) -> anyhow::Result<()>;
}

/// Owns the live [`Settings`] and persists every mutation.
pub struct SettingsManager {
    store: std::sync::Arc<dyn SettingsStore>,
    current: RwLock<Settings>,
    update_lock: Mutex<()>,
}

impl SettingsManager {
    /// A store that fails to load yields defaults.
    pub async fn load(store: std::sync::Arc<dyn SettingsStore>) -> Self {
        let settings = match store.load().await {
            Ok(Some(value)) => Settings::from_value(&value),
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        };
        tracing::info!("Settings loaded: property key `{}`", settings.property_key);
        Self {
            store,
            current: RwLock::new(settings),
            update_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Apply `mutate`, persist, and report what changed. Nothing changes in
    /// memory if persisting fails.
    pub async fn update<F>(&self, mutate: F) -> anyhow::Result<SettingsChange>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.update_lock.lock().await;
        let before = self.get();
        let mut next = before.clone();
        mutate(&mut next);
        let next = next.normalized();

        let change = before.diff(&next);
        if change.is_empty() {
            return Ok(change);
        }

        self.store.save(&next.to_value()).await?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = next;
        tracing::debug!("Settings updated: {:?}", change);
        Ok(change)
    }
}

//! Rust implementations of the host collaborators used by the CLI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use applock_core::{
    AppLockError, AppLockResult, AppState, BiometricOutcome, BiometricPrompt,
    LifecycleListener, LifecycleSignal, LifecycleSubscription, SessionAuthority,
    SettingsStore,
};
use serde::{Deserialize, Serialize};

const SETTINGS_DIRNAME: &str = "applock";
const SETTINGS_FILENAME: &str = "settings.json";

/// Default settings location, `<config dir>/applock/settings.json`.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIRNAME).join(SETTINGS_FILENAME))
}

fn settings_err(context: &str, err: impl std::fmt::Display) -> AppLockError {
    AppLockError::Settings(format!("{context}: {err}"))
}

/// Flags persisted as a JSON object of booleans.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn load(&self) -> AppLockResult<BTreeMap<String, bool>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|err| settings_err("malformed settings file", err)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(settings_err("failed to read settings", err)),
        }
    }

    async fn store(&self, flags: &BTreeMap<String, bool>) -> AppLockResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| settings_err("failed to create settings dir", err))?;
        }
        let bytes = serde_json::to_vec_pretty(flags)
            .map_err(|err| settings_err("failed to encode settings", err))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| settings_err("failed to write settings", err))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| settings_err("failed to replace settings", err))
    }
}

#[async_trait::async_trait]
impl SettingsStore for FileSettingsStore {
    async fn read_flag(&self, key: String) -> AppLockResult<bool> {
        Ok(self.load().await?.get(&key).copied().unwrap_or(false))
    }

    async fn write_flag(&self, key: String, value: bool) -> AppLockResult<()> {
        let mut flags = self.load().await?;
        if value {
            flags.insert(key, true);
        } else {
            flags.remove(&key);
        }
        self.store(&flags).await
    }
}

/// Settings for a replay: the file at `path` when given, otherwise an in-memory
/// store seeded with `enabled`.
pub fn simulation_settings(
    key: &str,
    enabled: bool,
    path: Option<&Path>,
) -> Arc<dyn SettingsStore> {
    match path {
        Some(path) => Arc::new(FileSettingsStore::new(path)),
        None => Arc::new(MemorySettingsStore::with_flag(key, enabled)),
    }
}

/// Process-local settings for replays, so they never touch the real file.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    flags: Mutex<BTreeMap<String, bool>>,
}

impl MemorySettingsStore {
    pub fn with_flag(key: &str, enabled: bool) -> Self {
        let store = Self::default();
        if enabled {
            store.flags().insert(key.to_string(), true);
        }
        store
    }

    fn flags(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, bool>> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn read_flag(&self, key: String) -> AppLockResult<bool> {
        Ok(self.flags().get(&key).copied().unwrap_or(false))
    }

    async fn write_flag(&self, key: String, value: bool) -> AppLockResult<()> {
        if value {
            self.flags().insert(key, true);
        } else {
            self.flags().remove(&key);
        }
        Ok(())
    }
}

/// What the scripted prompt resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptOutcome {
    Success,
    #[default]
    Failure,
    NotAvailable,
    Error,
}

/// Prompt that resolves to whatever the current script step says.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    next: Mutex<Option<PromptOutcome>>,
    shown: AtomicUsize,
}

impl ScriptedPrompt {
    /// Sets the outcome of the next challenge; `None` clears it.
    pub fn prepare(&self, outcome: Option<PromptOutcome>) {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
    }

    pub fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BiometricPrompt for ScriptedPrompt {
    async fn authenticate(&self, reason: String) -> AppLockResult<BiometricOutcome> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();
        tracing::info!(%reason, ?outcome, "biometric prompt shown");
        match outcome {
            PromptOutcome::Success => Ok(BiometricOutcome::success()),
            PromptOutcome::Failure => Ok(BiometricOutcome::failure(None)),
            PromptOutcome::NotAvailable => Ok(BiometricOutcome::not_available()),
            PromptOutcome::Error => {
                Err(AppLockError::Prompt("scripted prompt error".to_string()))
            }
        }
    }
}

type Listeners = Mutex<Vec<(u64, Arc<dyn LifecycleListener>)>>;

/// Lifecycle source fed by `transition` steps.
#[derive(Default)]
pub struct ManualLifecycle {
    listeners: Arc<Listeners>,
    next_id: AtomicU64,
}

impl ManualLifecycle {
    pub fn emit(&self, previous: AppState, next: AppState) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        tracing::debug!(%previous, %next, subscribers = listeners.len(), "lifecycle transition");
        for listener in listeners {
            listener.on_transition(previous, next);
        }
    }
}

impl LifecycleSignal for ManualLifecycle {
    fn subscribe(
        &self,
        listener: Arc<dyn LifecycleListener>,
    ) -> Arc<dyn LifecycleSubscription> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        Arc::new(ManualSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        })
    }
}

struct ManualSubscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl LifecycleSubscription for ManualSubscription {
    fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Session module that only records forced re-logins.
#[derive(Debug, Default)]
pub struct LoggingSession {
    relogins: AtomicUsize,
}

impl LoggingSession {
    pub fn relogins(&self) -> usize {
        self.relogins.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionAuthority for LoggingSession {
    async fn force_relogin(&self) -> AppLockResult<()> {
        self.relogins.fetch_add(1, Ordering::SeqCst);
        tracing::warn!("forced re-login requested");
        Ok(())
    }
}

//! In-memory host collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;

use crate::error::{AppLockError, AppLockResult};
use crate::platform::{
    BiometricOutcome, BiometricPrompt, LifecycleListener, LifecycleSignal,
    LifecycleSubscription, SessionAuthority, SettingsStore,
};
use crate::policy::AppState;
use crate::BIOMETRICS_ENABLED_KEY;

#[derive(Default)]
pub struct InMemorySettingsStore {
    flags: Mutex<HashMap<String, bool>>,
}

impl InMemorySettingsStore {
    pub fn with_enabled(enabled: bool) -> Self {
        let store = Self::default();
        if enabled {
            store
                .flags
                .lock()
                .unwrap()
                .insert(BIOMETRICS_ENABLED_KEY.to_string(), true);
        }
        store
    }
}

#[async_trait::async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn read_flag(&self, key: String) -> AppLockResult<bool> {
        Ok(self.flags.lock().unwrap().get(&key).copied().unwrap_or(false))
    }

    async fn write_flag(&self, key: String, value: bool) -> AppLockResult<()> {
        let mut flags = self.flags.lock().unwrap();
        if value {
            flags.insert(key, true);
        } else {
            flags.remove(&key);
        }
        Ok(())
    }
}

pub struct FailingSettingsStore;

#[async_trait::async_trait]
impl SettingsStore for FailingSettingsStore {
    async fn read_flag(&self, _key: String) -> AppLockResult<bool> {
        Err(AppLockError::Settings("storage unavailable".to_string()))
    }

    async fn write_flag(&self, _key: String, _value: bool) -> AppLockResult<()> {
        Err(AppLockError::Settings("storage unavailable".to_string()))
    }
}

/// Returns queued outcomes in order. When the queue is empty it either fails
/// immediately or, for [`ScriptedPrompt::pending`], waits for the next push.
#[derive(Default)]
pub struct ScriptedPrompt {
    outcomes: Mutex<VecDeque<BiometricOutcome>>,
    pushed: Notify,
    wait_for_outcome: bool,
    calls: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn pending() -> Self {
        Self {
            wait_for_outcome: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn push(&self, outcome: BiometricOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
        self.pushed.notify_one();
    }
}

#[async_trait::async_trait]
impl BiometricPrompt for ScriptedPrompt {
    async fn authenticate(&self, _reason: String) -> AppLockResult<BiometricOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        loop {
            if let Some(outcome) = self.outcomes.lock().unwrap().pop_front() {
                return Ok(outcome);
            }
            if !self.wait_for_outcome {
                return Ok(BiometricOutcome::failure(None));
            }
            self.pushed.notified().await;
        }
    }
}

#[derive(Default)]
pub struct ManualLifecycle {
    listeners: Arc<Mutex<Vec<(u64, Arc<dyn LifecycleListener>)>>>,
    next_id: AtomicU64,
}

impl ManualLifecycle {
    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn emit(&self, previous: AppState, next: AppState) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
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
        self.listeners.lock().unwrap().push((id, listener));
        Arc::new(ManualSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        })
    }
}

struct ManualSubscription {
    id: u64,
    listeners: Weak<Mutex<Vec<(u64, Arc<dyn LifecycleListener>)>>>,
}

impl LifecycleSubscription for ManualSubscription {
    fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().unwrap().retain(|(id, _)| *id != self.id);
        }
    }
}

#[derive(Default)]
pub struct RecordingSession {
    relogins: AtomicUsize,
}

impl RecordingSession {
    pub fn relogin_count(&self) -> usize {
        self.relogins.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionAuthority for RecordingSession {
    async fn force_relogin(&self) -> AppLockResult<()> {
        self.relogins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

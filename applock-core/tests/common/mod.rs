//! Host collaborator doubles shared by the integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use applock_core::{
    AppLockConfig, AppLockController, AppLockError, AppLockResult, AppState,
    BiometricOutcome, BiometricPrompt, LifecycleListener, LifecycleSignal,
    LifecycleSubscription, LockSnapshot, LockStateObserver, Platform,
    SessionAuthority, SettingsStore, BIOMETRICS_ENABLED_KEY,
};
use tokio::sync::Notify;

/// Settings store backed by a map; `false` deletes the key.
#[derive(Default)]
pub struct InMemorySettingsStore {
    flags: Mutex<HashMap<String, bool>>,
}

impl InMemorySettingsStore {
    /// Store with the biometrics flag already persisted.
    pub fn enabled() -> Self {
        let store = Self::default();
        store
            .flags
            .lock()
            .unwrap()
            .insert(BIOMETRICS_ENABLED_KEY.to_string(), true);
        store
    }

    /// Whether the biometrics key is present.
    pub fn has_flag(&self) -> bool {
        self.flags.lock().unwrap().contains_key(BIOMETRICS_ENABLED_KEY)
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

/// Prompt returning queued results; an empty queue reads as a plain failure.
///
/// A gated prompt signals [`ScriptedPrompt::entered`] and then waits for
/// [`ScriptedPrompt::release`] before resolving.
#[derive(Default)]
pub struct ScriptedPrompt {
    results: Mutex<VecDeque<AppLockResult<BiometricOutcome>>>,
    gated: bool,
    entered: Notify,
    released: Notify,
    calls: AtomicUsize,
}

impl ScriptedPrompt {
    /// Prompt that holds every call until released.
    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Self::default()
        }
    }

    /// Queues the result of the next call.
    pub fn push(&self, result: AppLockResult<BiometricOutcome>) {
        self.results.lock().unwrap().push_back(result);
    }

    /// Resolves once a call is waiting on the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the waiting call resolve.
    pub fn release(&self) {
        self.released.notify_one();
    }

    /// Number of challenges shown.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BiometricPrompt for ScriptedPrompt {
    async fn authenticate(&self, _reason: String) -> AppLockResult<BiometricOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.entered.notify_one();
            self.released.notified().await;
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(BiometricOutcome::failure(None)))
    }
}

type Listeners = Mutex<Vec<(u64, Arc<dyn LifecycleListener>)>>;

/// Lifecycle source driven by the test.
#[derive(Default)]
pub struct ManualLifecycle {
    listeners: Arc<Listeners>,
    next_id: AtomicU64,
}

impl ManualLifecycle {
    /// Delivers a transition to every subscriber.
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

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
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
    listeners: Weak<Listeners>,
}

impl LifecycleSubscription for ManualSubscription {
    fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().unwrap().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Session module recording forced re-logins and the lock state seen at that time.
#[derive(Default)]
pub struct RecordingSession {
    fail: bool,
    controller: OnceLock<Weak<AppLockController>>,
    seen: Mutex<Vec<LockSnapshot>>,
}

impl RecordingSession {
    /// Session whose logout always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Snapshots observed at each forced re-login.
    pub fn relogins(&self) -> Vec<LockSnapshot> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SessionAuthority for RecordingSession {
    async fn force_relogin(&self) -> AppLockResult<()> {
        let controller = self.controller.get().and_then(Weak::upgrade);
        if let Some(controller) = controller {
            self.seen.lock().unwrap().push(controller.snapshot());
        }
        if self.fail {
            return Err(AppLockError::Relogin("token revoke failed".to_string()));
        }
        Ok(())
    }
}

/// Collects every snapshot pushed to the observer.
#[derive(Default)]
pub struct RecordingObserver {
    snapshots: Mutex<Vec<LockSnapshot>>,
}

impl RecordingObserver {
    /// All snapshots received so far.
    pub fn snapshots(&self) -> Vec<LockSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl LockStateObserver for RecordingObserver {
    fn on_lock_state_changed(&self, snapshot: LockSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }
}

/// A controller wired to the doubles above.
pub struct Fixture {
    /// Controller under test.
    pub controller: Arc<AppLockController>,
    /// Persisted preference.
    pub settings: Arc<InMemorySettingsStore>,
    /// Biometric prompt double.
    pub prompt: Arc<ScriptedPrompt>,
    /// Lifecycle signal the test drives.
    pub lifecycle: Arc<ManualLifecycle>,
    /// Records forced re-logins.
    pub session: Arc<RecordingSession>,
    /// Records every state change.
    pub observer: Arc<RecordingObserver>,
}

impl Fixture {
    /// Builds an uninitialized controller.
    pub fn new(
        platform: Platform,
        settings: InMemorySettingsStore,
        prompt: ScriptedPrompt,
        session: RecordingSession,
    ) -> Self {
        let settings = Arc::new(settings);
        let prompt = Arc::new(prompt);
        let lifecycle = Arc::new(ManualLifecycle::default());
        let session = Arc::new(session);
        let observer = Arc::new(RecordingObserver::default());

        let controller = AppLockController::new(
            platform,
            AppLockConfig::default(),
            settings.clone(),
            prompt.clone(),
            lifecycle.clone(),
            session.clone(),
        )
        .expect("default config is valid");
        let _ = session.controller.set(Arc::downgrade(&controller));
        controller.set_observer(Some(observer.clone()));

        Self {
            controller,
            settings,
            prompt,
            lifecycle,
            session,
            observer,
        }
    }

    /// Native controller with biometrics enabled, initialized and signed in,
    /// which leaves it locked.
    pub async fn locked(prompt: ScriptedPrompt, session: RecordingSession) -> Self {
        let fixture = Self::new(
            Platform::Ios,
            InMemorySettingsStore::enabled(),
            prompt,
            session,
        );
        fixture.controller.initialize().await;
        fixture.controller.set_session_active(true);
        assert!(!fixture.controller.is_unlocked());
        fixture
    }
}

//! The biometric lock controller.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::config::AppLockConfig;
use crate::error::AppLockResult;
use crate::platform::{
    BiometricPrompt, LifecycleListener, LifecycleSignal, LifecycleSubscription,
    LockStateObserver, SessionAuthority, SettingsStore,
};
use crate::policy::AppState;
use crate::state::{
    LifecycleChange, LockMachine, LockSnapshot, UnlockResolution, UnlockStart,
};
use crate::Platform;

/// Decides when the app must be re-authenticated with device biometrics.
///
/// Construct one per process at app start and hand the `Arc` to every consumer
/// (or park it in an [`crate::AppLockHandle`]). The controller starts unlocked and
/// does not enforce anything until [`AppLockController::initialize`] has loaded the
/// stored preference and a session is active.
///
/// At most one biometric prompt is outstanding at a time: a second `unlock` or
/// `ensure_unlocked` while one is in flight returns `false` without prompting.
#[derive(uniffi::Object)]
pub struct AppLockController {
    config: AppLockConfig,
    machine: Mutex<LockMachine>,
    settings: Arc<dyn SettingsStore>,
    prompt: Arc<dyn BiometricPrompt>,
    lifecycle: Arc<dyn LifecycleSignal>,
    session: Arc<dyn SessionAuthority>,
    subscription: Mutex<Option<Arc<dyn LifecycleSubscription>>>,
    observer: Mutex<Option<Arc<dyn LockStateObserver>>>,
    this: Weak<Self>,
}

#[uniffi::export(async_runtime = "tokio")]
impl AppLockController {
    /// Creates a controller for `platform` wired to the host collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppLockError::InvalidConfig`] if `config` does not validate.
    #[uniffi::constructor]
    pub fn new(
        platform: Platform,
        config: AppLockConfig,
        settings: Arc<dyn SettingsStore>,
        prompt: Arc<dyn BiometricPrompt>,
        lifecycle: Arc<dyn LifecycleSignal>,
        session: Arc<dyn SessionAuthority>,
    ) -> AppLockResult<Arc<Self>> {
        config.validate()?;
        log::debug!("app lock created for {platform}");
        let machine = LockMachine::new(platform.is_native(), config.failure_limit);
        Ok(Arc::new_cyclic(|this| Self {
            config,
            machine: Mutex::new(machine),
            settings,
            prompt,
            lifecycle,
            session,
            subscription: Mutex::new(None),
            observer: Mutex::new(None),
            this: this.clone(),
        }))
    }

    /// Loads the stored preference. Until this completes the lock is not enforced.
    /// A read failure is treated as "disabled".
    pub async fn initialize(&self) {
        let enabled = match self.settings.read_flag(self.config.settings_key.clone()).await
        {
            Ok(enabled) => enabled,
            Err(err) => {
                log::warn!("failed to read biometrics preference, treating as disabled: {err}");
                false
            }
        };
        log::debug!("biometrics preference loaded: {enabled}");
        let change = self.update(|machine| machine.load_enabled(enabled));
        self.apply_lifecycle(change);
    }

    /// Reports whether an authenticated session exists.
    pub fn set_session_active(&self, active: bool) {
        let change = self.update(|machine| machine.set_session_active(active));
        self.apply_lifecycle(change);
    }

    /// Persists the preference and applies it.
    ///
    /// Enabling leaves the app unlocked: the user is already inside an unlocked
    /// session and must not be prompted again immediately. Disabling unlocks.
    /// Both reset the failure counter.
    ///
    /// # Errors
    ///
    /// Returns the settings store error if persisting fails; state is unchanged.
    pub async fn set_enabled(&self, enabled: bool) -> AppLockResult<()> {
        self.settings
            .write_flag(self.config.settings_key.clone(), enabled)
            .await?;
        log::info!("biometric lock {}", if enabled { "enabled" } else { "disabled" });
        let change = self.update(|machine| machine.apply_enabled(enabled));
        self.apply_lifecycle(change);
        Ok(())
    }

    /// Locks immediately if locking currently applies.
    pub fn lock_now(&self) {
        self.update(LockMachine::lock_now);
    }

    /// Shows a biometric prompt and unlocks on success.
    ///
    /// Returns `true` without prompting when locking does not apply, and `false`
    /// without prompting when another prompt is outstanding. Failed attempts count
    /// toward a forced re-login; a prompt that throws counts as a failed attempt.
    pub async fn unlock(&self, reason: String) -> bool {
        match self.update(LockMachine::begin_unlock) {
            UnlockStart::NotRequired => true,
            UnlockStart::Busy => {
                log::debug!("unlock ignored, prompt already outstanding");
                false
            }
            UnlockStart::Prompt => self.prompt_and_resolve(reason).await,
        }
    }

    /// Returns `true` right away when no proof is needed, otherwise behaves like
    /// [`AppLockController::unlock`].
    pub async fn ensure_unlocked(&self, reason: String) -> bool {
        match self.update(LockMachine::begin_ensure_unlocked) {
            UnlockStart::NotRequired => true,
            UnlockStart::Busy => {
                log::debug!("ensure_unlocked ignored, prompt already outstanding");
                false
            }
            UnlockStart::Prompt => self.prompt_and_resolve(reason).await,
        }
    }

    /// Whether the user opted in to biometric locking.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.machine().snapshot().is_enabled
    }

    /// Whether no biometric proof is required right now.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.machine().snapshot().is_unlocked
    }

    /// Whether a biometric prompt is outstanding.
    #[must_use]
    pub fn is_prompting(&self) -> bool {
        self.machine().snapshot().is_prompting
    }

    /// Consecutive failed attempts in the current lock cycle.
    #[must_use]
    pub fn failed_attempts(&self) -> u32 {
        self.machine().snapshot().failed_attempts
    }

    /// Whether locking currently applies.
    #[must_use]
    pub fn should_lock(&self) -> bool {
        self.machine().should_lock()
    }

    /// The full observable state.
    #[must_use]
    pub fn snapshot(&self) -> LockSnapshot {
        self.machine().snapshot()
    }

    /// Registers (or clears) the observer notified on every state change.
    pub fn set_observer(&self, observer: Option<Arc<dyn LockStateObserver>>) {
        *self.observer.lock().unwrap_or_else(PoisonError::into_inner) = observer;
    }
}

impl AppLockController {
    fn machine(&self) -> MutexGuard<'_, LockMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the state and notifies the observer if the snapshot changed.
    /// The state lock is released before any host code runs.
    fn update<R>(&self, f: impl FnOnce(&mut LockMachine) -> R) -> R {
        let (result, before, after) = {
            let mut machine = self.machine();
            let before = machine.snapshot();
            let result = f(&mut machine);
            (result, before, machine.snapshot())
        };
        if before != after {
            log::debug!("lock state changed: {:?} -> {:?}", before.phase, after.phase);
            let observer = self
                .observer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(observer) = observer {
                observer.on_lock_state_changed(after);
            }
        }
        result
    }

    fn subscription(&self) -> MutexGuard<'_, Option<Arc<dyn LifecycleSubscription>>> {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Holds the lifecycle subscription exactly while locking applies.
    ///
    /// Host `subscribe`/`unsubscribe` run without the slot locked, so they may
    /// call back into the controller.
    fn apply_lifecycle(&self, change: Option<LifecycleChange>) {
        let Some(change) = change else {
            return;
        };
        log::debug!("lifecycle subscription change requested: {change:?}");

        if !self.machine().should_lock() {
            let subscription = self.subscription().take();
            if let Some(subscription) = subscription {
                subscription.unsubscribe();
            }
            return;
        }
        if self.subscription().is_some() {
            return;
        }

        let listener = Arc::new(ControllerListener {
            controller: self.this.clone(),
        });
        let subscription = self.lifecycle.subscribe(listener);

        let surplus = {
            let mut slot = self.subscription();
            if slot.is_none() && self.machine().should_lock() {
                *slot = Some(subscription);
                None
            } else {
                Some(subscription)
            }
        };
        if let Some(surplus) = surplus {
            log::debug!("lifecycle subscription no longer needed, dropping it");
            surplus.unsubscribe();
        }
    }

    fn handle_transition(&self, previous: AppState, next: AppState) {
        if self.update(|machine| machine.on_transition(previous, next)) {
            log::info!("app returned to foreground ({previous} -> {next}), locking");
        }
    }

    async fn prompt_and_resolve(&self, reason: String) -> bool {
        let mut guard = PromptGuard {
            controller: self,
            armed: true,
        };
        let success = match self.prompt.authenticate(reason).await {
            Ok(outcome) => {
                if let Some(error) = outcome.error.as_deref() {
                    log::info!("biometric prompt failed: {error}");
                }
                outcome.success
            }
            Err(err) => {
                log::warn!("biometric prompt threw, counting as failed attempt: {err}");
                false
            }
        };
        guard.armed = false;

        match self.update(|machine| machine.finish_unlock(success)) {
            UnlockResolution::Unlocked => {
                log::info!("biometric unlock succeeded");
                true
            }
            UnlockResolution::Failed(outcome) => {
                log::info!(
                    "biometric unlock failed ({} of {})",
                    outcome.failed_attempts,
                    self.config.failure_limit
                );
                false
            }
            UnlockResolution::ForceRelogin(outcome) => {
                log::warn!(
                    "{} consecutive biometric failures, forcing re-login",
                    outcome.failed_attempts
                );
                if let Err(err) = self.session.force_relogin().await {
                    log::warn!("forced re-login failed: {err}");
                }
                false
            }
            UnlockResolution::Ignored => {
                log::debug!("biometric failure ignored, locking no longer applies");
                false
            }
        }
    }
}

impl fmt::Debug for AppLockController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppLockController")
            .field("config", &self.config)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Drop for AppLockController {
    fn drop(&mut self) {
        let subscription = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }
}

/// Releases the prompting guard if the unlock future is dropped mid-prompt.
struct PromptGuard<'a> {
    controller: &'a AppLockController,
    armed: bool,
}

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("unlock cancelled while prompting");
            self.controller.update(LockMachine::abandon_prompt);
        }
    }
}

/// Forwards host lifecycle transitions to a live controller.
struct ControllerListener {
    controller: Weak<AppLockController>,
}

impl LifecycleListener for ControllerListener {
    fn on_transition(&self, previous: AppState, next: AppState) {
        if let Some(controller) = self.controller.upgrade() {
            controller.handle_transition(previous, next);
        }
    }
}

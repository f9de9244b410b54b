//! The lock state machine.
//!
//! [`LockMachine`] owns every mutable field of the controller and applies the
//! transition rules synchronously. It never calls out to the host; instead it
//! reports what the controller has to do next (subscribe to lifecycle events,
//! show a prompt, force a re-login).

use serde::{Deserialize, Serialize};

use crate::policy::{
    next_failure_state_with_limit, relocks_on_foreground, AppState,
    FailureOutcome, LockConfig,
};

/// Coarse state of the lock, derived from [`LockSnapshot`] flags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum,
)]
#[serde(rename_all = "snake_case")]
pub enum LockPhase {
    /// No biometric proof is required right now.
    Unlocked,
    /// The UI must obtain biometric proof before use.
    Locked,
    /// A biometric prompt is outstanding.
    Prompting,
}

/// Everything the UI can observe about the lock.
#[allow(clippy::struct_excessive_bools)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Record,
)]
pub struct LockSnapshot {
    /// The user opted in to biometric locking.
    pub is_enabled: bool,
    /// Locking currently applies (native, session active, enabled).
    pub should_lock: bool,
    /// No biometric proof is required right now.
    pub is_unlocked: bool,
    /// A biometric prompt is outstanding.
    pub is_prompting: bool,
    /// Consecutive failed attempts in the current lock cycle.
    pub failed_attempts: u32,
    /// Coarse state derived from the flags above.
    pub phase: LockPhase,
}

/// One-shot suppression of the next automatic lock, armed by enabling the feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelockSuppression {
    Disarmed,
    Armed,
    Consumed,
}

/// Lifecycle subscription work the controller has to perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleChange {
    Subscribe,
    Unsubscribe,
}

/// How an unlock request should proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockStart {
    /// Locking does not apply (or the app is already unlocked for `ensure`).
    NotRequired,
    /// Another prompt is outstanding.
    Busy,
    /// The prompting guard is held; the caller must show the prompt.
    Prompt,
}

/// What a resolved prompt did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockResolution {
    Unlocked,
    Failed(FailureOutcome),
    ForceRelogin(FailureOutcome),
    /// Locking stopped applying while the prompt was outstanding.
    Ignored,
}

#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct LockMachine {
    is_native_platform: bool,
    session_active: bool,
    is_enabled: bool,
    enabled_settled: bool,
    is_unlocked: bool,
    is_prompting: bool,
    failed_attempts: u32,
    failure_limit: u32,
    suppression: RelockSuppression,
}

impl LockMachine {
    pub const fn new(is_native_platform: bool, failure_limit: u32) -> Self {
        Self {
            is_native_platform,
            session_active: false,
            is_enabled: false,
            enabled_settled: false,
            is_unlocked: true,
            is_prompting: false,
            failed_attempts: 0,
            failure_limit,
            suppression: RelockSuppression::Disarmed,
        }
    }

    pub const fn config(&self) -> LockConfig {
        LockConfig {
            is_native_platform: self.is_native_platform,
            session_active: self.session_active,
            is_enabled: self.is_enabled,
        }
    }

    pub const fn should_lock(&self) -> bool {
        self.config().should_lock()
    }

    pub const fn snapshot(&self) -> LockSnapshot {
        let phase = if self.is_prompting {
            LockPhase::Prompting
        } else if self.is_unlocked {
            LockPhase::Unlocked
        } else {
            LockPhase::Locked
        };
        LockSnapshot {
            is_enabled: self.is_enabled,
            should_lock: self.should_lock(),
            is_unlocked: self.is_unlocked,
            is_prompting: self.is_prompting,
            failed_attempts: self.failed_attempts,
            phase,
        }
    }

    pub fn set_session_active(&mut self, active: bool) -> Option<LifecycleChange> {
        let was_locking = self.should_lock();
        self.session_active = active;
        self.react(was_locking)
    }

    /// Applies the flag read from storage, unless `set_enabled` already settled it.
    pub fn load_enabled(&mut self, enabled: bool) -> Option<LifecycleChange> {
        if self.enabled_settled {
            log::debug!("stored biometrics flag ignored, already set explicitly");
            return None;
        }
        self.enabled_settled = true;
        let was_locking = self.should_lock();
        self.is_enabled = enabled;
        self.react(was_locking)
    }

    /// Applies a persisted `set_enabled`. Enabling from inside a session must not
    /// lock the user out of the screen they enabled it from.
    pub fn apply_enabled(&mut self, enabled: bool) -> Option<LifecycleChange> {
        self.enabled_settled = true;
        if enabled {
            self.suppression = RelockSuppression::Armed;
        }
        let was_locking = self.should_lock();
        self.is_enabled = enabled;
        let change = self.react(was_locking);

        match self.suppression {
            RelockSuppression::Armed => {
                log::debug!("relock suppression unused, disarming");
            }
            RelockSuppression::Consumed => {
                log::debug!("automatic lock suppressed after enabling biometrics");
            }
            RelockSuppression::Disarmed => {}
        }
        self.suppression = RelockSuppression::Disarmed;
        self.is_unlocked = true;
        self.failed_attempts = 0;
        change
    }

    /// Config-change reaction. Only fires when `should_lock` flips.
    fn react(&mut self, was_locking: bool) -> Option<LifecycleChange> {
        let locking = self.should_lock();
        if locking == was_locking {
            return None;
        }

        self.failed_attempts = 0;
        if !locking {
            self.is_unlocked = true;
            return Some(LifecycleChange::Unsubscribe);
        }

        if self.suppression == RelockSuppression::Armed {
            self.suppression = RelockSuppression::Consumed;
        } else {
            self.is_unlocked = false;
        }
        Some(LifecycleChange::Subscribe)
    }

    pub const fn lock_now(&mut self) {
        if self.should_lock() {
            self.is_unlocked = false;
        }
    }

    pub const fn on_transition(&mut self, previous: AppState, next: AppState) -> bool {
        if self.should_lock() && relocks_on_foreground(previous, next) {
            self.is_unlocked = false;
            return true;
        }
        false
    }

    pub fn begin_unlock(&mut self) -> UnlockStart {
        if !self.should_lock() {
            self.is_unlocked = true;
            return UnlockStart::NotRequired;
        }
        if self.is_prompting {
            return UnlockStart::Busy;
        }
        self.is_prompting = true;
        UnlockStart::Prompt
    }

    pub fn begin_ensure_unlocked(&mut self) -> UnlockStart {
        if !self.should_lock() || self.is_unlocked {
            return UnlockStart::NotRequired;
        }
        self.begin_unlock()
    }

    /// Releases the prompting guard without touching the counters. Used when the
    /// unlock future is dropped before the prompt resolved.
    pub const fn abandon_prompt(&mut self) {
        self.is_prompting = false;
    }

    /// Releases the prompting guard and applies the prompt result.
    pub fn finish_unlock(&mut self, success: bool) -> UnlockResolution {
        self.is_prompting = false;

        if success {
            self.is_unlocked = true;
            self.failed_attempts = 0;
            return UnlockResolution::Unlocked;
        }
        if !self.should_lock() {
            return UnlockResolution::Ignored;
        }

        let outcome = next_failure_state_with_limit(self.failed_attempts, self.failure_limit);
        if outcome.force_relogin {
            self.failed_attempts = 0;
            UnlockResolution::ForceRelogin(outcome)
        } else {
            self.failed_attempts = outcome.failed_attempts;
            UnlockResolution::Failed(outcome)
        }
    }
}

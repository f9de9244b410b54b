//! Host collaborator interfaces.
//!
//! Each trait is implemented by the host app (Swift, Kotlin, or Rust for tests and
//! tooling). The core never talks to biometric hardware, storage or the session
//! module directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppLockResult;
use crate::policy::AppState;
use crate::state::LockSnapshot;

/// `error` value reported by a prompt when no biometric hardware or module exists.
pub const BIOMETRIC_NOT_AVAILABLE: &str = "not_available";

/// Persists the "biometrics enabled" preference.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads the boolean stored under `key`. A missing key reads as `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    async fn read_flag(&self, key: String) -> AppLockResult<bool>;

    /// Stores `value` under `key`. `true` persists the flag, `false` deletes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be written.
    async fn write_flag(&self, key: String, value: bool) -> AppLockResult<()>;
}

/// Outcome of one biometric challenge.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, uniffi::Record,
)]
pub struct BiometricOutcome {
    /// The user passed the challenge.
    pub success: bool,
    /// Platform reason for a failure, e.g. [`BIOMETRIC_NOT_AVAILABLE`].
    pub error: Option<String>,
}

impl BiometricOutcome {
    /// A passed challenge.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed challenge with an optional platform reason.
    #[must_use]
    pub const fn failure(error: Option<String>) -> Self {
        Self {
            success: false,
            error,
        }
    }

    /// The device has no usable biometric hardware or module.
    #[must_use]
    pub fn not_available() -> Self {
        Self::failure(Some(BIOMETRIC_NOT_AVAILABLE.to_string()))
    }
}

/// Device-native biometric challenge (fingerprint, face).
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait BiometricPrompt: Send + Sync {
    /// Shows one challenge with `reason` as the user-facing explanation.
    ///
    /// Hosts without biometric support should resolve to
    /// [`BiometricOutcome::not_available`] rather than fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform call itself throws.
    async fn authenticate(&self, reason: String) -> AppLockResult<BiometricOutcome>;
}

/// Receives lifecycle transitions. Implemented by the core.
#[uniffi::export]
pub trait LifecycleListener: Send + Sync {
    /// Called by the host whenever the app moves from `previous` to `next`.
    fn on_transition(&self, previous: AppState, next: AppState);
}

/// A live lifecycle subscription held by the core.
#[uniffi::export(with_foreign)]
pub trait LifecycleSubscription: Send + Sync {
    /// Stops delivering transitions to the listener. Must be idempotent.
    fn unsubscribe(&self);
}

/// Source of foreground/background transitions.
#[uniffi::export(with_foreign)]
pub trait LifecycleSignal: Send + Sync {
    /// Starts delivering transitions to `listener` until the returned subscription
    /// is released.
    fn subscribe(
        &self,
        listener: Arc<dyn LifecycleListener>,
    ) -> Arc<dyn LifecycleSubscription>;
}

/// The auth/session module that owns credentials and login.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait SessionAuthority: Send + Sync {
    /// Discards the session and routes the user to a full credential login.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout could not be performed. The core logs it
    /// and does not retry.
    async fn force_relogin(&self) -> AppLockResult<()>;
}

/// Notified whenever the exposed lock state changes.
#[uniffi::export(with_foreign)]
pub trait LockStateObserver: Send + Sync {
    /// Receives the state after a change. Called outside the controller's lock,
    /// so it may call back into the controller.
    fn on_lock_state_changed(&self, snapshot: LockSnapshot);
}

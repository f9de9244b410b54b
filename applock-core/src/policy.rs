//! Pure lock rules.
//!
//! Nothing in here touches state; the controller feeds its inputs through these
//! functions and acts on the answers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::FAILURE_LIMIT;

/// Foreground/background status of the host process.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    Display,
    Serialize,
    Deserialize,
    uniffi::Enum,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    /// In the foreground and receiving events.
    Active,
    /// Not visible to the user.
    Background,
    /// Visible but not receiving events (app switcher, incoming call).
    Inactive,
}

/// The three inputs that decide whether biometric locking applies.
///
/// Never stored; recomputed whenever one of the inputs changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Record)]
pub struct LockConfig {
    /// Running on a native (non-browser) build.
    pub is_native_platform: bool,
    /// An authenticated session exists.
    pub session_active: bool,
    /// The user opted in to biometric locking.
    pub is_enabled: bool,
}

impl LockConfig {
    /// Whether this configuration requires biometric locking.
    #[must_use]
    pub const fn should_lock(&self) -> bool {
        self.is_native_platform && self.session_active && self.is_enabled
    }
}

/// Result of recording one failed biometric attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Record,
)]
pub struct FailureOutcome {
    /// Consecutive failures including this one.
    pub failed_attempts: u32,
    /// Biometrics are no longer trusted for this session.
    pub force_relogin: bool,
}

/// Returns true iff the app is native, a session is active and the user enabled
/// biometric locking.
#[must_use]
#[uniffi::export]
#[allow(clippy::missing_const_for_fn)] // uniffi exports are plain fns
pub fn should_lock_biometric_session(
    is_native_platform: bool,
    session_active: bool,
    is_enabled: bool,
) -> bool {
    LockConfig {
        is_native_platform,
        session_active,
        is_enabled,
    }
    .should_lock()
}

/// Records one failed attempt on top of `previous_failed_attempts` using the
/// default [`FAILURE_LIMIT`].
#[must_use]
#[uniffi::export]
pub fn next_biometric_failure_state(previous_failed_attempts: u32) -> FailureOutcome {
    next_failure_state_with_limit(previous_failed_attempts, FAILURE_LIMIT)
}

/// Records one failed attempt against an explicit `failure_limit`.
#[must_use]
#[uniffi::export]
#[allow(clippy::missing_const_for_fn)] // uniffi exports are plain fns
pub fn next_failure_state_with_limit(
    previous_failed_attempts: u32,
    failure_limit: u32,
) -> FailureOutcome {
    let failed_attempts = previous_failed_attempts.saturating_add(1);
    FailureOutcome {
        failed_attempts,
        force_relogin: failed_attempts >= failure_limit,
    }
}

/// Returns true iff the app is coming back to `Active` from `Background` or
/// `Inactive`.
#[must_use]
#[uniffi::export]
#[allow(clippy::missing_const_for_fn)] // uniffi exports are plain fns
pub fn should_relock_on_foreground(previous: AppState, next: AppState) -> bool {
    relocks_on_foreground(previous, next)
}

pub(crate) const fn relocks_on_foreground(previous: AppState, next: AppState) -> bool {
    matches!(
        (previous, next),
        (AppState::Background | AppState::Inactive, AppState::Active)
    )
}

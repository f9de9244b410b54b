//! Error types for the app-lock core and its host collaborators.

use thiserror::Error;

/// Result type for app-lock operations and host collaborator callbacks.
pub type AppLockResult<T> = Result<T, AppLockError>;

/// Errors raised by the app-lock core and by the host collaborators it calls.
#[derive(Debug, Error, uniffi::Error)]
pub enum AppLockError {
    /// The settings store could not read or persist the enabled flag.
    #[error("settings error: {0}")]
    Settings(String),

    /// The biometric prompt threw instead of resolving to an outcome.
    #[error("prompt error: {0}")]
    Prompt(String),

    /// The session module failed to perform a forced re-login.
    #[error("relogin error: {0}")]
    Relogin(String),

    /// The supplied configuration is malformed or out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// No controller has been attached to the handle yet.
    #[error("app lock not initialized")]
    NotInitialized,

    /// A controller was already attached to the handle.
    #[error("app lock already initialized")]
    AlreadyInitialized,

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for AppLockError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

//! Late-bound access to the process-wide controller.

use std::sync::{Arc, OnceLock};

use crate::controller::AppLockController;
use crate::error::{AppLockError, AppLockResult};

/// A slot for the controller, for consumers created before the controller is.
///
/// Hosts build the handle early, pass it to screens and navigation, and attach the
/// controller once its collaborators exist. Lookups before that return
/// [`AppLockError::NotInitialized`] instead of panicking.
#[derive(Debug, Default, uniffi::Object)]
pub struct AppLockHandle {
    controller: OnceLock<Arc<AppLockController>>,
}

#[uniffi::export]
impl AppLockHandle {
    /// Creates an empty handle.
    #[uniffi::constructor]
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attaches the controller. Only the first call succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AppLockError::AlreadyInitialized`] if a controller is attached.
    pub fn attach(&self, controller: Arc<AppLockController>) -> AppLockResult<()> {
        self.controller
            .set(controller)
            .map_err(|_| AppLockError::AlreadyInitialized)
    }

    /// Returns the attached controller.
    ///
    /// # Errors
    ///
    /// Returns [`AppLockError::NotInitialized`] if nothing was attached yet.
    pub fn controller(&self) -> AppLockResult<Arc<AppLockController>> {
        self.controller
            .get()
            .cloned()
            .ok_or(AppLockError::NotInitialized)
    }

    /// Whether a controller is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.controller.get().is_some()
    }
}

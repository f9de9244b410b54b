//! `applock-core` decides when a mobile app must be re-authenticated with device
//! biometrics.
//!
//! The crate is split in two layers:
//!
//! - [`policy`] holds the pure rules: when locking applies at all, how consecutive
//!   failures escalate to a forced re-login, and which lifecycle transitions re-lock.
//! - [`AppLockController`] composes those rules with the host collaborators from
//!   [`platform`] (settings store, biometric prompt, lifecycle signal, session) into
//!   a guarded state machine the UI drives.
//!
//! ```rust,ignore
//! let controller = AppLockController::new(
//!     Platform::Ios,
//!     AppLockConfig::default(),
//!     settings,
//!     prompt,
//!     lifecycle,
//!     session,
//! );
//! controller.initialize().await;
//! controller.set_session_active(true);
//!
//! if !controller.ensure_unlocked("Unlock to view your classes".to_string()).await {
//!     // stay on the lock screen
//! }
//! ```
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The platform family the host app is running on.
///
/// Biometric gating only exists on native builds; browser-hosted builds never lock.
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
pub enum Platform {
    /// Native iOS build.
    Ios,
    /// Native Android build.
    Android,
    /// Browser-hosted build.
    Web,
}

impl Platform {
    /// Whether this platform has native biometric capabilities.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Ios | Self::Android)
    }
}

pub mod config;
pub use config::*;

pub mod error;
pub use error::*;

pub mod logger;

pub mod platform;
pub use platform::*;

pub mod policy;
pub use policy::*;

mod state;
pub use state::{LockPhase, LockSnapshot};

mod controller;
pub use controller::AppLockController;

mod handle;
pub use handle::AppLockHandle;

#[cfg(test)]
mod test_support;

uniffi::setup_scaffolding!("applock_core");

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_platform_is_native() {
        assert!(Platform::Ios.is_native());
        assert!(Platform::Android.is_native());
        assert!(!Platform::Web.is_native());
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!(Platform::from_str("android").unwrap(), Platform::Android);
        assert_eq!(Platform::Web.to_string(), "web");
        assert!(Platform::from_str("symbian").is_err());
    }
}

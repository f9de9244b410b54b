//! Controller configuration.

use serde::{Deserialize, Serialize};

use crate::error::{AppLockError, AppLockResult};

/// Consecutive failed biometric attempts tolerated before a forced re-login.
pub const FAILURE_LIMIT: u32 = 3;

/// Settings key under which the "biometrics enabled" preference is stored.
pub const BIOMETRICS_ENABLED_KEY: &str = "biometrics_enabled";

/// Tunables for an [`crate::AppLockController`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(default, deny_unknown_fields)]
pub struct AppLockConfig {
    /// Consecutive failures before the controller forces a full re-login.
    pub failure_limit: u32,
    /// Key used with the host settings store.
    pub settings_key: String,
}

impl Default for AppLockConfig {
    fn default() -> Self {
        Self {
            failure_limit: FAILURE_LIMIT,
            settings_key: BIOMETRICS_ENABLED_KEY.to_string(),
        }
    }
}

impl AppLockConfig {
    /// Parses a config from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AppLockError::InvalidConfig`] if the JSON is malformed, has unknown
    /// fields or fails [`AppLockConfig::validate`].
    pub fn from_json(json: &str) -> AppLockResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| AppLockError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`AppLockError::InvalidConfig`] if `failure_limit` is zero or
    /// `settings_key` is blank.
    pub fn validate(&self) -> AppLockResult<()> {
        if self.failure_limit == 0 {
            return Err(AppLockError::InvalidConfig(
                "failure_limit must be at least 1".to_string(),
            ));
        }
        if self.settings_key.trim().is_empty() {
            return Err(AppLockError::InvalidConfig(
                "settings_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses an [`AppLockConfig`] from JSON for foreign hosts.
///
/// # Errors
///
/// See [`AppLockConfig::from_json`].
#[uniffi::export]
#[allow(clippy::needless_pass_by_value)]
pub fn app_lock_config_from_json(json: String) -> AppLockResult<AppLockConfig> {
    AppLockConfig::from_json(&json)
}

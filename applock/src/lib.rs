//! Native library shipped to mobile hosts.
//!
//! Re-exports [`applock_core`]; bindings are generated in library mode from the
//! compiled `applock` artifact, which covers both crates.

pub use applock_core::*;

/// Version of the native library, for host-side diagnostics.
#[must_use]
#[uniffi::export]
pub fn applock_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

uniffi::setup_scaffolding!("applock");

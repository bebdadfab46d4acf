//! # quill-settings
//!
//! Layered configuration for the Quill chat client.
//!
//! Settings come from three layers, in priority order:
//! 1. **Compiled defaults** — [`QuillSettings::default()`]
//! 2. **User file** — `~/.quill/settings.json`, deep-merged over defaults
//! 3. **Environment variables** — `QUILL_*` overrides (highest priority)
//!
//! The global is reloadable: after the user edits the file, calling
//! [`reload_settings_from_path`] swaps the cached value so subsequent
//! [`get_settings`] calls see fresh data without restarting.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Cached global settings.
///
/// `RwLock<Option<Arc<_>>>` rather than `OnceLock` so a reload can swap the
/// value after first access. Reads take a shared lock and clone the `Arc`;
/// writes only happen on reload.
static SETTINGS: RwLock<Option<Arc<QuillSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// First call loads from `~/.quill/settings.json` with env overrides;
/// later calls return the cached value. Load failures fall back to compiled
/// defaults. The returned `Arc` is a stable snapshot even if another thread
/// reloads concurrently.
pub fn get_settings() -> Arc<QuillSettings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref settings) = *guard {
            return Arc::clone(settings);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    // Another thread may have initialized while we waited for the lock.
    if let Some(ref settings) = *guard {
        return Arc::clone(settings);
    }

    let settings = Arc::new(match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            QuillSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Replace the global settings with a specific value.
///
/// Used by tests and by callers that already resolved their configuration.
pub fn init_settings(settings: QuillSettings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

/// Reload the global settings from a specific file path.
///
/// Falls back to defaults if the file cannot be read or parsed.
pub fn reload_settings_from_path(path: &Path) {
    let fresh = Arc::new(match load_settings_from_path(path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, ?path, "failed to reload settings, falling back to defaults");
            QuillSettings::default()
        }
    });
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(fresh);
    tracing::info!(?path, "settings reloaded");
}

//! Settings loading: defaults → user file deep-merge → env overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::errors::Result;
use crate::types::{QuillSettings, RevealModeSetting};

/// Path of the user settings file (`~/.quill/settings.json`), when a home
/// directory can be determined.
#[must_use]
pub fn settings_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".quill").join("settings.json"))
}

/// Recursively merge `overlay` onto `base`.
///
/// Objects merge key-by-key; any other value in `overlay` replaces the
/// corresponding value in `base`. `base` keys absent from `overlay` survive.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Load settings from the default path with env overrides applied.
///
/// A missing file is not an error — defaults are used. A malformed file is.
pub fn load_settings() -> Result<QuillSettings> {
    match settings_path() {
        Some(path) if path.exists() => load_settings_from_path(&path),
        _ => {
            let mut settings = QuillSettings::default();
            apply_env_overrides(&mut settings);
            Ok(settings)
        }
    }
}

/// Load settings from a specific file, deep-merged over compiled defaults,
/// then apply `QUILL_*` env overrides on top.
pub fn load_settings_from_path(path: &Path) -> Result<QuillSettings> {
    let text = std::fs::read_to_string(path)?;
    let overlay: Value = serde_json::from_str(&text)?;

    let mut merged = serde_json::to_value(QuillSettings::default())?;
    deep_merge(&mut merged, overlay);

    let mut settings: QuillSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply `QUILL_*` environment variable overrides (highest priority).
pub fn apply_env_overrides(settings: &mut QuillSettings) {
    if let Ok(base_url) = std::env::var("QUILL_API_BASE_URL") {
        settings.api.base_url = base_url;
    }
    if let Ok(user_id) = std::env::var("QUILL_USER_ID") {
        settings.api.user_id = user_id;
    }
    if let Ok(mode) = std::env::var("QUILL_REVEAL_MODE") {
        match mode.as_str() {
            "paced" => settings.reveal.mode = RevealModeSetting::Paced,
            "immediate" => settings.reveal.mode = RevealModeSetting::Immediate,
            other => warn!(value = other, "ignoring unknown QUILL_REVEAL_MODE"),
        }
    }
    if let Ok(delay) = std::env::var("QUILL_REVEAL_UNIT_DELAY_MS") {
        match delay.parse() {
            Ok(ms) => settings.reveal.unit_delay_ms = ms,
            Err(_) => warn!(value = %delay, "ignoring non-numeric QUILL_REVEAL_UNIT_DELAY_MS"),
        }
    }
    if let Ok(visible) = std::env::var("QUILL_UPLOAD_MIN_VISIBLE_MS") {
        if let Ok(ms) = visible.parse() {
            settings.upload.min_visible_ms = ms;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

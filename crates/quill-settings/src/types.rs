//! Settings type definitions and compiled defaults.

use serde::{Deserialize, Serialize};

/// Top-level settings for the Quill client.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuillSettings {
    /// Backend endpoint configuration.
    pub api: ApiSettings,
    /// Typewriter reveal configuration.
    pub reveal: RevealSettings,
    /// Upload behavior configuration.
    pub upload: UploadSettings,
}

/// Where the chat backend lives and who we are to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiSettings {
    /// Base URL of the chat backend.
    pub base_url: String,
    /// Opaque user identifier sent with chat and upload requests.
    pub user_id: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            user_id: "local".to_owned(),
        }
    }
}

/// How streamed content is revealed to the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealModeSetting {
    /// One character at a time with a fixed delay between units.
    Paced,
    /// Each fragment applied whole, no pacing.
    Immediate,
}

/// Typewriter reveal configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RevealSettings {
    /// Reveal mode. Paced is the shipped default; immediate disables the
    /// animation entirely.
    pub mode: RevealModeSetting,
    /// Delay between reveal units in milliseconds (paced mode only).
    pub unit_delay_ms: u64,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            mode: RevealModeSetting::Paced,
            unit_delay_ms: 15,
        }
    }
}

/// Upload behavior configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadSettings {
    /// Minimum time an upload batch stays visibly "in progress", in
    /// milliseconds. Keeps tiny uploads from flashing the progress UI.
    pub min_visible_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self { min_visible_ms: 800 }
    }
}

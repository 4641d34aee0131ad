//! Broker settings stored as plain JSON next to the application's data.
//!
//! Nothing in here is secret: tier preferences, the prompt timeout and the
//! default prompt text.

use std::fs;
use std::path::Path;
use std::time::Duration;

use keygate_core::PromptOptions;
use serde::{Deserialize, Serialize};

use crate::backend::ProtectionTier;

// ── Top-level settings ─────────────────────────────────────────────

/// Broker behaviour that callers may tune.
///
/// Persisted to `{data_dir}/keygate.json`. All fields have defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BrokerSettings {
    /// Retry key creation once at the next tier when the first is unavailable.
    #[serde(default = "default_allow_tier_fallback")]
    pub allow_tier_fallback: bool,

    /// Tier to request first. `None` asks for the store's strongest tier.
    #[serde(default)]
    pub preferred_tier: Option<ProtectionTier>,

    /// Give up on an unanswered prompt after this many milliseconds.
    #[serde(default)]
    pub prompt_timeout_ms: Option<u64>,

    /// Prompt text used where a request leaves fields blank.
    #[serde(default)]
    pub default_prompt: PromptDefaults,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            allow_tier_fallback: default_allow_tier_fallback(),
            preferred_tier: None,
            prompt_timeout_ms: None,
            default_prompt: PromptDefaults::default(),
        }
    }
}

const fn default_allow_tier_fallback() -> bool {
    true
}

impl BrokerSettings {
    #[must_use]
    pub fn prompt_timeout(&self) -> Option<Duration> {
        self.prompt_timeout_ms.map(Duration::from_millis)
    }
}

// ── Prompt defaults ────────────────────────────────────────────────

/// Fallback prompt text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptDefaults {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_subtitle")]
    pub subtitle: String,

    #[serde(default = "default_negative_text")]
    pub negative_text: String,
}

impl Default for PromptDefaults {
    fn default() -> Self {
        Self {
            title: default_title(),
            subtitle: default_subtitle(),
            negative_text: default_negative_text(),
        }
    }
}

fn default_title() -> String {
    "Authentication required".into()
}
fn default_subtitle() -> String {
    "Verify your identity to use a protected key".into()
}
fn default_negative_text() -> String {
    "Cancel".into()
}

impl PromptDefaults {
    /// `prompt` with every blank text field filled from these defaults.
    #[must_use]
    pub fn apply(&self, prompt: &PromptOptions) -> PromptOptions {
        let fill = |value: &str, default: &str| {
            if value.trim().is_empty() {
                default.to_owned()
            } else {
                value.to_owned()
            }
        };
        PromptOptions {
            title: fill(&prompt.title, &self.title),
            subtitle: fill(&prompt.subtitle, &self.subtitle),
            negative_text: fill(&prompt.negative_text, &self.negative_text),
            ..prompt.clone()
        }
    }
}

// ── File I/O ───────────────────────────────────────────────────────

const SETTINGS_FILE: &str = "keygate.json";

impl BrokerSettings {
    /// Load settings from `{data_dir}/keygate.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or holds
    /// invalid JSON.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        fs::read_to_string(&path).map_or_else(
            |_| Self::default(),
            |contents| serde_json::from_str(&contents).unwrap_or_default(),
        )
    }

    /// Persist settings to `{data_dir}/keygate.json` through a temporary
    /// file and a rename.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the file
    /// system rejects the write/rename.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let tmp = data_dir.join(".keygate.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────

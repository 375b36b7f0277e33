use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing knobs shared by the page engine and the background relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
    /// Wait after opening a fresh tab before the first command is relayed.
    pub settle_delay_ms: u32,
    /// Budget for the send control to become actionable.
    pub activation_timeout_ms: u32,
    /// Poll period of the activation watcher.
    pub poll_interval_ms: u32,
    /// Wait after clicking send before reading the reply. Zero skips reply collection.
    pub reply_delay_ms: u32,
    /// Minimum pause between two injected chunks.
    pub chunk_pause_base_ms: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            settle_delay_ms: 3000,
            activation_timeout_ms: 5000,
            poll_interval_ms: 100,
            reply_delay_ms: 0,
            chunk_pause_base_ms: 10,
        }
    }
}

impl RelayConfig {
    /// Parses a JSON object; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Same as `from_json`, but `None` or a blank string yields the defaults.
    pub fn from_optional_json(json: Option<String>) -> Result<Self, ConfigError> {
        match json {
            Some(raw) if !raw.trim().is_empty() => Self::from_json(&raw),
            _ => Ok(Self::default()),
        }
    }

    /// Pause inserted after writing a chunk of `chunk_len` characters.
    pub fn chunk_pause_ms(&self, chunk_len: usize) -> u32 {
        // One extra millisecond per 100 characters, capped so huge chunks stay responsive.
        let proportional = (chunk_len / 100).min(250) as u32;
        self.chunk_pause_base_ms + proportional
    }
}

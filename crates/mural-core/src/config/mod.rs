//! Runtime configuration for the engine and its remote store.
//!
//! `RemoteConfig` holds the safe-to-ship Supabase endpoint and anon key.
//! `EngineConfig` holds paging and timing knobs; every field has a default so
//! partial JSON documents deserialize.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_MIGRATION_SCAN_LIMIT: usize = 500;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 350;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 15;

/// Remote store endpoint. Secret credentials must never be stored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
}

impl RemoteConfig {
    /// Build from optional raw values. Both absent is a valid offline-only
    /// configuration; exactly one present is an error.
    pub fn resolve(url: Option<String>, anon_key: Option<String>) -> Result<Self> {
        let url = normalize_text_option(url);
        let anon_key = normalize_text_option(anon_key);

        match (url, anon_key) {
            (None, None) => Ok(Self::default()),
            (Some(url), Some(anon_key)) => {
                if !is_http_url(&url) {
                    return Err(Error::InvalidInput(
                        "Supabase URL must include http:// or https://".to_string(),
                    ));
                }
                Ok(Self {
                    supabase_url: Some(url.trim_end_matches('/').to_string()),
                    supabase_anon_key: Some(anon_key),
                })
            }
            (Some(_), None) => Err(Error::InvalidInput(
                "Supabase URL is set but the anon key is missing".to_string(),
            )),
            (None, Some(_)) => Err(Error::InvalidInput(
                "Supabase anon key is set but the URL is missing".to_string(),
            )),
        }
    }

    /// Normalized `(url, anon_key)` when both are present and the URL is http(s).
    pub fn credentials(&self) -> Option<(String, String)> {
        let url = normalize_text_option(self.supabase_url.clone())?;
        let anon_key = normalize_text_option(self.supabase_anon_key.clone())?;
        is_http_url(&url).then_some((url, anon_key))
    }
}

/// Engine tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub page_size: usize,
    pub remote_timeout_ms: u64,
    /// Upper bound on remote rows scanned for dedup keys during migration.
    pub migration_scan_limit: usize,
    pub search_debounce_ms: u64,
    pub refresh_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            migration_scan_limit: DEFAULT_MIGRATION_SCAN_LIMIT,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl EngineConfig {
    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub const fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Page size, never zero.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.max(1)
    }
}

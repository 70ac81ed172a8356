//! Browser session configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch a run in a visible window.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Apply anti-automation-detection patches (default: true).
    #[serde(default = "default_stealth")]
    pub stealth: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Per-attempt page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Explicit Chrome/Chromium executable. Searched for when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            stealth: default_stealth(),
            proxy: None,
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            chrome_path: None,
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_stealth() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

pub fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

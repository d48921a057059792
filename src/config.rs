//! Configuration for the scraping engine.
//!
//! Settings come from defaults overridden by environment variables (loaded
//! from `.env` when present). Source credentials are never stored in config
//! files; they are read from `SCRAPE_USERNAME` / `SCRAPE_PASSWORD`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the SQLite database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub source: SourceSettings,

    #[serde(default)]
    pub fetch: FetchSettings,
}

/// Settings describing the supported listing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Host whose `/series/<slug>` pages the listing crawler accepts.
    #[serde(default = "default_source_host")]
    pub host: String,

    /// Login form path on the source host.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Path prefix of source-internal redirect links that should be
    /// resolved to their canonical chapter URL via a browser tab.
    #[serde(default = "default_redirect_prefix")]
    pub redirect_path_prefix: String,

    /// Login username. Absent credentials skip the login step.
    #[serde(default)]
    pub username: Option<String>,

    /// Login password.
    #[serde(default)]
    pub password: Option<String>,

    /// Delay between listing page loads, in milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

/// Settings for the chapter fetch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Per-request timeout for plain HTTP fetches, in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Page timeout for browser navigation, in seconds.
    #[serde(default = "default_browser_timeout")]
    pub browser_timeout_secs: u64,

    /// Run the browser headless. Disable for debugging.
    #[serde(default = "default_headless")]
    pub headless: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("novelkeep.db")
}

fn default_source_host() -> String {
    "www.novelupdates.com".to_string()
}

fn default_login_path() -> String {
    "/login/".to_string()
}

fn default_redirect_prefix() -> String {
    "/extnu/".to_string()
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_http_timeout() -> u64 {
    15
}

fn default_browser_timeout() -> u64 {
    30
}

fn default_headless() -> bool {
    true
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            host: default_source_host(),
            login_path: default_login_path(),
            redirect_path_prefix: default_redirect_prefix(),
            username: None,
            password: None,
            page_delay_ms: default_page_delay_ms(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            browser_timeout_secs: default_browser_timeout(),
            headless: default_headless(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source: SourceSettings::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl Settings {
    /// Build settings from defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(path) = std::env::var("NOVELKEEP_DB") {
            settings.db_path = PathBuf::from(path);
        }
        if let Ok(host) = std::env::var("NOVELKEEP_SOURCE_HOST") {
            settings.source.host = host;
        }
        settings.source.username = std::env::var("SCRAPE_USERNAME").ok();
        settings.source.password = std::env::var("SCRAPE_PASSWORD").ok();
        settings
    }

    /// Base URL of the configured source.
    pub fn source_base_url(&self) -> String {
        format!("https://{}", self.source.host)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.http_timeout_secs)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.browser_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.source.page_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.source.host, "www.novelupdates.com");
        assert_eq!(settings.source_base_url(), "https://www.novelupdates.com");
        assert!(settings.fetch.headless);
        assert_eq!(settings.browser_timeout(), Duration::from_secs(30));
    }
}

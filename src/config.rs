//! Centralized configuration management for civic-registry

use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Result, Context};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the local SQLite database file
    pub database_path: PathBuf,
    /// Base URL of the remote registry API; when set, records are served from it
    pub api_url: Option<String>,
    /// Bearer token forwarded to the remote API (optional)
    pub api_token: Option<String>,
    /// Paging and input timing configuration
    pub ui: UiConfig,
    /// HTTP client configuration
    pub http: HttpConfig,
}

/// Paging and input timing for list and form views
#[derive(Debug, Clone)]
pub struct UiConfig {
    /// Records requested per page
    pub page_size: u32,
    /// Quiet period after the last search keystroke before a search is issued (milliseconds)
    pub search_debounce_ms: u64,
    /// Window in which a second submit of the same form is ignored (milliseconds)
    pub submit_guard_ms: u64,
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            search_debounce_ms: 300,
            submit_guard_ms: 100,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: "civic-registry/0.1.0".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./civic-registry.db".into(),
            api_url: None,
            api_token: None,
            ui: UiConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let database_path = std::env::var("REGISTRY_DB_PATH")
            .unwrap_or_else(|_| "./civic-registry.db".to_string())
            .into();

        let api_url = std::env::var("REGISTRY_API_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        let api_token = std::env::var("REGISTRY_API_TOKEN").ok();

        let ui = UiConfig {
            page_size: parse_env_var("REGISTRY_PAGE_SIZE")?.unwrap_or(10),
            search_debounce_ms: parse_env_var("REGISTRY_SEARCH_DEBOUNCE_MS")?.unwrap_or(300),
            submit_guard_ms: parse_env_var("REGISTRY_SUBMIT_GUARD_MS")?.unwrap_or(100),
        };

        let http = HttpConfig {
            timeout_seconds: parse_env_var("REGISTRY_HTTP_TIMEOUT_SECONDS")?.unwrap_or(30),
            user_agent: std::env::var("REGISTRY_USER_AGENT")
                .unwrap_or_else(|_| "civic-registry/0.1.0".to_string()),
        };

        Ok(Config {
            database_path,
            api_url,
            api_token,
            ui,
            http,
        })
    }

    /// Get database path as string
    pub fn database_path_str(&self) -> &str {
        self.database_path.to_str().unwrap_or("./civic-registry.db")
    }

    /// Whether records come from the remote API rather than the local database
    pub fn uses_remote(&self) -> bool {
        self.api_url.is_some()
    }

    /// Get HTTP timeout as Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    /// Get search debounce as Duration
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.ui.search_debounce_ms)
    }

    /// Get submit re-entrancy window as Duration
    pub fn submit_guard(&self) -> Duration {
        Duration::from_millis(self.ui.submit_guard_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ui.page_size == 0 {
            return Err(anyhow::anyhow!("REGISTRY_PAGE_SIZE must be greater than zero"));
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!("REGISTRY_API_URL must be an http(s) URL: {}", url));
            }
        } else if let Some(parent) = self.database_path.parent() {
            // Check if parent directory of database exists
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(anyhow::anyhow!(
                    "Database parent directory does not exist: {}",
                    parent.display()
                ));
            }
        }

        Ok(())
    }
}

/// Helper function to parse environment variable as a specific type
fn parse_env_var<T>(var_name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display + Send + Sync + std::error::Error + 'static,
{
    match std::env::var(var_name) {
        Ok(val) => val.parse().map(Some).with_context(|| {
            format!("Failed to parse environment variable {} = '{}'", var_name, val)
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path_str(), "./civic-registry.db");
        assert_eq!(config.ui.page_size, 10);
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.submit_guard(), Duration::from_millis(100));
        assert_eq!(config.http.timeout_seconds, 30);
        assert!(!config.uses_remote());
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        config.validate().unwrap();

        let zero_page = Config {
            ui: UiConfig { page_size: 0, ..UiConfig::default() },
            ..Config::default()
        };
        assert!(zero_page.validate().is_err());

        let bad_url = Config {
            api_url: Some("ftp://registry".to_string()),
            ..Config::default()
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_parse_env_var_reports_bad_values() {
        std::env::set_var("REGISTRY_TEST_BAD_NUMBER", "ten");
        let parsed: Result<Option<u32>> = parse_env_var("REGISTRY_TEST_BAD_NUMBER");
        assert!(parsed.is_err());
        let missing: Option<u32> = parse_env_var("REGISTRY_TEST_MISSING_NUMBER").unwrap();
        assert!(missing.is_none());
    }
}

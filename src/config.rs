//! Centralized configuration management for creditdesk

use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Result, Context};

use crate::list_state::pagination::{LimitPolicy, DEFAULT_LIMIT, PAGE_SIZES};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the credit management API
    pub api_base_url: String,
    /// Bearer token sent with every API call (optional)
    pub api_token: Option<String>,
    /// Path to the SQLite file holding last-applied filters
    pub database_path: PathBuf,
    /// HTTP client configuration
    pub http: HttpConfig,
    /// List paging configuration
    pub list: ListConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

/// Paging defaults shared by every list screen
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Page size used when neither the address nor the screen supplies one
    pub default_limit: u32,
    /// Page sizes offered by the pagination control
    pub page_sizes: Vec<u32>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: "creditdesk/0.1.0".to_string(),
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            page_sizes: PAGE_SIZES.to_vec(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/".to_string(),
            api_token: None,
            database_path: "./creditdesk.db".into(),
            http: HttpConfig::default(),
            list: ListConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var("CREDITDESK_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000/".to_string());

        let api_token = std::env::var("CREDITDESK_API_TOKEN").ok();

        let database_path = std::env::var("CREDITDESK_DB_PATH")
            .unwrap_or_else(|_| "./creditdesk.db".to_string())
            .into();

        let http = HttpConfig {
            timeout_seconds: parse_env_var("CREDITDESK_HTTP_TIMEOUT_SECONDS")?.unwrap_or(30),
            user_agent: std::env::var("CREDITDESK_USER_AGENT")
                .unwrap_or_else(|_| "creditdesk/0.1.0".to_string()),
        };

        let list = ListConfig {
            default_limit: parse_env_var("CREDITDESK_DEFAULT_LIMIT")?.unwrap_or(DEFAULT_LIMIT),
            page_sizes: PAGE_SIZES.to_vec(),
        };

        Ok(Config {
            api_base_url,
            api_token,
            database_path,
            http,
            list,
        })
    }

    /// Get database path as string
    pub fn database_path_str(&self) -> &str {
        self.database_path.to_str().unwrap_or("./creditdesk.db")
    }

    /// Get HTTP timeout as Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    /// Page-size policy derived from the list configuration
    pub fn limit_policy(&self) -> LimitPolicy {
        LimitPolicy::new(self.list.page_sizes.clone(), self.list.default_limit)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;

        if !self.list.page_sizes.contains(&self.list.default_limit) {
            return Err(anyhow::anyhow!(
                "Default page size {} is not one of the supported sizes {:?}",
                self.list.default_limit,
                self.list.page_sizes
            ));
        }

        // Check if parent directory of database exists
        if let Some(parent) = self.database_path.parent() {
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

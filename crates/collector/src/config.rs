//! Reporting-API configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the reporting API and the loader window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// OAuth token
    #[serde(default)]
    pub token: String,
    /// Account identifier in API paths
    #[serde(default)]
    pub user_id: String,
    /// Site identifier in API paths
    #[serde(default)]
    pub host_id: String,
    /// Lookback window for date-gap discovery, in days
    #[serde(default = "default_days_back")]
    pub days_back: u32,
    /// Page size for URL listing
    #[serde(default = "default_page_limit")]
    pub page_limit: i64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.webmaster.yandex.net/v4".to_string()
}

fn default_days_back() -> u32 {
    20
}

fn default_page_limit() -> i64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            user_id: String::new(),
            host_id: String::new(),
            days_back: default_days_back(),
            page_limit: default_page_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

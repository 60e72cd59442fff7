use serde::{Deserialize, Serialize};

/// Configuration loaded from ~/.subtrack/config.json.
///
/// Every field is optional on disk; a missing file yields `Config::default()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_retrieve_path")]
    pub retrieve_path: String,
    #[serde(default = "default_exchange_path")]
    pub exchange_path: String,
    /// Freshness window for cached recurring items.
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,
    /// Directory holding one cache file per identity. Defaults to ~/.subtrack/cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Hosted bank-linking page. Defaults to `<apiBaseUrl>/link`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_page_url: Option<String>,
    #[serde(default = "default_link_timeout_secs")]
    pub link_timeout_secs: u64,
    #[serde(default)]
    pub stream_scope: StreamScope,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            retrieve_path: default_retrieve_path(),
            exchange_path: default_exchange_path(),
            cache_ttl_hours: default_cache_ttl_hours(),
            cache_dir: None,
            request_timeout_secs: default_request_timeout_secs(),
            link_page_url: None,
            link_timeout_secs: default_link_timeout_secs(),
            stream_scope: StreamScope::default(),
        }
    }
}

impl Config {
    pub fn retrieve_url(&self) -> String {
        join_url(&self.api_base_url, &self.retrieve_path)
    }

    pub fn exchange_url(&self) -> String {
        join_url(&self.api_base_url, &self.exchange_path)
    }

    pub fn link_page_url(&self) -> String {
        self.link_page_url
            .clone()
            .unwrap_or_else(|| join_url(&self.api_base_url, "/link"))
    }

    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_retrieve_path() -> String {
    "/api/recurring".to_string()
}

fn default_exchange_path() -> String {
    "/api/exchange".to_string()
}

fn default_cache_ttl_hours() -> u64 {
    12
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_link_timeout_secs() -> u64 {
    600
}

/// Which stream lists of an aggregator payload are turned into items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamScope {
    /// Inflow and outflow streams, in that order.
    #[default]
    All,
    /// Outflow streams only.
    #[serde(alias = "outflow_only")]
    Outflow,
}

/// A display-ready recurring charge, projected from one active aggregator stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringItem {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub average_amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_finance_category: Option<FinanceCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_next_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceCategory {
    pub detailed: String,
}

impl RecurringItem {
    /// Raw category code, e.g. `ENTERTAINMENT_TV_AND_MOVIES`.
    pub fn category_code(&self) -> Option<&str> {
        self.personal_finance_category
            .as_ref()
            .map(|c| c.detailed.as_str())
    }
}

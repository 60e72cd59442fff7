use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{FileStore, KeyValueStore, MemoryStore, RecurringCache};
use crate::controller::PageController;
use crate::gateway::HttpGateway;
use crate::link::BrowserLauncher;
use crate::types::Config;

pub const ENV_API_URL: &str = "SUBTRACK_API_URL";
pub const ENV_CACHE_TTL_HOURS: &str = "SUBTRACK_CACHE_TTL_HOURS";

pub type AppController = PageController<HttpGateway, Box<dyn KeyValueStore>>;

/// Everything one CLI invocation needs, built from config.
pub struct AppState {
    pub config: Config,
    pub controller: AppController,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, String> {
        let gateway =
            HttpGateway::new(&config).map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        let cache = RecurringCache::new(open_cache_store(&config), config.cache_ttl());
        let controller = PageController::new(gateway, cache, config.stream_scope);
        Ok(Self { config, controller })
    }

    pub fn link_launcher(&self) -> BrowserLauncher {
        BrowserLauncher::new(
            self.config.link_page_url(),
            Duration::from_secs(self.config.link_timeout_secs),
        )
    }
}

/// File-backed store when a cache directory is usable, else in-memory.
pub fn open_cache_store(config: &Config) -> Box<dyn KeyValueStore> {
    let dir = cache_dir(config);
    match fs::create_dir_all(&dir) {
        Ok(()) => Box::new(FileStore::new(dir)),
        Err(e) => {
            log::warn!(
                "Cache directory {} unavailable ({}); caching for this run only",
                dir.display(),
                e
            );
            Box::new(MemoryStore::new())
        }
    }
}

pub fn cache_dir(config: &Config) -> PathBuf {
    match config.cache_dir.as_deref() {
        Some(dir) if !dir.trim().is_empty() => crate::util::expand_home(dir),
        _ => crate::util::state_dir().join("cache"),
    }
}

/// Get the canonical config file path (~/.subtrack/config.json)
pub fn config_path() -> PathBuf {
    crate::util::state_dir().join("config.json")
}

/// Load configuration from ~/.subtrack/config.json, then apply env overrides.
pub fn load_config() -> Result<Config, String> {
    let config = load_config_from(&config_path())?;
    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// A missing file yields defaults; an unreadable or unparseable one is an error.
pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::debug!("No config at {}; using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| {
        format!(
            "Failed to parse config at {}: {}",
            path.display(),
            e
        )
    })
}

pub fn apply_env_overrides(
    mut config: Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Config {
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
        config.api_base_url = url.trim().to_string();
    }
    if let Some(raw) = lookup(ENV_CACHE_TTL_HOURS) {
        match raw.trim().parse::<u64>() {
            Ok(hours) => config.cache_ttl_hours = hours,
            Err(_) => log::warn!("Ignoring invalid {}={:?}", ENV_CACHE_TTL_HOURS, raw),
        }
    }
    config
}

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::AppConfig;

/// Environment variable carrying the upstream credential.
pub const API_KEY_ENV: &str = "SITE_ACTIVITY_API_KEY";
/// Environment variable overriding the listen address.
pub const BIND_ADDR_ENV: &str = "SITE_ACTIVITY_BIND_ADDR";

/// Default config location: ~/.site-activity/config.json
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".site-activity").join("config.json"))
}

/// Load configuration from the default location plus environment overrides.
///
/// A missing config file is not an error; defaults apply.
pub fn load_config() -> Result<AppConfig, String> {
    let mut config = load_config_from(&config_path()?)?;
    apply_overrides(
        &mut config,
        std::env::var(API_KEY_ENV).ok(),
        std::env::var(BIND_ADDR_ENV).ok(),
    );
    Ok(config)
}

/// Load configuration from an explicit path. Missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        log::info!(
            "No config file at {}; using defaults",
            path.display()
        );
        return Ok(AppConfig::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Environment values win over the file. Blank values are ignored.
pub fn apply_overrides(config: &mut AppConfig, api_key: Option<String>, bind_addr: Option<String>) {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.upstream.api_key = Some(key);
    }
    if let Some(addr) = bind_addr.filter(|a| !a.trim().is_empty()) {
        config.server.bind_addr = addr;
    }
}

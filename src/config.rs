use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Runtime tunables. Defaults match the publisher contract; a JSON config
/// file can override individual fields.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Cookie export for ComicDays episodes.
    #[serde(default = "default_comic_days_cookie_file")]
    pub comic_days_cookie_file: String,

    /// Cookie export for the PocketMagazine viewer API.
    #[serde(default = "default_pocket_cookie_file")]
    pub pocket_cookie_file: String,

    /// GET attempts per fetch before giving up.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Fixed sleep between attempts, seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Pause between page downloads, milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Re-encode quality for JPEG output pages.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Settling pause before a search runs, milliseconds.
    #[serde(default = "default_search_settle_ms")]
    pub search_settle_ms: u64,
}

fn default_comic_days_cookie_file() -> String {
    "./cookies/cookie.cd.json".to_string()
}

fn default_pocket_cookie_file() -> String {
    "./cookies/cookie.ps.json".to_string()
}

fn default_retry_attempts() -> usize {
    5
}

fn default_retry_delay_secs() -> u64 {
    10
}

fn default_page_delay_ms() -> u64 {
    500
}

fn default_jpeg_quality() -> u8 {
    95
}

fn default_search_settle_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config must deserialize")
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file is absent or malformed.
    pub fn load(path: &Path) -> Config {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Invalid config {}: {}; using defaults", path.display(), e);
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }
}

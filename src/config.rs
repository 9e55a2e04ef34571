use crate::relay::RelayOptions;
use anyhow::Result;
use std::{env, path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,

    // Upstream configuration
    pub base_url: String,
    pub api_key: Option<String>,

    // Retry policy
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub escalate_timeout: bool,

    // Image result cache
    pub image_cache: bool,
    pub image_cache_ttl: Duration,
    pub image_cache_capacity: usize,

    // Logging
    pub debug: bool,
    pub verbose: bool,
}

impl Config {
    fn load_dotenv(custom_path: Option<PathBuf>) -> Option<PathBuf> {
        if let Some(path) = custom_path {
            if path.exists() && dotenvy::from_path(&path).is_ok() {
                return Some(path);
            }
            eprintln!("WARNING: Custom config file not found: {}", path.display());
        }

        if let Ok(path) = dotenvy::dotenv() {
            return Some(path);
        }

        if let Ok(home) = env::var("HOME") {
            let home_config = PathBuf::from(home).join(".story-relay.env");
            if home_config.exists() && dotenvy::from_path(&home_config).is_ok() {
                return Some(home_config);
            }
        }

        let etc_config = PathBuf::from("/etc/story-relay/.env");
        if etc_config.exists() && dotenvy::from_path(&etc_config).is_ok() {
            return Some(etc_config);
        }

        None
    }

    pub fn from_env() -> Result<Self> {
        Self::from_env_with_path(None)
    }

    pub fn from_env_with_path(custom_path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = Self::load_dotenv(custom_path) {
            eprintln!("Loaded config from: {}", path.display());
        }

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("UPSTREAM_BASE_URL")
            .or_else(|_| env::var("API_BASE_URL"))
            .ok()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "UPSTREAM_BASE_URL is required.\n\
                    Set it to your OpenAI-compatible endpoint, including any\n\
                    version prefix. Examples:\n\
                      - https://api.litviva.com/v1\n\
                      - https://api.openai.com/v1\n\
                      - http://localhost:11434/v1"
                )
            })?;

        let api_key = env::var("UPSTREAM_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());

        let timeout = Duration::from_millis(env_parse("TIMEOUT_MS", 15_000));
        let max_retries = env_parse("MAX_RETRIES", 3u32).max(1);
        let base_backoff = Duration::from_millis(env_parse("BACKOFF_MS", 1_000));
        let escalate_timeout = env_flag("ESCALATE_TIMEOUT", false);

        let image_cache = env_flag("IMAGE_CACHE", true);
        let image_cache_ttl = Duration::from_secs(env_parse("IMAGE_CACHE_TTL_SECS", 86_400));
        let image_cache_capacity = env_parse("IMAGE_CACHE_CAPACITY", 256usize);

        let debug = env_flag("DEBUG", false);
        let verbose = env_flag("VERBOSE", false);

        Ok(Config {
            port,
            base_url,
            api_key,
            timeout,
            max_retries,
            base_backoff,
            escalate_timeout,
            image_cache,
            image_cache_ttl,
            image_cache_capacity,
            debug,
            verbose,
        })
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout: self.timeout,
            max_retries: self.max_retries,
            base_backoff: self.base_backoff,
            escalate_timeout: self.escalate_timeout,
            verbose: self.verbose,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name).map(|v| parse_flag(&v)).unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "novelfetch.yaml";
const ENV_PREFIX: &str = "NOVELFETCH_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Raw session cookie: `name=value; name2=value2`.
    pub cookie: String,
    pub download_path: PathBuf,
    /// Pause before each series member fetch.
    pub request_delay_ms: u64,
    /// Total attempts per request, including the first.
    pub max_retries: u32,
    /// Initial retry backoff; doubles after every failed attempt.
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub show_progress: bool,
    pub log_level: String,
    pub base_url: String,
    pub user_agent: String,
    pub proxy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookie: String::new(),
            download_path: PathBuf::from("novels"),
            request_delay_ms: 1000,
            max_retries: 3,
            retry_delay_ms: 2000,
            timeout_secs: 30,
            show_progress: true,
            log_level: "info".to_owned(),
            base_url: "https://www.pixiv.net".to_owned(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_owned(),
            proxy: None,
        }
    }
}

impl Config {
    /// Loads `path`, or `novelfetch.yaml` from the working directory when it
    /// exists, then applies `NOVELFETCH_*` environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config
            .apply_env(|key| std::env::var(key).ok())
            .context("apply environment overrides")?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(raw).context("deserialize config yaml")?;
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("COOKIE") {
            self.cookie = value;
        }
        if let Some(value) = var("DOWNLOAD_PATH") {
            self.download_path = PathBuf::from(value);
        }
        if let Some(value) = var("REQUEST_DELAY_MS") {
            self.request_delay_ms = value
                .trim()
                .parse()
                .with_context(|| format!("parse {ENV_PREFIX}REQUEST_DELAY_MS: {value}"))?;
        }
        if let Some(value) = var("MAX_RETRIES") {
            self.max_retries = value
                .trim()
                .parse()
                .with_context(|| format!("parse {ENV_PREFIX}MAX_RETRIES: {value}"))?;
        }
        if let Some(value) = var("RETRY_DELAY_MS") {
            self.retry_delay_ms = value
                .trim()
                .parse()
                .with_context(|| format!("parse {ENV_PREFIX}RETRY_DELAY_MS: {value}"))?;
        }
        if let Some(value) = var("SHOW_PROGRESS") {
            self.show_progress = parse_bool(&value)
                .with_context(|| format!("parse {ENV_PREFIX}SHOW_PROGRESS: {value}"))?;
        }
        if let Some(value) = var("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = var("BASE_URL") {
            self.base_url = value;
        }
        if let Some(value) = var("PROXY") {
            self.proxy = if value.trim().is_empty() {
                None
            } else {
                Some(value)
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_retries == 0 {
            anyhow::bail!("max_retries must be at least 1");
        }
        let base = url::Url::parse(&self.base_url)
            .with_context(|| format!("parse base_url: {}", self.base_url))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!("base_url must be http/https: {}", self.base_url);
        }
        crate::transport::parse_cookie(&self.cookie).context("parse cookie")?;
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got `{other}`"),
    }
}

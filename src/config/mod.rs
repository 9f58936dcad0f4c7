use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Hard ceiling on videos per bulk request
pub const MAX_VIDEOS_CEILING: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// YouTube endpoints and Data API credential
    pub youtube: YoutubeConfig,

    /// Paid secondary transcript provider
    pub secondary: SecondaryProviderConfig,

    /// Transcript retrieval settings
    pub transcripts: TranscriptConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    /// YouTube Data API key, required for channel and playlist lookups
    pub api_key: Option<String>,

    /// Base URL of the Data API
    pub data_api_base_url: String,

    /// Base URL serving watch pages and timed-text captions
    pub watch_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryProviderConfig {
    /// Provider key; the secondary strategy is skipped when absent
    pub api_key: Option<String>,

    /// Provider host, also sent as `X-RapidAPI-Host`
    pub host: String,

    /// Endpoint root; `https://{host}` when unset
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Language used when a request does not name one
    pub default_language: String,

    /// Videos fetched per bulk request when `max` is not given
    pub default_max_videos: usize,

    /// Upper bound applied to any requested `max`
    pub max_videos_ceiling: usize,

    /// Try raw timed-text caption files before the secondary provider
    pub timedtext_fallback: bool,

    /// Transcript fetches in flight during a bulk request
    pub max_concurrent_fetches: usize,

    /// Per-request timeout for outbound calls; transport default when unset
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            youtube: YoutubeConfig {
                api_key: None,
                data_api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
                watch_base_url: "https://www.youtube.com".to_string(),
            },
            secondary: SecondaryProviderConfig {
                api_key: None,
                host: "youtube-transcript3.p.rapidapi.com".to_string(),
                base_url: None,
            },
            transcripts: TranscriptConfig {
                default_language: "en".to_string(),
                default_max_videos: 50,
                max_videos_ceiling: MAX_VIDEOS_CEILING,
                timedtext_fallback: false,
                max_concurrent_fetches: 1,
                request_timeout_secs: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1:3000".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_file().await?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Configuration as stored on disk, before environment overrides
    async fn load_file() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content).context("Failed to parse config file")
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("tubescribe").join("config.yaml"))
    }

    /// Override fields from the process environment.
    ///
    /// Blank values are ignored so an exported-but-empty key does not enable a strategy.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = get("YOUTUBE_API_KEY") {
            self.youtube.api_key = Some(key);
        }
        if let Some(key) = get("RAPIDAPI_KEY") {
            self.secondary.api_key = Some(key);
        }
        if let Some(host) = get("RAPIDAPI_HOST") {
            self.secondary.host = host;
        }
        if let Some(bind) = get("TUBESCRIBE_BIND") {
            self.server.bind_address = bind;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let ceiling = self.transcripts.max_videos_ceiling;
        if ceiling == 0 || ceiling > MAX_VIDEOS_CEILING {
            anyhow::bail!(
                "max_videos_ceiling must be between 1 and {}, got {}",
                MAX_VIDEOS_CEILING,
                ceiling
            );
        }

        if self.transcripts.max_concurrent_fetches == 0 {
            anyhow::bail!("max_concurrent_fetches must be at least 1");
        }

        if self.transcripts.default_language.trim().is_empty() {
            anyhow::bail!("default_language must not be empty");
        }

        if self.secondary.host.trim().is_empty() {
            anyhow::bail!("Secondary provider host must not be empty");
        }

        let bases = [
            Some(&self.youtube.data_api_base_url),
            Some(&self.youtube.watch_base_url),
            self.secondary.base_url.as_ref(),
        ];
        for base in bases.into_iter().flatten() {
            let parsed = Url::parse(base)
                .with_context(|| format!("Invalid base URL: {}", base))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("Base URL must use HTTP or HTTPS protocol: {}", base);
            }
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  YouTube API Key: {}", mask(self.youtube.api_key.as_deref()));
        println!("  Data API: {}", self.youtube.data_api_base_url);
        println!("  Watch Base: {}", self.youtube.watch_base_url);
        println!("  Secondary Key: {}", mask(self.secondary.api_key.as_deref()));
        println!("  Secondary Host: {}", self.secondary.host);
        if let Some(base_url) = &self.secondary.base_url {
            println!("  Secondary Endpoint: {}", base_url);
        }
        println!("  Default Language: {}", self.transcripts.default_language);
        println!("  Default Max Videos: {}", self.transcripts.default_max_videos);
        println!("  Max Videos Ceiling: {}", self.transcripts.max_videos_ceiling);
        println!("  Timed-text Fallback: {}", self.transcripts.timedtext_fallback);
        println!("  Concurrent Fetches: {}", self.transcripts.max_concurrent_fetches);
        if let Some(timeout) = self.transcripts.request_timeout_secs {
            println!("  Request Timeout: {}s", timeout);
        }
        println!("  Bind Address: {}", self.server.bind_address);
    }

    /// Write the effective configuration back to disk so it can be edited by hand.
    /// Fields the environment can override keep the values stored in the file.
    pub async fn write_template(&self) -> Result<PathBuf> {
        let on_disk = Self::load_file().await?;
        self.with_stored_overrides(&on_disk).save().await?;
        Self::config_path()
    }

    /// Copy of `self` with every env-overridable field taken from `stored`
    fn with_stored_overrides(&self, stored: &Config) -> Config {
        let mut persisted = self.clone();
        persisted.youtube.api_key = stored.youtube.api_key.clone();
        persisted.secondary.api_key = stored.secondary.api_key.clone();
        persisted.secondary.host = stored.secondary.host.clone();
        persisted.server.bind_address = stored.server.bind_address.clone();
        persisted
    }
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        None => "(not set)".to_string(),
        Some(s) if s.chars().count() <= 4 => "****".to_string(),
        Some(s) => format!("{}****", s.chars().take(4).collect::<String>()),
    }
}

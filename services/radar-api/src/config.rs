//! Service configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional YAML file, then command-line flags and their environment
//! variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://mrms.ncep.noaa.gov/2D/ReflectivityAtLowestAltitude/";
pub const DEFAULT_SUFFIX: &str = ".grib2.gz";

/// Command-line arguments. Every setting is optional so the YAML file and
/// defaults can fill the gaps.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "radar-api")]
#[command(about = "Serves the latest MRMS reflectivity mosaic as a PNG")]
pub struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "RADAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8080
    #[arg(short, long, env = "RADAR_LISTEN")]
    pub listen: Option<String>,

    /// Port to listen on (all interfaces); ignored when --listen is set
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Upstream directory index
    #[arg(long, env = "RADAR_BASE_URL")]
    pub base_url: Option<String>,

    /// File name suffix of candidate files
    #[arg(long, env = "RADAR_SUFFIX")]
    pub suffix: Option<String>,

    /// How the newest file is picked from the listing
    #[arg(long, env = "RADAR_SELECTOR", value_enum)]
    pub selector: Option<SelectorKind>,

    /// What to serve once the cached frame is older than --max-age-secs
    #[arg(long, env = "RADAR_STALENESS_POLICY", value_enum)]
    pub staleness_policy: Option<StalenessPolicy>,

    /// Age in seconds after which the cached frame counts as stale
    #[arg(long, env = "RADAR_MAX_AGE_SECS")]
    pub max_age_secs: Option<u64>,

    /// Directory for the persisted latest file, image and metadata
    #[arg(long, env = "RADAR_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Background refresh interval in seconds (0 disables)
    #[arg(long, env = "RADAR_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: Option<u64>,

    /// Style JSON with a color ramp to use instead of the built-in one
    #[arg(long, env = "RADAR_STYLE_FILE")]
    pub style_file: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// How a stale cached frame is handled on `GET /api/radar/latest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Answer with the stale frame and refresh in the background.
    #[default]
    ServeStale,
    /// Wait for a refresh; its failure is returned to the caller.
    RefreshThenServe,
}

impl StalenessPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StalenessPolicy::ServeStale => "serve_stale",
            StalenessPolicy::RefreshThenServe => "refresh_then_serve",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Greatest file name.
    #[default]
    Lexicographic,
    /// Latest `YYYYMMDD-HHMMSS` token in the file name.
    Timestamp,
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub source: SourceConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub schedule: ScheduleConfig,
    pub render: RenderConfig,
    pub listen: String,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            schedule: ScheduleConfig::default(),
            render: RenderConfig::default(),
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream file source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub suffix: String,
    pub selector: SelectorKind,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            selector: SelectorKind::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            user_agent: concat!("radar-api/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub staleness_policy: StalenessPolicy,
    pub max_age_secs: u64,
    pub cache_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness_policy: StalenessPolicy::default(),
            max_age_secs: 120,
            cache_dir: None,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Exponential backoff for listing and download failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between background refreshes; 0 disables the scheduler.
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub style_file: Option<PathBuf>,
    /// Style to take from `style_file`
    pub style_name: String,
    /// zlib level for the PNG image data
    pub compression_level: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            style_file: None,
            style_name: "reflectivity".to_string(),
            compression_level: 6,
        }
    }
}

impl RadarConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: RadarConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded radar config");
        Ok(config)
    }

    /// Build the effective configuration for `args`.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Overlay command-line values.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(listen) = &args.listen {
            self.listen = listen.clone();
        } else if let Some(port) = args.port {
            self.listen = format!("0.0.0.0:{}", port);
        }
        if let Some(base_url) = &args.base_url {
            self.source.base_url = base_url.clone();
        }
        if let Some(suffix) = &args.suffix {
            self.source.suffix = suffix.clone();
        }
        if let Some(selector) = args.selector {
            self.source.selector = selector;
        }
        if let Some(policy) = args.staleness_policy {
            self.cache.staleness_policy = policy;
        }
        if let Some(max_age) = args.max_age_secs {
            self.cache.max_age_secs = max_age;
        }
        if let Some(dir) = &args.cache_dir {
            self.cache.cache_dir = Some(dir.clone());
        }
        if let Some(interval) = args.poll_interval_secs {
            self.schedule.poll_interval_secs = interval;
        }
        if let Some(style) = &args.style_file {
            self.render.style_file = Some(style.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.base_url.trim().is_empty() {
            bail!("source.base_url must not be empty");
        }
        if !self.source.base_url.starts_with("http://")
            && !self.source.base_url.starts_with("https://")
        {
            bail!("source.base_url must be an http(s) URL: {}", self.source.base_url);
        }
        if self.source.suffix.is_empty() {
            bail!("source.suffix must not be empty");
        }
        if self.http.request_timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            bail!("http timeouts must be greater than zero");
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            bail!(
                "retry.initial_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.initial_delay_ms,
                self.retry.max_delay_ms
            );
        }
        if self.render.compression_level > 9 {
            bail!("render.compression_level must be 0-9");
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.listen))
    }
}

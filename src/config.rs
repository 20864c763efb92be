//! Configuration: built-in variant defaults, then an optional TOML file,
//! then command-line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::Deserialize;
use thiserror::Error;

use crate::polling::PollSettings;
use crate::views::{LabelStyle, TileStyle};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8080/entry-point";
pub const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8090);

/// The two historical builds of the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Display-name labels, slow polling
    #[default]
    Analyzer,
    /// Distance-range labels, fast polling
    Classic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiConfig {
    pub bind: SocketAddr,
    pub backend_url: String,
    pub initial_poll_delay: Duration,
    pub poll_delay: Duration,
    pub poll_retries: u32,
    pub result_limit: u32,
    pub before_window: usize,
    pub labels: LabelStyle,
    pub tiles: TileStyle,
    pub request_timeout: Duration,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self::for_variant(Variant::default())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("backend url must start with http:// or https://, got {0}")]
    BackendUrl(String),
}

/// Settings a TOML file may carry; all optional
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub variant: Option<Variant>,
    pub bind: Option<SocketAddr>,
    pub backend_url: Option<String>,
    pub initial_poll_delay_ms: Option<u64>,
    pub poll_delay_ms: Option<u64>,
    pub poll_retries: Option<u32>,
    pub result_limit: Option<u32>,
    pub before_window: Option<usize>,
    pub labels: Option<LabelStyle>,
    pub tiles: Option<TileStyle>,
    pub request_timeout_secs: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Command-line overrides
#[derive(Debug, Default, Clone, Args)]
pub struct Overrides {
    /// Front-end variant preset
    #[arg(long, value_enum, env = "FERRET_UI_VARIANT")]
    pub variant: Option<Variant>,

    /// Address to serve the UI on
    #[arg(long, env = "FERRET_UI_BIND")]
    pub bind: Option<SocketAddr>,

    /// Base URL of the search backend's entry point
    #[arg(long, env = "FERRET_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Delay between polls while recording, in milliseconds
    #[arg(long)]
    pub poll_delay_ms: Option<u64>,

    /// Failed polls tolerated before recording gives up
    #[arg(long)]
    pub poll_retries: Option<u32>,

    /// Maximum number of results requested per query
    #[arg(long)]
    pub result_limit: Option<u32>,
}

impl UiConfig {
    pub fn for_variant(variant: Variant) -> Self {
        let (poll_delay, labels, tiles, before_window) = match variant {
            Variant::Analyzer => (
                Duration::from_millis(2500),
                LabelStyle::DisplayName,
                TileStyle::Thumbnail,
                50,
            ),
            Variant::Classic => (
                Duration::from_millis(500),
                LabelStyle::DistanceRange,
                TileStyle::Mini,
                0,
            ),
        };
        Self {
            bind: SocketAddr::from(DEFAULT_BIND),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            initial_poll_delay: Duration::from_millis(500),
            poll_delay,
            poll_retries: 2,
            result_limit: 20,
            before_window,
            labels,
            tiles,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Layer `file` and then `overrides` over the variant defaults
    pub fn resolve(file: ConfigFile, overrides: &Overrides) -> Result<Self, ConfigError> {
        let variant = overrides.variant.or(file.variant).unwrap_or_default();
        let mut config = Self::for_variant(variant);

        if let Some(bind) = overrides.bind.or(file.bind) {
            config.bind = bind;
        }
        if let Some(url) = overrides.backend_url.clone().or(file.backend_url) {
            config.backend_url = url;
        }
        if let Some(ms) = file.initial_poll_delay_ms {
            config.initial_poll_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.poll_delay_ms.or(file.poll_delay_ms) {
            config.poll_delay = Duration::from_millis(ms);
        }
        if let Some(retries) = overrides.poll_retries.or(file.poll_retries) {
            config.poll_retries = retries;
        }
        if let Some(limit) = overrides.result_limit.or(file.result_limit) {
            config.result_limit = limit;
        }
        if let Some(window) = file.before_window {
            config.before_window = window;
        }
        if let Some(labels) = file.labels {
            config.labels = labels;
        }
        if let Some(tiles) = file.tiles {
            config.tiles = tiles;
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }

        if !(config.backend_url.starts_with("http://") || config.backend_url.starts_with("https://")) {
            return Err(ConfigError::BackendUrl(config.backend_url));
        }
        config.backend_url = config.backend_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            initial_delay: self.initial_poll_delay,
            delay: self.poll_delay,
            retries: self.poll_retries,
        }
    }
}

//! Client configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load configuration from `path`, writing the defaults there if the file
    /// does not exist yet.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

/// Connection and tick settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Explicit server (`host:port` or `ws://` URL). Skips the directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Origin header sent with the WebSocket upgrade.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// How long a non-blocking tick waits for a message.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    /// Deadline for blocking ticks (unset = wait forever).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
    /// Treat unknown message types as fatal instead of skipping them.
    #[serde(default)]
    pub strict_unknown_messages: bool,
}

impl SessionConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server: None,
            origin: default_origin(),
            poll_timeout_ms: default_poll_timeout(),
            read_timeout_ms: None,
            strict_unknown_messages: false,
        }
    }
}

fn default_origin() -> String {
    "http://agar.io".to_string()
}
fn default_poll_timeout() -> u64 {
    1
}

/// Region directory endpoints and retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    /// Returns the caller's location as plain text.
    #[serde(default = "default_location_url")]
    pub location_url: String,
    /// Returns per-region player counts as JSON.
    #[serde(default = "default_info_url")]
    pub info_url: String,
    /// Hands out a game server for a region (form POST).
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Total attempts when the directory returns a degenerate address.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts; up to half of it again is added as jitter.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Addresses the directory hands out that never host a game.
    #[serde(default = "default_degenerate_addresses")]
    pub degenerate_addresses: Vec<String>,
    /// Location (as reported by `location_url`) -> recommended region.
    #[serde(default)]
    pub recommended: BTreeMap<String, String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            location_url: default_location_url(),
            info_url: default_info_url(),
            server_url: default_server_url(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            degenerate_addresses: default_degenerate_addresses(),
            recommended: BTreeMap::new(),
        }
    }
}

fn default_location_url() -> String {
    "http://gc.agar.io/".to_string()
}
fn default_info_url() -> String {
    "http://m.agar.io/info".to_string()
}
fn default_server_url() -> String {
    "http://m.agar.io/".to_string()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_retry_delay() -> u64 {
    250
}
fn default_degenerate_addresses() -> Vec<String> {
    vec!["45.79.222.79:443".to_string()]
}

/// Player settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Nickname to spawn with; unset = spectate only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Region to join; unset = the directory's recommendation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default = "default_game_mode")]
    pub game_mode: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            nickname: None,
            region: None,
            game_mode: default_game_mode(),
        }
    }
}

fn default_game_mode() -> String {
    "ffa".to_string()
}

/// Settings for the `cellwatch` binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Log a world summary every this many processed messages.
    #[serde(default = "default_summary_interval")]
    pub summary_interval_ticks: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            summary_interval_ticks: default_summary_interval(),
        }
    }
}

fn default_summary_interval() -> u64 {
    250
}

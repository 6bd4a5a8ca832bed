//! Region directory: where am I, which regions exist, which server to join.

use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::DirectoryError;
use crate::config::DirectoryConfig;

/// Region name the directory uses for servers it cannot place.
const UNKNOWN_REGION: &str = "Unknown";

/// Game mode of regions listed without a `:mode` suffix.
pub const DEFAULT_GAME_MODE: &str = "ffa";

/// Player/realm/server counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Counts {
    #[serde(rename = "numPlayers", default)]
    pub players: u32,
    #[serde(rename = "numRealms", default)]
    pub realms: u32,
    #[serde(rename = "numServers", default)]
    pub servers: u32,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    totals: Counts,
    #[serde(default)]
    regions: HashMap<String, Counts>,
}

/// One region/game-mode combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub region: String,
    pub game_mode: String,
    pub counts: Counts,
}

impl Region {
    /// Form key used when asking for a server: `Region` or `Region:mode`.
    pub fn key(&self) -> String {
        if self.game_mode == DEFAULT_GAME_MODE {
            self.region.clone()
        } else {
            format!("{}:{}", self.region, self.game_mode)
        }
    }
}

/// Directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    pub totals: Counts,
    pub regions: Vec<Region>,
}

impl Info {
    pub fn find(&self, region: &str, game_mode: &str) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.region == region && r.game_mode == game_mode)
    }
}

/// Drop the `?` placeholders the location endpoint pads its answer with.
fn clean_location(raw: &str) -> String {
    raw.split(' ')
        .filter(|part| *part != "?")
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn parse_info(response: InfoResponse) -> Info {
    let mut regions: Vec<Region> = response
        .regions
        .into_iter()
        .filter(|(id, _)| id != UNKNOWN_REGION)
        .map(|(id, counts)| {
            let (region, game_mode) = match id.split_once(':') {
                Some((region, mode)) => (region.to_string(), mode.to_string()),
                None => (id, DEFAULT_GAME_MODE.to_string()),
            };
            Region {
                region,
                game_mode,
                counts,
            }
        })
        .collect();
    regions.sort_by(|a, b| (&a.region, &a.game_mode).cmp(&(&b.region, &b.game_mode)));

    Info {
        totals: response.totals,
        regions,
    }
}

/// Accept `host:port` with a numeric port.
fn validate_address(body: &str) -> Result<String, DirectoryError> {
    let address = body.trim();
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(address.to_string())
        }
        _ => Err(DirectoryError::InvalidAddress(address.to_string())),
    }
}

/// HTTP client for the region directory.
#[derive(Debug, Clone)]
pub struct Directory {
    http: reqwest::Client,
    config: DirectoryConfig,
}

impl Directory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// The caller's location and the region recommended for it, if known.
    pub async fn current_location(&self) -> Result<(String, Option<String>), DirectoryError> {
        let body = self
            .http
            .get(&self.config.location_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let location = clean_location(&body);
        let recommended = self.config.recommended.get(&location).cloned();
        debug!("Location {:?}, recommended region {:?}", location, recommended);
        Ok((location, recommended))
    }

    /// List regions with their player counts.
    pub async fn info(&self) -> Result<Info, DirectoryError> {
        let response: InfoResponse = self
            .http
            .get(&self.config.info_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_info(response))
    }

    /// Ask for a game server in `region`.
    ///
    /// The directory sometimes hands out an address that never hosts a game;
    /// those are retried with a jittered delay, at most `max_attempts` times
    /// in total.
    pub async fn server_address(&self, region: &Region) -> Result<String, DirectoryError> {
        let key = region.key();
        let attempts = self.config.max_attempts.max(1);

        let mut last = String::new();
        for attempt in 1..=attempts {
            let body = self
                .http
                .post(&self.config.server_url)
                .form(&[(key.as_str(), "")])
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let address = validate_address(&body)?;
            if !self.config.degenerate_addresses.contains(&address) {
                info!("Directory assigned {} for {}", address, key);
                return Ok(address);
            }

            warn!(
                "Directory returned unusable address {} for {} (attempt {}/{})",
                address, key, attempt, attempts
            );
            last = address;
            if attempt < attempts {
                tokio::time::sleep(self.retry_delay()).await;
            }
        }

        Err(DirectoryError::DegenerateAddress {
            address: last,
            attempts,
        })
    }

    /// Find `region`/`game_mode` in the listing and get a server for it.
    pub async fn resolve(&self, region: &str, game_mode: &str) -> Result<String, DirectoryError> {
        let info = self.info().await?;
        let region = info
            .find(region, game_mode)
            .ok_or_else(|| DirectoryError::UnknownRegion(format!("{}:{}", region, game_mode)))?;
        self.server_address(region).await
    }

    fn retry_delay(&self) -> Duration {
        let base = self.config.retry_delay_ms;
        let jitter = rand::rng().random_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }
}

use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::db::services::IssuanceSettings;
use crate::sequence;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Value the global MAC counter starts from on first boot.
    #[serde(default = "default_mac_seed")]
    pub mac_seed: String,

    /// Two-digit year tag embedded in serial prefixes.
    #[serde(default = "default_year_tag")]
    pub year_tag: String,

    #[serde(default)]
    pub require_region: bool,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialServerConfig {
    pub database_url: Option<String>,
    pub listen_addr: Option<String>,
    pub log_dir: Option<String>,
    pub max_connections: Option<u32>,
    pub mac_seed: Option<String>,
    pub year_tag: Option<String>,
    pub require_region: Option<bool>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_mac_seed() -> String {
    "0C7FEDB00000".to_string()
}

fn default_year_tag() -> String {
    "25".to_string()
}

fn read_file_config(config_path: Option<&str>) -> Result<PartialServerConfig, String> {
    let Some(path_str) = config_path else {
        return Ok(PartialServerConfig::default());
    };
    let path = Path::new(path_str);
    if !path.exists() {
        return Ok(PartialServerConfig::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
    toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
}

impl ServerConfig {
    /// Loads the config file (optional), then environment variables, with
    /// the environment taking precedence.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        let file_config = read_file_config(config_path)?;
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        Self::from_layers(env_config, file_config)
    }

    /// Merges two layers, `primary` winning over `fallback`, and validates
    /// the result.
    pub fn from_layers(
        primary: PartialServerConfig,
        fallback: PartialServerConfig,
    ) -> Result<Self, String> {
        let config = ServerConfig {
            database_url: primary
                .database_url
                .or(fallback.database_url)
                .ok_or("DATABASE_URL is required")?,
            listen_addr: primary
                .listen_addr
                .or(fallback.listen_addr)
                .unwrap_or_else(default_listen_addr),
            log_dir: primary.log_dir.or(fallback.log_dir).unwrap_or_else(default_log_dir),
            max_connections: primary
                .max_connections
                .or(fallback.max_connections)
                .unwrap_or_else(default_max_connections),
            mac_seed: primary.mac_seed.or(fallback.mac_seed).unwrap_or_else(default_mac_seed),
            year_tag: primary.year_tag.or(fallback.year_tag).unwrap_or_else(default_year_tag),
            require_region: primary
                .require_region
                .or(fallback.require_region)
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.database_url.trim().is_empty() {
            return Err("DATABASE_URL must not be empty".to_string());
        }
        self.socket_addr()?;
        if self.max_connections == 0 {
            return Err("MAX_CONNECTIONS must be at least 1".to_string());
        }
        sequence::parse_mac_hex(&self.mac_seed).map_err(|e| format!("MAC_SEED: {e}"))?;
        if self.year_tag.len() != 2 || !self.year_tag.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("YEAR_TAG must be two digits, got '{}'", self.year_tag));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        self.listen_addr
            .parse()
            .map_err(|e| format!("Invalid LISTEN_ADDR '{}': {e}", self.listen_addr))
    }

    pub fn issuance_settings(&self) -> IssuanceSettings {
        IssuanceSettings {
            year_tag: self.year_tag.clone(),
            require_region: self.require_region,
        }
    }
}

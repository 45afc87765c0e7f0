//! Configuration file parsing for `/etc/vutils/config.toml`

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::{eyre::Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::connection::DEFAULT_CONNECT_URI;
use crate::matcher::MatchPolicy;

/// System-wide configuration file, used when present
pub const SYSTEM_CONFIG_PATH: &str = "/etc/vutils/config.toml";
/// Environment variable naming an alternate configuration file
pub const CONFIG_ENV: &str = "VUTILS_CONFIG";

/// Network PXE-booted domains are attached to
pub const DEFAULT_NETWORK: &str = "br0_net";
/// Pool volumes are allocated from
pub const DEFAULT_POOL: &str = "zfspool";

/// How read-only lookups report a failed hypervisor call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LookupPolicy {
    /// Succeed with null content, recording the failure as a diagnostic
    #[default]
    Lenient,
    /// Fail the command
    Strict,
}

/// Configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Hypervisor connection URI
    #[serde(default = "default_connect")]
    pub connect: String,

    /// Default network for `domain-find` and `domain-get`
    #[serde(default = "default_network")]
    pub network: String,

    /// Default pool for storage commands
    #[serde(default = "default_pool")]
    pub pool: String,

    /// Attach diagnostics to every result
    #[serde(default)]
    pub debug: bool,

    /// Which record wins when several match a lookup key
    #[serde(default)]
    pub match_policy: MatchPolicy,

    /// How `domain_get`/`domain_state` report failed lookups
    #[serde(default)]
    pub lookup_policy: LookupPolicy,
}

fn default_connect() -> String {
    DEFAULT_CONNECT_URI.to_string()
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_pool() -> String {
    DEFAULT_POOL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect: default_connect(),
            network: default_network(),
            pool: default_pool(),
            debug: false,
            match_policy: MatchPolicy::default(),
            lookup_policy: LookupPolicy::default(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file
    pub fn load_from_path(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Load configuration from `explicit`, else `$VUTILS_CONFIG`, else the
    /// system file if it exists, else defaults.
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let path = Utf8PathBuf::try_from(std::path::PathBuf::from(path))
                .with_context(|| format!("{} is not valid UTF-8", CONFIG_ENV))?;
            return Self::load_from_path(&path);
        }
        let system = Utf8Path::new(SYSTEM_CONFIG_PATH);
        if system.exists() {
            return Self::load_from_path(system);
        }
        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}

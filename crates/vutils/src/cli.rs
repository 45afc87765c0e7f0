//! Command-line interface
//!
//! Each subcommand maps onto one dispatcher command. `call` passes a raw
//! command name and JSON parameter bag through unchanged, for callers that
//! already speak the dispatcher's protocol.

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::Context as _, Result};
use tracing::debug;

use crate::config::{Config, LookupPolicy};
use crate::connection::VirshConnection;
use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::envelope::ResultEnvelope;
use crate::matcher::MatchPolicy;
use crate::request::{fields, CommandKind, RequestParameters};

/// Hypervisor command dispatch for provisioning automation.
///
/// Runs one command against a libvirt connection and prints the result
/// envelope `{changed, success, content}` as JSON on stdout.
#[derive(Debug, Parser)]
#[command(name = "vutils", version)]
pub struct Cli {
    /// Hypervisor connection URI (e.g., qemu:///system, qemu+ssh://host/system)
    #[clap(short = 'c', long, global = true)]
    pub connect: Option<String>,

    /// Configuration file (default: $VUTILS_CONFIG, then /etc/vutils/config.toml)
    #[clap(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Attach diagnostics to the result
    #[clap(long, global = true)]
    pub debug: bool,

    /// Which record wins when several match a lookup key
    #[clap(long, value_enum, global = true)]
    pub match_policy: Option<MatchPolicy>,

    /// How domain-get and domain-state report failed lookups
    #[clap(long, value_enum, global = true)]
    pub lookup_policy: Option<LookupPolicy>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Options naming a descriptor file
#[derive(Debug, Clone, Parser)]
pub struct XmlConfigOpts {
    /// Path to the XML descriptor
    #[clap(long)]
    pub xmlconfig: Utf8PathBuf,
}

/// Options naming a domain
#[derive(Debug, Clone, Parser)]
pub struct NameOpts {
    /// Domain name
    #[clap(long)]
    pub name: String,
}

/// Options for `domain-find`
#[derive(Debug, Clone, Parser)]
pub struct DomainFindOpts {
    /// MAC address to resolve
    #[clap(long)]
    pub mac: String,

    /// Network the MAC is attached to (default from config)
    #[clap(long)]
    pub network: Option<String>,
}

/// Options for `domain-get`
#[derive(Debug, Clone, Parser)]
pub struct DomainGetOpts {
    /// Domain name
    #[clap(long)]
    pub name: String,

    /// Network to report the MAC for (default from config)
    #[clap(long)]
    pub network: Option<String>,
}

/// Options for `storage-create`
#[derive(Debug, Clone, Parser)]
pub struct StorageCreateOpts {
    /// Path to the volume XML descriptor
    #[clap(long)]
    pub xmlconfig: Utf8PathBuf,

    /// Storage pool (default from config)
    #[clap(long)]
    pub pool: Option<String>,
}

/// Options naming a volume
#[derive(Debug, Clone, Parser)]
pub struct VolumeOpts {
    /// Volume name
    #[clap(long)]
    pub name: String,

    /// Storage pool (default from config)
    #[clap(long)]
    pub pool: Option<String>,
}

/// Options for `call`
#[derive(Debug, Clone, Parser)]
pub struct CallOpts {
    /// Command name, e.g. domain_find
    pub command: String,

    /// Parameters as a JSON object
    #[clap(long, default_value = "{}")]
    pub data: String,
}

/// vutils subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Define a domain from a descriptor and start it
    DomainCreate(XmlConfigOpts),

    /// Stop and undefine a domain; succeeds if it does not exist
    DomainDelete(NameOpts),

    /// Find the domain holding a MAC address on a network
    DomainFind(DomainFindOpts),

    /// Report a domain's MAC address on a network
    DomainGet(DomainGetOpts),

    /// Report a domain's run state
    DomainState(NameOpts),

    /// Create a volume in a storage pool
    StorageCreate(StorageCreateOpts),

    /// Delete a volume from a storage pool
    StorageDelete(VolumeOpts),

    /// Check that a volume exists in a storage pool
    StorageGet(VolumeOpts),

    /// Dispatch a raw command name with a JSON parameter bag
    Call(CallOpts),
}

fn read_descriptor(path: &Utf8Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read descriptor: {}", path))
}

impl Commands {
    /// The command name and parameter bag to dispatch, with network and
    /// pool defaults taken from `config`.
    pub fn into_request(self, config: &Config) -> Result<(String, RequestParameters)> {
        let network = |n: Option<String>| n.unwrap_or_else(|| config.network.clone());
        let pool = |p: Option<String>| p.unwrap_or_else(|| config.pool.clone());

        let (kind, params) = match self {
            Commands::DomainCreate(opts) => (
                CommandKind::DomainCreate,
                RequestParameters::new()
                    .with(fields::XMLCONFIG, read_descriptor(&opts.xmlconfig)?),
            ),
            Commands::DomainDelete(opts) => (
                CommandKind::DomainDelete,
                RequestParameters::new().with(fields::NAME, opts.name),
            ),
            Commands::DomainFind(opts) => (
                CommandKind::DomainFind,
                RequestParameters::new()
                    .with(fields::MAC, opts.mac)
                    .with(fields::NETWORK, network(opts.network)),
            ),
            Commands::DomainGet(opts) => (
                CommandKind::DomainGet,
                RequestParameters::new()
                    .with(fields::NAME, opts.name)
                    .with(fields::NETWORK, network(opts.network)),
            ),
            Commands::DomainState(opts) => (
                CommandKind::DomainState,
                RequestParameters::new().with(fields::NAME, opts.name),
            ),
            Commands::StorageCreate(opts) => (
                CommandKind::StorageCreate,
                RequestParameters::new()
                    .with(fields::POOL, pool(opts.pool))
                    .with(fields::XMLCONFIG, read_descriptor(&opts.xmlconfig)?),
            ),
            Commands::StorageDelete(opts) => (
                CommandKind::StorageDelete,
                RequestParameters::new()
                    .with(fields::NAME, opts.name)
                    .with(fields::POOL, pool(opts.pool)),
            ),
            Commands::StorageGet(opts) => (
                CommandKind::StorageGet,
                RequestParameters::new()
                    .with(fields::NAME, opts.name)
                    .with(fields::POOL, pool(opts.pool)),
            ),
            Commands::Call(opts) => {
                let params = RequestParameters::from_json(&opts.data)
                    .context("Parsing --data as a JSON object")?;
                return Ok((opts.command, params));
            }
        };
        Ok((kind.to_string(), params))
    }
}

impl Cli {
    /// Load the configuration file and apply command-line overrides
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(connect) = &self.connect {
            config.connect = connect.clone();
        }
        if self.debug {
            config.debug = true;
        }
        if let Some(policy) = self.match_policy {
            config.match_policy = policy;
        }
        if let Some(policy) = self.lookup_policy {
            config.lookup_policy = policy;
        }
        Ok(config)
    }
}

impl From<&Config> for DispatchOptions {
    fn from(config: &Config) -> Self {
        Self {
            debug: config.debug,
            match_policy: config.match_policy,
            lookup_policy: config.lookup_policy,
        }
    }
}

/// Run the parsed command line against the configured hypervisor
pub fn run(cli: Cli) -> Result<ResultEnvelope> {
    let config = cli.resolve_config()?;
    let (command, params) = cli.command.into_request(&config)?;
    debug!("Dispatching {} via {}", command, config.connect);

    let conn = VirshConnection::open(&config.connect)
        .with_context(|| format!("Connecting to {}", config.connect))?;
    let envelope = Dispatcher::new(&conn, DispatchOptions::from(&config))
        .dispatch(&command, &params)
        .with_context(|| format!("Running {}", command))?;
    Ok(envelope)
}

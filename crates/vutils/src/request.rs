//! Command names, parameter bags and the typed commands built from them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::CommandError;
use crate::validate::check_required;

/// Field names used in parameter bags
pub mod fields {
    /// Domain or volume name
    pub const NAME: &str = "name";
    /// MAC address to resolve
    pub const MAC: &str = "mac";
    /// Virtual network the interfaces are attached to
    pub const NETWORK: &str = "network";
    /// Storage pool name
    pub const POOL: &str = "pool";
    /// Domain or volume XML descriptor
    pub const XMLCONFIG: &str = "xmlconfig";
}

/// Unordered mapping of field name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParameters(Map<String, Value>);

impl RequestParameters {
    /// An empty parameter bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Builder-style insert
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a field
    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    /// Get a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// A string field that has already passed validation
    fn string(&self, field: &str) -> Result<String, CommandError> {
        match self.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(CommandError::InvalidParameter {
                field: field.to_string(),
                expected: "string",
            }),
        }
    }

    /// The bag as JSON for diagnostics, with descriptors reduced to their size
    pub fn redacted(&self) -> Value {
        let map = self
            .0
            .iter()
            .map(|(k, v)| match (k.as_str(), v) {
                (fields::XMLCONFIG, Value::String(xml)) => {
                    (k.clone(), Value::String(format!("<{} bytes>", xml.len())))
                }
                _ => (k.clone(), v.clone()),
            })
            .collect();
        Value::Object(map)
    }
}

/// The eight supported command names
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::Display,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum CommandKind {
    /// Define and start a domain
    DomainCreate,
    /// Stop and undefine a domain
    DomainDelete,
    /// Resolve a MAC address to a domain name
    DomainFind,
    /// Resolve a domain name to its MAC on a network
    DomainGet,
    /// Report a domain's run state
    DomainState,
    /// Create a volume in a pool
    StorageCreate,
    /// Delete a volume from a pool
    StorageDelete,
    /// Confirm a volume exists in a pool
    StorageGet,
}

impl CommandKind {
    /// Fields that must be present, in validation order
    pub fn required_fields(self) -> &'static [&'static str] {
        use fields::*;
        match self {
            CommandKind::DomainCreate => &[XMLCONFIG],
            CommandKind::DomainDelete => &[NAME],
            CommandKind::DomainFind => &[MAC, NETWORK],
            CommandKind::DomainGet => &[NAME, NETWORK],
            CommandKind::DomainState => &[NAME],
            CommandKind::StorageCreate => &[POOL, XMLCONFIG],
            CommandKind::StorageDelete => &[NAME, POOL],
            CommandKind::StorageGet => &[NAME, POOL],
        }
    }

    /// Whether the command mutates hypervisor state
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            CommandKind::DomainCreate
                | CommandKind::DomainDelete
                | CommandKind::StorageCreate
                | CommandKind::StorageDelete
        )
    }
}

/// Parameters of `domain_create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainCreate {
    /// Domain XML descriptor
    pub xmlconfig: String,
}

/// Parameters naming a single domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainName {
    /// Domain name
    pub name: String,
}

/// Parameters of `domain_find`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainFind {
    /// MAC address to resolve
    pub mac: String,
    /// Network the MAC is attached to
    pub network: String,
}

/// Parameters of `domain_get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainGet {
    /// Domain name
    pub name: String,
    /// Network to report the MAC for
    pub network: String,
}

/// Parameters of `storage_create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCreate {
    /// Pool to create the volume in
    pub pool: String,
    /// Volume XML descriptor
    pub xmlconfig: String,
}

/// Parameters naming a volume within a pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRef {
    /// Volume name
    pub name: String,
    /// Pool containing the volume
    pub pool: String,
}

/// A validated command with its typed parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `domain_create`
    DomainCreate(DomainCreate),
    /// `domain_delete`
    DomainDelete(DomainName),
    /// `domain_find`
    DomainFind(DomainFind),
    /// `domain_get`
    DomainGet(DomainGet),
    /// `domain_state`
    DomainState(DomainName),
    /// `storage_create`
    StorageCreate(StorageCreate),
    /// `storage_delete`
    StorageDelete(VolumeRef),
    /// `storage_get`
    StorageGet(VolumeRef),
}

impl Command {
    /// Validate `params` against `kind`'s required fields and build the
    /// typed command.
    pub fn from_request(kind: CommandKind, params: &RequestParameters) -> Result<Self, CommandError> {
        let required: Vec<_> = kind
            .required_fields()
            .iter()
            .map(|f| (*f, params.get(f)))
            .collect();
        check_required(&required)?;

        use fields::*;
        let command = match kind {
            CommandKind::DomainCreate => Command::DomainCreate(DomainCreate {
                xmlconfig: params.string(XMLCONFIG)?,
            }),
            CommandKind::DomainDelete => Command::DomainDelete(DomainName {
                name: params.string(NAME)?,
            }),
            CommandKind::DomainFind => Command::DomainFind(DomainFind {
                mac: params.string(MAC)?,
                network: params.string(NETWORK)?,
            }),
            CommandKind::DomainGet => Command::DomainGet(DomainGet {
                name: params.string(NAME)?,
                network: params.string(NETWORK)?,
            }),
            CommandKind::DomainState => Command::DomainState(DomainName {
                name: params.string(NAME)?,
            }),
            CommandKind::StorageCreate => Command::StorageCreate(StorageCreate {
                pool: params.string(POOL)?,
                xmlconfig: params.string(XMLCONFIG)?,
            }),
            CommandKind::StorageDelete => Command::StorageDelete(VolumeRef {
                name: params.string(NAME)?,
                pool: params.string(POOL)?,
            }),
            CommandKind::StorageGet => Command::StorageGet(VolumeRef {
                name: params.string(NAME)?,
                pool: params.string(POOL)?,
            }),
        };
        Ok(command)
    }

    /// The command's kind
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::DomainCreate(_) => CommandKind::DomainCreate,
            Command::DomainDelete(_) => CommandKind::DomainDelete,
            Command::DomainFind(_) => CommandKind::DomainFind,
            Command::DomainGet(_) => CommandKind::DomainGet,
            Command::DomainState(_) => CommandKind::DomainState,
            Command::StorageCreate(_) => CommandKind::StorageCreate,
            Command::StorageDelete(_) => CommandKind::StorageDelete,
            Command::StorageGet(_) => CommandKind::StorageGet,
        }
    }
}

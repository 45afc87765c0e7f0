//! Command dispatch
//!
//! [`Dispatcher::dispatch`] takes a command name and parameter bag, validates
//! the command's required fields, runs its handler against one hypervisor
//! connection and returns a [`ResultEnvelope`].
//!
//! Failure handling is a per-handler decision:
//! - `domain_delete` swallows lookup/stop/undefine failures so that deleting
//!   an absent domain succeeds.
//! - `domain_get` and `domain_state` follow [`LookupPolicy`].
//! - Everything else propagates as a [`CommandError`].

use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::config::LookupPolicy;
use crate::connection::{invalid_descriptor, DomainState, Hypervisor};
use crate::envelope::{Diagnostics, ResultEnvelope};
use crate::errors::CommandError;
use crate::interfaces::parse_interface_macs;
use crate::matcher::{find_record, MatchPolicy, MatchRecord};
use crate::request::{
    Command, CommandKind, DomainCreate, DomainFind, DomainGet, DomainName, RequestParameters,
    StorageCreate, VolumeRef,
};

/// Behavior switches for a dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Attach diagnostics to the envelope
    pub debug: bool,
    /// Which record wins when several match
    pub match_policy: MatchPolicy,
    /// How read-only lookups report failures
    pub lookup_policy: LookupPolicy,
}

/// Runs commands against one hypervisor connection
#[derive(Debug)]
pub struct Dispatcher<'a, H: Hypervisor + ?Sized> {
    conn: &'a H,
    options: DispatchOptions,
}

impl<'a, H: Hypervisor + ?Sized> Dispatcher<'a, H> {
    /// Create a dispatcher over an open connection
    pub fn new(conn: &'a H, options: DispatchOptions) -> Self {
        Self { conn, options }
    }

    /// Dispatch a command by name.
    ///
    /// An unrecognized name yields the unknown-command envelope rather than
    /// an error. Missing parameters fail before any hypervisor call.
    pub fn dispatch(
        &self,
        command: &str,
        params: &RequestParameters,
    ) -> Result<ResultEnvelope, CommandError> {
        let mut diags = Diagnostics::new(self.options.debug);
        diags.record("cmd", command);
        diags.record("data", params.redacted());

        let Ok(kind) = CommandKind::from_str(command) else {
            warn!("Unknown command '{}'", command);
            return Ok(ResultEnvelope::unknown_command().with_diagnostics(diags));
        };

        let command = Command::from_request(kind, params)?;
        let envelope = self.execute(&command, &mut diags)?;
        debug_assert!(kind.is_mutating() || !envelope.changed);
        Ok(envelope.with_diagnostics(diags))
    }

    /// Run an already-validated command
    pub fn execute(
        &self,
        command: &Command,
        diags: &mut Diagnostics,
    ) -> Result<ResultEnvelope, CommandError> {
        debug!("Executing {}", command.kind());
        match command {
            Command::DomainCreate(p) => self.domain_create(p, diags),
            Command::DomainDelete(p) => Ok(self.domain_delete(p, diags)),
            Command::DomainFind(p) => self.domain_find(p, diags),
            Command::DomainGet(p) => self.domain_get(p, diags),
            Command::DomainState(p) => self.domain_state(p, diags),
            Command::StorageCreate(p) => self.storage_create(p),
            Command::StorageDelete(p) => self.storage_delete(p),
            Command::StorageGet(p) => self.storage_get(p),
        }
    }

    fn domain_create(
        &self,
        p: &DomainCreate,
        diags: &mut Diagnostics,
    ) -> Result<ResultEnvelope, CommandError> {
        let name = self.conn.define_domain(&p.xmlconfig)?;
        info!("Defined domain '{}'", name);

        if let Err(e) = self.conn.start_domain(&name) {
            warn!("Domain '{}' defined but failed to start: {}", name, e);
            diags.record("start_error", e.to_string());
            return Ok(ResultEnvelope::failed(true));
        }
        Ok(ResultEnvelope::changed(Some(name)))
    }

    fn domain_delete(&self, p: &DomainName, diags: &mut Diagnostics) -> ResultEnvelope {
        let name = &p.name;
        match self.conn.lookup_domain(name) {
            Err(e) => {
                debug!("Nothing to delete: {}", e);
                diags.record("lookup_error", e.to_string());
            }
            Ok(()) => {
                match self.conn.domain_is_active(name) {
                    Ok(true) => {
                        if let Err(e) = self.conn.destroy_domain(name) {
                            warn!("Failed to stop domain '{}': {}", name, e);
                            diags.record("stop_error", e.to_string());
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Failed to query domain '{}': {}", name, e);
                        diags.record("stop_error", e.to_string());
                    }
                }
                match self.conn.undefine_domain(name) {
                    Ok(()) => info!("Undefined domain '{}'", name),
                    Err(e) => {
                        warn!("Failed to undefine domain '{}': {}", name, e);
                        diags.record("undefine_error", e.to_string());
                    }
                }
            }
        }
        ResultEnvelope::changed(None)
    }

    fn domain_find(
        &self,
        p: &DomainFind,
        diags: &mut Diagnostics,
    ) -> Result<ResultEnvelope, CommandError> {
        let records = self.domain_mac_records(&p.network, diags)?;
        match find_record(&p.mac, &records, self.options.match_policy) {
            Some(record) => Ok(ResultEnvelope::read(Some(record.name().to_string()))),
            None => {
                debug!("No domain holds {} on {}", p.mac, p.network);
                Ok(ResultEnvelope::failed(false))
            }
        }
    }

    fn domain_get(
        &self,
        p: &DomainGet,
        diags: &mut Diagnostics,
    ) -> Result<ResultEnvelope, CommandError> {
        let result = self.resolve_mac(p, diags);
        let mac = self.tolerate(result, diags)?;
        Ok(ResultEnvelope::read(mac))
    }

    fn resolve_mac(&self, p: &DomainGet, diags: &mut Diagnostics) -> Result<String, CommandError> {
        self.conn.lookup_domain(&p.name)?;
        let records = self.domain_mac_records(&p.network, diags)?;
        find_record(&p.name, &records, self.options.match_policy)
            .filter(|record| record.name() == p.name)
            .and_then(MatchRecord::first_value)
            .map(str::to_string)
            .ok_or_else(|| {
                CommandError::NotFound(format!(
                    "MAC of domain '{}' on network '{}'",
                    p.name, p.network
                ))
            })
    }

    fn domain_state(
        &self,
        p: &DomainName,
        diags: &mut Diagnostics,
    ) -> Result<ResultEnvelope, CommandError> {
        let result = self
            .conn
            .lookup_domain(&p.name)
            .and_then(|()| self.conn.domain_state_code(&p.name))
            .map_err(CommandError::from);
        let state = self.tolerate(result, diags)?.and_then(|code| {
            let state = DomainState::from_code(code);
            if state.is_none() {
                diags.record("unknown_state", code);
            }
            state
        });
        Ok(ResultEnvelope::read(state.map(|s| s.to_string())))
    }

    fn storage_create(&self, p: &StorageCreate) -> Result<ResultEnvelope, CommandError> {
        self.conn.lookup_pool(&p.pool)?;
        let key = self.conn.create_volume(&p.pool, &p.xmlconfig)?;
        info!("Created volume {} in pool '{}'", key, p.pool);
        Ok(ResultEnvelope::changed(Some(key)))
    }

    fn storage_delete(&self, p: &VolumeRef) -> Result<ResultEnvelope, CommandError> {
        self.conn.lookup_pool(&p.pool)?;
        self.conn.lookup_volume(&p.pool, &p.name)?;
        self.conn.delete_volume(&p.pool, &p.name)?;
        info!("Deleted volume '{}' from pool '{}'", p.name, p.pool);
        Ok(ResultEnvelope::changed(None))
    }

    fn storage_get(&self, p: &VolumeRef) -> Result<ResultEnvelope, CommandError> {
        self.conn.lookup_pool(&p.pool)?;
        let records: Vec<MatchRecord> = self
            .conn
            .list_volumes(&p.pool)?
            .into_iter()
            .map(MatchRecord::Scalar)
            .collect();
        match find_record(&p.name, &records, self.options.match_policy) {
            Some(record) => Ok(ResultEnvelope::read(Some(record.name().to_string()))),
            None => Ok(ResultEnvelope::failed(false)),
        }
    }

    /// Enumerate every domain and collect its MACs on `network`.
    ///
    /// Domains that disappear between listing and descriptor fetch are
    /// skipped.
    fn domain_mac_records(
        &self,
        network: &str,
        diags: &mut Diagnostics,
    ) -> Result<Vec<MatchRecord>, CommandError> {
        let names = self.conn.list_all_domains()?;
        diags.record("domains_scanned", names.len());

        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let xml = match self.conn.domain_descriptor(&name) {
                Ok(xml) => xml,
                Err(e) if e.is_not_found() => {
                    warn!("Domain '{}' vanished during enumeration", name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let record =
                parse_interface_macs(&name, network, Some(&xml)).map_err(invalid_descriptor)?;
            records.extend(record);
        }
        Ok(records)
    }

    /// Apply the lookup policy to a read-only lookup's result
    fn tolerate<T>(
        &self,
        result: Result<T, CommandError>,
        diags: &mut Diagnostics,
    ) -> Result<Option<T>, CommandError> {
        match (result, self.options.lookup_policy) {
            (Ok(v), _) => Ok(Some(v)),
            (Err(e), LookupPolicy::Strict) => Err(e),
            (Err(e), LookupPolicy::Lenient) => {
                warn!("Lookup failed: {}", e);
                diags.record("lookup_error", e.to_string());
                Ok(None)
            }
        }
    }
}

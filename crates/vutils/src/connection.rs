//! Hypervisor connection handle
//!
//! [`Hypervisor`] is the set of libvirt operations the command handlers
//! consume. [`VirshConnection`] implements it by running `virsh` against a
//! fixed connection URI, one process per call.

use std::io::Write;
use std::process::Command;

use tracing::debug;

use crate::descriptor::descriptor_name;
use crate::errors::{HypervisorError, HypervisorResult, ObjectKind};

/// Default management endpoint
pub const DEFAULT_CONNECT_URI: &str = "qemu:///system";

/// Operations consumed from the hypervisor management service.
///
/// Implementations are used by a single command invocation at a time and
/// need not be safe for concurrent use.
pub trait Hypervisor {
    /// Names of all domains, active and inactive
    fn list_all_domains(&self) -> HypervisorResult<Vec<String>>;
    /// Fail with [`HypervisorError::NotFound`] unless the domain exists
    fn lookup_domain(&self, name: &str) -> HypervisorResult<()>;
    /// Define a domain from its descriptor, returning the domain name
    fn define_domain(&self, descriptor: &str) -> HypervisorResult<String>;
    /// Start a defined domain
    fn start_domain(&self, name: &str) -> HypervisorResult<()>;
    /// Forcefully stop a running domain
    fn destroy_domain(&self, name: &str) -> HypervisorResult<()>;
    /// Remove a domain's definition
    fn undefine_domain(&self, name: &str) -> HypervisorResult<()>;
    /// Whether the domain has a running instance
    fn domain_is_active(&self, name: &str) -> HypervisorResult<bool>;
    /// libvirt `virDomainState` code of the domain
    fn domain_state_code(&self, name: &str) -> HypervisorResult<u32>;
    /// The domain's device descriptor
    fn domain_descriptor(&self, name: &str) -> HypervisorResult<String>;
    /// Fail with [`HypervisorError::NotFound`] unless the pool exists
    fn lookup_pool(&self, pool: &str) -> HypervisorResult<()>;
    /// Create a volume from its descriptor, returning the volume key
    fn create_volume(&self, pool: &str, descriptor: &str) -> HypervisorResult<String>;
    /// Names of the volumes in a pool
    fn list_volumes(&self, pool: &str) -> HypervisorResult<Vec<String>>;
    /// Fail with [`HypervisorError::NotFound`] unless the volume exists
    fn lookup_volume(&self, pool: &str, name: &str) -> HypervisorResult<()>;
    /// Delete a volume
    fn delete_volume(&self, pool: &str, name: &str) -> HypervisorResult<()>;
}

/// Domain run states, by `virDomainState` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DomainState {
    /// `VIR_DOMAIN_NOSTATE`
    NoState,
    /// `VIR_DOMAIN_RUNNING`
    Running,
    /// `VIR_DOMAIN_BLOCKED`
    Blocked,
    /// `VIR_DOMAIN_PAUSED`
    Paused,
    /// `VIR_DOMAIN_SHUTDOWN`
    Shutdown,
    /// `VIR_DOMAIN_SHUTOFF`
    Shutoff,
    /// `VIR_DOMAIN_CRASHED`
    Crashed,
}

impl DomainState {
    /// Map a state code; codes without a name (e.g. pmsuspended) are `None`
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => DomainState::NoState,
            1 => DomainState::Running,
            2 => DomainState::Blocked,
            3 => DomainState::Paused,
            4 => DomainState::Shutdown,
            5 => DomainState::Shutoff,
            6 => DomainState::Crashed,
            _ => return None,
        })
    }
}

/// Map `virsh domstate` output back to its state code
fn state_code_from_virsh(text: &str) -> Option<u32> {
    Some(match text.trim() {
        "no state" => 0,
        "running" => 1,
        "idle" | "blocked" => 2,
        "paused" => 3,
        "in shutdown" => 4,
        "shut off" => 5,
        "crashed" => 6,
        "pmsuspended" => 7,
        _ => return None,
    })
}

/// Parse `virsh vol-list --name` output, one volume name per line
fn parse_vol_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// A connection to libvirt through the `virsh` client
#[derive(Debug, Clone)]
pub struct VirshConnection {
    uri: String,
}

impl VirshConnection {
    /// Open a connection, failing if the endpoint cannot be reached
    pub fn open(uri: &str) -> HypervisorResult<Self> {
        let conn = Self {
            uri: uri.to_string(),
        };
        let canonical = conn.virsh(&["uri"])?;
        debug!("Connected to {}", canonical.trim());
        Ok(conn)
    }

    /// Build a virsh command bound to this connection.
    ///
    /// Output and error text are parsed, so messages must be untranslated.
    fn virsh_command(&self) -> Command {
        let mut cmd = Command::new("virsh");
        cmd.env("LC_ALL", "C");
        cmd.arg("-c").arg(&self.uri);
        cmd
    }

    /// Run a virsh subcommand, returning its stdout
    fn virsh(&self, args: &[&str]) -> HypervisorResult<String> {
        let op = args.first().copied().unwrap_or_default().to_string();
        debug!("virsh -c {} {}", self.uri, args.join(" "));

        let output = self
            .virsh_command()
            .args(args)
            .output()
            .map_err(|source| HypervisorError::Io {
                context: format!("Failed to run virsh {}", op),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(HypervisorError::Virsh { op, stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a virsh subcommand that takes a descriptor file argument
    fn virsh_with_descriptor(&self, args: &[&str], descriptor: &str) -> HypervisorResult<String> {
        let io_err = |context: &str| {
            let context = context.to_string();
            move |source| HypervisorError::Io { context, source }
        };
        let mut file = tempfile::Builder::new()
            .prefix("vutils-")
            .suffix(".xml")
            .tempfile()
            .map_err(io_err("Failed to create descriptor file"))?;
        file.write_all(descriptor.as_bytes())
            .and_then(|_| file.flush())
            .map_err(io_err("Failed to write descriptor file"))?;

        let path = file.path().to_string_lossy().into_owned();
        let mut full_args = args.to_vec();
        full_args.push(&path);
        self.virsh(&full_args)
    }
}

pub(crate) fn invalid_descriptor(e: color_eyre::Report) -> HypervisorError {
    HypervisorError::Invalid {
        what: "descriptor",
        reason: format!("{:#}", e),
    }
}

impl Hypervisor for VirshConnection {
    fn list_all_domains(&self) -> HypervisorResult<Vec<String>> {
        let out = self.virsh(&["list", "--all", "--name"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn lookup_domain(&self, name: &str) -> HypervisorResult<()> {
        self.virsh(&["dominfo", name])
            .map(|_| ())
            .map_err(|e| e.not_found_as(ObjectKind::Domain, name))
    }

    fn define_domain(&self, descriptor: &str) -> HypervisorResult<String> {
        let name = descriptor_name(descriptor).map_err(invalid_descriptor)?;
        self.virsh_with_descriptor(&["define"], descriptor)?;
        Ok(name)
    }

    fn start_domain(&self, name: &str) -> HypervisorResult<()> {
        self.virsh(&["start", name])
            .map(|_| ())
            .map_err(|e| e.not_found_as(ObjectKind::Domain, name))
    }

    fn destroy_domain(&self, name: &str) -> HypervisorResult<()> {
        self.virsh(&["destroy", name])
            .map(|_| ())
            .map_err(|e| e.not_found_as(ObjectKind::Domain, name))
    }

    fn undefine_domain(&self, name: &str) -> HypervisorResult<()> {
        self.virsh(&["undefine", name])
            .map(|_| ())
            .map_err(|e| e.not_found_as(ObjectKind::Domain, name))
    }

    fn domain_is_active(&self, name: &str) -> HypervisorResult<bool> {
        // domid prints "-" for inactive domains
        let out = self
            .virsh(&["domid", name])
            .map_err(|e| e.not_found_as(ObjectKind::Domain, name))?;
        Ok(out.trim() != "-")
    }

    fn domain_state_code(&self, name: &str) -> HypervisorResult<u32> {
        let out = self
            .virsh(&["domstate", name])
            .map_err(|e| e.not_found_as(ObjectKind::Domain, name))?;
        state_code_from_virsh(&out).ok_or_else(|| HypervisorError::Invalid {
            what: "domain state",
            reason: out.trim().to_string(),
        })
    }

    fn domain_descriptor(&self, name: &str) -> HypervisorResult<String> {
        self.virsh(&["dumpxml", name])
            .map_err(|e| e.not_found_as(ObjectKind::Domain, name))
    }

    fn lookup_pool(&self, pool: &str) -> HypervisorResult<()> {
        self.virsh(&["pool-info", pool])
            .map(|_| ())
            .map_err(|e| e.not_found_as(ObjectKind::Pool, pool))
    }

    fn create_volume(&self, pool: &str, descriptor: &str) -> HypervisorResult<String> {
        let name = descriptor_name(descriptor).map_err(invalid_descriptor)?;
        self.virsh_with_descriptor(&["vol-create", pool], descriptor)
            .map_err(|e| e.not_found_as(ObjectKind::Pool, pool))?;
        let key = self
            .virsh(&["vol-key", &name, "--pool", pool])
            .map_err(|e| e.not_found_as(ObjectKind::Volume, &name))?;
        Ok(key.trim().to_string())
    }

    fn list_volumes(&self, pool: &str) -> HypervisorResult<Vec<String>> {
        let out = self
            .virsh(&["vol-list", "--pool", pool, "--name"])
            .map_err(|e| e.not_found_as(ObjectKind::Pool, pool))?;
        Ok(parse_vol_names(&out))
    }

    fn lookup_volume(&self, pool: &str, name: &str) -> HypervisorResult<()> {
        self.virsh(&["vol-info", name, "--pool", pool])
            .map(|_| ())
            .map_err(|e| e.not_found_as(ObjectKind::Volume, name))
    }

    fn delete_volume(&self, pool: &str, name: &str) -> HypervisorResult<()> {
        self.virsh(&["vol-delete", name, "--pool", pool])
            .map(|_| ())
            .map_err(|e| e.not_found_as(ObjectKind::Volume, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        let names: Vec<_> = (0..8)
            .map(|c| DomainState::from_code(c).map(|s| s.to_string()))
            .collect();
        assert_eq!(
            names,
            vec![
                Some("nostate".to_string()),
                Some("running".to_string()),
                Some("blocked".to_string()),
                Some("paused".to_string()),
                Some("shutdown".to_string()),
                Some("shutoff".to_string()),
                Some("crashed".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_virsh_domstate_text() {
        assert_eq!(state_code_from_virsh("running\n\n"), Some(1));
        assert_eq!(state_code_from_virsh("shut off"), Some(5));
        assert_eq!(state_code_from_virsh("in shutdown"), Some(4));
        assert_eq!(state_code_from_virsh("idle"), Some(2));
        assert_eq!(state_code_from_virsh("pmsuspended"), Some(7));
        assert_eq!(state_code_from_virsh("exploded"), None);
    }

    #[test]
    fn test_parse_vol_names() {
        let output = "v1\nv2.qcow2\nseed disk.iso\n\n";
        assert_eq!(parse_vol_names(output), vec!["v1", "v2.qcow2", "seed disk.iso"]);
        assert!(parse_vol_names("\n").is_empty());
    }

    #[test]
    fn test_virsh_command_uses_c_locale() {
        let conn = VirshConnection {
            uri: "test:///default".to_string(),
        };
        let cmd = conn.virsh_command();
        assert_eq!(cmd.get_program(), "virsh");
        assert!(cmd
            .get_envs()
            .any(|(k, v)| k == "LC_ALL" && v == Some(std::ffi::OsStr::new("C"))));
        assert_eq!(
            cmd.get_args().collect::<Vec<_>>(),
            vec!["-c", "test:///default"]
        );
    }
}

//! Error types for command dispatch and hypervisor calls

use thiserror::Error;

/// The kind of hypervisor object a lookup was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ObjectKind {
    /// A libvirt domain
    #[strum(to_string = "domain")]
    Domain,
    /// A storage pool
    #[strum(to_string = "storage pool")]
    Pool,
    /// A storage volume within a pool
    #[strum(to_string = "storage volume")]
    Volume,
}

/// A failed call into the hypervisor management service
#[derive(Debug, Error)]
pub enum HypervisorError {
    /// The named object does not exist
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// What was looked up
        kind: ObjectKind,
        /// The name that was looked up
        name: String,
    },
    /// virsh ran but reported a failure
    #[error("virsh {op} failed: {stderr}")]
    Virsh {
        /// The virsh subcommand
        op: String,
        /// Trimmed error output
        stderr: String,
    },
    /// A descriptor or virsh output could not be understood
    #[error("invalid {what}: {reason}")]
    Invalid {
        /// What was being interpreted
        what: &'static str,
        /// Why it was rejected
        reason: String,
    },
    /// Spawning virsh or staging a descriptor failed
    #[error("{context}")]
    Io {
        /// What was being attempted
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl HypervisorError {
    /// Reclassify a virsh failure as [`HypervisorError::NotFound`] when its
    /// error output says the object does not exist.
    pub fn not_found_as(self, kind: ObjectKind, name: &str) -> Self {
        match self {
            HypervisorError::Virsh { ref stderr, .. } if reports_missing_object(stderr) => {
                HypervisorError::NotFound {
                    kind,
                    name: name.to_string(),
                }
            }
            other => other,
        }
    }

    /// Whether this is a missing-object failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, HypervisorError::NotFound { .. })
    }
}

/// libvirt error lines for absent domains, pools and volumes, e.g.
/// `Domain not found: no domain with matching name 'x'`. virsh prefixes any
/// lookup failure with `failed to get ...`, so that alone is not enough.
const MISSING_OBJECT_ERRORS: &[&str] = &[
    "domain not found",
    "storage pool not found",
    "storage volume not found",
    "no domain with matching",
    "no storage pool with matching",
    "no storage vol with matching",
];

fn reports_missing_object(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    MISSING_OBJECT_ERRORS.iter().any(|m| stderr.contains(m))
}

/// Result alias for hypervisor calls
pub type HypervisorResult<T> = std::result::Result<T, HypervisorError>;

/// Why a dispatched command could not complete
#[derive(Debug, Error)]
pub enum CommandError {
    /// A required field was absent, null or empty
    #[error("missing required parameter: {0}")]
    MissingParameter(String),
    /// A field was present but of the wrong type
    #[error("invalid parameter {field}: expected {expected}")]
    InvalidParameter {
        /// The offending field
        field: String,
        /// Expected JSON type
        expected: &'static str,
    },
    /// A looked-up object does not exist
    #[error("{0} not found")]
    NotFound(String),
    /// An external call failed
    #[error(transparent)]
    Operation(HypervisorError),
}

impl From<HypervisorError> for CommandError {
    fn from(e: HypervisorError) -> Self {
        match e {
            HypervisorError::NotFound { kind, name } => {
                CommandError::NotFound(format!("{} '{}'", kind, name))
            }
            other => CommandError::Operation(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn virsh_err(stderr: &str) -> HypervisorError {
        HypervisorError::Virsh {
            op: "dominfo".into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_not_found_classification() {
        let e = virsh_err("error: failed to get domain 'vm1'\nerror: Domain not found: no domain with matching name 'vm1'")
            .not_found_as(ObjectKind::Domain, "vm1");
        assert!(e.is_not_found());
        assert_eq!(e.to_string(), "domain 'vm1' not found");

        let e = virsh_err("error: Storage pool not found: no storage pool with matching name 'zfspool'")
            .not_found_as(ObjectKind::Pool, "zfspool");
        assert_eq!(e.to_string(), "storage pool 'zfspool' not found");

        let e = virsh_err("error: failed to get vol 'v3'\nerror: Storage volume not found: no storage vol with matching path 'v3'")
            .not_found_as(ObjectKind::Volume, "v3");
        assert!(e.is_not_found());
    }

    #[test]
    fn test_other_failures_kept() {
        let e = virsh_err("error: failed to connect to the hypervisor")
            .not_found_as(ObjectKind::Domain, "vm1");
        assert!(!e.is_not_found());
        assert!(e.to_string().starts_with("virsh dominfo failed"));

        let e = virsh_err("error: failed to get domain 'vm1'\nerror: Cannot recv data: Connection reset by peer")
            .not_found_as(ObjectKind::Domain, "vm1");
        assert!(!e.is_not_found());
    }

    #[test]
    fn test_command_error_conversion() {
        let e: CommandError = HypervisorError::NotFound {
            kind: ObjectKind::Volume,
            name: "v3".into(),
        }
        .into();
        assert_eq!(e.to_string(), "storage volume 'v3' not found");

        let e: CommandError = virsh_err("boom").into();
        assert!(matches!(e, CommandError::Operation(_)));
    }
}

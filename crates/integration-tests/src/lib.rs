//! Shared library code for integration tests
//!
//! This module contains constants and utilities that are shared between
//! the main test binary and the cleanup helper.

// Unfortunately needed here to work with linkme
#![allow(unsafe_code)]

use linkme::distributed_slice;

/// Prefix of every domain and volume name created by integration tests
pub const TEST_RESOURCE_PREFIX: &str = "vutils-it-";

/// Hypervisor URI to test against; tests are skipped when unset
pub const CONNECT_ENV: &str = "VUTILS_INTEGRATION_CONNECT";

/// Network test domains attach to
pub const NETWORK_ENV: &str = "VUTILS_TEST_NETWORK";

/// Pool test volumes are created in
pub const POOL_ENV: &str = "VUTILS_TEST_POOL";

/// A test function that returns a Result
pub type TestFn = fn() -> color_eyre::Result<()>;

/// Metadata for a registered integration test
#[derive(Debug)]
pub struct IntegrationTest {
    /// Name of the integration test
    pub name: &'static str,
    /// Test function to execute
    pub f: TestFn,
}

impl IntegrationTest {
    /// Create a new integration test with the given name and function
    pub const fn new(name: &'static str, f: TestFn) -> Self {
        Self { name, f }
    }
}

/// Distributed slice holding all registered integration tests
#[distributed_slice]
pub static INTEGRATION_TESTS: [IntegrationTest];

/// Register an integration test with less boilerplate.
///
/// # Examples
///
/// ```ignore
/// fn test_unknown_command() -> Result<()> {
///     let output = run_vutils(&["call", "domain_reboot"])?;
///     output.assert_exit(2, "unknown command");
///     Ok(())
/// }
/// integration_test!(test_unknown_command);
/// ```
#[macro_export]
macro_rules! integration_test {
    ($fn_name:ident) => {
        ::paste::paste! {
            #[distributed_slice($crate::INTEGRATION_TESTS)]
            static [<$fn_name:upper>]: $crate::IntegrationTest =
                $crate::IntegrationTest::new(stringify!($fn_name), $fn_name);
        }
    };
}

/// The network for test domains, from `VUTILS_TEST_NETWORK` or `default`
pub fn test_network() -> String {
    std::env::var(NETWORK_ENV).unwrap_or_else(|_| "default".to_string())
}

/// The pool for test volumes, from `VUTILS_TEST_POOL` or `default`
pub fn test_pool() -> String {
    std::env::var(POOL_ENV).unwrap_or_else(|_| "default".to_string())
}

/// A fresh, unique name for a test domain or volume
pub fn unique_resource_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", TEST_RESOURCE_PREFIX, &id[..12])
}

/// Whether `name` was created by [`unique_resource_name`]
pub fn is_test_resource(name: &str) -> bool {
    name.strip_prefix(TEST_RESOURCE_PREFIX)
        .is_some_and(|id| !id.is_empty())
}

/// A random locally administered MAC in the QEMU `52:54:00` range
pub fn random_mac() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    format!("52:54:00:{:02x}:{:02x}:{:02x}", bytes[0], bytes[1], bytes[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_resource_names() {
        let a = unique_resource_name();
        let b = unique_resource_name();
        assert_ne!(a, b);
        assert!(is_test_resource(&a));
        assert_eq!(a.len(), TEST_RESOURCE_PREFIX.len() + 12);
    }

    #[test]
    fn test_is_test_resource() {
        assert!(!is_test_resource("vutils-it-"));
        assert!(!is_test_resource("hostA"));
        assert!(!is_test_resource("xvutils-it-abc"));
    }

    #[test]
    fn test_random_mac() {
        let mac = random_mac();
        assert!(mac.starts_with("52:54:00:"));
        assert_eq!(mac.len(), 17);
    }
}

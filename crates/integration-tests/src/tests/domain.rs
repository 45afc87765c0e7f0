//! Domain lifecycle against a live hypervisor
//!
//! - `domain-create` defines and starts a minimal emulated domain
//! - `domain-find`/`domain-get` resolve it by MAC and by name
//! - `domain-delete` removes it, and succeeds again once it is gone

use color_eyre::Result;
use integration_tests::{random_mac, test_network, unique_resource_name};
use linkme::distributed_slice;
use serde_json::{json, Value};
use vutils::descriptor::DomainDescriptor;

use crate::{integration_test, path_arg, run_vutils, run_vutils_ok, write_descriptor};

/// Deletes the domain when dropped so failed assertions don't leak it
struct DomainGuard(String);

impl Drop for DomainGuard {
    fn drop(&mut self) {
        let _ = run_vutils(&["domain-delete", "--name", &self.0]);
    }
}

fn test_domain_lifecycle() -> Result<()> {
    let name = unique_resource_name();
    let mac = random_mac();
    let network = test_network();
    let xml = DomainDescriptor::new(&name)
        .with_type("qemu")
        .with_interface(&network, &mac)
        .to_xml()?;
    let descriptor = write_descriptor(&xml)?;

    let guard = DomainGuard(name.clone());
    let created = run_vutils_ok(&["domain-create", "--xmlconfig", path_arg(&descriptor)?])?;
    assert_eq!(created["changed"], json!(true));
    assert_eq!(created["content"], json!(name));

    let state = run_vutils_ok(&["domain-state", "--name", &name])?;
    assert_eq!(state["content"], json!("running"));
    assert_eq!(state["changed"], json!(false));

    let found = run_vutils_ok(&["domain-find", "--mac", &mac, "--network", &network])?;
    assert_eq!(found["content"], json!(name));

    let got = run_vutils_ok(&["domain-get", "--name", &name, "--network", &network])?;
    assert_eq!(got["content"], json!(mac));

    let deleted = run_vutils_ok(&["domain-delete", "--name", &name])?;
    assert_eq!(deleted["changed"], json!(true));
    drop(guard);

    let state = run_vutils_ok(&["domain-state", "--name", &name])?;
    assert_eq!(state["content"], Value::Null);
    Ok(())
}
integration_test!(test_domain_lifecycle);

fn test_domain_delete_missing() -> Result<()> {
    let name = unique_resource_name();
    let deleted = run_vutils_ok(&["domain-delete", "--name", &name])?;
    assert_eq!(
        deleted,
        json!({"changed": true, "success": true, "content": null})
    );
    Ok(())
}
integration_test!(test_domain_delete_missing);

fn test_domain_find_unknown_mac() -> Result<()> {
    let output = run_vutils(&[
        "domain-find",
        "--mac",
        "52:54:00:ff:ff:fe",
        "--network",
        "vutils-it-no-such-network",
    ])?;
    output.assert_exit(2, "domain-find");
    assert_eq!(
        output.envelope()?,
        json!({"changed": false, "success": false, "content": null})
    );
    Ok(())
}
integration_test!(test_domain_find_unknown_mac);

fn test_domain_state_strict_missing() -> Result<()> {
    let name = unique_resource_name();
    let output = run_vutils(&["--lookup-policy", "strict", "domain-state", "--name", &name])?;
    output.assert_exit(1, "strict domain-state");
    assert!(output.stdout.is_empty());
    assert!(
        output.stderr.contains(&format!("domain '{}' not found", name)),
        "{}",
        output.stderr
    );
    Ok(())
}
integration_test!(test_domain_state_strict_missing);

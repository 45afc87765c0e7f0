//! The raw `call` entry point used by automation

use color_eyre::Result;
use integration_tests::test_network;
use linkme::distributed_slice;
use serde_json::json;
use vutils::envelope::UNKNOWN_COMMAND;

use crate::{integration_test, run_vutils};

fn test_unknown_command() -> Result<()> {
    let output = run_vutils(&["call", "domain_reboot", "--data", r#"{"name": "x"}"#])?;
    output.assert_exit(2, "unknown command");
    assert_eq!(
        output.envelope()?,
        json!({"changed": false, "success": false, "content": UNKNOWN_COMMAND})
    );
    Ok(())
}
integration_test!(test_unknown_command);

fn test_missing_parameter() -> Result<()> {
    let output = run_vutils(&["call", "domain_state", "--data", r#"{"name": ""}"#])?;
    output.assert_exit(1, "missing parameter");
    assert!(output.stdout.is_empty());
    assert!(
        output.stderr.contains("missing required parameter: name"),
        "{}",
        output.stderr
    );
    Ok(())
}
integration_test!(test_missing_parameter);

fn test_debug_diagnostics() -> Result<()> {
    let data = json!({"mac": "52:54:00:ff:ff:fd", "network": test_network()}).to_string();
    let output = run_vutils(&["--debug", "call", "domain_find", "--data", &data])?;
    output.assert_exit(2, "domain_find of unused MAC");
    let envelope = output.envelope()?;
    assert_eq!(envelope["debug"]["cmd"], json!("domain_find"));
    assert_eq!(envelope["debug"]["data"]["mac"], json!("52:54:00:ff:ff:fd"));
    assert!(envelope["debug"]["domains_scanned"].is_u64());
    Ok(())
}
integration_test!(test_debug_diagnostics);

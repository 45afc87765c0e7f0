//! The uniform result returned by every command, and its debug diagnostics

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Content reported for a command name no handler is registered for
pub const UNKNOWN_COMMAND: &str = "cmd call error - unknown command";

/// `{changed, success, content, debug?}` as consumed by the automation layer
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResultEnvelope {
    /// Whether hypervisor state was mutated
    pub changed: bool,
    /// Whether the operation completed without a fatal error
    pub success: bool,
    /// Payload; null when nothing was found or the command failed
    pub content: Option<Value>,
    /// Diagnostics, present only in debug mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Diagnostics>,
}

impl ResultEnvelope {
    /// A successful mutating command
    pub fn changed(content: Option<String>) -> Self {
        Self {
            changed: true,
            success: true,
            content: content.map(Value::String),
            debug: None,
        }
    }

    /// A successful read-only command
    pub fn read(content: Option<String>) -> Self {
        Self {
            changed: false,
            success: true,
            content: content.map(Value::String),
            debug: None,
        }
    }

    /// An unsuccessful command; `changed` records whether state was touched
    /// before the failure.
    pub fn failed(changed: bool) -> Self {
        Self {
            changed,
            success: false,
            content: None,
            debug: None,
        }
    }

    /// The result for an unrecognized command name
    pub fn unknown_command() -> Self {
        Self {
            changed: false,
            success: false,
            content: Some(Value::String(UNKNOWN_COMMAND.to_string())),
            debug: None,
        }
    }

    /// Attach diagnostics if they were collected
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        if diagnostics.enabled {
            self.debug = Some(diagnostics);
        }
        self
    }
}

/// Ordered debug key/value pairs collected over one call.
///
/// Only collects when enabled at construction. A key, once recorded, keeps
/// its first value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    enabled: bool,
    entries: Vec<(String, Value)>,
}

impl Diagnostics {
    /// Create a collector; a disabled one drops every record
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    /// Record `key` unless it is already present
    pub fn record(&mut self, key: &str, value: impl Into<Value>) {
        if !self.enabled {
            return;
        }
        if self.get(key).is_some() {
            tracing::trace!("Diagnostic '{}' already recorded", key);
            return;
        }
        self.entries.push((key.to_string(), value.into()));
    }

    /// Look up a recorded value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

}

impl Serialize for Diagnostics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use similar_asserts::assert_eq;

    #[test]
    fn test_envelope_json_without_debug() {
        let env = ResultEnvelope::read(Some("hostA".into()));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"changed": false, "success": true, "content": "hostA"})
        );

        let env = ResultEnvelope::failed(false).with_diagnostics(Diagnostics::new(false));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"changed": false, "success": false, "content": null})
        );
    }

    #[test]
    fn test_unknown_command() {
        let env = ResultEnvelope::unknown_command();
        assert!(!env.success);
        assert!(!env.changed);
        assert_eq!(env.content, Some(json!(UNKNOWN_COMMAND)));
    }

    #[test]
    fn test_diagnostics_first_value_kept_in_order() {
        let mut diags = Diagnostics::new(true);
        diags.record("cmd", "domain_find");
        diags.record("domains_scanned", 2);
        diags.record("cmd", "other");

        assert_eq!(diags.get("cmd"), Some(&json!("domain_find")));

        let env = ResultEnvelope::changed(None).with_diagnostics(diags);
        assert_eq!(
            serde_json::to_string(&env).unwrap(),
            r#"{"changed":true,"success":true,"content":null,"debug":{"cmd":"domain_find","domains_scanned":2}}"#
        );
    }

    #[test]
    fn test_disabled_diagnostics_drop_records() {
        let mut diags = Diagnostics::new(false);
        diags.record("cmd", "domain_state");
        assert_eq!(diags.get("cmd"), None);
    }
}

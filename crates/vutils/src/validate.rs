//! Required-field validation for request parameters

use serde_json::Value;

use crate::errors::CommandError;

/// Reject the request unless every `(field, value)` pair is present.
///
/// A value fails if it is absent, JSON null, an empty string, or an object
/// with an empty key. The first failing field aborts the whole check.
pub fn check_required(fields: &[(&str, Option<&Value>)]) -> Result<(), CommandError> {
    for (field, value) in fields {
        if !is_present(*value) {
            return Err(CommandError::MissingParameter(field.to_string()));
        }
    }
    Ok(())
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Object(map)) => map.keys().all(|k| !k.is_empty()),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_present() {
        let mac = json!("52:54:00:aa:bb:cc");
        let network = json!("br0_net");
        check_required(&[("mac", Some(&mac)), ("network", Some(&network))]).unwrap();
    }

    #[test]
    fn test_first_failure_wins() {
        let null = Value::Null;
        let err = check_required(&[("name", None), ("pool", Some(&null))]).unwrap_err();
        assert!(matches!(err, CommandError::MissingParameter(ref f) if f == "name"));

        let name = json!("v1");
        let err = check_required(&[("name", Some(&name)), ("pool", Some(&null))]).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter: pool");
    }

    #[test]
    fn test_empty_string() {
        let empty = json!("");
        assert!(check_required(&[("xmlconfig", Some(&empty))]).is_err());
    }

    #[test]
    fn test_mapping_keys() {
        let good = json!({"a": null});
        check_required(&[("data", Some(&good))]).unwrap();
        let bad = json!({"a": 1, "": 2});
        assert!(check_required(&[("data", Some(&bad))]).is_err());
    }

    #[test]
    fn test_other_scalars_present() {
        let zero = json!(0);
        let f = json!(false);
        check_required(&[("a", Some(&zero)), ("b", Some(&f))]).unwrap();
    }
}

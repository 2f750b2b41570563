//! API token access policies.
//!
//! A policy is a JSON object restricting which HTTP methods a token may use
//! on which resources:
//!
//! ```json
//! {
//!     "resources": {
//!         "*": {"allow": ["GET", "HEAD", "OPTIONS"]},
//!         "review": {
//!             "*": {"block": ["*"]},
//!             "42": {"allow": ["PUT"]}
//!         }
//!     }
//! }
//! ```
//!
//! An empty object places no restrictions on the token.

use serde_json::{Map, Value};

/// Resource policy IDs that may appear under `resources`.
pub const POLICY_IDS: &[&str] = &[
    "api_token",
    "draft_filediff",
    "review",
    "review_request",
    "root",
    "user",
];

const HTTP_METHODS: &[&str] = &["*", "DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];

/// Check a decoded policy's structure.
///
/// Returns a human-readable message describing the first problem found.
pub fn validate_policy(policy: &Value) -> Result<(), String> {
    let Value::Object(policy) = policy else {
        return Err("The policy must be a JSON object.".to_string());
    };

    if policy.is_empty() {
        return Ok(());
    }

    let resources = match policy.get("resources") {
        None => return Err("The policy is missing a \"resources\" section.".to_string()),
        Some(Value::Object(resources)) => resources,
        Some(_) => {
            return Err("The policy's \"resources\" section must be a JSON object.".to_string())
        }
    };

    if resources.is_empty() {
        return Err("The policy's \"resources\" section must not be empty.".to_string());
    }

    for (policy_id, value) in resources {
        if policy_id == "*" {
            validate_section(value, "resources.*")?;
            continue;
        }

        if !POLICY_IDS.contains(&policy_id.as_str()) {
            return Err(format!(
                "\"{}\" is not a valid resource policy ID.",
                policy_id
            ));
        }

        let full_name = format!("resources.{}", policy_id);
        let Value::Object(sections) = value else {
            return Err(format!("\"{}\" must be a JSON object.", full_name));
        };

        for (object_id, section) in sections {
            validate_section(section, &format!("{}.{}", full_name, object_id))?;
        }
    }

    Ok(())
}

fn validate_section(section: &Value, full_name: &str) -> Result<(), String> {
    let Value::Object(section) = section else {
        return Err(format!("\"{}\" must be a JSON object.", full_name));
    };

    if !section.contains_key("allow") && !section.contains_key("block") {
        return Err(format!(
            "\"{}\" must have \"allow\" and/or \"block\" lists.",
            full_name
        ));
    }

    for list_name in ["allow", "block"] {
        let Some(list) = section.get(list_name) else {
            continue;
        };

        let Value::Array(methods) = list else {
            return Err(format!(
                "\"{}.{}\" must be a list of HTTP methods.",
                full_name, list_name
            ));
        };

        for method in methods {
            match method.as_str() {
                Some(m) if HTTP_METHODS.contains(&m) => {}
                _ => {
                    return Err(format!(
                        "\"{}.{}\" contains an invalid HTTP method: {}",
                        full_name, list_name, method
                    ))
                }
            }
        }
    }

    Ok(())
}

/// Decide whether a policy permits `method` on a resource.
///
/// The most specific section wins: the object's own section, then the
/// resource's `*` section, then the global `*` section. A section that
/// mentions neither the method nor `*` defers to the next one. When no
/// section decides, only an empty policy allows.
pub fn is_access_allowed(
    policy: &Map<String, Value>,
    policy_id: &str,
    method: &str,
    object_id: Option<&str>,
) -> bool {
    if policy.is_empty() {
        return true;
    }

    let Some(Value::Object(resources)) = policy.get("resources") else {
        return false;
    };

    let resource = resources.get(policy_id);
    let candidates = [
        object_id.and_then(|id| resource.and_then(|r| r.get(id))),
        resource.and_then(|r| r.get("*")),
        resources.get("*"),
    ];

    let method = method.to_ascii_uppercase();

    candidates
        .into_iter()
        .flatten()
        .find_map(|section| section_decision(section, &method))
        .unwrap_or(false)
}

fn section_decision(section: &Value, method: &str) -> Option<bool> {
    let lists = |name: &str, needle: &str| {
        section
            .get(name)
            .and_then(Value::as_array)
            .is_some_and(|methods| methods.iter().any(|m| m.as_str() == Some(needle)))
    };

    if lists("block", method) {
        Some(false)
    } else if lists("allow", method) {
        Some(true)
    } else if lists("block", "*") {
        Some(false)
    } else if lists("allow", "*") {
        Some(true)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_empty_policy_is_valid_and_unrestricted() {
        assert!(validate_policy(&json!({})).is_ok());
        assert!(is_access_allowed(&Map::new(), "review", "DELETE", Some("1")));
    }

    #[test]
    fn test_rejects_non_object() {
        assert_eq!(
            validate_policy(&json!([])).unwrap_err(),
            "The policy must be a JSON object."
        );
    }

    #[test]
    fn test_rejects_missing_or_empty_resources() {
        assert!(validate_policy(&json!({"foo": {}}))
            .unwrap_err()
            .contains("missing a \"resources\" section"));
        assert!(validate_policy(&json!({"resources": {}}))
            .unwrap_err()
            .contains("must not be empty"));
        assert!(validate_policy(&json!({"resources": []}))
            .unwrap_err()
            .contains("must be a JSON object"));
    }

    #[test]
    fn test_rejects_unknown_policy_id() {
        let err = validate_policy(&json!({"resources": {"bogus": {"*": {"allow": ["*"]}}}}))
            .unwrap_err();
        assert_eq!(err, "\"bogus\" is not a valid resource policy ID.");
    }

    #[test]
    fn test_rejects_bad_sections() {
        assert!(validate_policy(&json!({"resources": {"*": {}}}))
            .unwrap_err()
            .contains("\"resources.*\" must have"));
        assert!(validate_policy(&json!({"resources": {"*": {"allow": "GET"}}}))
            .unwrap_err()
            .contains("\"resources.*.allow\" must be a list"));
        assert!(validate_policy(&json!({"resources": {"review": {"*": {"block": ["FETCH"]}}}}))
            .unwrap_err()
            .contains("invalid HTTP method"));
    }

    #[test]
    fn test_read_only_policy() {
        let policy = as_map(json!({"resources": {"*": {"allow": ["GET", "HEAD", "OPTIONS"]}}}));
        assert!(validate_policy(&Value::Object(policy.clone())).is_ok());

        assert!(is_access_allowed(&policy, "review", "GET", None));
        assert!(is_access_allowed(&policy, "review", "get", Some("3")));
        assert!(!is_access_allowed(&policy, "review", "PUT", Some("3")));
    }

    #[test]
    fn test_specific_object_overrides_resource_wildcard() {
        let policy = as_map(json!({
            "resources": {
                "*": {"allow": ["*"]},
                "review": {
                    "*": {"block": ["*"]},
                    "42": {"allow": ["PUT"]}
                }
            }
        }));

        assert!(is_access_allowed(&policy, "review", "PUT", Some("42")));
        assert!(!is_access_allowed(&policy, "review", "GET", Some("42")));
        assert!(!is_access_allowed(&policy, "review", "PUT", Some("7")));
        assert!(is_access_allowed(&policy, "user", "DELETE", None));
    }

    #[test]
    fn test_explicit_method_beats_wildcard_in_same_section() {
        let policy = as_map(json!({"resources": {"*": {"allow": ["*"], "block": ["DELETE"]}}}));
        assert!(!is_access_allowed(&policy, "review", "DELETE", None));
        assert!(is_access_allowed(&policy, "review", "POST", None));
    }

    #[test]
    fn test_undecided_non_empty_policy_denies() {
        let policy = as_map(json!({"resources": {"review": {"*": {"allow": ["GET"]}}}}));
        assert!(!is_access_allowed(&policy, "user", "GET", None));
    }
}

//! Tool-call validation, one-pass argument repair, and output capping (C4).
//!
//! Schema checks run against a tool's `parameters` JSON Schema. When a call
//! fails validation we attempt exactly one repair pass — drop unknown keys,
//! coerce JSON-string primitives to their declared type, fill in schema
//! defaults — then re-validate. A call that still fails is rejected rather
//! than retried further.

use art_domain::error::{Error, Result};
use art_domain::tool::ToolDefinition;
use serde_json::{Map, Value};

pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;
const MAX_OUTPUT_BYTES: usize = 10 * 1024;

/// Validate `arguments` against `def.parameters`; repair once if invalid.
pub fn validate_and_repair(def: &ToolDefinition, arguments: &Value) -> Result<Value> {
    let schema = match jsonschema::JSONSchema::compile(&def.parameters) {
        // A tool with a malformed schema can't be validated; pass the
        // arguments through unchanged rather than blocking the call.
        Err(_) => return Ok(arguments.clone()),
        Ok(s) => s,
    };

    if schema.is_valid(arguments) {
        return Ok(arguments.clone());
    }

    let repaired = repair_once(&def.parameters, arguments);
    if schema.is_valid(&repaired) {
        return Ok(repaired);
    }

    Err(Error::InvalidArguments(format!(
        "arguments for tool \"{}\" failed schema validation",
        def.name
    )))
}

fn repair_once(schema: &Value, arguments: &Value) -> Value {
    let mut obj: Map<String, Value> = arguments.as_object().cloned().unwrap_or_default();

    let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Value::Object(obj);
    };

    // Drop keys the schema doesn't recognize.
    obj.retain(|k, _| props.contains_key(k));

    for (key, prop_schema) in props {
        let expected_type = prop_schema.get("type").and_then(|t| t.as_str());
        match obj.get(key) {
            Some(v) => {
                if let Some(coerced) = coerce_primitive(v, expected_type) {
                    obj.insert(key.clone(), coerced);
                }
            }
            None => {
                if let Some(default) = prop_schema.get("default") {
                    obj.insert(key.clone(), default.clone());
                }
            }
        }
    }

    Value::Object(obj)
}

/// Coerce a JSON string holding a primitive (`"5"`, `"true"`) to the type
/// its schema declares. Returns `None` when no coercion applies.
fn coerce_primitive(value: &Value, expected_type: Option<&str>) -> Option<Value> {
    let s = value.as_str()?;
    match expected_type {
        Some("integer") => s.trim().parse::<i64>().ok().map(Value::from),
        Some("number") => s.trim().parse::<f64>().ok().map(Value::from),
        Some("boolean") => s.trim().parse::<bool>().ok().map(Value::from),
        _ => None,
    }
}

/// Truncate a tool's output to the 10 KiB cap, returning whether it was cut.
pub fn cap_output(output: String) -> (String, bool) {
    if output.len() <= MAX_OUTPUT_BYTES {
        return (output, false);
    }
    let mut end = MAX_OUTPUT_BYTES;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = output[..end].to_string();
    truncated.push_str("\n...[truncated]");
    (truncated, true)
}

pub fn timeout_ms(def: &ToolDefinition) -> u64 {
    def.timeout_ms.unwrap_or(DEFAULT_TOOL_TIMEOUT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(parameters: Value) -> ToolDefinition {
        ToolDefinition::new("t", "test tool", parameters)
    }

    #[test]
    fn passes_through_already_valid_arguments() {
        let d = def(serde_json::json!({
            "type": "object",
            "properties": { "x": { "type": "integer" } },
            "required": ["x"]
        }));
        let out = validate_and_repair(&d, &serde_json::json!({ "x": 5 })).unwrap();
        assert_eq!(out, serde_json::json!({ "x": 5 }));
    }

    #[test]
    fn drops_unknown_keys_and_coerces_string_integer() {
        let d = def(serde_json::json!({
            "type": "object",
            "properties": { "x": { "type": "integer" } },
            "required": ["x"]
        }));
        let out = validate_and_repair(&d, &serde_json::json!({ "x": "5", "bogus": true })).unwrap();
        assert_eq!(out, serde_json::json!({ "x": 5 }));
    }

    #[test]
    fn fills_schema_default_for_missing_key() {
        let d = def(serde_json::json!({
            "type": "object",
            "properties": { "limit": { "type": "integer", "default": 10 } }
        }));
        let out = validate_and_repair(&d, &serde_json::json!({})).unwrap();
        assert_eq!(out, serde_json::json!({ "limit": 10 }));
    }

    #[test]
    fn rejects_arguments_that_cannot_be_repaired() {
        let d = def(serde_json::json!({
            "type": "object",
            "properties": { "x": { "type": "integer" } },
            "required": ["x"]
        }));
        assert!(validate_and_repair(&d, &serde_json::json!({ "x": "not a number" })).is_err());
    }

    #[test]
    fn cap_output_leaves_small_output_untouched() {
        let (out, truncated) = cap_output("hello".to_string());
        assert_eq!(out, "hello");
        assert!(!truncated);
    }

    #[test]
    fn cap_output_truncates_oversized_output() {
        let big = "a".repeat(MAX_OUTPUT_BYTES + 500);
        let (out, truncated) = cap_output(big);
        assert!(truncated);
        assert!(out.len() <= MAX_OUTPUT_BYTES + "\n...[truncated]".len());
    }

    #[test]
    fn timeout_ms_falls_back_to_default() {
        let d = def(serde_json::json!({"type": "object"}));
        assert_eq!(timeout_ms(&d), DEFAULT_TOOL_TIMEOUT_MS);
    }
}

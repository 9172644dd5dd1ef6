//! JSON Schema cleaning for tool parameter schemas (spec §4.2.1): strip
//! fields the upstream rejects, flatten enum-only `anyOf`s.

use serde_json::{Map, Value};

/// Top-level keys stripped unconditionally.
const TOP_LEVEL_STRIP: &[&str] = &["additionalProperties", "strict", "$schema"];
/// Keys stripped from inner (nested) schema objects only when their value is null.
const NULLABLE_INNER_STRIP: &[&str] = &["default", "nullable", "title", "example"];

/// Recursively cleans a JSON Schema for use as a Gemini `functionDeclarations`
/// parameter schema. Idempotent: running it twice never reintroduces a
/// stripped key.
pub fn clean_json_schema(schema: &Value) -> Value {
    clean_inner(schema, true)
}

fn clean_inner(value: &Value, is_top_level: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (key, val) in map {
                if TOP_LEVEL_STRIP.contains(&key.as_str()) {
                    continue;
                }
                if !is_top_level && NULLABLE_INNER_STRIP.contains(&key.as_str()) && val.is_null() {
                    continue;
                }
                if key == "anyOf" {
                    if let Some(flattened) = try_flatten_enum_any_of(val) {
                        cleaned.insert("enum".to_string(), flattened);
                        continue;
                    }
                }
                cleaned.insert(key.clone(), clean_inner(val, false));
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| clean_inner(v, false)).collect()),
        other => other.clone(),
    }
}

/// `anyOf` of enum-only variants is flattened into a single `enum`. Returns
/// `None` (leave `anyOf` alone) unless every branch is an enum-only object.
fn try_flatten_enum_any_of(any_of: &Value) -> Option<Value> {
    let branches = any_of.as_array()?;
    if branches.is_empty() {
        return None;
    }

    let mut values = Vec::new();
    for branch in branches {
        let obj = branch.as_object()?;
        let enum_values = obj.get("enum")?.as_array()?;
        // Only flatten when the branch carries nothing besides `enum` (and
        // optionally `type`) — otherwise it's not "enum-only".
        let extra_keys = obj.keys().filter(|k| k.as_str() != "enum" && k.as_str() != "type").count();
        if extra_keys > 0 {
            return None;
        }
        values.extend(enum_values.iter().cloned());
    }

    Some(Value::Array(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_additional_properties_strict_and_schema() {
        let input = json!({
            "type": "object",
            "additionalProperties": false,
            "strict": true,
            "$schema": "http://json-schema.org/draft-07/schema#",
            "properties": { "x": { "type": "string" } }
        });
        let cleaned = clean_json_schema(&input);
        assert!(cleaned.get("additionalProperties").is_none());
        assert!(cleaned.get("strict").is_none());
        assert!(cleaned.get("$schema").is_none());
    }

    #[test]
    fn strips_null_nullable_fields_from_inner_schema_only() {
        let input = json!({
            "type": "object",
            "properties": {
                "x": { "type": "string", "default": null, "nullable": null, "title": null }
            }
        });
        let cleaned = clean_json_schema(&input);
        let inner = &cleaned["properties"]["x"];
        assert!(inner.get("default").is_none());
        assert!(inner.get("nullable").is_none());
        assert!(inner.get("title").is_none());
    }

    #[test]
    fn flattens_any_of_of_enum_only_variants() {
        let input = json!({
            "anyOf": [
                { "enum": ["a", "b"] },
                { "enum": ["c"] }
            ]
        });
        let cleaned = clean_json_schema(&input);
        assert_eq!(cleaned["enum"], json!(["a", "b", "c"]));
        assert!(cleaned.get("anyOf").is_none());
    }

    #[test]
    fn leaves_any_of_alone_when_not_enum_only() {
        let input = json!({
            "anyOf": [
                { "type": "string" },
                { "type": "number" }
            ]
        });
        let cleaned = clean_json_schema(&input);
        assert!(cleaned.get("anyOf").is_some());
    }

    #[test]
    fn idempotent_never_reintroduces_stripped_keys() {
        let input = json!({
            "additionalProperties": false,
            "strict": true,
            "properties": { "x": { "default": null } }
        });
        let once = clean_json_schema(&input);
        let twice = clean_json_schema(&once);
        assert_eq!(once, twice);
    }
}

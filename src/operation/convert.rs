//! Converters shared by operations
//!
//! Request adapters often deliver arrays as index-keyed objects (`{"0": a, "1": b}`) or as JSON
//! strings. These helpers normalise such raw values and compose inside a
//! [`ParamSpec::convert_with`](super::ParamSpec::convert_with) closure.

use serde_json::Value;

/// Turn an index-keyed object into an array of its non-null values
///
/// Any other value is returned unchanged.
pub fn ensure_array(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Array(
            map.into_iter()
                .map(|(_, v)| v)
                .filter(|v| !v.is_null())
                .collect(),
        ),
        other => other,
    }
}

/// Parse string values as JSON, pass everything else through
pub fn parse_json(value: Value) -> Result<Value, String> {
    match value {
        Value::String(raw) => serde_json::from_str(&raw).map_err(|err| err.to_string()),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use serde_json::json;
    use speculoos::prelude::*;

    #[rstest]
    #[case(json!({"0": "a", "1": null, "2": "c"}), json!(["a", "c"]))]
    #[case(json!(["a", "b"]), json!(["a", "b"]))]
    #[case(json!("a"), json!("a"))]
    fn test_ensure_array(#[case] input: Value, #[case] expected: Value) {
        assert_that!(ensure_array(input)).is_equal_to(expected);
    }

    #[test]
    fn test_ensure_array_keeps_insertion_order() {
        let raw: Value = serde_json::from_str(r#"{"2": "b", "10": "c", "1": "a"}"#).unwrap();

        assert_that!(ensure_array(raw)).is_equal_to(json!(["b", "c", "a"]));
    }

    #[rstest]
    #[case(json!("[1, 2]"), json!([1, 2]))]
    #[case(json!([1, 2]), json!([1, 2]))]
    #[case(json!(null), json!(null))]
    fn test_parse_json(#[case] input: Value, #[case] expected: Value) {
        assert_that!(parse_json(input)).is_ok().is_equal_to(expected);
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        assert_that!(parse_json(json!("{not json"))).is_err();
    }
}

//! Turns inbound request bodies into operation input

use serde_json::Value;

use crate::operation::{Input, InputError};

/// Keyword mapping from a JSON object body
///
/// Keeps only `keys` when any are given and drops null values, so absent and null parameters
/// both fall back to their defaults.
pub fn param_hash(body: Value, keys: &[&str]) -> Result<Input, InputError> {
    let Value::Object(params) = body else {
        return Err(InputError::InvalidParameter {
            name: "body".to_string(),
            reason: "expected a JSON object".to_string(),
        });
    };

    Ok(params
        .into_iter()
        .filter(|(key, value)| {
            !value.is_null() && (keys.is_empty() || keys.contains(&key.as_str()))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use speculoos::prelude::*;

    #[test]
    fn test_param_hash() {
        let body = json!({"members": [{"email": "a@x.com"}], "note": null, "debug": true});

        let all = param_hash(body.clone(), &[]);
        let sliced = param_hash(body, &["members", "note"]);

        assert_that!(all)
            .is_ok()
            .matches(|input| input.len() == 2 && !input.contains_key("note"));
        assert_that!(sliced)
            .is_ok()
            .matches(|input| input.len() == 1 && input.contains_key("members"));
    }

    #[test]
    fn test_param_hash_rejects_non_objects() {
        assert_that!(param_hash(json!([1, 2]), &[])).is_err();
    }
}

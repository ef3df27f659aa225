use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Surrogate stored in place of an absent attribute so that null and empty
/// string produce different digests.
pub const NULL_SURROGATE: &str = "_strata_null_";

/// Computes the content fingerprint of an ordered attribute list.
///
/// The attribute names fix the hashing domain (the list is declared once per
/// entity at configuration time); only the values, joined with `|` and with
/// nulls replaced by [`NULL_SURROGATE`], feed the digest. The output is a
/// `0x`-prefixed SHA-256 hex string, stable across runs for identical input.
///
/// A collision between two distinct payloads is silently treated as "no
/// change" downstream. There is no detection or recovery path; this is an
/// accepted risk, not an error condition.
pub fn fingerprint(attributes: &[(&str, Option<&str>)]) -> String {
    let mut joined = String::new();
    for (idx, (_, value)) in attributes.iter().enumerate() {
        if idx > 0 {
            joined.push('|');
        }
        joined.push_str(value.unwrap_or(NULL_SURROGATE));
    }
    format!("0x{}", hex::encode(Sha256::digest(joined.as_bytes())))
}

/// Fingerprints a payload row against a configured, ordered column list.
///
/// Columns absent from the payload hash like nulls, so adding a column to the
/// configuration changes the domain for future observations without touching
/// hashes already stored.
pub fn fingerprint_row(columns: &[String], payload: &Map<String, Value>) -> String {
    let mut joined = String::new();
    for (idx, column) in columns.iter().enumerate() {
        if idx > 0 {
            joined.push('|');
        }
        match payload.get(column).and_then(value_text) {
            Some(text) => joined.push_str(&text),
            None => joined.push_str(NULL_SURROGATE),
        }
    }
    format!("0x{}", hex::encode(Sha256::digest(joined.as_bytes())))
}

/// Renders a scalar JSON value as the text used for hashing and hook values.
/// Nulls and non-scalar values yield `None`.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

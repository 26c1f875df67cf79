//! Content-addressed hashing.
//!
//! Every derived artifact's `content_hash`/`input_hash`/`file_hash` is a
//! `sha256:`-prefixed lowercase hex digest. Hashing JSON values first
//! canonicalizes them (sorted keys) so identical logical content always
//! hashes identically regardless of construction order.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Regex-equivalent check: `^sha256:[0-9a-f]{64}$` without pulling in `regex`
/// for a single fixed-format check.
pub fn is_valid_hash(s: &str) -> bool {
    match s.strip_prefix("sha256:") {
        Some(hex) => hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()),
        None => false,
    }
}

/// Hash raw bytes, producing a `sha256:`-prefixed lowercase hex digest.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Hash a UTF-8 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash a file's contents. `hash_bytes(read(path)) == hash_file(path)` is a
/// required round-trip law.
pub fn hash_file(path: &std::path::Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// Canonicalize a JSON value by sorting object keys recursively. Arrays
/// retain order (order is semantically meaningful for e.g. `parent_ids`).
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize a JSON value canonically (sorted keys) for hashing or storage.
pub fn canonical_json_string(value: &Value) -> String {
    // serde_json::to_string on a pre-sorted Map preserves insertion order,
    // which is what we want after `canonicalize`.
    serde_json::to_string(&canonicalize(value)).expect("canonicalized value is always valid JSON")
}

/// Hash a JSON value's canonical encoding. Used for `content_hash` whenever
/// the artifact is a structured value rather than raw text/bytes.
pub fn hash_json(value: &Value) -> String {
    hash_str(&canonical_json_string(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_format() {
        let h = hash_str("hello world");
        assert!(is_valid_hash(&h));
        assert_eq!(h.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_is_valid_hash_rejects_garbage() {
        assert!(!is_valid_hash("not-a-hash"));
        assert!(!is_valid_hash("sha256:tooShort"));
        assert!(!is_valid_hash(&format!("sha256:{}", "A".repeat(64))));
    }

    #[test]
    fn test_canonical_json_is_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json_string(&a), canonical_json_string(&b));
        assert_eq!(hash_json(&a), hash_json(&b));
    }

    #[test]
    fn test_hash_deterministic_for_identical_input() {
        let text = "The house is near the river and the park";
        assert_eq!(hash_str(text), hash_str(text));
    }

    #[test]
    fn test_hash_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, b"hello provenance").unwrap();
        let from_file = hash_file(&path).unwrap();
        let from_bytes = hash_bytes(&std::fs::read(&path).unwrap());
        assert_eq!(from_file, from_bytes);
    }
}

//! Canonical forms shared by every exported value object.
//!
//! Floats leave the crate rounded to 4 decimal places, and anything that is
//! hashed is first rendered as JSON with object keys sorted, so equal field
//! values always produce equal digests.

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Free-form metadata attached to nodes, edges and audit entries.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Round a value to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Serde helper: serialize an `f64` rounded to 4 decimal places.
pub fn serialize_round4<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(round4(*value))
}

/// Render a value as compact JSON with object keys in sorted order.
///
/// Going through `serde_json::Value` sorts keys because its map type is
/// ordered by key.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_value(value).map(|v| v.to_string())
}

/// Compute SHA-256 of arbitrary bytes and return the lowercase hex digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Clamp an aggregate into the unit interval.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Whether a value is a finite number within `[0, 1]`.
pub(crate) fn is_unit(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round4(0.75), 0.75);
        assert_eq!(round4(round4(0.999_349_9)), round4(0.999_349_9));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = json!({"zeta": 1, "alpha": {"b": 2, "a": 1}});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"alpha":{"a":1,"b":2},"zeta":1}"#
        );
    }

    #[test]
    fn test_sha256_hex_empty() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_is_unit() {
        assert!(is_unit(0.0));
        assert!(is_unit(1.0));
        assert!(!is_unit(1.0001));
        assert!(!is_unit(-0.1));
        assert!(!is_unit(f64::NAN));
    }
}

//! # Encoding Helpers
//!
//! Pure, stateless conversions used by the envelope:
//! - alias labels to and from their trimmed hex form
//! - signature prefix handling and identity derivation
//! - canonical string form of structured signed values

use serde_json::Value;

/// Number of hex characters of the signature that make up an envelope identity.
pub const IDENTITY_HEX_LEN: usize = 40;

/// Strip a leading `0x`/`0X` from a hex string.
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Encode a UTF-8 label as lowercase hex with leading zero nibbles trimmed.
pub fn encode_alias(label: &str) -> String {
    hex::encode(label.as_bytes())
        .trim_start_matches('0')
        .to_string()
}

/// Decode a hex alias back into its UTF-8 label.
///
/// Accepts an optional `0x` prefix, odd lengths (left-padded), and NUL
/// padding from fixed-width encodings. Returns `None` for non-hex input
/// or invalid UTF-8.
pub fn decode_alias(encoded: &str) -> Option<String> {
    let digits = strip_hex_prefix(encoded);
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };

    let bytes = hex::decode(padded).ok()?;
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| *b != 0).map_or(start, |i| i + 1);

    String::from_utf8(bytes[start..end].to_vec()).ok()
}

/// Identity of a signature: its first 40 hex characters, prefix excluded.
pub fn identity_from_signature(signature: &str) -> String {
    strip_hex_prefix(signature)
        .chars()
        .take(IDENTITY_HEX_LEN)
        .collect()
}

/// Canonical string form of a signed value.
///
/// Strings pass through untouched; everything else becomes its JSON text.
/// Object keys come out sorted and numbers keep their literal digits.
pub fn canonicalize(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_hex_prefix() {
        assert_eq!(strip_hex_prefix("0xabc"), "abc");
        assert_eq!(strip_hex_prefix("0Xabc"), "abc");
        assert_eq!(strip_hex_prefix("abc"), "abc");
        // Only one prefix is removed
        assert_eq!(strip_hex_prefix("0x0xab"), "0xab");
    }

    #[test]
    fn test_encode_alias_is_lowercase_hex() {
        assert_eq!(encode_alias("alice"), "616c696365");
        assert_eq!(encode_alias(""), "");
    }

    #[test]
    fn test_encode_alias_trims_leading_zero_nibbles() {
        // "\u{1}" is 0x01
        assert_eq!(encode_alias("\u{1}a"), "161");
        assert_eq!(decode_alias("161").as_deref(), Some("\u{1}a"));
    }

    #[test]
    fn test_decode_alias_accepts_prefix_and_padding() {
        assert_eq!(decode_alias("0x616c696365").as_deref(), Some("alice"));
        assert_eq!(decode_alias("616C696365").as_deref(), Some("alice"));
        // bytes32-style right padding
        let padded = format!("{:0<64}", "616c696365");
        assert_eq!(decode_alias(&padded).as_deref(), Some("alice"));
    }

    #[test]
    fn test_decode_alias_rejects_garbage() {
        assert_eq!(decode_alias("zz"), None);
        // 0xff is not valid UTF-8 on its own
        assert_eq!(decode_alias("ff"), None);
    }

    #[test]
    fn test_alias_unicode_survives() {
        let label = "ålice ✓";
        assert_eq!(decode_alias(&encode_alias(label)).as_deref(), Some(label));
    }

    #[test]
    fn test_identity_takes_first_forty_hex_chars() {
        let sig = format!("0x{}{}", "ab".repeat(20), "cd".repeat(45));
        assert_eq!(identity_from_signature(&sig), "ab".repeat(20));
    }

    #[test]
    fn test_identity_of_short_signature_is_whole_signature() {
        assert_eq!(identity_from_signature("0xabc"), "abc");
    }

    #[test]
    fn test_canonicalize_values() {
        assert_eq!(canonicalize(&json!("hi")), "hi");
        assert_eq!(canonicalize(&json!(42)), "42");
        assert_eq!(canonicalize(&json!(true)), "true");
        assert_eq!(canonicalize(&json!(null)), "null");
        assert_eq!(canonicalize(&json!({"b": 1, "a": [1, "x"]})), r#"{"a":[1,"x"],"b":1}"#);
    }

    #[test]
    fn test_canonicalize_keeps_big_integer_digits() {
        let value: Value = serde_json::from_str("123456789012345678901234567890").unwrap();
        assert_eq!(canonicalize(&value), "123456789012345678901234567890");
    }
}

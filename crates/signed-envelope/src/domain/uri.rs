//! # URI Codec
//!
//! Query-string wire form of an envelope payload.
//!
//! ## Format
//!
//! ```text
//! https://host/path?_signed_name=hi&_signed_n=42&_params_sig=abc...
//!                   └─ prefix + field ─┘ └ value ┘
//! ```
//!
//! - The query portion is whatever follows the LATER of `?` and `#`
//! - Keys and values are percent-encoded with the `encodeURIComponent` set
//! - A decoded key is routed into every bucket whose prefix it contains as a
//!   substring, so one key can land in both buckets

use crate::domain::config::WireConfig;
use crate::domain::entities::Payload;
use crate::domain::errors::EnvelopeError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

/// Characters left unescaped by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Substring after the later of `?` and `#`, or the whole input when neither occurs.
pub fn query_portion(uri: &str) -> &str {
    let cut = [uri.rfind('?'), uri.rfind('#')].into_iter().flatten().max();
    match cut {
        Some(index) => &uri[index + 1..],
        None => uri,
    }
}

/// Decode a URI (or bare query string) into a payload.
pub fn decode_payload(uri: &str, config: &WireConfig) -> Result<Payload, EnvelopeError> {
    let mut payload = Payload::default();

    for pair in query_portion(uri).split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key)?;
        let value = decode_component(raw_value)?;

        let mut routed = false;
        for (prefix, bucket) in [
            (config.signed_prefix.as_str(), &mut payload.signed),
            (config.params_prefix.as_str(), &mut payload.params),
        ] {
            if let Some(index) = key.find(prefix) {
                bucket.insert(key[index + prefix.len()..].to_string(), value.clone());
                routed = true;
            }
        }

        if !routed {
            debug!(key = %key, "Query key matches no envelope bucket, skipping");
        }
    }

    Ok(payload)
}

/// Encode a payload as an `&`-joined query string (no leading `?`).
///
/// Signed fields come first, then params, each in key order.
pub fn encode_payload(payload: &Payload, config: &WireConfig) -> String {
    let signed = payload
        .signed
        .iter()
        .map(|(key, value)| (&config.signed_prefix, key, value));
    let params = payload
        .params
        .iter()
        .map(|(key, value)| (&config.params_prefix, key, value));

    signed
        .chain(params)
        .map(|(prefix, key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(&format!("{prefix}{key}"), URI_COMPONENT),
                utf8_percent_encode(value, URI_COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_component(raw: &str) -> Result<String, EnvelopeError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| EnvelopeError::MalformedUri(format!("{raw:?}: {e}")))
}

//! # Envelope
//!
//! Signed application data plus authorship params, with a derived
//! `verified` flag.
//!
//! ## Lifecycle
//!
//! ```text
//!   new / from_value / from_uri ──→ [unverified] ──sign/verify──→ [verified]
//!                                        ↑                            │
//!                                        └── add_signed / add_params ─┘
//!                                            set_author_alias / set_signature
//!                                            clear_signature
//! ```
//!
//! Every mutator that touches signed data or the `alias`/`sig` params drops
//! the verified flag itself; callers never have to remember to.
//!
//! Signing and verification live in [`crate::service`].

use crate::domain::config::WireConfig;
use crate::domain::encoding::{
    canonicalize, decode_alias, encode_alias, identity_from_signature, strip_hex_prefix,
};
use crate::domain::entities::{
    Params, Payload, SignedData, ADDRESS_PARAM, ALIAS_PARAM, SIG_PARAM,
};
use crate::domain::errors::EnvelopeError;
use crate::domain::uri;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A signed message envelope.
///
/// The envelope is a plain owned value. `sign`/`verify` take `&mut self`,
/// so one envelope can only have one service call in flight at a time.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    signed: SignedData,
    params: Params,
    verified: bool,
}

// =============================================================================
// Construction
// =============================================================================

impl Envelope {
    /// Create an empty, unverified envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an envelope from a structured value using the default wire format.
    ///
    /// - object with a `signed` or `params` bucket: buckets used directly
    /// - any other object: the whole object is the signed data
    /// - string: parsed as a URI
    /// - null: empty envelope
    /// - anything else: [`EnvelopeError::InvalidInputKind`]
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        Self::from_value_with(value, &WireConfig::default())
    }

    /// Build an envelope from a structured value using `config`.
    ///
    /// Fails with [`EnvelopeError::InvalidConfig`] before reading `value`
    /// when `config` cannot tell the buckets apart.
    pub fn from_value_with(value: Value, config: &WireConfig) -> Result<Self, EnvelopeError> {
        config.validate()?;
        match value {
            Value::Null => Ok(Self::new()),
            Value::String(uri) => Self::from_uri_with(&uri, config),
            Value::Object(object) => Ok(Self::from_object(object, config)),
            Value::Bool(_) => Err(EnvelopeError::InvalidInputKind { kind: "boolean" }),
            Value::Number(_) => Err(EnvelopeError::InvalidInputKind { kind: "number" }),
            Value::Array(_) => Err(EnvelopeError::InvalidInputKind { kind: "array" }),
        }
    }

    /// Parse an envelope from a URI or bare query string using the default wire format.
    pub fn from_uri(uri: &str) -> Result<Self, EnvelopeError> {
        Self::from_uri_with(uri, &WireConfig::default())
    }

    /// Parse an envelope from a URI or bare query string using `config`.
    pub fn from_uri_with(uri: &str, config: &WireConfig) -> Result<Self, EnvelopeError> {
        config.validate()?;
        Ok(Self::from_payload(uri::decode_payload(uri, config)?))
    }

    /// Build an envelope from an object-form payload.
    pub fn from_payload(payload: Payload) -> Self {
        let mut envelope = Self {
            signed: payload.signed,
            params: payload.params,
            verified: false,
        };
        envelope.normalize_signature();
        envelope
    }

    fn from_object(mut object: Map<String, Value>, config: &WireConfig) -> Self {
        // Some(true): bucket present as an object (or null), Some(false): present as a scalar
        let bucket_shape = |name: &str| {
            object
                .get(name)
                .map(|value| value.is_object() || value.is_null())
        };
        let shapes = [
            bucket_shape(config.signed_bucket.as_str()),
            bucket_shape(config.params_bucket.as_str()),
        ];
        let is_bucketed = shapes.contains(&Some(true)) && !shapes.contains(&Some(false));

        let (signed, params) = if is_bucketed {
            (
                take_bucket(&mut object, &config.signed_bucket),
                take_bucket(&mut object, &config.params_bucket),
            )
        } else {
            (object, Map::new())
        };

        let signed = signed
            .iter()
            .map(|(key, value)| (key.clone(), canonicalize(value)))
            .collect();
        let params = params
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), canonicalize(value)))
            .collect();

        Self::from_payload(Payload::new(signed, params))
    }

    fn normalize_signature(&mut self) {
        if let Some(sig) = self.params.get_mut(SIG_PARAM) {
            let stripped = strip_hex_prefix(sig).to_string();
            if stripped.len() != sig.len() {
                *sig = stripped;
            }
        }
    }
}

fn take_bucket(object: &mut Map<String, Value>, bucket: &str) -> Map<String, Value> {
    match object.remove(bucket) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

// =============================================================================
// Mutation
// =============================================================================

impl Envelope {
    /// Merge fields into the signed data, overwriting existing keys.
    ///
    /// Non-string values are canonicalized. A non-empty merge clears the
    /// signature.
    pub fn add_signed<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields: Vec<(String, String)> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), canonicalize(&value.into())))
            .collect();

        if fields.is_empty() {
            return;
        }

        self.clear_signature();
        self.signed.extend(fields);
    }

    /// Merge fields into the params, overwriting existing keys.
    ///
    /// When `alias` or `sig` is among the keys the signature is cleared
    /// before the merge. A merged `sig` is stored without its `0x` prefix.
    pub fn add_params<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields: Vec<(String, String)> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        if fields
            .iter()
            .any(|(key, _)| key == ALIAS_PARAM || key == SIG_PARAM)
        {
            self.clear_signature();
        }

        self.merge_params(fields);
    }

    /// Remove the signature and drop the verified flag. Idempotent.
    pub fn clear_signature(&mut self) {
        self.params.remove(SIG_PARAM);
        self.verified = false;
    }

    /// Store the author alias as trimmed hex of its UTF-8 bytes.
    pub fn set_author_alias(&mut self, label: &str) {
        self.params.insert(ALIAS_PARAM.to_string(), encode_alias(label));
        self.verified = false;
    }

    /// Store the signature with any leading `0x` removed.
    pub fn set_signature(&mut self, signature: &str) {
        self.params.insert(
            SIG_PARAM.to_string(),
            strip_hex_prefix(signature).to_string(),
        );
        self.verified = false;
    }

    /// Overwrite params without touching the verified flag.
    pub(crate) fn merge_params(&mut self, fields: impl IntoIterator<Item = (String, String)>) {
        self.params.extend(fields);
        self.normalize_signature();
    }

    pub(crate) fn adopt_param(&mut self, key: &str, value: String) {
        self.params.insert(key.to_string(), value);
    }

    pub(crate) fn mark_verified(&mut self) {
        self.verified = true;
    }
}

// =============================================================================
// Accessors
// =============================================================================

impl Envelope {
    /// Signed application data.
    pub fn signed(&self) -> &SignedData {
        &self.signed
    }

    /// Authorship and signature metadata.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A single signed field.
    pub fn get_signed(&self, key: &str) -> Option<&str> {
        self.signed.get(key).map(String::as_str)
    }

    /// A single param.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Signed field names in key order.
    pub fn signed_keys(&self) -> Vec<&str> {
        self.signed.keys().map(String::as_str).collect()
    }

    /// True only right after a successful sign or verify.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Decoded author alias, if one is set and decodes as UTF-8.
    pub fn author_alias(&self) -> Option<String> {
        self.params.get(ALIAS_PARAM).and_then(|hex| decode_alias(hex))
    }

    /// Signing address as reported by the identity service.
    pub fn author_address(&self) -> Option<&str> {
        self.get_param(ADDRESS_PARAM)
    }

    /// Signature without `0x` prefix.
    pub fn signature(&self) -> Option<&str> {
        self.get_param(SIG_PARAM)
    }

    /// Identity: the first 40 hex characters of the signature.
    ///
    /// Fails with [`EnvelopeError::NoSignature`] on unsigned envelopes so two
    /// unsigned envelopes never share an identity.
    pub fn identity(&self) -> Result<String, EnvelopeError> {
        self.signature()
            .map(identity_from_signature)
            .ok_or(EnvelopeError::NoSignature)
    }

    /// Order two signed envelopes by identity.
    pub fn compare(&self, other: &Envelope) -> Result<Ordering, EnvelopeError> {
        Ok(self.identity()?.cmp(&other.identity()?))
    }

    /// Deep copy of both buckets.
    pub fn payload(&self) -> Payload {
        Payload::new(self.signed.clone(), self.params.clone())
    }

    /// Query-string wire form using the default wire format.
    pub fn to_uri(&self) -> String {
        uri::encode_payload(&self.payload(), &WireConfig::default())
    }

    /// Query-string wire form using `config`.
    pub fn to_uri_with(&self, config: &WireConfig) -> Result<String, EnvelopeError> {
        config.validate()?;
        Ok(uri::encode_payload(&self.payload(), config))
    }

    /// Object wire form using `config` bucket names.
    pub fn to_value_with(&self, config: &WireConfig) -> Result<Value, EnvelopeError> {
        config.validate()?;
        let bucket = |entries: &SignedData| {
            Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect(),
            )
        };

        let mut object = Map::new();
        object.insert(config.signed_bucket.clone(), bucket(&self.signed));
        object.insert(config.params_bucket.clone(), bucket(&self.params));
        Ok(Value::Object(object))
    }

    /// Canonical JSON text of the payload.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

/// Sort envelopes by identity.
///
/// Nothing is reordered unless every envelope is signed.
pub fn sort_canonical(envelopes: &mut [Envelope]) -> Result<(), EnvelopeError> {
    if envelopes.iter().any(|envelope| envelope.signature().is_none()) {
        return Err(EnvelopeError::NoSignature);
    }

    envelopes.sort_by_cached_key(|envelope| {
        envelope
            .signature()
            .map(identity_from_signature)
            .unwrap_or_default()
    });
    Ok(())
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.payload()).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl FromStr for Envelope {
    type Err = EnvelopeError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        Self::from_uri(uri)
    }
}

impl TryFrom<Value> for Envelope {
    type Error = EnvelopeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Payload> for Envelope {
    fn from(payload: Payload) -> Self {
        Self::from_payload(payload)
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

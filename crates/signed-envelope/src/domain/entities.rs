//! # Domain Entities
//!
//! Plain data shapes shared by the envelope and the identity service port.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Signed application data. Every value is already canonicalized to a string.
pub type SignedData = BTreeMap<String, String>;

/// Authorship and signature metadata. An unset param is an absent key.
pub type Params = BTreeMap<String, String>;

/// Ledger height used as the point-in-time reference for synchronous verification.
pub type BlockHeight = u64;

/// Param key holding the hex-encoded author alias.
pub const ALIAS_PARAM: &str = "alias";

/// Param key holding the signature (stored without a `0x` prefix).
pub const SIG_PARAM: &str = "sig";

/// Param key holding the signing address, written only by the identity service.
pub const ADDRESS_PARAM: &str = "address";

// =============================================================================
// Payload
// =============================================================================

/// Object wire form of an envelope.
///
/// Both buckets default to empty when missing on input and are always
/// present on output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Signed application data
    #[serde(default)]
    pub signed: SignedData,
    /// Authorship and signature metadata
    #[serde(default)]
    pub params: Params,
}

impl Payload {
    /// Create a payload from its two buckets.
    pub fn new(signed: SignedData, params: Params) -> Self {
        Self { signed, params }
    }
}

// =============================================================================
// Verification Result
// =============================================================================

/// Authorship resolved by the identity service for a signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// UTF-8 alias bound to the signing address
    pub alias: String,
    /// The signing address, when the service reports it
    pub address: Option<String>,
}

impl Resolution {
    /// Resolution carrying only an alias.
    pub fn alias(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            address: None,
        }
    }

    /// Attach the signing address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

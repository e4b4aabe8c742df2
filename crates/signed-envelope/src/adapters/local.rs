//! # Local Identity Service
//!
//! In-process [`IdentityService`] backed by a secp256k1 key and an alias
//! registry.
//!
//! ## Scheme
//!
//! ```text
//! digest    = keccak256( ctx_tag || len(ctx) || ctx || canonical_json(signed) )
//! sig       = r (32) || s (32) || v (1, 27 or 28)          → hex, no prefix
//! address   = last 20 bytes of keccak256(uncompressed pubkey without 0x04)
//! ```
//!
//! Verification recovers the address from `sig`, checks it against any
//! `address` param the envelope carries, then looks the alias up in the
//! [`AliasRegistry`], either as currently bound or as bound at a height.

use crate::domain::encoding::strip_hex_prefix;
use crate::domain::entities::{
    BlockHeight, Params, Resolution, SignedData, ADDRESS_PARAM, SIG_PARAM,
};
use crate::domain::envelope::Envelope;
use crate::ports::outbound::{IdentityService, ServiceError};
use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use parking_lot::RwLock;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Ethereum-style address (last 20 bytes of keccak256(pubkey))
pub type Address = [u8; 20];

/// Recoverable signature length: r || s || v
const SIGNATURE_LEN: usize = 65;

// =============================================================================
// Hashing & Addresses
// =============================================================================

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    finish(hasher)
}

fn finish(hasher: Keccak256) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Derive the address of a public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let encoded = public_key.to_encoded_point(false);

    // Skip the 0x04 uncompressed marker
    let hash = keccak256(&encoded.as_bytes()[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// `0x`-prefixed lowercase hex form of an address.
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

/// Parse a hex address, with or without `0x`.
pub fn parse_address(value: &str) -> Option<Address> {
    let bytes = hex::decode(strip_hex_prefix(value)).ok()?;
    bytes.try_into().ok()
}

/// Digest signed over for `signed` under `context`.
///
/// The context is length-prefixed and tagged so that no context and an
/// empty context give different digests.
pub fn signing_digest(
    signed: &SignedData,
    context: Option<&str>,
) -> Result<[u8; 32], ServiceError> {
    let body = serde_json::to_vec(signed).map_err(|e| ServiceError::SigningRejected {
        reason: format!("cannot serialize signed data: {e}"),
    })?;

    let mut hasher = Keccak256::new();
    match context {
        Some(context) => {
            hasher.update([1u8]);
            hasher.update((context.len() as u64).to_be_bytes());
            hasher.update(context.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.update(&body);
    Ok(finish(hasher))
}

// =============================================================================
// Alias Registry
// =============================================================================

#[derive(Debug, Clone)]
struct Binding {
    from_height: BlockHeight,
    alias: String,
}

/// Address → alias bindings with history by block height.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    bindings: RwLock<HashMap<Address, Vec<Binding>>>,
}

impl AliasRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `alias` to `address` from `from_height` onward.
    ///
    /// A second binding at the same height replaces the first.
    pub fn bind(&self, address: Address, alias: impl Into<String>, from_height: BlockHeight) {
        let alias = alias.into();
        let mut bindings = self.bindings.write();
        let history = bindings.entry(address).or_default();

        match history.binary_search_by_key(&from_height, |b| b.from_height) {
            Ok(index) => history[index].alias = alias,
            Err(index) => history.insert(index, Binding { from_height, alias }),
        }
    }

    /// Most recent alias bound to `address`.
    pub fn current(&self, address: &Address) -> Option<String> {
        self.bindings
            .read()
            .get(address)
            .and_then(|history| history.last())
            .map(|binding| binding.alias.clone())
    }

    /// Alias bound to `address` as of `height`.
    pub fn alias_at(&self, address: &Address, height: BlockHeight) -> Option<String> {
        self.bindings
            .read()
            .get(address)
            .and_then(|history| {
                history
                    .iter()
                    .rev()
                    .find(|binding| binding.from_height <= height)
            })
            .map(|binding| binding.alias.clone())
    }
}

// =============================================================================
// Local Identity Service
// =============================================================================

/// Identity service signing with a local secp256k1 key.
pub struct LocalIdentityService {
    signing_key: SigningKey,
    registry: Arc<AliasRegistry>,
}

impl LocalIdentityService {
    /// Create a service for `signing_key` resolving aliases through `registry`.
    pub fn new(signing_key: SigningKey, registry: Arc<AliasRegistry>) -> Self {
        Self {
            signing_key,
            registry,
        }
    }

    /// Create a service from raw 32-byte secret key material.
    pub fn from_secret_bytes(
        secret: &[u8],
        registry: Arc<AliasRegistry>,
    ) -> Result<Self, ServiceError> {
        let signing_key =
            SigningKey::from_slice(secret).map_err(|_| ServiceError::SigningRejected {
                reason: "invalid secret key".to_string(),
            })?;
        Ok(Self::new(signing_key, registry))
    }

    /// Address of this service's key.
    pub fn address(&self) -> Address {
        address_from_pubkey(self.signing_key.verifying_key())
    }

    /// The registry aliases are resolved from.
    pub fn registry(&self) -> &Arc<AliasRegistry> {
        &self.registry
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<String, ServiceError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| ServiceError::SigningRejected {
                reason: e.to_string(),
            })?;

        let mut bytes = Vec::with_capacity(SIGNATURE_LEN);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte() + 27);
        Ok(hex::encode(bytes))
    }

    /// Recover the signer of `envelope` and check it against any claimed address.
    fn recover_signer(
        &self,
        envelope: &Envelope,
        context: Option<&str>,
    ) -> Result<Address, ServiceError> {
        let encoded = envelope
            .signature()
            .ok_or_else(|| ServiceError::MalformedSignature("missing".to_string()))?;
        let bytes = hex::decode(strip_hex_prefix(encoded))
            .map_err(|e| ServiceError::MalformedSignature(e.to_string()))?;

        if bytes.len() != SIGNATURE_LEN {
            return Err(ServiceError::MalformedSignature(format!(
                "expected {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let signature = Signature::from_slice(&bytes[..64])
            .map_err(|e| ServiceError::MalformedSignature(e.to_string()))?;
        let recovery_id = parse_recovery_id(bytes[64])?;

        let digest = signing_digest(envelope.signed(), context)?;
        let public_key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
            .map_err(|e| ServiceError::SignatureRejected {
                reason: e.to_string(),
            })?;
        let recovered = address_from_pubkey(&public_key);

        if let Some(claimed) = envelope.author_address() {
            if parse_address(claimed) != Some(recovered) {
                return Err(ServiceError::SignatureRejected {
                    reason: format!(
                        "signer {} does not match address {claimed}",
                        format_address(&recovered)
                    ),
                });
            }
        }

        Ok(recovered)
    }

    fn resolve(address: Address, alias: Option<String>) -> Result<Resolution, ServiceError> {
        let alias = alias.ok_or_else(|| ServiceError::UnknownAddress(format_address(&address)))?;
        debug!(address = %format_address(&address), alias = %alias, "Resolved signer alias");
        Ok(Resolution::alias(alias).with_address(format_address(&address)))
    }
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId, ServiceError> {
    let normalized = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        _ => {
            return Err(ServiceError::MalformedSignature(format!(
                "invalid recovery id {v}"
            )))
        }
    };

    RecoveryId::from_byte(normalized)
        .ok_or_else(|| ServiceError::MalformedSignature(format!("invalid recovery id {v}")))
}

#[async_trait]
impl IdentityService for LocalIdentityService {
    async fn sign_data(
        &self,
        signed: &SignedData,
        context: Option<&str>,
    ) -> Result<Params, ServiceError> {
        let digest = signing_digest(signed, context)?;
        let signature = self.sign_digest(&digest)?;

        let mut params = Params::new();
        params.insert(SIG_PARAM.to_string(), signature);
        params.insert(ADDRESS_PARAM.to_string(), format_address(&self.address()));
        Ok(params)
    }

    async fn verify_data(
        &self,
        envelope: &Envelope,
        context: Option<&str>,
    ) -> Result<Resolution, ServiceError> {
        let address = self.recover_signer(envelope, context)?;
        Self::resolve(address, self.registry.current(&address))
    }

    fn verify_data_sync(
        &self,
        envelope: &Envelope,
        height: BlockHeight,
        context: Option<&str>,
    ) -> Result<Resolution, ServiceError> {
        let address = self.recover_signer(envelope, context)?;
        Self::resolve(address, self.registry.alias_at(&address, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> LocalIdentityService {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        LocalIdentityService::new(signing_key, Arc::new(AliasRegistry::new()))
    }

    fn envelope() -> Envelope {
        Envelope::from_value(json!({"move": "e4", "ply": 1})).unwrap()
    }

    #[test]
    fn test_registry_history() {
        let registry = AliasRegistry::new();
        let address = [0x11; 20];

        assert_eq!(registry.current(&address), None);

        registry.bind(address, "alice", 10);
        registry.bind(address, "alicia", 20);

        assert_eq!(registry.alias_at(&address, 5), None);
        assert_eq!(registry.alias_at(&address, 10).as_deref(), Some("alice"));
        assert_eq!(registry.alias_at(&address, 19).as_deref(), Some("alice"));
        assert_eq!(registry.alias_at(&address, 25).as_deref(), Some("alicia"));
        assert_eq!(registry.current(&address).as_deref(), Some("alicia"));
    }

    #[test]
    fn test_registry_rebinding_same_height_replaces() {
        let registry = AliasRegistry::new();
        let address = [0x22; 20];

        registry.bind(address, "first", 3);
        registry.bind(address, "second", 3);

        assert_eq!(registry.alias_at(&address, 3).as_deref(), Some("second"));
    }

    #[test]
    fn test_registry_out_of_order_binds() {
        let registry = AliasRegistry::new();
        let address = [0x33; 20];

        registry.bind(address, "later", 50);
        registry.bind(address, "earlier", 5);

        assert_eq!(registry.current(&address).as_deref(), Some("later"));
        assert_eq!(registry.alias_at(&address, 10).as_deref(), Some("earlier"));
    }

    #[test]
    fn test_address_round_trip() {
        let address = [0xab; 20];
        let formatted = format_address(&address);
        assert_eq!(formatted, format!("0x{}", "ab".repeat(20)));
        assert_eq!(parse_address(&formatted), Some(address));
        assert_eq!(parse_address("0x1234"), None);
    }

    #[test]
    fn test_signing_digest_separates_contexts() {
        let signed = envelope().signed().clone();
        let none = signing_digest(&signed, None).unwrap();
        let empty = signing_digest(&signed, Some("")).unwrap();
        let chess = signing_digest(&signed, Some("chess")).unwrap();

        assert_ne!(none, empty);
        assert_ne!(empty, chess);
        assert_eq!(chess, signing_digest(&signed, Some("chess")).unwrap());
    }

    #[test]
    fn test_from_secret_bytes_rejects_zero_key() {
        let result =
            LocalIdentityService::from_secret_bytes(&[0u8; 32], Arc::new(AliasRegistry::new()));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sign_data_returns_signature_and_address() {
        let service = service();
        let params = service
            .sign_data(envelope().signed(), Some("chess"))
            .await
            .unwrap();

        let sig = params.get(SIG_PARAM).unwrap();
        assert_eq!(sig.len(), SIGNATURE_LEN * 2);
        assert!(!sig.starts_with("0x"));
        assert_eq!(
            params.get(ADDRESS_PARAM),
            Some(&format_address(&service.address()))
        );
    }

    #[tokio::test]
    async fn test_verify_resolves_current_alias() {
        let service = service();
        service.registry().bind(service.address(), "alice", 0);

        let mut envelope = envelope();
        let params = service.sign_data(envelope.signed(), None).await.unwrap();
        envelope.add_params(params);

        let resolution = service.verify_data(&envelope, None).await.unwrap();
        assert_eq!(resolution.alias, "alice");
        assert_eq!(resolution.address, Some(format_address(&service.address())));
    }

    #[tokio::test]
    async fn test_verify_unknown_address() {
        let service = service();

        let mut envelope = envelope();
        let params = service.sign_data(envelope.signed(), None).await.unwrap();
        envelope.add_params(params);

        let result = service.verify_data(&envelope, None).await;
        assert!(matches!(result, Err(ServiceError::UnknownAddress(_))));
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_context() {
        let service = service();
        service.registry().bind(service.address(), "alice", 0);

        let mut envelope = envelope();
        let params = service
            .sign_data(envelope.signed(), Some("chess"))
            .await
            .unwrap();
        envelope.add_params(params);

        let result = service.verify_data(&envelope, Some("go")).await;
        assert!(matches!(result, Err(ServiceError::SignatureRejected { .. })));
    }

    #[test]
    fn test_verify_sync_rejects_malformed_signature() {
        let service = service();
        let mut envelope = envelope();
        envelope.set_signature("abcd");

        let result = service.verify_data_sync(&envelope, 0, None);
        assert!(matches!(result, Err(ServiceError::MalformedSignature(_))));

        envelope.set_signature("zz");
        let result = service.verify_data_sync(&envelope, 0, None);
        assert!(matches!(result, Err(ServiceError::MalformedSignature(_))));
    }

    #[test]
    fn test_parse_recovery_id() {
        assert!(parse_recovery_id(27).is_ok());
        assert!(parse_recovery_id(1).is_ok());
        assert!(matches!(
            parse_recovery_id(29),
            Err(ServiceError::MalformedSignature(_))
        ));
    }
}

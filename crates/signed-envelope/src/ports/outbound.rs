//! # Outbound Ports (Driven Ports / SPI)
//!
//! The identity & signing service the envelope depends on.

use crate::domain::entities::{BlockHeight, Params, Resolution, SignedData};
use crate::domain::envelope::Envelope;
use thiserror::Error;

/// Error from identity service operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The signer declined or could not produce a signature
    #[error("Signing rejected: {reason}")]
    SigningRejected { reason: String },

    /// The signature does not verify against the envelope
    #[error("Signature rejected: {reason}")]
    SignatureRejected { reason: String },

    /// No alias is bound to the signing address
    #[error("No alias bound to address {0}")]
    UnknownAddress(String),

    /// The signature could not be parsed
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Communication error
    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

/// Gateway to the identity & signing service.
///
/// Signing and the async verification path may involve I/O or a user prompt.
/// The sync path resolves against an already-loaded ledger snapshot at an
/// explicit height.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Sign the signed-data bucket.
    ///
    /// # Arguments
    /// * `signed` - The envelope's signed data
    /// * `context` - Opaque domain-separation context, passed through untouched
    ///
    /// # Returns
    /// Params to merge into the envelope, at least `sig` and usually `address`.
    async fn sign_data(
        &self,
        signed: &SignedData,
        context: Option<&str>,
    ) -> Result<Params, ServiceError>;

    /// Resolve the alias of whoever produced the envelope's signature.
    async fn verify_data(
        &self,
        envelope: &Envelope,
        context: Option<&str>,
    ) -> Result<Resolution, ServiceError>;

    /// Resolve the alias of the envelope's signer as of `height`, without suspending.
    fn verify_data_sync(
        &self,
        envelope: &Envelope,
        height: BlockHeight,
        context: Option<&str>,
    ) -> Result<Resolution, ServiceError>;
}

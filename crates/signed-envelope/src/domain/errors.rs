//! # Envelope Errors
//!
//! Error types for envelope construction, signing, and verification.

use thiserror::Error;

/// Errors that can occur while building, signing, or verifying an envelope.
///
/// Service-layer failures are folded into [`EnvelopeError::SigningFailed`] and
/// [`EnvelopeError::VerificationFailed`] so the error surface stays the same
/// whichever identity service is plugged in.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Construction input was neither an object, a URI string, nor absent
    #[error("Invalid envelope input kind: {kind}")]
    InvalidInputKind { kind: &'static str },

    /// A URI query pair could not be percent-decoded into UTF-8
    #[error("Malformed envelope URI: {0}")]
    MalformedUri(String),

    /// `sign`/`verify` called without an identity service
    #[error("No identity service supplied")]
    MissingService,

    /// `verify` called on an envelope that carries no signature
    #[error("Envelope has no signature to verify")]
    MissingSignature,

    /// The identity service failed to sign the envelope
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The claimed author alias differs from the alias the service resolved
    #[error("Author mismatch: claimed {claimed:?}, resolved {resolved:?}")]
    AuthorMismatch { claimed: String, resolved: String },

    /// The identity service failed to verify the envelope
    #[error("Verification failed")]
    VerificationFailed,

    /// Identity requested on an unsigned envelope
    #[error("Envelope has no signature, identity is undefined")]
    NoSignature,

    /// Wire configuration is unusable
    #[error("Invalid wire configuration: {0}")]
    InvalidConfig(String),
}

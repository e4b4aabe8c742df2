//! # Signed Envelope
//!
//! A message envelope that keeps application data ("signed") apart from
//! authorship metadata ("params"), travels as a JSON object or a URI query
//! string, and tracks whether it has been signed or verified since its last
//! change.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): The envelope, its canonicalization and wire codecs, no I/O
//! - **Ports Layer** (`ports/`): The identity & signing service trait
//! - **Service Layer** (`service.rs`): Sign/verify protocol driving the port
//! - **Adapters Layer** (`adapters/`): An in-process secp256k1 identity service
//!
//! ## Example
//!
//! ```ignore
//! use signed_envelope::Envelope;
//!
//! let mut envelope: Envelope = "_signed_move=e4".parse()?;
//! envelope.sign(Some(&service), Some("chess")).await?;
//!
//! let mut received = Envelope::from_uri(&envelope.to_uri())?;
//! received.verify(Some(&service), Some("chess")).await?;
//! assert_eq!(received.author_alias().as_deref(), Some("alice"));
//! ```
//!
//! ## Invariants
//!
//! - Signed values are always strings; structured inputs are canonicalized to JSON text
//! - `sig` is stored without a `0x` prefix; identity is its first 40 hex characters
//! - Changing signed data or the `alias`/`sig` params clears the verified flag
//! - An unsigned envelope has no identity and cannot be ordered

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::local::{AliasRegistry, LocalIdentityService};
pub use domain::config::WireConfig;
pub use domain::entities::{
    BlockHeight, Params, Payload, Resolution, SignedData, ADDRESS_PARAM, ALIAS_PARAM, SIG_PARAM,
};
pub use domain::envelope::{sort_canonical, Envelope};
pub use domain::errors::EnvelopeError;
pub use ports::outbound::{IdentityService, ServiceError};

//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports.
//! - **Local**: in-process secp256k1 signer with an alias registry

pub mod local;

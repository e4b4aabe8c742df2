//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Outbound (Driven)**: the identity & signing service the envelope needs

pub mod outbound;

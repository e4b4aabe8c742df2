//! # Domain Layer
//!
//! The envelope type and its pure encoding rules, with no I/O dependencies.
//! This is the inner layer of the hexagonal architecture.

pub mod config;
pub mod encoding;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod uri;

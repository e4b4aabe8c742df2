//! Wire format configuration
//!
//! Names the object-form bucket keys and the URI-form key prefixes.
//!
//! # Example
//!
//! ```ignore
//! use signed_envelope::WireConfig;
//!
//! let config = WireConfig::default()
//!     .with_prefixes("s.", "p.")
//!     .validated()
//!     .expect("Valid config");
//! ```

use crate::domain::errors::EnvelopeError;
use serde::{Deserialize, Serialize};

/// Default object-form key of the signed-data bucket
pub const DEFAULT_SIGNED_BUCKET: &str = "signed";
/// Default object-form key of the params bucket
pub const DEFAULT_PARAMS_BUCKET: &str = "params";
/// Default URI key prefix of the signed-data bucket
pub const DEFAULT_SIGNED_PREFIX: &str = "_signed_";
/// Default URI key prefix of the params bucket
pub const DEFAULT_PARAMS_PREFIX: &str = "_params_";

/// Envelope wire format configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Object-form key of the signed-data bucket
    pub signed_bucket: String,
    /// Object-form key of the params bucket
    pub params_bucket: String,
    /// URI key prefix routing values into the signed-data bucket
    pub signed_prefix: String,
    /// URI key prefix routing values into the params bucket
    pub params_prefix: String,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            signed_bucket: DEFAULT_SIGNED_BUCKET.to_string(),
            params_bucket: DEFAULT_PARAMS_BUCKET.to_string(),
            signed_prefix: DEFAULT_SIGNED_PREFIX.to_string(),
            params_prefix: DEFAULT_PARAMS_PREFIX.to_string(),
        }
    }
}

impl WireConfig {
    /// Check that both forms can tell the two buckets apart
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.signed_bucket.is_empty() || self.params_bucket.is_empty() {
            return Err(EnvelopeError::InvalidConfig(
                "bucket names cannot be empty".to_string(),
            ));
        }

        if self.signed_bucket == self.params_bucket {
            return Err(EnvelopeError::InvalidConfig(format!(
                "bucket names must differ, both are {:?}",
                self.signed_bucket
            )));
        }

        // An empty prefix would be a substring of every key
        if self.signed_prefix.is_empty() || self.params_prefix.is_empty() {
            return Err(EnvelopeError::InvalidConfig(
                "URI prefixes cannot be empty".to_string(),
            ));
        }

        if self.signed_prefix == self.params_prefix {
            return Err(EnvelopeError::InvalidConfig(format!(
                "URI prefixes must differ, both are {:?}",
                self.signed_prefix
            )));
        }

        Ok(())
    }

    /// Validate and return self
    pub fn validated(self) -> Result<Self, EnvelopeError> {
        self.validate()?;
        Ok(self)
    }

    /// Builder-style method to set the object-form bucket names
    pub fn with_buckets(mut self, signed: impl Into<String>, params: impl Into<String>) -> Self {
        self.signed_bucket = signed.into();
        self.params_bucket = params.into();
        self
    }

    /// Builder-style method to set the URI prefixes
    pub fn with_prefixes(mut self, signed: impl Into<String>, params: impl Into<String>) -> Self {
        self.signed_prefix = signed.into();
        self.params_prefix = params.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WireConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.signed_prefix, "_signed_");
        assert_eq!(config.params_prefix, "_params_");
    }

    #[test]
    fn test_config_rejects_equal_prefixes() {
        let config = WireConfig::default().with_prefixes("_x_", "_x_");
        assert!(matches!(
            config.validate(),
            Err(EnvelopeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_empty_prefix() {
        let config = WireConfig::default().with_prefixes("", "_p_");
        assert!(matches!(
            config.validated(),
            Err(EnvelopeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_equal_buckets() {
        let config = WireConfig::default().with_buckets("data", "data");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: WireConfig = serde_json::from_str(r#"{"signed_prefix": "s."}"#).unwrap();
        assert_eq!(config.signed_prefix, "s.");
        assert_eq!(config.params_prefix, DEFAULT_PARAMS_PREFIX);
        assert_eq!(config.signed_bucket, DEFAULT_SIGNED_BUCKET);
    }
}

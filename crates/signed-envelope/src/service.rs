//! # Signing & Verification Protocol
//!
//! Drives an [`Envelope`] through the [`IdentityService`] outbound port.
//!
//! ## Flow
//!
//! ```text
//! sign:    signed data ──sign_data──→ [service] ──params──→ merge ──→ verified
//!
//! verify:  envelope ──verify_data(_sync)──→ [service] ──alias──→ reconcile
//!                                                                   │
//!                                  claimed alias differs ←──────────┤
//!                                     AuthorMismatch                │
//!                                                  no claim: adopt, verified
//! ```
//!
//! ## Concurrency
//!
//! Both calls hold `&mut Envelope` across the service round trip, and the
//! returned params are merged in a single step once the call returns. A
//! caller that drops the future mid-flight gets the envelope back unchanged.
//! Nothing is retried: a signing call may have shown the user a prompt.

use crate::domain::encoding::{decode_alias, encode_alias};
use crate::domain::entities::{BlockHeight, Resolution, ADDRESS_PARAM, ALIAS_PARAM, SIG_PARAM};
use crate::domain::envelope::Envelope;
use crate::domain::errors::EnvelopeError;
use crate::ports::outbound::{IdentityService, ServiceError};
use tracing::{debug, warn};

impl Envelope {
    /// Sign the envelope's signed data through `service`.
    ///
    /// # Arguments
    /// * `service` - The identity & signing service
    /// * `context` - Domain-separation context, passed through opaquely
    ///
    /// # Errors
    /// * `EnvelopeError::MissingService` - No service supplied
    /// * `EnvelopeError::SigningFailed` - The service failed or returned no signature
    pub async fn sign(
        &mut self,
        service: Option<&dyn IdentityService>,
        context: Option<&str>,
    ) -> Result<&mut Self, EnvelopeError> {
        let service = service.ok_or(EnvelopeError::MissingService)?;

        let params = service
            .sign_data(self.signed(), context)
            .await
            .map_err(|e| {
                warn!(error = %e, "Identity service failed to sign envelope");
                EnvelopeError::SigningFailed(e.to_string())
            })?;

        if !params.contains_key(SIG_PARAM) {
            warn!("Identity service returned params without a signature");
            return Err(EnvelopeError::SigningFailed(
                "service returned no signature".to_string(),
            ));
        }

        self.merge_params(params);
        self.mark_verified();

        debug!(
            identity = %self.identity().unwrap_or_default(),
            address = ?self.author_address(),
            "Envelope signed"
        );
        Ok(self)
    }

    /// Verify the envelope's signature and reconcile its claimed author.
    ///
    /// # Errors
    /// * `EnvelopeError::MissingService` - No service supplied
    /// * `EnvelopeError::MissingSignature` - The envelope is unsigned
    /// * `EnvelopeError::AuthorMismatch` - Claimed alias differs from the resolved one
    /// * `EnvelopeError::VerificationFailed` - The service failed
    pub async fn verify(
        &mut self,
        service: Option<&dyn IdentityService>,
        context: Option<&str>,
    ) -> Result<&mut Self, EnvelopeError> {
        let service = service.ok_or(EnvelopeError::MissingService)?;
        self.ensure_signature()?;

        let resolution = service
            .verify_data(self, context)
            .await
            .map_err(verification_failed)?;

        self.reconcile(resolution)
    }

    /// Blocking variant of [`Envelope::verify`] against the ledger as of `height`.
    pub fn verify_sync(
        &mut self,
        service: Option<&dyn IdentityService>,
        height: BlockHeight,
        context: Option<&str>,
    ) -> Result<&mut Self, EnvelopeError> {
        let service = service.ok_or(EnvelopeError::MissingService)?;
        self.ensure_signature()?;

        let resolution = service
            .verify_data_sync(self, height, context)
            .map_err(verification_failed)?;

        self.reconcile(resolution)
    }

    fn ensure_signature(&self) -> Result<(), EnvelopeError> {
        match self.signature() {
            Some(_) => Ok(()),
            None => Err(EnvelopeError::MissingSignature),
        }
    }

    fn reconcile(&mut self, resolution: Resolution) -> Result<&mut Self, EnvelopeError> {
        match self.get_param(ALIAS_PARAM) {
            Some(raw) => {
                // An undecodable claim can never match
                let claimed = decode_alias(raw).unwrap_or_else(|| raw.to_string());
                if claimed != resolution.alias {
                    warn!(
                        claimed = %claimed,
                        resolved = %resolution.alias,
                        "Claimed author does not match signer"
                    );
                    return Err(EnvelopeError::AuthorMismatch {
                        claimed,
                        resolved: resolution.alias,
                    });
                }
            }
            None => self.adopt_param(ALIAS_PARAM, encode_alias(&resolution.alias)),
        }

        if let Some(address) = resolution.address {
            if self.author_address().is_none() {
                self.adopt_param(ADDRESS_PARAM, address);
            }
        }

        self.mark_verified();
        debug!(alias = %resolution.alias, "Envelope verified");
        Ok(self)
    }
}

fn verification_failed(error: ServiceError) -> EnvelopeError {
    warn!(error = %error, "Identity service failed to verify envelope");
    EnvelopeError::VerificationFailed
}

// =============================================================================
// TESTS
// =============================================================================

//! Certificate authority records.

use chrono::{DateTime, Duration, Utc};
use wayfi_pki::{PKey, Private, X509Ref, X509};

use crate::error::TrustError;
use crate::TrustStore;

/// Maximum number of issuer edges followed from any CA.
pub const MAX_CHAIN_DEPTH: usize = 16;

/// An imported certificate authority.
#[derive(Clone)]
pub struct Ca {
    pub(crate) subject: String,
    pub(crate) certificate: X509,
    pub(crate) private_key: Option<PKey<Private>>,
    pub(crate) issuer: Option<String>,
}

impl Ca {
    /// Subject DN, the CA's key in the store.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The CA certificate.
    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    /// The CA private key; `None` for trust-only imports.
    pub fn private_key(&self) -> Option<&PKey<Private>> {
        self.private_key.as_ref()
    }

    /// Issuer subject DN; `None` for a self-signed root.
    pub fn issuer_subject(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Returns true for a self-signed root.
    pub fn is_root(&self) -> bool {
        self.issuer.is_none()
    }

    /// Follows one edge towards the root. Returns `None` for a root.
    pub async fn issuer_ca(&self, store: &TrustStore) -> Result<Option<Ca>, TrustError> {
        let Some(issuer) = &self.issuer else {
            return Ok(None);
        };
        store.get_ca(issuer).await?.map(Some).ok_or_else(|| {
            TrustError::TrustChain(format!(
                "issuer {issuer} of {} is missing from the store",
                self.subject
            ))
        })
    }

    /// Returns this CA followed by its issuers, ending at the root.
    pub async fn chain_to_root(&self, store: &TrustStore) -> Result<Vec<Ca>, TrustError> {
        let mut chain = vec![self.clone()];
        while let Some(issuer) = chain[chain.len() - 1].issuer_ca(store).await? {
            if chain.len() >= MAX_CHAIN_DEPTH {
                return Err(TrustError::TrustChain(format!(
                    "chain of {} exceeds {MAX_CHAIN_DEPTH} certificates",
                    self.subject
                )));
            }
            chain.push(issuer);
        }
        Ok(chain)
    }
}

impl std::fmt::Debug for Ca {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ca")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Listing entry for an imported CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaSummary {
    /// Subject DN.
    pub subject: String,
    /// Issuer subject DN, `None` for roots.
    pub issuer: Option<String>,
    /// Whether the store holds the CA's private key.
    pub has_key: bool,
    /// Certificate expiry.
    pub not_after: DateTime<Utc>,
    /// SHA-256 of the DER certificate, lowercase hex.
    pub fingerprint: String,
}

/// The CA designated to sign a realm's credentials.
#[derive(Debug, Clone)]
pub struct Signer {
    /// Signing CA. Always holds a private key.
    pub ca: Ca,
    /// Validity of issued credentials, in days.
    pub default_validity_days: u32,
}

impl Signer {
    /// Default validity as a duration.
    pub fn validity(&self) -> Duration {
        Duration::days(i64::from(self.default_validity_days))
    }

    /// The signing key.
    pub fn private_key(&self) -> Result<&PKey<Private>, TrustError> {
        self.ca.private_key().ok_or_else(|| {
            TrustError::Configuration(format!("signer CA {} has no private key", self.ca.subject))
        })
    }
}

/// Normalizes a validity to whole days, rounding up; never less than one.
pub fn validity_days(validity: Duration) -> Result<u32, TrustError> {
    let seconds = validity.num_seconds();
    if seconds <= 0 {
        return Err(TrustError::Validation(format!(
            "validity must be positive, got {seconds}s"
        )));
    }
    let days = (seconds + 86_399) / 86_400;
    u32::try_from(days.max(1))
        .map_err(|_| TrustError::Validation(format!("validity of {days} days is too long")))
}

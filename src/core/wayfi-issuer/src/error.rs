//! Issuer error types.

use thiserror::Error;

use wayfi_pki::PkiError;
use wayfi_registry::RegistryError;
use wayfi_storage::StorageError;
use wayfi_trust::TrustError;

/// Errors that can occur while issuing or revoking credentials.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// Missing or malformed realm, signer or key record.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied value is not acceptable.
    #[error("validation error: {0}")]
    Validation(String),

    /// The signing log does not account for an issuance exactly once.
    #[error("audit invariant violated: {0}")]
    AuditInvariantViolation(String),

    /// A revocation matched no active credential.
    #[error("nothing to revoke: {0}")]
    RevocationNotFound(String),

    /// Trust store failure.
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// Key generation or signing failed.
    #[error("pki error: {0}")]
    Pki(#[from] PkiError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IssuerError {
    /// Returns true if the error was caused by client input.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Trust(e) => e.is_client_error(),
            _ => false,
        }
    }
}

impl From<RegistryError> for IssuerError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(msg) => IssuerError::Validation(msg),
            other => IssuerError::Configuration(other.to_string()),
        }
    }
}

//! Trust store error types.

use thiserror::Error;

use wayfi_pki::PkiError;
use wayfi_registry::RegistryError;
use wayfi_storage::StorageError;

/// Errors that can occur in the trust store.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Missing or inconsistent realm or CA record.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// CA chain cannot be established or references an unknown CA.
    #[error("trust chain error: {0}")]
    TrustChain(String),

    /// Caller-supplied value is not acceptable.
    #[error("validation error: {0}")]
    Validation(String),

    /// Certificate or key handling failed.
    #[error("pki error: {0}")]
    Pki(#[from] PkiError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TrustError {
    /// Returns true if the error was caused by client input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<RegistryError> for TrustError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(msg) => TrustError::Validation(msg),
            other => TrustError::Configuration(other.to_string()),
        }
    }
}

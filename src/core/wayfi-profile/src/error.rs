//! Profile generation error types.

use thiserror::Error;
use wayfi_crypto::CryptoError;
use wayfi_pki::PkiError;
use wayfi_registry::RegistryError;
use wayfi_trust::TrustError;

/// Errors that can occur while generating or decoding profiles.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The realm lacks data every profile needs (trusted CAs, server names).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The realm's networks cannot be expressed in the requested format.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// An encrypted ONC document could not be decrypted.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Cryptographic primitive error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// PKI error.
    #[error("pki error: {0}")]
    Pki(#[from] PkiError),

    /// Trust store error.
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProfileError {
    /// Returns true if the error was caused by the requester.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Validation(_) | Self::UnsupportedNetwork(_) | Self::Decryption(_) => true,
            Self::Trust(e) => e.is_client_error(),
            _ => false,
        }
    }
}

impl From<RegistryError> for ProfileError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(msg) => Self::Validation(msg),
            other => Self::Configuration(other.to_string()),
        }
    }
}

//! PKI error types.

use thiserror::Error;

/// Errors that can occur in PKI operations.
#[derive(Debug, Error)]
pub enum PkiError {
    /// Underlying OpenSSL failure.
    #[error("openssl error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    /// Certificate could not be parsed or is unusable.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Private key could not be parsed or does not match.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid certificate signing request.
    #[error("invalid certificate request: {0}")]
    InvalidRequest(String),

    /// PKCS#12 bundle is missing a required component.
    #[error("invalid PKCS#12 bundle: {0}")]
    InvalidBundle(String),
}

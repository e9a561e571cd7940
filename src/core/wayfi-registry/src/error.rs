//! Registry error types.

use thiserror::Error;

/// Errors that can occur while loading or querying the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has the wrong shape.
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing or inconsistent configuration record.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied value is not acceptable.
    #[error("validation error: {0}")]
    Validation(String),

    /// Signing material could not be loaded.
    #[error("signing authority: {0}")]
    Pki(#[from] wayfi_pki::PkiError),
}

impl RegistryError {
    /// Returns true if the error was caused by client input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

//! # Wayfi Storage
//!
//! Backend-neutral storage vocabulary shared by the trust store, the issuer
//! and the storage backends.
//!
//! Provides the storage error type, the enumerations persisted as text in the
//! signing log, and UNIX timestamp conversion.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod record;
pub mod time;

pub use error::StorageError;
pub use record::{LogStatus, Usage};

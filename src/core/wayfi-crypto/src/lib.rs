//! # Wayfi Crypto
//!
//! Core cryptographic primitives for Wayfi.
//!
//! This crate provides the symmetric building blocks used when profiles are
//! encrypted for transport:
//! - Password-based key derivation (PBKDF2-HMAC-SHA1)
//! - Symmetric encryption (AES-256-CBC with PKCS#7 padding)
//! - Message authentication (HMAC-SHA1)
//! - Secure random generation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aes_cbc;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod mac;
pub mod random;

pub use error::CryptoError;
pub use keys::DerivedKey;

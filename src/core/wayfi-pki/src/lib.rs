//! # Wayfi PKI
//!
//! Public Key Infrastructure primitives used by the trust store, the
//! credential issuer and the profile encoders.
//!
//! ## Features
//!
//! - Key pair and CSR generation
//! - CSR signing with client, server and CA extension profiles
//! - PKCS#12 bundling, including re-encoding with legacy 3DES for older clients
//! - PKCS#7 signatures for signed configuration profiles
//! - Distinguished name formatting and hostname validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bundle;
pub mod cert;
pub mod error;
pub mod hostname;
pub mod keys;
pub mod name;
pub mod pkcs12;
pub mod pkcs7;
pub mod sign;

pub use bundle::SignedBundle;
pub use error::PkiError;
pub use keys::KeyAlgorithm;
pub use name::DistinguishedName;
pub use pkcs12::{ChainMode, Pkcs12Cipher, DEFAULT_PASSPHRASE};
pub use pkcs7::{SignatureMode, SigningAuthority};
pub use sign::{ExtensionProfile, SigningRequest};

pub use openssl::pkey::{PKey, Private};
pub use openssl::x509::{X509Ref, X509Req, X509};

//! Key pair generation and encoding.

use std::str::FromStr;

use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use openssl::x509::X509Ref;

use crate::error::PkiError;

/// Key algorithm options for generated key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAlgorithm {
    /// NIST P-256 (default, small certificates, broad client support).
    #[default]
    EcdsaP256,
    /// NIST P-384.
    EcdsaP384,
    /// RSA 2048 bits.
    Rsa2048,
    /// RSA 4096 bits.
    Rsa4096,
}

impl KeyAlgorithm {
    /// Returns the canonical identifier of this algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EcdsaP256 => "ecdsa-p256",
            Self::EcdsaP384 => "ecdsa-p384",
            Self::Rsa2048 => "rsa-2048",
            Self::Rsa4096 => "rsa-4096",
        }
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ecdsa-p256" => Ok(Self::EcdsaP256),
            "ecdsa-p384" => Ok(Self::EcdsaP384),
            "rsa-2048" => Ok(Self::Rsa2048),
            "rsa-4096" => Ok(Self::Rsa4096),
            _ => Err(PkiError::InvalidKey(format!("unknown key algorithm: {s}"))),
        }
    }
}

/// Generates a new private key.
pub fn generate_key_pair(algorithm: KeyAlgorithm) -> Result<PKey<Private>, PkiError> {
    let key = match algorithm {
        KeyAlgorithm::EcdsaP256 => ec_key(Nid::X9_62_PRIME256V1)?,
        KeyAlgorithm::EcdsaP384 => ec_key(Nid::SECP384R1)?,
        KeyAlgorithm::Rsa2048 => PKey::from_rsa(Rsa::generate(2048)?)?,
        KeyAlgorithm::Rsa4096 => PKey::from_rsa(Rsa::generate(4096)?)?,
    };
    Ok(key)
}

fn ec_key(curve: Nid) -> Result<PKey<Private>, PkiError> {
    let group = EcGroup::from_curve_name(curve)?;
    let ec_key = EcKey::generate(&group)?;
    Ok(PKey::from_ec_key(ec_key)?)
}

/// Parses a PEM-encoded private key (PKCS#8, PKCS#1 or SEC1).
pub fn private_key_from_pem(pem: &[u8]) -> Result<PKey<Private>, PkiError> {
    PKey::private_key_from_pem(pem).map_err(|e| PkiError::InvalidKey(e.to_string()))
}

/// Encodes a private key as PKCS#8 PEM.
pub fn private_key_to_pem(key: &PKeyRef<Private>) -> Result<Vec<u8>, PkiError> {
    Ok(key.private_key_to_pem_pkcs8()?)
}

/// Returns true if `key` is the private half of the certificate's public key.
pub fn key_matches_certificate(key: &PKeyRef<Private>, cert: &X509Ref) -> Result<bool, PkiError> {
    let public = cert.public_key()?;
    Ok(public.public_eq(key))
}

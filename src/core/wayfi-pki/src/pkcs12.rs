//! PKCS#12 bundling.
//!
//! Modern OpenSSL encrypts PKCS#12 content with PBES2/AES. Several onboarding
//! targets (older Android, Apple configuration profiles) only accept the
//! legacy PBE-SHA1-3DES encoding with a SHA-1 MAC, so bundles can be
//! re-encoded on demand.

use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::stack::Stack;
use openssl::x509::{X509Ref, X509};

use crate::error::PkiError;

/// Passphrase used when the caller supplies none.
pub const DEFAULT_PASSPHRASE: &str = "pkcs12";

/// Whether CA certificates are included in a PKCS#12 bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// Leaf, key and issuing chain.
    Include,
    /// Leaf and key only.
    ///
    /// Used for OS keychains that would otherwise trust the bundled CA for
    /// unrelated purposes such as HTTPS.
    Exclude,
}

/// Encryption used for the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pkcs12Cipher {
    /// OpenSSL defaults (PBES2, AES-256-CBC, SHA-256 MAC).
    Modern,
    /// PBE-SHA1-3DES for keys and certificates, SHA-1 MAC.
    Legacy3Des,
}

/// Contents of a decoded PKCS#12 bundle.
pub struct ParsedPkcs12 {
    /// Leaf certificate.
    pub certificate: X509,
    /// Private key of the leaf.
    pub private_key: PKey<Private>,
    /// Additional certificates, in bundle order.
    pub chain: Vec<X509>,
}

impl std::fmt::Debug for ParsedPkcs12 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedPkcs12")
            .field("certificate", &crate::cert::subject(&self.certificate))
            .field("private_key", &"[REDACTED]")
            .field("chain", &self.chain.len())
            .finish()
    }
}

/// Bundles a certificate, its key and an optional chain.
pub fn bundle_pkcs12(
    friendly_name: &str,
    certificate: &X509Ref,
    private_key: &PKeyRef<Private>,
    chain: &[X509],
    passphrase: &str,
    cipher: Pkcs12Cipher,
) -> Result<Vec<u8>, PkiError> {
    let mut builder = Pkcs12::builder();
    builder.name(friendly_name).cert(certificate).pkey(private_key);

    if !chain.is_empty() {
        let mut stack = Stack::new()?;
        for ca in chain {
            stack.push(ca.clone())?;
        }
        builder.ca(stack);
    }

    if cipher == Pkcs12Cipher::Legacy3Des {
        builder
            .key_algorithm(Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC)
            .cert_algorithm(Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC)
            .mac_md(MessageDigest::sha1());
    }

    let pkcs12 = builder.build2(passphrase)?;
    Ok(pkcs12.to_der()?)
}

/// Decodes a PKCS#12 bundle.
pub fn parse_pkcs12(der: &[u8], passphrase: &str) -> Result<ParsedPkcs12, PkiError> {
    let parsed = Pkcs12::from_der(der)?.parse2(passphrase)?;

    let certificate = parsed
        .cert
        .ok_or_else(|| PkiError::InvalidBundle("no certificate".to_string()))?;
    let private_key = parsed
        .pkey
        .ok_or_else(|| PkiError::InvalidBundle("no private key".to_string()))?;
    let chain = parsed
        .ca
        .map(|stack| stack.into_iter().collect())
        .unwrap_or_default();

    Ok(ParsedPkcs12 {
        certificate,
        private_key,
        chain,
    })
}

/// Re-encodes a bundle with legacy 3DES encryption, keeping its contents.
pub fn reencode_legacy_cipher(
    der: &[u8],
    passphrase: &str,
    friendly_name: &str,
) -> Result<Vec<u8>, PkiError> {
    let parsed = parse_pkcs12(der, passphrase)?;
    bundle_pkcs12(
        friendly_name,
        &parsed.certificate,
        &parsed.private_key,
        &parsed.chain,
        passphrase,
        Pkcs12Cipher::Legacy3Des,
    )
}

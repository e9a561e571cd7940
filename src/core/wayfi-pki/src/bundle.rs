//! Signed credential bundles.

use chrono::{DateTime, Utc};
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::x509::{X509Ref, X509};

use crate::cert;
use crate::error::PkiError;
use crate::pkcs12::{bundle_pkcs12, ChainMode, Pkcs12Cipher};

/// A signed certificate with its private key and issuing chain.
///
/// The bundle is immutable; every PKCS#12 variant is derived on demand by
/// [`SignedBundle::pkcs12`].
#[derive(Clone)]
pub struct SignedBundle {
    certificate: X509,
    private_key: PKey<Private>,
    chain: Vec<X509>,
}

impl SignedBundle {
    /// Creates a bundle. `chain` is ordered leaf-side first.
    pub fn new(certificate: X509, private_key: PKey<Private>, chain: Vec<X509>) -> Self {
        Self {
            certificate,
            private_key,
            chain,
        }
    }

    /// The leaf certificate.
    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    /// The leaf private key.
    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.private_key
    }

    /// The issuing chain, issuer of the leaf first.
    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    /// The leaf subject common name.
    pub fn common_name(&self) -> Option<String> {
        cert::common_name(&self.certificate)
    }

    /// The leaf expiry.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, PkiError> {
        cert::not_after(&self.certificate)
    }

    /// Encodes the bundle as PKCS#12.
    pub fn pkcs12(
        &self,
        passphrase: &str,
        chain: ChainMode,
        cipher: Pkcs12Cipher,
    ) -> Result<Vec<u8>, PkiError> {
        let name = self.common_name().unwrap_or_default();
        let ca: &[X509] = match chain {
            ChainMode::Include => &self.chain,
            ChainMode::Exclude => &[],
        };
        bundle_pkcs12(
            &name,
            &self.certificate,
            &self.private_key,
            ca,
            passphrase,
            cipher,
        )
    }
}

impl std::fmt::Debug for SignedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedBundle")
            .field("certificate", &cert::subject(&self.certificate))
            .field("private_key", &"[REDACTED]")
            .field("chain", &self.chain.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::keys::{generate_key_pair, KeyAlgorithm};
    use crate::name::DistinguishedName;
    use crate::pkcs12::parse_pkcs12;
    use crate::sign::self_signed_ca;

    fn bundle() -> SignedBundle {
        let ca_key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let ca = self_signed_ca(&DistinguishedName::common_name("Bundle Root"), &ca_key, 5).unwrap();
        let key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let leaf = self_signed_ca(&DistinguishedName::common_name("abc@example.com"), &key, 5)
            .unwrap();
        SignedBundle::new(leaf, key, vec![ca])
    }

    #[test]
    fn test_exclude_chain_holds_only_leaf_and_key() {
        let bundle = bundle();
        let der = bundle
            .pkcs12("pw", ChainMode::Exclude, Pkcs12Cipher::Modern)
            .unwrap();

        let parsed = parse_pkcs12(&der, "pw").unwrap();
        assert!(parsed.chain.is_empty());
        assert!(parsed.private_key.public_eq(bundle.private_key()));
    }

    #[test]
    fn test_legacy_variant_is_semantically_identical() {
        let bundle = bundle();
        let modern = bundle
            .pkcs12("pw", ChainMode::Include, Pkcs12Cipher::Modern)
            .unwrap();
        let legacy = bundle
            .pkcs12("pw", ChainMode::Include, Pkcs12Cipher::Legacy3Des)
            .unwrap();
        assert_ne!(modern, legacy);

        let a = parse_pkcs12(&modern, "pw").unwrap();
        let b = parse_pkcs12(&legacy, "pw").unwrap();
        assert_eq!(
            a.certificate.to_der().unwrap(),
            b.certificate.to_der().unwrap()
        );
        assert!(a.private_key.public_eq(&b.private_key));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", bundle());
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("CN=abc@example.com"));
    }
}

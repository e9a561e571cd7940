//! PKCS#7 signatures for configuration profiles.

use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::{X509Ref, X509};

use crate::cert::{certificate_from_pem, certificates_from_pem};
use crate::error::PkiError;
use crate::keys::{key_matches_certificate, private_key_from_pem};

/// Whether the signed content is embedded in the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMode {
    /// Signature only; the content travels separately.
    Detached,
    /// SignedData wraps the content (what Apple profile installers expect).
    Enveloping,
}

/// Certificate, key and chain used to sign profiles.
#[derive(Clone)]
pub struct SigningAuthority {
    certificate: X509,
    private_key: PKey<Private>,
    chain: Vec<X509>,
}

impl SigningAuthority {
    /// Creates an authority, checking that the key belongs to the certificate.
    pub fn new(
        certificate: X509,
        private_key: PKey<Private>,
        chain: Vec<X509>,
    ) -> Result<Self, PkiError> {
        if !key_matches_certificate(&private_key, &certificate)? {
            return Err(PkiError::InvalidKey(
                "signing key does not match signing certificate".to_string(),
            ));
        }
        Ok(Self {
            certificate,
            private_key,
            chain,
        })
    }

    /// Loads an authority from PEM data. `chain_pem` may be empty.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], chain_pem: &[u8]) -> Result<Self, PkiError> {
        let certificate = certificate_from_pem(cert_pem)?;
        let private_key = private_key_from_pem(key_pem)?;
        let chain = if chain_pem.is_empty() {
            Vec::new()
        } else {
            certificates_from_pem(chain_pem)?
        };
        Self::new(certificate, private_key, chain)
    }

    /// The signing certificate.
    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }
}

impl std::fmt::Debug for SigningAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningAuthority")
            .field("certificate", &crate::cert::subject(&self.certificate))
            .field("private_key", &"[REDACTED]")
            .field("chain", &self.chain.len())
            .finish()
    }
}

/// Signs `data`, returning a DER-encoded PKCS#7 SignedData structure.
pub fn sign_pkcs7(
    data: &[u8],
    authority: &SigningAuthority,
    mode: SignatureMode,
) -> Result<Vec<u8>, PkiError> {
    let mut certs = Stack::new()?;
    for cert in &authority.chain {
        certs.push(cert.clone())?;
    }

    let mut flags = Pkcs7Flags::BINARY;
    if mode == SignatureMode::Detached {
        flags |= Pkcs7Flags::DETACHED;
    }

    let pkcs7 = Pkcs7::sign(
        &authority.certificate,
        &authority.private_key,
        &certs,
        data,
        flags,
    )?;

    Ok(pkcs7.to_der()?)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::keys::{generate_key_pair, KeyAlgorithm};
    use crate::name::DistinguishedName;
    use crate::sign::self_signed_ca;
    use openssl::x509::store::X509StoreBuilder;

    fn authority() -> SigningAuthority {
        let key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let cert = self_signed_ca(&DistinguishedName::common_name("Profile Signer"), &key, 5)
            .unwrap();
        SigningAuthority::new(cert, key, Vec::new()).unwrap()
    }

    fn verify(der: &[u8], authority: &SigningAuthority, detached: Option<&[u8]>) -> Vec<u8> {
        let pkcs7 = Pkcs7::from_der(der).unwrap();
        let certs = Stack::new().unwrap();
        let mut store = X509StoreBuilder::new().unwrap();
        store.add_cert(authority.certificate.clone()).unwrap();
        let store = store.build();

        let mut out = Vec::new();
        pkcs7
            .verify(&certs, &store, detached, Some(&mut out), Pkcs7Flags::NOVERIFY)
            .unwrap();
        out
    }

    #[test]
    fn test_enveloping_signature_embeds_content() {
        let authority = authority();
        let der = sign_pkcs7(b"<plist/>", &authority, SignatureMode::Enveloping).unwrap();
        assert_eq!(verify(&der, &authority, None), b"<plist/>");
    }

    #[test]
    fn test_detached_signature_verifies_with_content() {
        let authority = authority();
        let der = sign_pkcs7(b"payload", &authority, SignatureMode::Detached).unwrap();
        assert_eq!(verify(&der, &authority, Some(b"payload")), b"payload");
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let other = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let cert = self_signed_ca(&DistinguishedName::common_name("Signer"), &key, 5).unwrap();

        let result = SigningAuthority::new(cert, other, Vec::new());
        assert!(matches!(result, Err(PkiError::InvalidKey(_))));
    }
}

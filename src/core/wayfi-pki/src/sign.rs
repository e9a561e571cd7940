//! Certificate signing requests and certificate signing.

use chrono::{DateTime, Duration, Utc};
use openssl::asn1::Asn1Integer;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKeyRef, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Ref, X509Req, X509ReqBuilder, X509ReqRef, X509};
use tracing::debug;

use crate::cert::asn1_time;
use crate::error::PkiError;
use crate::name::{common_name_of, DistinguishedName};

/// Extension set applied when a CSR is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionProfile {
    /// End-user credential for EAP-TLS: `clientAuth`.
    Client,
    /// RADIUS server certificate: `serverAuth`, SAN DNS = common name.
    Server,
    /// Subordinate certificate authority.
    Ca {
        /// Maximum number of intermediates below this CA.
        path_len: Option<u32>,
    },
}

/// Everything needed to turn a CSR into a certificate.
pub struct SigningRequest<'a> {
    /// The request to sign.
    pub csr: &'a X509ReqRef,
    /// Issuing CA certificate.
    pub ca_certificate: &'a X509Ref,
    /// Issuing CA private key.
    pub ca_key: &'a PKeyRef<Private>,
    /// Start of validity.
    pub not_before: DateTime<Utc>,
    /// End of validity.
    pub not_after: DateTime<Utc>,
    /// Extension profile.
    pub profile: ExtensionProfile,
    /// Certificate serial number (must be positive).
    pub serial: i64,
}

/// Generates a CSR for `dn`, self-signed with `key`.
pub fn generate_csr(dn: &DistinguishedName, key: &PKeyRef<Private>) -> Result<X509Req, PkiError> {
    let name = dn.to_x509_name()?;

    let mut builder = X509ReqBuilder::new()?;
    builder.set_version(0)?;
    builder.set_subject_name(&name)?;
    builder.set_pubkey(key)?;
    builder.sign(key, MessageDigest::sha256())?;

    Ok(builder.build())
}

/// Encodes a CSR as PEM text.
pub fn csr_to_pem(csr: &X509ReqRef) -> Result<String, PkiError> {
    let pem = csr.to_pem()?;
    String::from_utf8(pem).map_err(|e| PkiError::InvalidRequest(e.to_string()))
}

/// Parses a PEM CSR.
pub fn csr_from_pem(pem: &[u8]) -> Result<X509Req, PkiError> {
    X509Req::from_pem(pem).map_err(|e| PkiError::InvalidRequest(e.to_string()))
}

fn serial_number(serial: i64) -> Result<Asn1Integer, PkiError> {
    if serial <= 0 {
        return Err(PkiError::InvalidRequest(format!(
            "serial number must be positive, got {serial}"
        )));
    }
    let bn = BigNum::from_dec_str(&serial.to_string())?;
    Ok(bn.to_asn1_integer()?)
}

/// Signs a CSR with the given CA and extension profile.
///
/// The CSR self-signature is verified first, so a request whose subject key
/// does not match its signature is never certified.
pub fn sign_csr(request: &SigningRequest<'_>) -> Result<X509, PkiError> {
    let public_key = request.csr.public_key()?;
    if !request.csr.verify(&public_key)? {
        return Err(PkiError::InvalidRequest(
            "CSR signature does not verify".to_string(),
        ));
    }

    if request.not_after <= request.not_before {
        return Err(PkiError::InvalidRequest(
            "notAfter must be later than notBefore".to_string(),
        ));
    }

    let mut builder = X509Builder::new()?;
    builder.set_version(2)?;
    builder.set_serial_number(&*serial_number(request.serial)?)?;
    builder.set_subject_name(request.csr.subject_name())?;
    builder.set_issuer_name(request.ca_certificate.subject_name())?;
    builder.set_pubkey(&public_key)?;
    builder.set_not_before(&*asn1_time(request.not_before)?)?;
    builder.set_not_after(&*asn1_time(request.not_after)?)?;

    match request.profile {
        ExtensionProfile::Client => {
            builder.append_extension(BasicConstraints::new().critical().build()?)?;
            builder.append_extension(
                KeyUsage::new()
                    .critical()
                    .digital_signature()
                    .key_encipherment()
                    .build()?,
            )?;
            builder.append_extension(ExtendedKeyUsage::new().client_auth().build()?)?;
        }
        ExtensionProfile::Server => {
            let cn = common_name_of(request.csr.subject_name()).ok_or_else(|| {
                PkiError::InvalidRequest("server CSR has no common name".to_string())
            })?;
            builder.append_extension(BasicConstraints::new().critical().build()?)?;
            builder.append_extension(
                KeyUsage::new()
                    .critical()
                    .digital_signature()
                    .key_encipherment()
                    .build()?,
            )?;
            builder.append_extension(ExtendedKeyUsage::new().server_auth().build()?)?;
            let san = SubjectAlternativeName::new()
                .dns(&cn)
                .build(&builder.x509v3_context(Some(request.ca_certificate), None))?;
            builder.append_extension(san)?;
        }
        ExtensionProfile::Ca { path_len } => {
            let mut constraints = BasicConstraints::new();
            constraints.critical().ca();
            if let Some(len) = path_len {
                constraints.pathlen(len);
            }
            builder.append_extension(constraints.build()?)?;
            builder.append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()?,
            )?;
        }
    }

    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(Some(request.ca_certificate), None))?;
    builder.append_extension(ski)?;
    let aki = AuthorityKeyIdentifier::new()
        .keyid(false)
        .build(&builder.x509v3_context(Some(request.ca_certificate), None))?;
    builder.append_extension(aki)?;

    builder.sign(request.ca_key, MessageDigest::sha256())?;
    let cert = builder.build();

    debug!(
        serial = request.serial,
        profile = ?request.profile,
        "Signed certificate request"
    );

    Ok(cert)
}

/// Creates a self-signed root CA certificate valid for `days` days.
///
/// Roots get serial 1; they are created out of band and never appear in a
/// realm's signing log.
pub fn self_signed_ca(
    dn: &DistinguishedName,
    key: &PKeyRef<Private>,
    days: u32,
) -> Result<X509, PkiError> {
    let name = dn.to_x509_name()?;
    let now = Utc::now();

    let mut builder = X509Builder::new()?;
    builder.set_version(2)?;
    builder.set_serial_number(&*serial_number(1)?)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(key)?;
    builder.set_not_before(&*asn1_time(now)?)?;
    builder.set_not_after(&*asn1_time(now + Duration::days(i64::from(days)))?)?;

    builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()?,
    )?;
    let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(ski)?;
    let aki = AuthorityKeyIdentifier::new()
        .keyid(false)
        .build(&builder.x509v3_context(None, None))?;
    builder.append_extension(aki)?;

    builder.sign(key, MessageDigest::sha256())?;
    Ok(builder.build())
}

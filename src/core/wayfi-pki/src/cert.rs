//! Certificate inspection and encoding helpers.

use chrono::{DateTime, TimeZone, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::x509::{X509Ref, X509};

use crate::error::PkiError;
use crate::name::{common_name_of, format_dn};

/// Parses a single PEM certificate.
pub fn certificate_from_pem(pem: &[u8]) -> Result<X509, PkiError> {
    X509::from_pem(pem).map_err(|e| PkiError::InvalidCertificate(e.to_string()))
}

/// Parses a DER certificate.
pub fn certificate_from_der(der: &[u8]) -> Result<X509, PkiError> {
    X509::from_der(der).map_err(|e| PkiError::InvalidCertificate(e.to_string()))
}

/// Parses every certificate in a PEM file, in file order.
pub fn certificates_from_pem(pem: &[u8]) -> Result<Vec<X509>, PkiError> {
    X509::stack_from_pem(pem).map_err(|e| PkiError::InvalidCertificate(e.to_string()))
}

/// Encodes a certificate as PEM text.
pub fn certificate_to_pem(cert: &X509Ref) -> Result<String, PkiError> {
    let pem = cert.to_pem()?;
    String::from_utf8(pem).map_err(|e| PkiError::InvalidCertificate(e.to_string()))
}

/// Returns the subject DN in canonical text form.
pub fn subject(cert: &X509Ref) -> String {
    format_dn(cert.subject_name())
}

/// Returns the issuer DN in canonical text form.
pub fn issuer(cert: &X509Ref) -> String {
    format_dn(cert.issuer_name())
}

/// Returns the first subject common name.
pub fn common_name(cert: &X509Ref) -> Option<String> {
    common_name_of(cert.subject_name())
}

/// Returns the DNS entries of the subjectAltName extension.
pub fn dns_names(cert: &X509Ref) -> Vec<String> {
    cert.subject_alt_names()
        .map(|names| {
            names
                .iter()
                .filter_map(|name| name.dnsname().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

/// Returns true if the certificate carries basicConstraints with `CA:TRUE`.
pub fn is_ca(cert: &X509Ref) -> Result<bool, PkiError> {
    let der = cert.to_der()?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der)
        .map_err(|e| PkiError::InvalidCertificate(e.to_string()))?;

    let constraints = parsed
        .basic_constraints()
        .map_err(|e| PkiError::InvalidCertificate(e.to_string()))?;

    Ok(constraints.map(|ext| ext.value.ca).unwrap_or(false))
}

/// Returns true if the certificate names itself as issuer and verifies
/// under its own public key.
pub fn is_self_signed(cert: &X509Ref) -> Result<bool, PkiError> {
    if subject(cert) != issuer(cert) {
        return Ok(false);
    }
    let public = cert.public_key()?;
    Ok(cert.verify(&public)?)
}

/// Returns true if `cert` was signed by `issuer_cert`.
pub fn is_issued_by(cert: &X509Ref, issuer_cert: &X509Ref) -> Result<bool, PkiError> {
    if issuer(cert) != subject(issuer_cert) {
        return Ok(false);
    }
    let public = issuer_cert.public_key()?;
    Ok(cert.verify(&public)?)
}

/// Returns the notBefore time.
pub fn not_before(cert: &X509Ref) -> Result<DateTime<Utc>, PkiError> {
    asn1_to_datetime(cert.not_before())
}

/// Returns the notAfter time.
pub fn not_after(cert: &X509Ref) -> Result<DateTime<Utc>, PkiError> {
    asn1_to_datetime(cert.not_after())
}

/// Converts a UTC timestamp to an ASN.1 time.
pub fn asn1_time(time: DateTime<Utc>) -> Result<Asn1Time, PkiError> {
    Ok(Asn1Time::from_unix(time.timestamp())?)
}

fn asn1_to_datetime(time: &Asn1TimeRef) -> Result<DateTime<Utc>, PkiError> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);

    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| PkiError::InvalidCertificate("timestamp out of range".to_string()))
}

//! Distinguished names.
//!
//! Subjects are stored as text in the relational store (the CA table is keyed
//! by subject), so formatting must be deterministic: attributes are emitted in
//! certificate order as `SN=value` joined with `", "`.

use openssl::asn1::Asn1StringRef;
use openssl::nid::Nid;
use openssl::x509::{X509Name, X509NameBuilder, X509NameRef};

use crate::error::PkiError;

/// Upper bound for a common name (`ub-common-name` in RFC 5280).
pub const MAX_COMMON_NAME_LEN: usize = 64;

/// An ordered list of distinguished name attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistinguishedName {
    entries: Vec<(String, String)>,
}

impl DistinguishedName {
    /// Creates an empty name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a name holding only a common name.
    pub fn common_name(cn: impl Into<String>) -> Self {
        Self::new().with("CN", cn)
    }

    /// Appends an attribute (`CN`, `O`, `OU`, `C`, `L`, `ST`, ...).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((field.into(), value.into()));
        self
    }

    /// Returns the first common name, if any.
    pub fn cn(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(field, _)| field == "CN")
            .map(|(_, value)| value.as_str())
    }

    /// Builds the OpenSSL representation.
    ///
    /// # Errors
    ///
    /// Fails when a common name exceeds 64 octets or an attribute is unknown.
    pub fn to_x509_name(&self) -> Result<X509Name, PkiError> {
        if let Some(cn) = self.cn() {
            if cn.is_empty() || cn.len() > MAX_COMMON_NAME_LEN {
                return Err(PkiError::InvalidRequest(format!(
                    "common name must be 1..={MAX_COMMON_NAME_LEN} octets, got {}",
                    cn.len()
                )));
            }
        }

        let mut builder = X509NameBuilder::new()?;
        for (field, value) in &self.entries {
            builder
                .append_entry_by_text(field, value)
                .map_err(|e| PkiError::InvalidRequest(format!("{field}={value}: {e}")))?;
        }
        Ok(builder.build())
    }
}

impl std::fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(field, value)| format!("{field}={}", escape(value)))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace(',', "\\,")
}

/// Formats an OpenSSL name in the same textual form as `DistinguishedName`.
pub fn format_dn(name: &X509NameRef) -> String {
    let parts: Vec<String> = name
        .entries()
        .map(|entry| {
            let field = entry
                .object()
                .nid()
                .short_name()
                .map(str::to_owned)
                .unwrap_or_else(|_| entry.object().to_string());
            format!("{field}={}", escape(&entry_text(entry.data())))
        })
        .collect();
    parts.join(", ")
}

/// Returns the first common name of an OpenSSL name.
pub fn common_name_of(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| entry_text(entry.data()))
}

/// Decodes an entry value from its raw bytes, keeping interior NULs.
fn entry_text(data: &Asn1StringRef) -> String {
    String::from_utf8_lossy(data.as_slice()).into_owned()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_format_dn() {
        let dn = DistinguishedName::new()
            .with("C", "NL")
            .with("O", "Example, Inc")
            .with("CN", "Example Root");
        let name = dn.to_x509_name().unwrap();

        assert_eq!(format_dn(&name), dn.to_string());
        assert_eq!(dn.to_string(), "C=NL, O=Example\\, Inc, CN=Example Root");
    }

    #[test]
    fn test_common_name_lookup() {
        let dn = DistinguishedName::common_name("abc@example.com");
        assert_eq!(dn.cn(), Some("abc@example.com"));

        let name = dn.to_x509_name().unwrap();
        assert_eq!(common_name_of(&name).as_deref(), Some("abc@example.com"));
    }

    #[test]
    fn test_common_name_keeps_interior_nul() {
        let name = DistinguishedName::common_name("evil.example.com\0.attacker.net")
            .to_x509_name()
            .unwrap();
        assert_eq!(
            common_name_of(&name).as_deref(),
            Some("evil.example.com\0.attacker.net")
        );
        assert_eq!(format_dn(&name), "CN=evil.example.com\0.attacker.net");
    }

    #[test]
    fn test_common_name_length_limit() {
        let ok = DistinguishedName::common_name("a".repeat(MAX_COMMON_NAME_LEN));
        assert!(ok.to_x509_name().is_ok());

        let too_long = DistinguishedName::common_name("a".repeat(MAX_COMMON_NAME_LEN + 1));
        assert!(matches!(
            too_long.to_x509_name(),
            Err(PkiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dn = DistinguishedName::new().with("NOPE", "value");
        assert!(dn.to_x509_name().is_err());
    }
}

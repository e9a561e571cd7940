//! Validated registry records.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::RegistryError;
use crate::format::ProfileFormat;

/// Affiliation key that matches when no other affiliation does.
pub const WILDCARD_AFFILIATION: &str = "*";

/// Browser/SSO authentication backend in front of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBackend {
    /// SAML service provider.
    Saml,
    /// HTTP basic authentication.
    Basic,
    /// Development backend that accepts any user.
    Dev,
}

impl AuthBackend {
    /// Configuration identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saml => "saml",
            Self::Basic => "basic",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for AuthBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthBackend {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saml" => Ok(Self::Saml),
            "basic" => Ok(Self::Basic),
            "dev" => Ok(Self::Dev),
            other => Err(RegistryError::Configuration(format!(
                "unknown auth backend: {other}"
            ))),
        }
    }
}

/// Authentication settings of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Selected backend.
    pub backend: AuthBackend,
    /// Backend-specific parameters, passed through opaquely.
    pub params: BTreeMap<String, String>,
}

/// Minimum RSN cipher a client must negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RsnProto {
    /// AES-CCMP (WPA2).
    #[default]
    Ccmp,
    /// TKIP (WPA).
    Tkip,
}

impl RsnProto {
    /// Identifier used in configuration and in EAP-config documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ccmp => "CCMP",
            Self::Tkip => "TKIP",
        }
    }
}

impl FromStr for RsnProto {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CCMP" => Ok(Self::Ccmp),
            "TKIP" => Ok(Self::Tkip),
            _ => Err(RegistryError::Configuration(format!(
                "unknown RSN protocol: {s}"
            ))),
        }
    }
}

/// A Wi-Fi network a realm's credentials authenticate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    /// Plain SSID.
    Ssid {
        /// Network name.
        ssid: String,
        /// Minimum RSN cipher.
        min_rsn_proto: RsnProto,
    },
    /// Hotspot 2.0 / Passpoint.
    Passpoint {
        /// Roaming consortium OIs, lowercase hex.
        oids: Vec<String>,
        /// NAI realm names.
        nai_realms: Vec<String>,
        /// Home operator domain.
        domain: Option<String>,
    },
}

/// Helpdesk contact details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Support mail address.
    pub mail: String,
    /// Support web page.
    pub web: String,
    /// Support phone number.
    pub phone: String,
    /// Logo image file.
    pub logo: Option<PathBuf>,
}

/// A loaded logo image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logo {
    /// MIME type derived from the file extension.
    pub mime: &'static str,
    /// Image bytes.
    pub data: Vec<u8>,
}

impl Contact {
    /// Reads the logo file, if one is configured.
    pub fn load_logo(&self) -> Result<Option<Logo>, RegistryError> {
        let Some(path) = &self.logo else {
            return Ok(None);
        };

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let mime = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "svg" => "image/svg+xml",
            other => {
                return Err(RegistryError::Configuration(format!(
                    "unsupported logo type {other:?}: {}",
                    path.display()
                )))
            }
        };

        let data = std::fs::read(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Some(Logo { mime, data }))
    }
}

/// A realm credentials are issued for.
///
/// Network and contact references are resolved at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    /// Dot-scoped realm id, e.g. `staff.example.com`.
    pub realm_id: String,
    /// Human readable name.
    pub display_name: String,
    /// Free-form description.
    pub description: String,
    /// Networks the realm's credentials are configured for.
    pub networks: Vec<Network>,
    /// Helpdesk contact.
    pub contact: Option<Contact>,
}

impl Realm {
    /// Returns true if any configured network is a plain SSID.
    pub fn has_ssid_network(&self) -> bool {
        self.networks
            .iter()
            .any(|network| matches!(network, Network::Ssid { .. }))
    }
}

/// An onboarding site, identified by its HTTP host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// HTTP host the provider is served under.
    pub host: String,
    /// Human readable name.
    pub display_name: String,
    /// Authentication backend configuration.
    pub auth: AuthConfig,
    /// Affiliation to realm ids; `*` applies when nothing else matches.
    pub realm_map: BTreeMap<String, Vec<String>>,
    /// Helpdesk contact.
    pub contact: Option<Contact>,
    /// Formats offered for download.
    pub formats: Vec<ProfileFormat>,
}

impl Provider {
    /// Realm ids a user with `affiliations` may obtain credentials for.
    ///
    /// Realms are collected in affiliation order without duplicates. When no
    /// affiliation is mapped, the wildcard entry is used.
    pub fn realms_for_affiliations<S: AsRef<str>>(&self, affiliations: &[S]) -> Vec<&str> {
        let mut realms: Vec<&str> = Vec::new();

        for affiliation in affiliations {
            if let Some(ids) = self.realm_map.get(affiliation.as_ref()) {
                for id in ids {
                    if !realms.contains(&id.as_str()) {
                        realms.push(id);
                    }
                }
            }
        }

        if realms.is_empty() {
            if let Some(ids) = self.realm_map.get(WILDCARD_AFFILIATION) {
                realms.extend(ids.iter().map(String::as_str));
            }
        }

        realms
    }

    /// Returns true if the provider offers `format`.
    pub fn offers(&self, format: ProfileFormat) -> bool {
        self.formats.contains(&format)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn provider() -> Provider {
        let mut realm_map = BTreeMap::new();
        realm_map.insert("staff".to_string(), vec!["staff.example.com".to_string()]);
        realm_map.insert(
            "student".to_string(),
            vec![
                "student.example.com".to_string(),
                "staff.example.com".to_string(),
            ],
        );
        realm_map.insert("*".to_string(), vec!["guest.example.com".to_string()]);

        Provider {
            host: "wayfi.example.com".to_string(),
            display_name: "Example".to_string(),
            auth: AuthConfig {
                backend: AuthBackend::Dev,
                params: BTreeMap::new(),
            },
            realm_map,
            contact: None,
            formats: vec![ProfileFormat::EapConfig],
        }
    }

    #[test]
    fn test_affiliation_order_and_dedup() {
        let provider = provider();
        assert_eq!(
            provider.realms_for_affiliations(&["student", "staff"]),
            vec!["student.example.com", "staff.example.com"]
        );
    }

    #[test]
    fn test_wildcard_only_when_nothing_matched() {
        let provider = provider();
        assert_eq!(
            provider.realms_for_affiliations(&["alumni"]),
            vec!["guest.example.com"]
        );
        assert_eq!(
            provider.realms_for_affiliations::<&str>(&[]),
            vec!["guest.example.com"]
        );
        assert!(!provider
            .realms_for_affiliations(&["staff"])
            .contains(&"guest.example.com"));
    }

    #[test]
    fn test_auth_backend_identifiers() {
        assert_eq!("saml".parse::<AuthBackend>().unwrap(), AuthBackend::Saml);
        assert!(matches!(
            "ldap".parse::<AuthBackend>(),
            Err(RegistryError::Configuration(_))
        ));
    }

    #[test]
    fn test_logo_mime_from_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logo.PNG");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let contact = Contact {
            mail: "help@example.com".to_string(),
            web: "https://example.com".to_string(),
            phone: "+1".to_string(),
            logo: Some(path),
        };
        let logo = contact.load_logo().unwrap().unwrap();
        assert_eq!(logo.mime, "image/png");
        assert_eq!(logo.data, b"\x89PNG");
    }
}

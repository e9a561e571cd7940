//! The loaded registry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use wayfi_pki::hostname::is_valid_hostname;

use crate::config::{
    RawConfig, RawContact, RawNetwork, RawProvider, RawRealm, SigningConfig, StorageConfig,
    DATA_DIR_ENV,
};
use crate::error::RegistryError;
use crate::format::ProfileFormat;
use crate::model::{AuthConfig, Contact, Network, Provider, Realm, RsnProto};
use crate::realm::validate_realm_id;

/// Immutable, validated configuration.
#[derive(Debug, Clone)]
pub struct Registry {
    storage: StorageConfig,
    signing: Option<SigningConfig>,
    realms: BTreeMap<String, Realm>,
    providers: BTreeMap<String, Provider>,
}

impl Registry {
    /// Parses and validates a TOML document. Relative paths are kept as is.
    pub fn from_toml_str(source: &str) -> Result<Self, RegistryError> {
        let raw: RawConfig = toml::from_str(source)?;
        Self::build(raw)
    }

    /// Loads a configuration file.
    ///
    /// Relative paths in the file are resolved against its directory, and
    /// `WAYFI_DATA_DIR` overrides `storage.data_dir`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut raw: RawConfig = toml::from_str(&source)?;
        if let Some(base) = path.parent() {
            raw.rebase_paths(base);
        }

        let mut registry = Self::build(raw)?;
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            registry = registry.with_data_dir(PathBuf::from(dir));
        }

        info!(
            path = %path.display(),
            realms = registry.realms.len(),
            providers = registry.providers.len(),
            "Registry loaded"
        );
        Ok(registry)
    }

    /// Replaces the storage directory.
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.storage.data_dir = data_dir;
        self
    }

    /// Storage settings.
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Profile signing settings, if configured.
    pub fn signing(&self) -> Option<&SigningConfig> {
        self.signing.as_ref()
    }

    /// Looks up a provider by HTTP host.
    pub fn provider(&self, host: &str) -> Result<&Provider, RegistryError> {
        self.providers
            .get(host)
            .ok_or_else(|| RegistryError::Configuration(format!("no provider for host {host}")))
    }

    /// All providers, ordered by host.
    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    /// Looks up a realm by id.
    pub fn realm(&self, realm_id: &str) -> Result<&Realm, RegistryError> {
        self.realms
            .get(realm_id)
            .ok_or_else(|| RegistryError::Configuration(format!("no realm {realm_id}")))
    }

    /// All realms, ordered by id.
    pub fn realms(&self) -> impl Iterator<Item = &Realm> {
        self.realms.values()
    }

    /// Realms a user of `host` with `affiliations` may obtain credentials for.
    pub fn realms_for_affiliations<S: AsRef<str>>(
        &self,
        host: &str,
        affiliations: &[S],
    ) -> Result<Vec<&Realm>, RegistryError> {
        self.provider(host)?
            .realms_for_affiliations(affiliations)
            .into_iter()
            .map(|id| self.realm(id))
            .collect()
    }

    fn build(raw: RawConfig) -> Result<Self, RegistryError> {
        if raw.storage.database.is_empty() {
            return Err(RegistryError::Configuration(
                "storage.database may not be empty".to_string(),
            ));
        }

        let contacts = build_contacts(raw.contacts)?;
        let networks = build_networks(raw.networks)?;
        let realms = build_realms(raw.realms, &networks, &contacts)?;
        let providers = build_providers(raw.providers, &realms, &contacts)?;

        debug!(
            contacts = contacts.len(),
            networks = networks.len(),
            "Configuration validated"
        );

        Ok(Self {
            storage: raw.storage,
            signing: raw.signing,
            realms,
            providers,
        })
    }
}

fn duplicate(kind: &str, id: &str) -> RegistryError {
    RegistryError::Configuration(format!("duplicate {kind} {id:?}"))
}

fn configuration(error: RegistryError) -> RegistryError {
    match error {
        RegistryError::Validation(msg) => RegistryError::Configuration(msg),
        other => other,
    }
}

fn build_contacts(raw: Vec<RawContact>) -> Result<HashMap<String, Contact>, RegistryError> {
    let mut contacts = HashMap::new();
    for contact in raw {
        let id = contact.id;
        let entry = Contact {
            mail: contact.mail,
            web: contact.web,
            phone: contact.phone,
            logo: contact.logo,
        };
        if contacts.insert(id.clone(), entry).is_some() {
            return Err(duplicate("contact", &id));
        }
    }
    Ok(contacts)
}

fn validate_oid(oid: &str) -> Result<String, RegistryError> {
    if oid.is_empty() || oid.len() % 2 != 0 || !oid.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RegistryError::Configuration(format!(
            "roaming consortium OI must be even-length hex: {oid:?}"
        )));
    }
    Ok(oid.to_ascii_lowercase())
}

fn build_networks(raw: Vec<RawNetwork>) -> Result<HashMap<String, Network>, RegistryError> {
    let mut networks = HashMap::new();
    for network in raw {
        let id = network.id().to_string();
        let entry = match network {
            RawNetwork::Ssid {
                ssid,
                min_rsn_proto,
                ..
            } => {
                if ssid.is_empty() || ssid.len() > 32 {
                    return Err(RegistryError::Configuration(format!(
                        "network {id}: SSID must be 1..=32 octets"
                    )));
                }
                let min_rsn_proto = match min_rsn_proto {
                    Some(proto) => proto.parse()?,
                    None => RsnProto::default(),
                };
                Network::Ssid {
                    ssid,
                    min_rsn_proto,
                }
            }
            RawNetwork::Passpoint {
                oids,
                nai_realms,
                domain,
                ..
            } => {
                if oids.is_empty() && nai_realms.is_empty() {
                    return Err(RegistryError::Configuration(format!(
                        "passpoint network {id} needs at least one OI or NAI realm"
                    )));
                }
                let oids = oids
                    .iter()
                    .map(|oid| validate_oid(oid))
                    .collect::<Result<Vec<_>, _>>()?;
                for name in nai_realms.iter().chain(domain.iter()) {
                    if !is_valid_hostname(name) {
                        return Err(RegistryError::Configuration(format!(
                            "passpoint network {id}: invalid domain {name:?}"
                        )));
                    }
                }
                Network::Passpoint {
                    oids,
                    nai_realms,
                    domain,
                }
            }
        };
        if networks.insert(id.clone(), entry).is_some() {
            return Err(duplicate("network", &id));
        }
    }
    Ok(networks)
}

fn lookup_contact(
    owner: &str,
    id: Option<String>,
    contacts: &HashMap<String, Contact>,
) -> Result<Option<Contact>, RegistryError> {
    id.map(|id| {
        contacts.get(&id).cloned().ok_or_else(|| {
            RegistryError::Configuration(format!("{owner} references unknown contact {id:?}"))
        })
    })
    .transpose()
}

fn build_realms(
    raw: Vec<RawRealm>,
    networks: &HashMap<String, Network>,
    contacts: &HashMap<String, Contact>,
) -> Result<BTreeMap<String, Realm>, RegistryError> {
    let mut realms = BTreeMap::new();
    for realm in raw {
        validate_realm_id(&realm.id).map_err(configuration)?;

        let owner = format!("realm {}", realm.id);
        let resolved = realm
            .networks
            .iter()
            .map(|id| {
                networks.get(id).cloned().ok_or_else(|| {
                    RegistryError::Configuration(format!("{owner} references unknown network {id:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let entry = Realm {
            display_name: realm.display_name.unwrap_or_else(|| realm.id.clone()),
            description: realm.description,
            networks: resolved,
            contact: lookup_contact(&owner, realm.contact, contacts)?,
            realm_id: realm.id.clone(),
        };
        if realms.insert(realm.id.clone(), entry).is_some() {
            return Err(duplicate("realm", &realm.id));
        }
    }
    Ok(realms)
}

fn build_providers(
    raw: Vec<RawProvider>,
    realms: &BTreeMap<String, Realm>,
    contacts: &HashMap<String, Contact>,
) -> Result<BTreeMap<String, Provider>, RegistryError> {
    let mut providers = BTreeMap::new();
    for provider in raw {
        if !is_valid_hostname(&provider.host) {
            return Err(RegistryError::Configuration(format!(
                "invalid provider host {:?}",
                provider.host
            )));
        }
        let owner = format!("provider {}", provider.host);

        for (affiliation, ids) in &provider.realm_map {
            if affiliation.is_empty() {
                return Err(RegistryError::Configuration(format!(
                    "{owner} has an empty affiliation key"
                )));
            }
            if let Some(id) = ids.iter().find(|id| !realms.contains_key(id.as_str())) {
                return Err(RegistryError::Configuration(format!(
                    "{owner} maps {affiliation:?} to unknown realm {id:?}"
                )));
            }
        }

        let formats = match provider.formats {
            None => ProfileFormat::ALL.to_vec(),
            Some(ids) => {
                let mut seen = HashSet::new();
                let mut formats = Vec::new();
                for id in ids {
                    let format: ProfileFormat = id.parse().map_err(configuration)?;
                    if seen.insert(format) {
                        formats.push(format);
                    }
                }
                formats
            }
        };

        let entry = Provider {
            host: provider.host.clone(),
            display_name: provider.display_name,
            auth: AuthConfig {
                backend: provider.auth.backend.parse()?,
                params: provider.auth.params,
            },
            realm_map: provider.realm_map,
            contact: lookup_contact(&owner, provider.contact, contacts)?,
            formats,
        };
        if providers.insert(provider.host.clone(), entry).is_some() {
            return Err(duplicate("provider", &provider.host));
        }
    }
    Ok(providers)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::model::AuthBackend;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[storage]
data_dir = "var"
database = "wayfi"

[[contact]]
id = "helpdesk"
mail = "help@example.com"
web = "https://example.com/help"
phone = "+31 20 000 0000"

[[network]]
id = "eduroam"
type = "ssid"
ssid = "eduroam"

[[network]]
id = "eduroam-hs20"
type = "passpoint"
oids = ["5A03BA0000", "001bc50460"]
nai_realms = ["eduroam.org"]
domain = "eduroam.org"

[[realm]]
id = "example.com"
display_name = "Example"
networks = ["eduroam", "eduroam-hs20"]
contact = "helpdesk"

[[realm]]
id = "staff.example.com"
networks = ["eduroam"]

[[provider]]
host = "wayfi.example.com"
display_name = "Example onboarding"
contact = "helpdesk"
formats = ["eap-config", "onc"]
auth = { backend = "saml", params = { idp = "https://idp.example.com" } }
realm_map = { "*" = ["example.com"], staff = ["staff.example.com"] }
"#;

    fn with_extra(extra: &str) -> Result<Registry, RegistryError> {
        Registry::from_toml_str(&format!("{CONFIG}\n{extra}"))
    }

    #[test]
    fn test_parse_full_config() {
        let registry = Registry::from_toml_str(CONFIG).unwrap();

        let provider = registry.provider("wayfi.example.com").unwrap();
        assert_eq!(provider.auth.backend, AuthBackend::Saml);
        assert_eq!(
            provider.auth.params.get("idp").map(String::as_str),
            Some("https://idp.example.com")
        );
        assert_eq!(
            provider.formats,
            vec![ProfileFormat::EapConfig, ProfileFormat::Onc]
        );
        assert_eq!(provider.contact.as_ref().unwrap().mail, "help@example.com");

        let realm = registry.realm("example.com").unwrap();
        assert_eq!(realm.networks.len(), 2);
        assert!(realm.has_ssid_network());
        match &realm.networks[1] {
            Network::Passpoint { oids, .. } => {
                assert_eq!(oids, &vec!["5a03ba0000".to_string(), "001bc50460".to_string()]);
            }
            other => panic!("unexpected network {other:?}"),
        }

        let staff = registry.realm("staff.example.com").unwrap();
        assert_eq!(staff.display_name, "staff.example.com");
        assert!(staff.contact.is_none());
    }

    #[test]
    fn test_realms_for_affiliations() {
        let registry = Registry::from_toml_str(CONFIG).unwrap();

        let staff = registry
            .realms_for_affiliations("wayfi.example.com", &["staff"])
            .unwrap();
        assert_eq!(staff[0].realm_id, "staff.example.com");

        let other = registry
            .realms_for_affiliations("wayfi.example.com", &["student"])
            .unwrap();
        assert_eq!(other[0].realm_id, "example.com");
    }

    #[test]
    fn test_unknown_lookups_are_configuration_errors() {
        let registry = Registry::from_toml_str(CONFIG).unwrap();
        assert!(matches!(
            registry.provider("nope.example.com"),
            Err(RegistryError::Configuration(_))
        ));
        assert!(matches!(
            registry.realm("nope.example.com"),
            Err(RegistryError::Configuration(_))
        ));
    }

    #[test]
    fn test_formats_default_to_all() {
        let registry = with_extra(
            r#"
[[provider]]
host = "other.example.com"
display_name = "Other"
auth = { backend = "dev" }
"#,
        )
        .unwrap();
        let provider = registry.provider("other.example.com").unwrap();
        assert_eq!(provider.formats, ProfileFormat::ALL.to_vec());
        assert!(provider.offers(ProfileFormat::Mobileconfig));
    }

    #[test]
    fn test_load_time_rejections() {
        let cases = [
            r#"
[[provider]]
host = "x.example.com"
display_name = "X"
auth = { backend = "ldap" }
"#,
            r#"
[[provider]]
host = "x.example.com"
display_name = "X"
auth = { backend = "dev" }
formats = ["windows"]
"#,
            r#"
[[provider]]
host = "x.example.com"
display_name = "X"
auth = { backend = "dev" }
realm_map = { "*" = ["missing.example.com"] }
"#,
            r#"
[[realm]]
id = ".bad.example.com"
"#,
            r#"
[[realm]]
id = "x.example.com"
networks = ["missing"]
"#,
            r#"
[[realm]]
id = "x.example.com"
contact = "missing"
"#,
            r#"
[[realm]]
id = "example.com"
"#,
            r#"
[[network]]
id = "hs20"
type = "passpoint"
"#,
            r#"
[[network]]
id = "hs20"
type = "passpoint"
oids = ["abc"]
"#,
            r#"
[[network]]
id = "hs20"
type = "passpoint"
oids = ["zz00"]
"#,
        ];

        for (i, extra) in cases.iter().enumerate() {
            let result = with_extra(extra);
            assert!(
                matches!(result, Err(RegistryError::Configuration(_))),
                "case {i} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_unknown_network_type_is_parse_error() {
        let result = with_extra(
            r#"
[[network]]
id = "wired"
type = "ethernet"
"#,
        );
        assert!(matches!(result, Err(RegistryError::Parse(_))));
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wayfi.toml");
        std::fs::write(
            &path,
            r#"
[storage]
data_dir = "state"

[signing]
certificate = "signer.pem"
key = "signer.key"
"#,
        )
        .unwrap();

        let registry = Registry::load(&path).unwrap();
        let signing = registry.signing().unwrap();
        assert_eq!(signing.certificate, dir.path().join("signer.pem"));
        assert_eq!(signing.key, dir.path().join("signer.key"));
        if std::env::var_os(DATA_DIR_ENV).is_none() {
            assert_eq!(registry.storage().data_dir, dir.path().join("state"));
        }
    }

    #[test]
    fn test_missing_file() {
        let result = Registry::load("/nonexistent/wayfi.toml");
        assert!(matches!(result, Err(RegistryError::Io { .. })));
    }
}

//! Configuration file format.
//!
//! ```toml
//! [storage]
//! data_dir = "var"
//! database = "wayfi"
//!
//! [[contact]]
//! id = "helpdesk"
//! mail = "help@example.com"
//! web = "https://example.com/help"
//! phone = "+31 20 000 0000"
//!
//! [[network]]
//! id = "eduroam"
//! type = "ssid"
//! ssid = "eduroam"
//!
//! [[realm]]
//! id = "example.com"
//! display_name = "Example"
//! networks = ["eduroam"]
//! contact = "helpdesk"
//!
//! [[provider]]
//! host = "wayfi.example.com"
//! display_name = "Example onboarding"
//! auth = { backend = "saml", params = { idp = "https://idp.example.com" } }
//! realm_map = { "*" = ["example.com"] }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use wayfi_pki::SigningAuthority;

use crate::error::RegistryError;

/// Configuration file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/wayfi.toml";

/// Environment variable overriding `storage.data_dir`.
pub const DATA_DIR_ENV: &str = "WAYFI_DATA_DIR";

/// Where the relational store lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the database file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Database name; the file is `{data_dir}/{database}.db`.
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("var")
}

fn default_database() -> String {
    "wayfi".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: default_database(),
        }
    }
}

/// Profile signing authority, used to sign Apple configuration profiles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    /// Signing certificate (PEM).
    pub certificate: PathBuf,
    /// Signing key (PEM).
    pub key: PathBuf,
    /// Intermediate certificates (PEM), sent along with the signature.
    #[serde(default)]
    pub chain: Vec<PathBuf>,
}

impl SigningConfig {
    /// Loads the certificate, key and chain files.
    pub fn load_authority(&self) -> Result<SigningAuthority, RegistryError> {
        let certificate = read(&self.certificate)?;
        let key = read(&self.key)?;
        let mut chain = Vec::new();
        for path in &self.chain {
            chain.extend(read(path)?);
        }
        Ok(SigningAuthority::from_pem(&certificate, &key, &chain)?)
    }
}

fn read(path: &Path) -> Result<Vec<u8>, RegistryError> {
    std::fs::read(path).map_err(|source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn rebase(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    pub signing: Option<SigningConfig>,
    #[serde(default, rename = "contact")]
    pub contacts: Vec<RawContact>,
    #[serde(default, rename = "network")]
    pub networks: Vec<RawNetwork>,
    #[serde(default, rename = "realm")]
    pub realms: Vec<RawRealm>,
    #[serde(default, rename = "provider")]
    pub providers: Vec<RawProvider>,
}

impl RawConfig {
    /// Makes relative file paths relative to the configuration directory.
    pub fn rebase_paths(&mut self, base: &Path) {
        rebase(base, &mut self.storage.data_dir);
        if let Some(signing) = &mut self.signing {
            rebase(base, &mut signing.certificate);
            rebase(base, &mut signing.key);
            for path in &mut signing.chain {
                rebase(base, path);
            }
        }
        for contact in &mut self.contacts {
            if let Some(logo) = &mut contact.logo {
                rebase(base, logo);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawContact {
    pub id: String,
    pub mail: String,
    pub web: String,
    pub phone: String,
    pub logo: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum RawNetwork {
    Ssid {
        id: String,
        ssid: String,
        min_rsn_proto: Option<String>,
    },
    Passpoint {
        id: String,
        #[serde(default)]
        oids: Vec<String>,
        #[serde(default)]
        nai_realms: Vec<String>,
        domain: Option<String>,
    },
}

impl RawNetwork {
    pub fn id(&self) -> &str {
        match self {
            Self::Ssid { id, .. } | Self::Passpoint { id, .. } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawRealm {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub networks: Vec<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawAuth {
    pub backend: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawProvider {
    pub host: String,
    pub display_name: String,
    pub auth: RawAuth,
    #[serde(default)]
    pub realm_map: BTreeMap<String, Vec<String>>,
    pub contact: Option<String>,
    pub formats: Option<Vec<String>>,
}

//! # Wayfi Registry
//!
//! Static multi-tenant configuration: which providers exist, which realms
//! they map affiliations to, and which networks and contacts each realm
//! advertises.
//!
//! Configuration is read from TOML, validated once, and exposed as immutable
//! typed structures. Unknown identifiers (auth backends, profile formats,
//! realm, network and contact references) are rejected at load time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod realm;
pub mod registry;

pub use config::{SigningConfig, StorageConfig, DATA_DIR_ENV, DEFAULT_CONFIG_PATH};
pub use error::RegistryError;
pub use format::ProfileFormat;
pub use model::{AuthBackend, AuthConfig, Contact, Logo, Network, Provider, Realm, RsnProto};
pub use realm::{resolve_realm_prefix, validate_realm_id};
pub use registry::Registry;

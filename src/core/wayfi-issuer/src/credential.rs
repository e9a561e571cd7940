//! Credentials and the inputs that produce them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use wayfi_pki::{ChainMode, PkiError, Pkcs12Cipher, SignedBundle};
use wayfi_registry::resolve_realm_prefix;

use crate::error::IssuerError;

/// The kind of credential to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// X.509 client certificate for EAP-TLS.
    Certificate,
}

impl CredentialKind {
    /// Identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKind {
    type Err = IssuerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certificate" => Ok(Self::Certificate),
            other => Err(IssuerError::Validation(format!(
                "unknown credential kind: {other}"
            ))),
        }
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Identifier recorded as the requester in the signing log.
    pub user_id: String,
    /// Affiliations reported by the authentication backend.
    pub affiliations: Vec<String>,
    /// Sub-realm prefix reported by the authentication backend.
    pub realm_prefix: Option<String>,
}

impl User {
    /// Creates a user without affiliations or realm prefix.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            affiliations: Vec::new(),
            realm_prefix: None,
        }
    }

    /// The realm this user's credentials are scoped to within `realm`.
    pub fn resolve_realm(&self, realm: &str) -> Result<String, IssuerError> {
        Ok(resolve_realm_prefix(realm, self.realm_prefix.as_deref())?)
    }
}

/// Client details recorded with every signing log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// OAuth client id, or the name of the administrative tool.
    pub client_id: Option<String>,
    /// HTTP user agent.
    pub user_agent: Option<String>,
    /// Remote address.
    pub ip: Option<String>,
}

impl RequestContext {
    /// Context for an administrative tool.
    pub fn admin(tool: impl Into<String>) -> Self {
        Self {
            client_id: Some(tool.into()),
            ..Self::default()
        }
    }
}

/// An issued credential.
///
/// The bundle is immutable; PKCS#12 encodings are derived on demand.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Requester.
    pub user_id: String,
    /// Realm the credential was issued for.
    pub realm_id: String,
    /// Provider host the request came through.
    pub provider: String,
    /// Signed certificate, key and chain.
    pub bundle: SignedBundle,
    /// Certificate serial, equal to the signing log serial.
    pub serial: i64,
}

impl Credential {
    /// Certificate expiry.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, PkiError> {
        self.bundle.expires_at()
    }

    /// Certificate common name, `token@realm` for client credentials.
    pub fn common_name(&self) -> Option<String> {
        self.bundle.common_name()
    }

    /// PKCS#12 encoding of the bundle.
    pub fn pkcs12(
        &self,
        passphrase: &str,
        chain: ChainMode,
        cipher: Pkcs12Cipher,
    ) -> Result<Vec<u8>, PkiError> {
        self.bundle.pkcs12(passphrase, chain, cipher)
    }
}

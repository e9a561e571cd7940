//! Inputs shared by every profile encoder.

use chrono::{DateTime, Utc};
use tracing::debug;
use wayfi_issuer::Credential;
use wayfi_pki::{SigningAuthority, DEFAULT_PASSPHRASE, X509};
use wayfi_registry::Realm;
use wayfi_trust::TrustStore;

use crate::domain::reverse_dns;
use crate::error::ProfileError;

/// Realm configuration combined with the realm's trust data.
#[derive(Debug, Clone)]
pub struct RealmProfile {
    /// Realm as configured in the registry.
    pub realm: Realm,
    /// RADIUS server names clients must accept.
    pub server_names: Vec<String>,
    /// Trusted CA certificates, root first.
    pub ca_certificates: Vec<X509>,
}

impl RealmProfile {
    /// Loads server names and trusted CAs for `realm` from the trust store.
    pub async fn load(trust: &TrustStore, realm: Realm) -> Result<Self, ProfileError> {
        let server_names = trust.server_names(&realm.realm_id).await?;
        let ca_certificates = trust.get_trusted_ca_certificates(&realm.realm_id).await?;
        debug!(
            realm = %realm.realm_id,
            server_names = server_names.len(),
            cas = ca_certificates.len(),
            "Loaded realm profile"
        );
        Ok(Self {
            realm,
            server_names,
            ca_certificates,
        })
    }

    /// Fails unless the realm has trusted CAs and server names, without which
    /// a client cannot authenticate the RADIUS server.
    pub(crate) fn require_server_trust(&self) -> Result<(), ProfileError> {
        if self.ca_certificates.is_empty() {
            return Err(ProfileError::Configuration(format!(
                "realm {} has no trusted CA certificates",
                self.realm.realm_id
            )));
        }
        if self.server_names.is_empty() {
            return Err(ProfileError::Configuration(format!(
                "realm {} has no RADIUS server names",
                self.realm.realm_id
            )));
        }
        Ok(())
    }

    pub(crate) fn require_networks(&self) -> Result<(), ProfileError> {
        if self.realm.networks.is_empty() {
            return Err(ProfileError::UnsupportedNetwork(format!(
                "realm {} has no networks configured",
                self.realm.realm_id
            )));
        }
        Ok(())
    }
}

/// Everything an encoder needs to produce one profile.
#[derive(Debug, Clone)]
pub struct ProfileContext {
    /// The credential to package.
    pub credential: Credential,
    /// Realm networks and trust data.
    pub realm: RealmProfile,
    /// Optional authority for signing mobileconfig profiles.
    pub signer: Option<SigningAuthority>,
    /// Passphrase chosen by the user, if any.
    pub passphrase: Option<String>,
    /// Generation time, used in filenames.
    pub generated_at: DateTime<Utc>,
}

impl ProfileContext {
    /// The supplied passphrase, or the well-known default.
    pub fn passphrase_or_default(&self) -> &str {
        self.passphrase
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PASSPHRASE)
    }

    /// True when the user supplied no passphrase. Profiles then carry the
    /// default passphrase so the OS can import the bundle unattended.
    pub fn uses_default_passphrase(&self) -> bool {
        self.passphrase.as_deref().map_or(true, str::is_empty)
    }

    /// Realm the profile is issued for.
    ///
    /// This is the credential's realm, so a prefixed sub-realm such as
    /// `staff.example.com` names the profile even though networks and trust
    /// come from the parent realm.
    pub fn realm_id(&self) -> &str {
        &self.credential.realm_id
    }

    /// `reverse-dns(realm).YYYYMMDDTHHMMSSZ.extension`
    pub fn filename(&self, extension: &str) -> String {
        format!(
            "{}.{}.{extension}",
            reverse_dns(self.realm_id()),
            self.generated_at.format("%Y%m%dT%H%M%SZ")
        )
    }

    /// Earliest expiry of the client certificate and the included CAs.
    pub fn valid_until(&self) -> Result<DateTime<Utc>, ProfileError> {
        let mut earliest = self.credential.expires_at()?;
        for ca in &self.realm.ca_certificates {
            earliest = earliest.min(wayfi_pki::cert::not_after(ca)?);
        }
        Ok(earliest)
    }
}

/// ISO-8601 UTC with second precision, as used in the XML formats.
pub(crate) fn iso8601(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::testing::{realm, ssid};
    use tempfile::TempDir;
    use wayfi_pki::keys::generate_key_pair;
    use wayfi_pki::sign::self_signed_ca;
    use wayfi_pki::{DistinguishedName, KeyAlgorithm};

    #[tokio::test]
    async fn test_load_from_trust_store() {
        let dir = TempDir::new().unwrap();
        let trust = TrustStore::open(dir.path(), "profile").await.unwrap();
        trust.create_realm("example.com").await.unwrap();

        let empty = RealmProfile::load(&trust, realm(vec![ssid("eduroam")]))
            .await
            .unwrap();
        assert!(matches!(
            empty.require_server_trust(),
            Err(ProfileError::Configuration(_))
        ));

        let key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let root = self_signed_ca(&DistinguishedName::common_name("Load Root"), &key, 30).unwrap();
        let pem = wayfi_pki::cert::certificate_to_pem(&root).unwrap();
        trust.import_ca(pem.as_bytes(), None).await.unwrap();
        trust.add_trusted_ca("example.com", "CN=Load Root").await.unwrap();
        trust
            .add_server_name("example.com", "radius.example.com")
            .await
            .unwrap();

        let loaded = RealmProfile::load(&trust, realm(vec![ssid("eduroam")]))
            .await
            .unwrap();
        assert_eq!(loaded.server_names, ["radius.example.com"]);
        assert_eq!(loaded.ca_certificates.len(), 1);
        assert!(loaded.require_server_trust().is_ok());
        assert!(loaded.require_networks().is_ok());
    }

    #[test]
    fn test_filename() {
        let ctx = crate::testing::context(vec![ssid("eduroam")], None);
        assert_eq!(ctx.filename("onc"), "com.example.20240301T123005Z.onc");
    }

    #[test]
    fn test_sub_realm_names_the_profile() {
        let mut ctx = crate::testing::context(vec![ssid("eduroam")], None);
        ctx.credential.realm_id = "staff.example.com".to_string();

        assert_eq!(ctx.realm_id(), "staff.example.com");
        assert_eq!(ctx.filename("p12"), "com.example.staff.20240301T123005Z.p12");
    }
}

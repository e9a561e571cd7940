//! # Wayfi Profile Encoders
//!
//! Packages an issued credential into a downloadable network profile.
//!
//! | Format | Content type | Extension |
//! |---|---|---|
//! | eap-config | `application/x-eap-config` | `.eap-config` |
//! | mobileconfig | `application/x-apple-aspen-config` | `.mobileconfig` |
//! | ONC | `application/x-onc` | `.onc` |
//! | PKCS#12 | `application/x-pkcs12` | `.p12` |
//!
//! Every encoder reads the same [`ProfileContext`]; [`generator`] maps a
//! validated [`ProfileFormat`] to its encoder.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod domain;
pub mod eap_config;
pub mod error;
pub mod mobileconfig;
pub mod onc;
pub mod pkcs12;

mod xml;

pub use context::{ProfileContext, RealmProfile};
pub use domain::{longest_common_domain_suffix, reverse_dns};
pub use error::ProfileError;
pub use onc::{decrypt_onc, encrypt_onc};
pub use wayfi_registry::ProfileFormat;

use tracing::info;

/// An encoder for one profile format.
pub trait ProfileGenerator {
    /// The format produced.
    fn format(&self) -> ProfileFormat;

    /// The context the profile is generated from.
    fn context(&self) -> &ProfileContext;

    /// MIME type of the generated document.
    fn content_type(&self) -> &'static str;

    /// File extension, without the dot.
    fn file_extension(&self) -> &'static str;

    /// Encodes the profile.
    fn generate(&self) -> Result<Vec<u8>, ProfileError>;

    /// Download filename, `reverse-dns(realm).timestamp.extension`.
    fn filename(&self) -> String {
        self.context().filename(self.file_extension())
    }
}

/// Returns the encoder for `format`.
pub fn generator(format: ProfileFormat, ctx: &ProfileContext) -> Box<dyn ProfileGenerator + '_> {
    match format {
        ProfileFormat::EapConfig => Box::new(eap_config::EapConfig::new(ctx)),
        ProfileFormat::Mobileconfig => Box::new(mobileconfig::Mobileconfig::new(ctx)),
        ProfileFormat::Onc => Box::new(onc::Onc::new(ctx)),
        ProfileFormat::Pkcs12 => Box::new(pkcs12::Pkcs12::new(ctx)),
    }
}

/// A generated profile, ready to be served or written to disk.
#[derive(Clone, PartialEq, Eq)]
pub struct Profile {
    /// Download filename.
    pub filename: String,
    /// MIME type.
    pub content_type: &'static str,
    /// Encoded document.
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .finish()
    }
}

/// Generates a profile in `format`.
pub fn render(format: ProfileFormat, ctx: &ProfileContext) -> Result<Profile, ProfileError> {
    let generator = generator(format, ctx);
    let data = generator.generate()?;
    let profile = Profile {
        filename: generator.filename(),
        content_type: generator.content_type(),
        data,
    };

    info!(
        format = %format,
        realm = %ctx.credential.realm_id,
        serial = ctx.credential.serial,
        size = profile.data.len(),
        "Profile generated"
    );
    Ok(profile)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
pub(crate) mod testing {
    use chrono::{Duration, TimeZone, Utc};
    use wayfi_issuer::Credential;
    use wayfi_pki::keys::generate_key_pair;
    use wayfi_pki::sign::{generate_csr, self_signed_ca, sign_csr};
    use wayfi_pki::{
        DistinguishedName, ExtensionProfile, KeyAlgorithm, SignedBundle, SigningAuthority,
        SigningRequest,
    };
    use wayfi_registry::{Contact, Network, Realm, RsnProto};

    use crate::context::{ProfileContext, RealmProfile};

    pub(crate) const CLIENT_CN: &str = "abcdef@example.com";

    pub(crate) fn realm(networks: Vec<Network>) -> Realm {
        Realm {
            realm_id: "example.com".to_string(),
            display_name: "Example & Co".to_string(),
            description: "Example campus Wi-Fi".to_string(),
            networks,
            contact: Some(Contact {
                mail: "helpdesk@example.com".to_string(),
                web: "https://help.example.com/".to_string(),
                phone: "+1 555 0100".to_string(),
                logo: None,
            }),
        }
    }

    pub(crate) fn ssid(name: &str) -> Network {
        Network::Ssid {
            ssid: name.to_string(),
            min_rsn_proto: RsnProto::Ccmp,
        }
    }

    pub(crate) fn passpoint() -> Network {
        Network::Passpoint {
            oids: vec!["5a03ba0000".to_string()],
            nai_realms: vec!["example.com".to_string()],
            domain: Some("example.com".to_string()),
        }
    }

    pub(crate) fn context(networks: Vec<Network>, passphrase: Option<&str>) -> ProfileContext {
        let ca_key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let root = self_signed_ca(&DistinguishedName::common_name("Profile Root"), &ca_key, 3650)
            .unwrap();

        let key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let csr = generate_csr(&DistinguishedName::common_name(CLIENT_CN), &key).unwrap();
        let now = Utc::now();
        let leaf = sign_csr(&SigningRequest {
            csr: &csr,
            ca_certificate: &root,
            ca_key: &ca_key,
            not_before: now,
            not_after: now + Duration::days(30),
            profile: ExtensionProfile::Client,
            serial: 7,
        })
        .unwrap();

        ProfileContext {
            credential: Credential {
                user_id: "alice".to_string(),
                realm_id: "example.com".to_string(),
                provider: "portal.example.com".to_string(),
                bundle: SignedBundle::new(leaf, key, vec![root.clone()]),
                serial: 7,
            },
            realm: RealmProfile {
                realm: realm(networks),
                server_names: vec![
                    "radius1.example.com".to_string(),
                    "radius2.example.com".to_string(),
                ],
                ca_certificates: vec![root],
            },
            signer: None,
            passphrase: passphrase.map(str::to_string),
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
        }
    }

    pub(crate) fn signer() -> SigningAuthority {
        let key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let cert = self_signed_ca(&DistinguishedName::common_name("Profile Signer"), &key, 30)
            .unwrap();
        SigningAuthority::new(cert, key, Vec::new()).unwrap()
    }
}

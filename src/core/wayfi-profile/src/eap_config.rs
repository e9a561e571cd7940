//! EAP-config XML, as consumed by the geteduroam apps.
//!
//! The document carries the CA chain and accepted server names for server
//! validation, the client identity as an inline base64 PKCS#12 (3DES, for
//! older Android keystores), and the networks the credential applies to.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;
use wayfi_pki::{ChainMode, Pkcs12Cipher};
use wayfi_registry::{Network, ProfileFormat};

use crate::context::{iso8601, ProfileContext};
use crate::error::ProfileError;
use crate::xml::XmlWriter;
use crate::ProfileGenerator;

/// EAP method type for EAP-TLS.
pub const EAP_TLS: u8 = 13;

/// EAP-config encoder.
pub struct EapConfig<'a> {
    ctx: &'a ProfileContext,
}

impl<'a> EapConfig<'a> {
    /// Creates the encoder.
    pub fn new(ctx: &'a ProfileContext) -> Self {
        Self { ctx }
    }

    fn write_server_side(&self, xml: &mut XmlWriter) -> Result<(), ProfileError> {
        xml.open("ServerSideCredential", &[]);
        for ca in &self.ctx.realm.ca_certificates {
            xml.element(
                "CA",
                &[("format", "X.509"), ("encoding", "base64")],
                &BASE64.encode(ca.to_der().map_err(wayfi_pki::PkiError::from)?),
            );
        }
        for name in &self.ctx.realm.server_names {
            xml.element("ServerID", &[], name);
        }
        xml.close("ServerSideCredential");
        Ok(())
    }

    fn write_client_side(&self, xml: &mut XmlWriter) -> Result<(), ProfileError> {
        let pkcs12 = self.ctx.credential.pkcs12(
            self.ctx.passphrase_or_default(),
            ChainMode::Include,
            Pkcs12Cipher::Legacy3Des,
        )?;

        xml.open("ClientSideCredential", &[]);
        xml.element(
            "ClientCertificate",
            &[("format", "PKCS12"), ("encoding", "base64")],
            &BASE64.encode(pkcs12),
        );
        if self.ctx.uses_default_passphrase() {
            xml.element("Passphrase", &[], self.ctx.passphrase_or_default());
        }
        xml.close("ClientSideCredential");
        Ok(())
    }

    fn write_applicability(&self, xml: &mut XmlWriter) {
        xml.open("CredentialApplicability", &[]);
        for network in &self.ctx.realm.realm.networks {
            match network {
                Network::Ssid {
                    ssid,
                    min_rsn_proto,
                } => {
                    xml.open("IEEE80211", &[]);
                    xml.element("SSID", &[], ssid);
                    xml.element("MinRSNProto", &[], min_rsn_proto.as_str());
                    xml.close("IEEE80211");
                }
                Network::Passpoint {
                    oids, nai_realms, ..
                } => {
                    for oid in oids {
                        xml.open("IEEE80211", &[]);
                        xml.element("ConsortiumOID", &[], oid);
                        xml.close("IEEE80211");
                    }
                    for nai_realm in nai_realms {
                        xml.open("IEEE80211", &[]);
                        xml.element("NAIRealm", &[], nai_realm);
                        xml.close("IEEE80211");
                    }
                }
            }
        }
        xml.close("CredentialApplicability");
    }

    fn write_provider_info(&self, xml: &mut XmlWriter) -> Result<(), ProfileError> {
        let realm = &self.ctx.realm.realm;

        xml.open("ProviderInfo", &[]);
        xml.element("DisplayName", &[], &realm.display_name);
        if !realm.description.is_empty() {
            xml.element("Description", &[], &realm.description);
        }
        if let Some(contact) = &realm.contact {
            if let Some(logo) = contact.load_logo()? {
                xml.element(
                    "ProviderLogo",
                    &[("mime", logo.mime), ("encoding", "base64")],
                    &BASE64.encode(&logo.data),
                );
            }
            xml.open("Helpdesk", &[]);
            if !contact.mail.is_empty() {
                xml.element("EmailAddress", &[], &contact.mail);
            }
            if !contact.web.is_empty() {
                xml.element("WebAddress", &[], &contact.web);
            }
            if !contact.phone.is_empty() {
                xml.element("Phone", &[], &contact.phone);
            }
            xml.close("Helpdesk");
        }
        xml.close("ProviderInfo");
        Ok(())
    }
}

impl ProfileGenerator for EapConfig<'_> {
    fn format(&self) -> ProfileFormat {
        ProfileFormat::EapConfig
    }

    fn context(&self) -> &ProfileContext {
        self.ctx
    }

    fn content_type(&self) -> &'static str {
        "application/x-eap-config"
    }

    fn file_extension(&self) -> &'static str {
        "eap-config"
    }

    fn generate(&self) -> Result<Vec<u8>, ProfileError> {
        self.ctx.realm.require_networks()?;
        self.ctx.realm.require_server_trust()?;

        let realm_id = self.ctx.realm_id();
        let eap_type = EAP_TLS.to_string();

        let mut xml = XmlWriter::new(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        xml.open(
            "EAPIdentityProviderList",
            &[
                ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
                ("xsi:noNamespaceSchemaLocation", "eap-metadata.xsd"),
            ],
        );
        xml.open(
            "EAPIdentityProvider",
            &[
                ("ID", realm_id),
                ("namespace", "urn:RFC4282:realm"),
                ("lang", "en"),
                ("version", "1"),
            ],
        );
        xml.element("ValidUntil", &[], &iso8601(self.ctx.valid_until()?));

        xml.open("AuthenticationMethods", &[]);
        xml.open("AuthenticationMethod", &[]);
        xml.open("EAPMethod", &[]);
        xml.element("Type", &[], &eap_type);
        xml.close("EAPMethod");
        self.write_server_side(&mut xml)?;
        self.write_client_side(&mut xml)?;
        xml.close("AuthenticationMethod");
        xml.close("AuthenticationMethods");

        self.write_applicability(&mut xml);
        self.write_provider_info(&mut xml)?;

        xml.close("EAPIdentityProvider");
        xml.close("EAPIdentityProviderList");

        debug!(realm = %realm_id, "Encoded eap-config");
        Ok(xml.finish().into_bytes())
    }
}

//! Apple configuration profiles (`.mobileconfig`).
//!
//! One certificate payload per trusted CA, one identity payload and one
//! Wi-Fi payload per network. The identity payload is a 3DES PKCS#12 without
//! the CA chain so the OS does not trust the CA for unrelated purposes.
//! With a signing authority configured, the plist is wrapped in PKCS#7
//! SignedData.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;
use uuid::Uuid;
use wayfi_pki::cert::{common_name, is_self_signed};
use wayfi_pki::pkcs7::sign_pkcs7;
use wayfi_pki::{ChainMode, PkiError, Pkcs12Cipher, SignatureMode};
use wayfi_registry::{Network, ProfileFormat};

use crate::context::{iso8601, ProfileContext};
use crate::domain::reverse_dns;
use crate::eap_config::EAP_TLS;
use crate::error::ProfileError;
use crate::xml::XmlWriter;
use crate::ProfileGenerator;

const PLIST_PROLOG: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "\n",
    r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#
);

/// Plist value writers.
struct Plist(XmlWriter);

impl Plist {
    fn key(&mut self, key: &str) {
        self.0.element("key", &[], key);
    }

    fn string(&mut self, key: &str, value: &str) {
        self.key(key);
        self.0.element("string", &[], value);
    }

    fn integer(&mut self, key: &str, value: i64) {
        self.key(key);
        self.0.element("integer", &[], &value.to_string());
    }

    fn boolean(&mut self, key: &str, value: bool) {
        self.key(key);
        self.0.empty(if value { "true" } else { "false" });
    }

    fn data(&mut self, key: &str, value: &[u8]) {
        self.key(key);
        self.0.element("data", &[], &BASE64.encode(value));
    }

    fn strings(&mut self, key: &str, values: &[String]) {
        self.key(key);
        self.0.open("array", &[]);
        for value in values {
            self.0.element("string", &[], value);
        }
        self.0.close("array");
    }

    fn open_dict(&mut self) {
        self.0.open("dict", &[]);
    }

    fn close_dict(&mut self) {
        self.0.close("dict");
    }

    /// Common payload keys. Every payload gets a fresh UUID.
    fn payload_header(&mut self, payload_type: &str, identifier: &str, display_name: &str) -> String {
        let uuid = Uuid::new_v4().to_string().to_uppercase();
        self.string("PayloadType", payload_type);
        self.string("PayloadIdentifier", &format!("{identifier}.{uuid}"));
        self.string("PayloadUUID", &uuid);
        self.string("PayloadDisplayName", display_name);
        self.integer("PayloadVersion", 1);
        uuid
    }
}

/// Apple mobileconfig encoder.
pub struct Mobileconfig<'a> {
    ctx: &'a ProfileContext,
}

impl<'a> Mobileconfig<'a> {
    /// Creates the encoder.
    pub fn new(ctx: &'a ProfileContext) -> Self {
        Self { ctx }
    }

    fn identifier(&self) -> String {
        reverse_dns(self.ctx.realm_id())
    }

    /// Writes the CA payloads, returning their UUIDs.
    fn write_ca_payloads(&self, plist: &mut Plist) -> Result<Vec<String>, ProfileError> {
        let identifier = self.identifier();
        let mut uuids = Vec::with_capacity(self.ctx.realm.ca_certificates.len());

        for (index, ca) in self.ctx.realm.ca_certificates.iter().enumerate() {
            let name = common_name(ca).unwrap_or_else(|| format!("CA {}", index + 1));
            let payload_type = if is_self_signed(ca)? {
                "com.apple.security.root"
            } else {
                "com.apple.security.pkcs1"
            };

            plist.open_dict();
            uuids.push(plist.payload_header(payload_type, &identifier, &name));
            plist.string("PayloadCertificateFileName", &format!("{name}.cer"));
            plist.data("PayloadContent", &ca.to_der().map_err(PkiError::from)?);
            plist.close_dict();
        }
        Ok(uuids)
    }

    /// Writes the client identity payload, returning its UUID.
    fn write_identity_payload(&self, plist: &mut Plist) -> Result<String, ProfileError> {
        let credential = &self.ctx.credential;
        let name = credential.common_name().unwrap_or_default();
        let pkcs12 = credential.pkcs12(
            self.ctx.passphrase_or_default(),
            ChainMode::Exclude,
            Pkcs12Cipher::Legacy3Des,
        )?;

        plist.open_dict();
        let uuid = plist.payload_header("com.apple.security.pkcs12", &self.identifier(), &name);
        plist.string("PayloadCertificateFileName", &format!("{name}.p12"));
        plist.data("PayloadContent", &pkcs12);
        if self.ctx.uses_default_passphrase() {
            plist.string("Password", self.ctx.passphrase_or_default());
        }
        plist.close_dict();
        Ok(uuid)
    }

    fn write_wifi_payload(
        &self,
        plist: &mut Plist,
        network: &Network,
        ca_uuids: &[String],
        identity_uuid: &str,
    ) {
        let realm = &self.ctx.realm.realm;
        let display_name = match network {
            Network::Ssid { ssid, .. } => ssid.clone(),
            Network::Passpoint { .. } => format!("{} (Passpoint)", realm.display_name),
        };

        plist.open_dict();
        plist.payload_header("com.apple.wifi.managed", &self.identifier(), &display_name);
        plist.boolean("AutoJoin", true);
        plist.string("EncryptionType", "WPA2");
        plist.string("PayloadCertificateUUID", identity_uuid);

        plist.key("EAPClientConfiguration");
        plist.open_dict();
        plist.key("AcceptEAPTypes");
        plist.0.open("array", &[]);
        plist.0.element("integer", &[], &EAP_TLS.to_string());
        plist.0.close("array");
        plist.strings("PayloadCertificateAnchorUUID", ca_uuids);
        plist.strings("TLSTrustedServerNames", &self.ctx.realm.server_names);
        plist.close_dict();

        match network {
            Network::Ssid { ssid, .. } => {
                plist.string("SSID_STR", ssid);
                plist.boolean("HIDDEN_NETWORK", false);
            }
            Network::Passpoint {
                oids,
                nai_realms,
                domain,
            } => {
                plist.boolean("IsHotspot", true);
                plist.boolean("ServiceProviderRoamingEnabled", true);
                plist.string("DisplayedOperatorName", &realm.display_name);
                plist.string("DomainName", domain.as_deref().unwrap_or(&realm.realm_id));
                let oids: Vec<String> = oids.iter().map(|oid| oid.to_uppercase()).collect();
                plist.strings("RoamingConsortiumOIs", &oids);
                plist.strings("NAIRealmNames", nai_realms);
            }
        }
        plist.close_dict();
    }

    fn plist(&self) -> Result<String, ProfileError> {
        let realm = &self.ctx.realm.realm;
        let mut plist = Plist(XmlWriter::new(PLIST_PROLOG));
        plist.0.open("plist", &[("version", "1.0")]);
        plist.open_dict();

        plist.key("PayloadContent");
        plist.0.open("array", &[]);
        let ca_uuids = self.write_ca_payloads(&mut plist)?;
        let identity_uuid = self.write_identity_payload(&mut plist)?;
        for network in &realm.networks {
            self.write_wifi_payload(&mut plist, network, &ca_uuids, &identity_uuid);
        }
        plist.0.close("array");

        let uuid = Uuid::new_v4().to_string().to_uppercase();
        plist.string("PayloadType", "Configuration");
        plist.string("PayloadIdentifier", &self.identifier());
        plist.string("PayloadUUID", &uuid);
        plist.string("PayloadDisplayName", &realm.display_name);
        plist.string("PayloadDescription", &realm.description);
        plist.string("PayloadOrganization", &realm.display_name);
        plist.integer("PayloadVersion", 1);
        plist.boolean("PayloadRemovalDisallowed", false);
        plist.key("PayloadExpirationDate");
        plist
            .0
            .element("date", &[], &iso8601(self.ctx.credential.expires_at()?));

        plist.close_dict();
        plist.0.close("plist");
        Ok(plist.0.finish())
    }
}

impl ProfileGenerator for Mobileconfig<'_> {
    fn format(&self) -> ProfileFormat {
        ProfileFormat::Mobileconfig
    }

    fn context(&self) -> &ProfileContext {
        self.ctx
    }

    fn content_type(&self) -> &'static str {
        "application/x-apple-aspen-config"
    }

    fn file_extension(&self) -> &'static str {
        "mobileconfig"
    }

    fn generate(&self) -> Result<Vec<u8>, ProfileError> {
        self.ctx.realm.require_networks()?;
        self.ctx.realm.require_server_trust()?;

        let plist = self.plist()?;
        let signed = self.ctx.signer.is_some();
        let data = match &self.ctx.signer {
            Some(authority) => sign_pkcs7(plist.as_bytes(), authority, SignatureMode::Enveloping)?,
            None => plist.into_bytes(),
        };

        debug!(realm = %self.ctx.realm_id(), signed = signed, "Encoded mobileconfig");
        Ok(data)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::testing::{context, passpoint, signer, ssid};
    use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
    use openssl::stack::Stack;
    use openssl::x509::store::X509StoreBuilder;
    use std::collections::HashSet;
    use wayfi_pki::pkcs12::parse_pkcs12;

    fn generate(ctx: &ProfileContext) -> String {
        String::from_utf8(Mobileconfig::new(ctx).generate().unwrap()).unwrap()
    }

    fn uuids(doc: &str) -> Vec<String> {
        doc.match_indices("<key>PayloadUUID</key>")
            .map(|(index, _)| {
                let rest = &doc[index..];
                let start = rest.find("<string>").unwrap() + "<string>".len();
                let end = rest.find("</string>").unwrap();
                rest[start..end].to_string()
            })
            .collect()
    }

    fn identity(doc: &str) -> Vec<u8> {
        let payload = &doc[doc.find("com.apple.security.pkcs12").unwrap()..];
        let content = &payload[payload.find("<key>PayloadContent</key>").unwrap()..];
        let start = content.find("<data>").unwrap() + "<data>".len();
        let end = content.find("</data>").unwrap();
        BASE64.decode(&content[start..end]).unwrap()
    }

    #[test]
    fn test_payloads() {
        let ctx = context(vec![ssid("eduroam"), passpoint()], None);
        let doc = generate(&ctx);

        assert!(doc.contains("<!DOCTYPE plist"));
        assert_eq!(doc.matches("com.apple.security.root").count(), 1);
        assert_eq!(doc.matches("com.apple.security.pkcs12").count(), 1);
        assert_eq!(doc.matches("com.apple.wifi.managed").count(), 2);
        assert!(doc.contains("<string>Profile Root.cer</string>"));
        assert!(doc.contains("<key>SSID_STR</key>"));
        assert!(doc.contains("<string>5A03BA0000</string>"));
        assert!(doc.contains("<key>NAIRealmNames</key>"));
        assert!(doc.contains("<string>com.example</string>"));
    }

    #[test]
    fn test_sub_realm_identifier() {
        let mut ctx = context(vec![ssid("eduroam")], None);
        ctx.credential.realm_id = "staff.example.com".to_string();
        let doc = generate(&ctx);
        assert!(doc.contains("<string>com.example.staff</string>"));
        assert!(!doc.contains("<string>com.example</string>"));
    }

    #[test]
    fn test_every_payload_has_fresh_uuid() {
        let ctx = context(vec![ssid("eduroam"), ssid("example")], None);
        let doc = generate(&ctx);

        let first = uuids(&doc);
        // root CA, identity, two networks, the profile itself
        assert_eq!(first.len(), 5);
        assert_eq!(first.iter().collect::<HashSet<_>>().len(), 5);

        let again = uuids(&generate(&ctx));
        assert!(first.iter().all(|uuid| !again.contains(uuid)));
    }

    #[test]
    fn test_identity_excludes_ca() {
        let ctx = context(vec![ssid("eduroam")], None);
        let doc = generate(&ctx);

        assert!(doc.contains("<key>Password</key>"));
        let parsed = parse_pkcs12(&identity(&doc), "pkcs12").unwrap();
        assert!(parsed.chain.is_empty());
    }

    #[test]
    fn test_user_passphrase_not_embedded() {
        let ctx = context(vec![ssid("eduroam")], Some("s3cret"));
        let doc = generate(&ctx);

        assert!(!doc.contains("<key>Password</key>"));
        assert!(parse_pkcs12(&identity(&doc), "s3cret").is_ok());
    }

    #[test]
    fn test_expiration_date_is_credential_expiry() {
        let ctx = context(vec![ssid("eduroam")], None);
        let doc = generate(&ctx);
        let expected = format!(
            "<key>PayloadExpirationDate</key>\n\t\t<date>{}</date>",
            iso8601(ctx.credential.expires_at().unwrap())
        );
        assert!(doc.contains(&expected));
    }

    #[test]
    fn test_signed_profile_wraps_plist() {
        let mut ctx = context(vec![ssid("eduroam")], None);
        let authority = signer();
        ctx.signer = Some(authority.clone());

        let der = Mobileconfig::new(&ctx).generate().unwrap();
        assert!(!der.starts_with(b"<?xml"));

        let pkcs7 = Pkcs7::from_der(&der).unwrap();
        let certs = Stack::new().unwrap();
        let mut store = X509StoreBuilder::new().unwrap();
        store.add_cert(authority.certificate().to_owned()).unwrap();
        let store = store.build();

        let mut content = Vec::new();
        pkcs7
            .verify(&certs, &store, None, Some(&mut content), Pkcs7Flags::NOVERIFY)
            .unwrap();
        assert!(content.starts_with(b"<?xml"));
        assert!(String::from_utf8(content).unwrap().contains("com.apple.wifi.managed"));
    }
}

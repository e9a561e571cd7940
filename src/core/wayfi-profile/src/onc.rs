//! ChromeOS Open Network Configuration.
//!
//! The unencrypted document lists the trusted CAs, a passphrase-less client
//! PKCS#12 and one Wi-Fi network per SSID. Passpoint networks have no ONC
//! representation and are skipped.
//!
//! When the user supplies a passphrase, the whole document is wrapped in an
//! `EncryptedConfiguration`: a 32-byte key is derived with
//! PBKDF2-HMAC-SHA1 (20000 iterations, random 12-byte salt), the document is
//! encrypted with AES-256-CBC under a random IV, and an HMAC-SHA1 over the
//! ciphertext is computed with the same key.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;
use wayfi_crypto::kdf::{derive_passphrase_key, ONC_ITERATIONS};
use wayfi_crypto::{aes_cbc, mac, random, CryptoError};
use wayfi_pki::{ChainMode, PkiError, Pkcs12Cipher};
use wayfi_registry::{Network, ProfileFormat};

use crate::context::ProfileContext;
use crate::domain::longest_common_domain_suffix;
use crate::error::ProfileError;
use crate::ProfileGenerator;

const CIPHER: &str = "AES256";
const HMAC_METHOD: &str = "SHA1";
const STRETCH: &str = "PBKDF2";
const ENCRYPTED_TYPE: &str = "EncryptedConfiguration";

/// The encrypted ONC envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EncryptedConfiguration {
    cipher: String,
    ciphertext: String,
    #[serde(rename = "HMAC")]
    hmac: String,
    #[serde(rename = "HMACMethod")]
    hmac_method: String,
    salt: String,
    stretch: String,
    iterations: u32,
    #[serde(rename = "IV")]
    iv: String,
    #[serde(rename = "Type")]
    kind: String,
}

/// Encrypts an ONC document with `passphrase`.
pub fn encrypt_onc(document: &[u8], passphrase: &str) -> Result<Vec<u8>, ProfileError> {
    let salt = random::generate_salt();
    let iv = random::generate_iv();
    let key = derive_passphrase_key(passphrase, &salt, ONC_ITERATIONS)?;

    let ciphertext = aes_cbc::encrypt(key.as_bytes(), &iv, document)?;
    let hmac = mac::hmac_sha1(key.as_bytes(), &ciphertext)?;

    let envelope = EncryptedConfiguration {
        cipher: CIPHER.to_string(),
        ciphertext: BASE64.encode(&ciphertext),
        hmac: BASE64.encode(hmac),
        hmac_method: HMAC_METHOD.to_string(),
        salt: BASE64.encode(salt),
        stretch: STRETCH.to_string(),
        iterations: ONC_ITERATIONS,
        iv: BASE64.encode(iv),
        kind: ENCRYPTED_TYPE.to_string(),
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Decrypts an encrypted ONC document.
///
/// The HMAC is verified before any decryption; a wrong passphrase or a
/// modified document fails with [`ProfileError::Decryption`].
pub fn decrypt_onc(envelope: &[u8], passphrase: &str) -> Result<Vec<u8>, ProfileError> {
    let envelope: EncryptedConfiguration = serde_json::from_slice(envelope)
        .map_err(|e| ProfileError::Decryption(format!("malformed envelope: {e}")))?;

    if envelope.kind != ENCRYPTED_TYPE {
        return Err(ProfileError::Decryption(format!(
            "not an encrypted configuration: {}",
            envelope.kind
        )));
    }
    if envelope.cipher != CIPHER || envelope.hmac_method != HMAC_METHOD || envelope.stretch != STRETCH {
        return Err(ProfileError::Decryption(format!(
            "unsupported parameters: {}/{}/{}",
            envelope.cipher, envelope.hmac_method, envelope.stretch
        )));
    }

    let decode = |field: &str, value: &str| {
        BASE64
            .decode(value)
            .map_err(|e| ProfileError::Decryption(format!("invalid {field}: {e}")))
    };
    let ciphertext = decode("Ciphertext", &envelope.ciphertext)?;
    let hmac = decode("HMAC", &envelope.hmac)?;
    let salt = decode("Salt", &envelope.salt)?;
    let iv = decode("IV", &envelope.iv)?;

    let key = derive_passphrase_key(passphrase, &salt, envelope.iterations)?;
    mac::verify_hmac_sha1(key.as_bytes(), &ciphertext, &hmac).map_err(|e| match e {
        CryptoError::AuthenticationFailed => {
            ProfileError::Decryption("HMAC mismatch: wrong passphrase or modified document".to_string())
        }
        other => ProfileError::Crypto(other),
    })?;

    let plaintext = aes_cbc::decrypt(key.as_bytes(), &iv, &ciphertext)
        .map_err(|e| ProfileError::Decryption(e.to_string()))?;
    Ok(plaintext.to_vec())
}

fn guid() -> String {
    format!("{{{}}}", Uuid::new_v4())
}

/// ONC encoder.
pub struct Onc<'a> {
    ctx: &'a ProfileContext,
}

impl<'a> Onc<'a> {
    /// Creates the encoder.
    pub fn new(ctx: &'a ProfileContext) -> Self {
        Self { ctx }
    }

    /// The unencrypted configuration.
    pub fn document(&self) -> Result<Value, ProfileError> {
        let realm = &self.ctx.realm;
        let credential = &self.ctx.credential;

        let ssids: Vec<&str> = realm
            .realm
            .networks
            .iter()
            .filter_map(|network| match network {
                Network::Ssid { ssid, .. } => Some(ssid.as_str()),
                Network::Passpoint { .. } => None,
            })
            .collect();
        if ssids.is_empty() {
            return Err(ProfileError::UnsupportedNetwork(format!(
                "realm {} has no SSID network; ONC cannot express Passpoint",
                realm.realm.realm_id
            )));
        }

        let mut certificates = Vec::with_capacity(realm.ca_certificates.len() + 1);
        let mut ca_refs = Vec::with_capacity(realm.ca_certificates.len());
        for ca in &realm.ca_certificates {
            let id = guid();
            certificates.push(json!({
                "GUID": id,
                "Type": "Authority",
                "X509": BASE64.encode(ca.to_der().map_err(PkiError::from)?),
            }));
            ca_refs.push(id);
        }

        let client_ref = guid();
        let pkcs12 = credential.pkcs12("", ChainMode::Exclude, Pkcs12Cipher::Modern)?;
        certificates.push(json!({
            "GUID": client_ref,
            "Type": "Client",
            "PKCS12": BASE64.encode(pkcs12),
        }));

        let subject_match = longest_common_domain_suffix(&realm.server_names);
        let identity = credential.common_name().unwrap_or_default();

        let networks: Vec<Value> = ssids
            .into_iter()
            .map(|ssid| {
                let mut eap = Map::new();
                eap.insert("Outer".into(), json!("EAP-TLS"));
                eap.insert("Identity".into(), json!(identity));
                eap.insert("SaveCredentials".into(), json!(true));
                eap.insert("UseSystemCAs".into(), json!(false));
                eap.insert("ServerCARefs".into(), json!(ca_refs));
                if !subject_match.is_empty() {
                    eap.insert("SubjectMatch".into(), json!(subject_match));
                }
                eap.insert("ClientCertType".into(), json!("Ref"));
                eap.insert("ClientCertRef".into(), json!(client_ref));

                json!({
                    "GUID": guid(),
                    "Name": ssid,
                    "Type": "WiFi",
                    "WiFi": {
                        "AutoConnect": true,
                        "HiddenSSID": false,
                        "SSID": ssid,
                        "Security": "WPA-EAP",
                        "EAP": eap,
                    },
                })
            })
            .collect();

        Ok(json!({
            "Type": "UnencryptedConfiguration",
            "Certificates": certificates,
            "NetworkConfigurations": networks,
        }))
    }
}

impl ProfileGenerator for Onc<'_> {
    fn format(&self) -> ProfileFormat {
        ProfileFormat::Onc
    }

    fn context(&self) -> &ProfileContext {
        self.ctx
    }

    fn content_type(&self) -> &'static str {
        "application/x-onc"
    }

    fn file_extension(&self) -> &'static str {
        "onc"
    }

    fn generate(&self) -> Result<Vec<u8>, ProfileError> {
        self.ctx.realm.require_networks()?;
        self.ctx.realm.require_server_trust()?;

        let document = serde_json::to_vec_pretty(&self.document()?)?;
        let encrypted = !self.ctx.uses_default_passphrase();
        let data = if encrypted {
            encrypt_onc(&document, self.ctx.passphrase_or_default())?
        } else {
            document
        };

        debug!(realm = %self.ctx.realm.realm.realm_id, encrypted = encrypted, "Encoded ONC");
        Ok(data)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::testing::{context, passpoint, ssid, CLIENT_CN};
    use wayfi_pki::pkcs12::parse_pkcs12;

    fn parse(data: &[u8]) -> Value {
        serde_json::from_slice(data).unwrap()
    }

    #[test]
    fn test_unencrypted_document() {
        let ctx = context(vec![ssid("eduroam"), passpoint()], None);
        let doc = parse(&Onc::new(&ctx).generate().unwrap());

        assert_eq!(doc["Type"], "UnencryptedConfiguration");
        let certificates = doc["Certificates"].as_array().unwrap();
        assert_eq!(certificates.len(), 2);
        assert_eq!(certificates[0]["Type"], "Authority");
        assert_eq!(certificates[1]["Type"], "Client");

        let networks = doc["NetworkConfigurations"].as_array().unwrap();
        assert_eq!(networks.len(), 1, "Passpoint network is skipped");

        let eap = &networks[0]["WiFi"]["EAP"];
        assert_eq!(networks[0]["WiFi"]["SSID"], "eduroam");
        assert_eq!(eap["Outer"], "EAP-TLS");
        assert_eq!(eap["Identity"], CLIENT_CN);
        assert_eq!(eap["SubjectMatch"], "example.com");
        assert_eq!(eap["ServerCARefs"][0], certificates[0]["GUID"]);
        assert_eq!(eap["ClientCertRef"], certificates[1]["GUID"]);

        let guid = certificates[0]["GUID"].as_str().unwrap();
        assert!(guid.starts_with('{') && guid.ends_with('}'));
    }

    #[test]
    fn test_client_pkcs12_has_no_passphrase() {
        let ctx = context(vec![ssid("eduroam")], None);
        let doc = parse(&Onc::new(&ctx).generate().unwrap());

        let encoded = doc["Certificates"][1]["PKCS12"].as_str().unwrap();
        let parsed = parse_pkcs12(&BASE64.decode(encoded).unwrap(), "").unwrap();
        assert!(parsed.chain.is_empty());
    }

    #[test]
    fn test_passpoint_only_realm_unsupported() {
        let ctx = context(vec![passpoint()], None);
        assert!(matches!(
            Onc::new(&ctx).generate(),
            Err(ProfileError::UnsupportedNetwork(_))
        ));
    }

    #[test]
    fn test_passphrase_encrypts_document() {
        let ctx = context(vec![ssid("eduroam")], Some("correct horse"));
        let data = Onc::new(&ctx).generate().unwrap();

        let envelope = parse(&data);
        assert_eq!(envelope["Type"], "EncryptedConfiguration");
        assert_eq!(envelope["Cipher"], "AES256");
        assert_eq!(envelope["HMACMethod"], "SHA1");
        assert_eq!(envelope["Stretch"], "PBKDF2");
        assert_eq!(envelope["Iterations"], 20_000);
        assert_eq!(
            BASE64.decode(envelope["Salt"].as_str().unwrap()).unwrap().len(),
            12
        );
        assert_eq!(
            BASE64.decode(envelope["IV"].as_str().unwrap()).unwrap().len(),
            16
        );

        let plain = parse(&decrypt_onc(&data, "correct horse").unwrap());
        assert_eq!(plain["Type"], "UnencryptedConfiguration");
    }

    #[test]
    fn test_roundtrip_is_byte_exact() {
        let document = br#"{"Type":"UnencryptedConfiguration","NetworkConfigurations":[]}"#;
        let envelope = encrypt_onc(document, "pw").unwrap();
        assert_eq!(decrypt_onc(&envelope, "pw").unwrap(), document);
    }

    #[test]
    fn test_wrong_passphrase_detected() {
        let envelope = encrypt_onc(b"{}", "right").unwrap();
        assert!(matches!(
            decrypt_onc(&envelope, "wrong"),
            Err(ProfileError::Decryption(_))
        ));
    }

    #[test]
    fn test_modified_ciphertext_detected() {
        let envelope = encrypt_onc(b"{\"Type\":\"UnencryptedConfiguration\"}", "pw").unwrap();
        let mut value = parse(&envelope);
        let mut ciphertext = BASE64
            .decode(value["Ciphertext"].as_str().unwrap())
            .unwrap();
        ciphertext[0] ^= 0x01;
        value["Ciphertext"] = json!(BASE64.encode(ciphertext));

        let tampered = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            decrypt_onc(&tampered, "pw"),
            Err(ProfileError::Decryption(_))
        ));
    }

    #[test]
    fn test_unencrypted_input_rejected() {
        assert!(matches!(
            decrypt_onc(b"{\"Type\":\"UnencryptedConfiguration\"}", "pw"),
            Err(ProfileError::Decryption(_))
        ));
    }
}

//! Integration tests for Wayfi.
//!
//! These tests drive the complete workflow: configuration, trust setup,
//! audited issuance, profile encoding, revocation and key rotation, both
//! through the library crates and through the `wayfi` binary.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use tempfile::TempDir;

use wayfi_issuer::Issuer;
use wayfi_pki::cert::certificate_to_pem;
use wayfi_pki::keys::{generate_key_pair, private_key_to_pem};
use wayfi_pki::sign::{generate_csr, self_signed_ca, sign_csr};
use wayfi_pki::{DistinguishedName, ExtensionProfile, KeyAlgorithm, SigningRequest};
use wayfi_registry::Registry;
use wayfi_trust::TrustStore;

pub const REALM: &str = "example.com";
pub const PROVIDER: &str = "portal.example.com";
pub const ROOT_SUBJECT: &str = "CN=Example Root CA";
pub const INTERMEDIATE_SUBJECT: &str = "CN=Example Issuing CA";

// ============================================================================
// Test Environment
// ============================================================================

/// A configuration file and data directory in a temporary location.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    /// Writes a configuration with one realm, two networks and one provider.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp dir")?;
        let config = format!(
            r#"
[storage]
data_dir = "var"
database = "wayfi"

[[contact]]
id = "helpdesk"
mail = "helpdesk@example.com"
web = "https://help.example.com/"
phone = "+1 555 0100"

[[network]]
id = "eduroam"
type = "ssid"
ssid = "eduroam"

[[network]]
id = "openroaming"
type = "passpoint"
oids = ["5A03BA0000"]
nai_realms = ["example.com"]

[[realm]]
id = "{REALM}"
display_name = "Example University"
networks = ["eduroam", "openroaming"]
contact = "helpdesk"

[[provider]]
host = "{PROVIDER}"
display_name = "Example onboarding"
auth = {{ backend = "dev" }}
realm_map = {{ "staff" = ["{REALM}"], "*" = ["{REALM}"] }}
"#
        );
        std::fs::write(dir.path().join("wayfi.toml"), config)?;
        Ok(Self { dir })
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("wayfi.toml")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn registry(&self) -> Result<Registry> {
        Ok(Registry::load(self.config_path())?)
    }

    /// Opens the issuer over the configured store.
    pub async fn issuer(&self) -> Result<Issuer> {
        let registry = self.registry()?;
        let storage = registry.storage();
        let trust = TrustStore::open(&storage.data_dir, &storage.database).await?;
        Ok(Issuer::new(trust))
    }
}

/// Creates the realm, a root and an intermediate CA, trusts the root,
/// makes the intermediate the signer and registers two RADIUS servers.
pub async fn bootstrap_realm(trust: &TrustStore) -> Result<()> {
    trust.create_realm(REALM).await?;

    let root_key = generate_key_pair(KeyAlgorithm::EcdsaP256)?;
    let root = self_signed_ca(&DistinguishedName::common_name("Example Root CA"), &root_key, 3650)?;
    trust
        .import_ca(
            certificate_to_pem(&root)?.as_bytes(),
            Some(private_key_to_pem(&root_key)?.as_slice()),
        )
        .await?;

    let key = generate_key_pair(KeyAlgorithm::EcdsaP256)?;
    let csr = generate_csr(&DistinguishedName::common_name("Example Issuing CA"), &key)?;
    let now = Utc::now();
    let intermediate = sign_csr(&SigningRequest {
        csr: &csr,
        ca_certificate: &root,
        ca_key: &root_key,
        not_before: now,
        not_after: now + Duration::days(1825),
        profile: ExtensionProfile::Ca { path_len: Some(0) },
        serial: 2,
    })?;
    trust
        .import_ca(
            certificate_to_pem(&intermediate)?.as_bytes(),
            Some(private_key_to_pem(&key)?.as_slice()),
        )
        .await?;

    trust.add_trusted_ca(REALM, ROOT_SUBJECT).await?;
    trust
        .set_signer_ca(REALM, INTERMEDIATE_SUBJECT, Duration::days(365))
        .await?;
    trust.add_server_name(REALM, "radius1.example.com").await?;
    trust.add_server_name(REALM, "radius2.example.com").await?;
    Ok(())
}

// ============================================================================
// CLI Runner
// ============================================================================

/// Find the CLI binary in the target directory.
pub fn find_cli_binary() -> Option<PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());

    // Try debug build first, then release
    let candidates = [
        Path::new(&manifest_dir).join("../../target/debug/wayfi"),
        Path::new(&manifest_dir).join("../../target/debug/wayfi.exe"),
        Path::new(&manifest_dir).join("../../target/release/wayfi"),
        Path::new(&manifest_dir).join("../../target/release/wayfi.exe"),
    ];

    candidates
        .iter()
        .find(|candidate| candidate.exists())
        .and_then(|candidate| candidate.canonicalize().ok())
}

/// Runs `wayfi --config <env> args...`, returning stdout.
pub fn wayfi(binary: &Path, env: &TestEnv, args: &[&str]) -> Result<String> {
    let output = Command::new(binary)
        .arg("--config")
        .arg(env.config_path())
        .args(args)
        .current_dir(env.path())
        .output()
        .with_context(|| format!("Failed to run {:?}", binary))?;

    if !output.status.success() {
        bail!(
            "wayfi {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8(output.stdout)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfi_issuer::{IssuerError, LogFilter, RequestContext, User};
    use wayfi_pki::cert::{common_name, subject};
    use wayfi_pki::pkcs12::parse_pkcs12;
    use wayfi_pki::{ChainMode, Pkcs12Cipher};
    use wayfi_profile::{decrypt_onc, render, ProfileContext, ProfileFormat, RealmProfile};
    use wayfi_storage::{LogStatus, Usage};

    async fn setup() -> (TestEnv, Registry, Issuer) {
        let env = TestEnv::new().unwrap();
        let registry = env.registry().unwrap();
        let issuer = env.issuer().await.unwrap();
        bootstrap_realm(issuer.trust()).await.unwrap();
        (env, registry, issuer)
    }

    #[tokio::test]
    async fn test_issue_and_package_every_format() {
        let (_env, registry, issuer) = setup().await;

        let realms = registry
            .realms_for_affiliations(PROVIDER, &["staff"])
            .unwrap();
        assert_eq!(realms.len(), 1);
        let realm = realms[0].clone();

        let user = User {
            user_id: "alice".to_string(),
            affiliations: vec!["staff".to_string()],
            realm_prefix: None,
        };
        let before = Utc::now();
        let credential = issuer
            .issue_client_credential(&user, REALM, PROVIDER, &RequestContext::default())
            .await
            .unwrap();

        assert!(credential.common_name().unwrap().ends_with("@example.com"));
        let chain: Vec<String> = credential.bundle.chain().iter().map(|c| subject(c)).collect();
        assert_eq!(chain, [INTERMEDIATE_SUBJECT, ROOT_SUBJECT]);
        let lifetime = credential.expires_at().unwrap() - before;
        assert!((lifetime - Duration::days(365)).num_seconds().abs() <= 5);

        let log = issuer
            .list_signing_log(REALM, &LogFilter::default())
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].usage, Usage::Client);
        assert_eq!(log[0].status, LogStatus::Completed);
        assert_eq!(log[0].ca_subject, INTERMEDIATE_SUBJECT);

        let ctx = ProfileContext {
            credential,
            realm: RealmProfile::load(issuer.trust(), realm).await.unwrap(),
            signer: None,
            passphrase: Some("correct horse".to_string()),
            generated_at: Utc::now(),
        };
        assert_eq!(ctx.realm.ca_certificates.len(), 1);

        let eap = render(ProfileFormat::EapConfig, &ctx).unwrap();
        let eap = String::from_utf8(eap.data).unwrap();
        assert!(eap.contains("<ServerID>radius1.example.com</ServerID>"));
        assert!(eap.contains("<ConsortiumOID>5a03ba0000</ConsortiumOID>"));

        let mobileconfig = render(ProfileFormat::Mobileconfig, &ctx).unwrap();
        assert!(mobileconfig.filename.starts_with("com.example."));
        assert!(mobileconfig.filename.ends_with(".mobileconfig"));

        let onc = render(ProfileFormat::Onc, &ctx).unwrap();
        let plain = decrypt_onc(&onc.data, "correct horse").unwrap();
        let document: serde_json::Value = serde_json::from_slice(&plain).unwrap();
        assert_eq!(
            document["NetworkConfigurations"][0]["WiFi"]["EAP"]["SubjectMatch"],
            "example.com"
        );
        assert!(decrypt_onc(&onc.data, "wrong horse").is_err());

        let p12 = render(ProfileFormat::Pkcs12, &ctx).unwrap();
        let parsed = parse_pkcs12(&p12.data, "correct horse").unwrap();
        assert_eq!(parsed.chain.len(), 2);
    }

    #[tokio::test]
    async fn test_pkcs12_variants() {
        let (_env, _registry, issuer) = setup().await;
        let credential = issuer
            .issue_client_credential(&User::new("bob"), REALM, PROVIDER, &RequestContext::default())
            .await
            .unwrap();

        let bare = credential
            .pkcs12("pw", ChainMode::Exclude, Pkcs12Cipher::Modern)
            .unwrap();
        let parsed = parse_pkcs12(&bare, "pw").unwrap();
        assert!(parsed.chain.is_empty());

        let modern = credential
            .pkcs12("pw", ChainMode::Include, Pkcs12Cipher::Modern)
            .unwrap();
        let legacy = credential
            .pkcs12("pw", ChainMode::Include, Pkcs12Cipher::Legacy3Des)
            .unwrap();
        assert_ne!(modern, legacy);

        let a = parse_pkcs12(&modern, "pw").unwrap();
        let b = parse_pkcs12(&legacy, "pw").unwrap();
        assert_eq!(common_name(&a.certificate), common_name(&b.certificate));
        assert!(a.private_key.public_eq(&b.private_key));
    }

    #[tokio::test]
    async fn test_revocation_lifecycle() {
        let (_env, _registry, issuer) = setup().await;
        let ctx = RequestContext::admin("integration");
        issuer
            .issue_client_credential(&User::new("carol"), REALM, PROVIDER, &ctx)
            .await
            .unwrap();

        assert_eq!(issuer.revoke_user(REALM, "carol").await.unwrap(), 1);
        assert!(matches!(
            issuer.revoke_user(REALM, "carol").await,
            Err(IssuerError::RevocationNotFound(_))
        ));
        assert!(matches!(
            issuer.revoke_user(REALM, "nobody").await,
            Err(IssuerError::RevocationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_trust_chain_terminates_at_root() {
        let (_env, _registry, issuer) = setup().await;
        let trust = issuer.trust();

        let root = trust.get_ca(ROOT_SUBJECT).await.unwrap().unwrap();
        assert!(root.issuer_ca(trust).await.unwrap().is_none());

        let intermediate = trust.get_ca(INTERMEDIATE_SUBJECT).await.unwrap().unwrap();
        let chain = intermediate.chain_to_root(trust).await.unwrap();
        let subjects: Vec<&str> = chain.iter().map(|ca| ca.subject()).collect();
        assert_eq!(subjects, [INTERMEDIATE_SUBJECT, ROOT_SUBJECT]);

        trust.add_trusted_ca(REALM, INTERMEDIATE_SUBJECT).await.unwrap();
        let trusted = trust.get_trusted_ca_certificates(REALM).await.unwrap();
        let subjects: Vec<String> = trusted.iter().map(|c| subject(c)).collect();
        assert_eq!(subjects, [ROOT_SUBJECT, INTERMEDIATE_SUBJECT]);
    }

    #[tokio::test]
    async fn test_oauth_rotation() {
        let (_env, _registry, issuer) = setup().await;

        let first = issuer.rotate_oauth_key(REALM, Duration::minutes(30)).await.unwrap();
        let second = issuer.rotate_oauth_key(REALM, Duration::minutes(30)).await.unwrap();

        let keys = issuer.oauth_keys(REALM, Utc::now()).await.unwrap();
        assert_eq!(keys.iter().filter(|k| k.expires.is_none()).count(), 1);
        assert_eq!(keys[0].key, second.key);
        assert_eq!(keys[1].key, first.key);
        assert_eq!(keys[1].expires, Some(second.issued + Duration::minutes(30)));
    }

    #[tokio::test]
    async fn test_cli_workflow() {
        let Some(binary) = find_cli_binary() else {
            eprintln!("wayfi binary not built; run 'cargo build -p wayfi-cli' first");
            return;
        };
        let env = TestEnv::new().unwrap();

        wayfi(&binary, &env, &["realm", "create", REALM]).unwrap();
        wayfi(&binary, &env, &["ca", "create", "--cn", "CLI Root", "--days", "365"]).unwrap();
        wayfi(
            &binary,
            &env,
            &["ca", "create", "--cn", "CLI Issuing", "--issuer", "CN=CLI Root"],
        )
        .unwrap();
        wayfi(&binary, &env, &["trust", "add", REALM, "CN=CLI Root"]).unwrap();
        wayfi(&binary, &env, &["signer", "set", REALM, "CN=CLI Issuing", "--days", "30"]).unwrap();
        wayfi(&binary, &env, &["server", "add", REALM, "radius.example.com"]).unwrap();

        let listed = wayfi(&binary, &env, &["ca", "list"]).unwrap();
        assert!(listed.contains("CN=CLI Root"));
        assert!(listed.contains("CN=CLI Issuing"));

        let out = env.path().join("profiles");
        let out_arg = out.display().to_string();
        let issued = wayfi(
            &binary,
            &env,
            &[
                "profile", "issue", "--provider", PROVIDER, "--user", "dave",
                "--affiliation", "staff", "--format", "eap-config", "--out", &out_arg,
            ],
        )
        .unwrap();
        assert!(issued.contains("@example.com"));

        let files: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(files.len(), 1);

        let abandoned = wayfi(&binary, &env, &["log", "abandon", REALM, "--minutes", "0"]).unwrap();
        assert!(abandoned.contains("Marked 0"));

        let log = wayfi(&binary, &env, &["log", "list", REALM]).unwrap();
        assert!(log.contains("completed"));
        assert!(log.contains("dave"));

        let revoked = wayfi(&binary, &env, &["revoke", "user", REALM, "dave"]).unwrap();
        assert!(revoked.contains("Revoked 1"));
        assert!(wayfi(&binary, &env, &["revoke", "user", REALM, "dave"]).is_err());

        wayfi(&binary, &env, &["oauth", "rotate", REALM]).unwrap();
        let keys = wayfi(&binary, &env, &["oauth", "list", REALM]).unwrap();
        assert!(keys.contains("(current)"));
    }
}

//! Wayfi CLI - Administration of realms, CAs, signing logs and profiles.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wayfi_crypto::random::generate_bytes;
use wayfi_issuer::{CredentialKind, Issuer, LogFilter, RequestContext, User};
use wayfi_pki::cert::certificate_to_pem;
use wayfi_pki::keys::{generate_key_pair, private_key_to_pem};
use wayfi_pki::sign::{generate_csr, self_signed_ca, sign_csr};
use wayfi_pki::{DistinguishedName, ExtensionProfile, KeyAlgorithm, SigningRequest};
use wayfi_profile::{render, ProfileContext, ProfileFormat, RealmProfile};
use wayfi_registry::{Registry, DEFAULT_CONFIG_PATH};
use wayfi_storage::{LogStatus, Usage};
use wayfi_trust::TrustStore;

/// Recorded as the client of every signing log entry this tool creates.
const TOOL: &str = "wayfi-cli";

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "wayfi")]
#[command(about = "Wayfi - Wi-Fi credential issuing and onboarding administration")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "WAYFI_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Realm management
    Realm {
        #[command(subcommand)]
        command: RealmCommands,
    },
    /// Certificate authority management
    Ca {
        #[command(subcommand)]
        command: CaCommands,
    },
    /// CAs trusted by a realm's clients
    Trust {
        #[command(subcommand)]
        command: TrustCommands,
    },
    /// Signing CA of a realm
    Signer {
        #[command(subcommand)]
        command: SignerCommands,
    },
    /// RADIUS server names and certificates
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
    /// HTTP virtual hosts serving a realm
    Vhost {
        #[command(subcommand)]
        command: VhostCommands,
    },
    /// Revoke client credentials
    Revoke {
        #[command(subcommand)]
        command: RevokeCommands,
    },
    /// Signing log
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// OAuth signing keys
    Oauth {
        #[command(subcommand)]
        command: OauthCommands,
    },
    /// Credential profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand)]
enum RealmCommands {
    /// Create a realm
    Create {
        /// Realm id, e.g. example.com
        realm: String,
    },
    /// List realms
    List,
}

#[derive(Subcommand)]
enum CaCommands {
    /// Import a CA certificate, optionally with its private key
    Import {
        /// PEM certificate file
        #[arg(long)]
        cert: PathBuf,
        /// PEM private key file
        #[arg(long)]
        key: Option<PathBuf>,
    },
    /// Create a root CA, or an intermediate under an existing CA
    Create {
        /// Common name of the new CA
        #[arg(long)]
        cn: String,
        /// Subject of the issuing CA; omit for a self-signed root
        #[arg(long)]
        issuer: Option<String>,
        /// Validity in days
        #[arg(long, default_value = "3650")]
        days: u32,
        /// Key algorithm (ecdsa-p256, ecdsa-p384, rsa-2048, rsa-4096)
        #[arg(long, default_value = "ecdsa-p256")]
        algorithm: KeyAlgorithm,
    },
    /// List CAs
    List,
}

#[derive(Subcommand)]
enum TrustCommands {
    /// Trust a CA for a realm
    Add {
        /// Realm id
        realm: String,
        /// CA subject DN
        subject: String,
    },
    /// Stop trusting a CA for a realm
    Remove {
        /// Realm id
        realm: String,
        /// CA subject DN
        subject: String,
    },
    /// List the CAs a realm trusts
    List {
        /// Realm id
        realm: String,
    },
}

#[derive(Subcommand)]
enum SignerCommands {
    /// Set the CA that signs a realm's credentials
    Set {
        /// Realm id
        realm: String,
        /// CA subject DN
        subject: String,
        /// Default validity of issued credentials, in days
        #[arg(long, default_value = "365")]
        days: u32,
    },
    /// Show a realm's signer
    Show {
        /// Realm id
        realm: String,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Add a RADIUS server name
    Add {
        /// Realm id
        realm: String,
        /// Server hostname
        name: String,
    },
    /// Remove a RADIUS server name
    Remove {
        /// Realm id
        realm: String,
        /// Server hostname
        name: String,
    },
    /// List RADIUS server names
    List {
        /// Realm id
        realm: String,
    },
    /// Issue a RADIUS server certificate
    Issue {
        /// Realm id
        realm: String,
        /// Server hostname
        name: String,
        /// Validity in days
        #[arg(long, default_value = "825")]
        days: u32,
        /// Output directory for `<name>.crt` and `<name>.key`
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum VhostCommands {
    /// Serve a realm on an HTTP host
    Add {
        /// Realm id
        realm: String,
        /// HTTP host
        host: String,
    },
    /// Remove an HTTP host
    Remove {
        /// Realm id
        realm: String,
        /// HTTP host
        host: String,
    },
}

#[derive(Subcommand)]
enum RevokeCommands {
    /// Revoke every active credential of a user
    User {
        /// Realm id
        realm: String,
        /// User id
        user: String,
    },
    /// Revoke a credential by subject DN or common name
    Subject {
        /// Realm id
        realm: String,
        /// Subject DN or common name
        subject: String,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// List a realm's signing log, newest first
    List {
        /// Realm id
        realm: String,
        /// Only this requester
        #[arg(long)]
        requester: Option<String>,
        /// Only this usage (client, server)
        #[arg(long)]
        usage: Option<Usage>,
        /// Only this status (prepared, completed, failed)
        #[arg(long)]
        status: Option<LogStatus>,
        /// Hide revoked entries
        #[arg(long)]
        active: bool,
    },
    /// Mark prepared entries older than the given age as failed
    Abandon {
        /// Realm id
        realm: String,
        /// Minimum age in minutes
        #[arg(long, default_value = "60")]
        minutes: i64,
    },
}

#[derive(Subcommand)]
enum OauthCommands {
    /// Replace a realm's current OAuth key
    Rotate {
        /// Realm id
        realm: String,
        /// Hours the previous key stays valid
        #[arg(long, default_value = "24")]
        grace_hours: i64,
    },
    /// List a realm's valid OAuth keys
    List {
        /// Realm id
        realm: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Issue a client credential and write it as a profile
    Issue {
        /// Provider host the user signs in through
        #[arg(long)]
        provider: String,
        /// User id
        #[arg(long)]
        user: String,
        /// Affiliations reported for the user
        #[arg(long = "affiliation")]
        affiliations: Vec<String>,
        /// Realm to issue for; defaults to the first one the affiliations map to
        #[arg(long)]
        realm: Option<String>,
        /// Sub-realm prefix reported for the user
        #[arg(long)]
        prefix: Option<String>,
        /// Credential kind
        #[arg(long, default_value = "certificate")]
        kind: CredentialKind,
        /// Profile format (eap-config, mobileconfig, onc, pkcs12)
        #[arg(long)]
        format: ProfileFormat,
        /// Passphrase protecting the profile
        #[arg(long, env = "WAYFI_PROFILE_PASSPHRASE")]
        passphrase: Option<String>,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

// ============================================================================
// Helpers
// ============================================================================

struct Admin {
    registry: Registry,
    issuer: Issuer,
}

impl Admin {
    async fn open(config: &Path) -> Result<Self> {
        let registry = Registry::load(config)
            .with_context(|| format!("Failed to load configuration {}", config.display()))?;
        let storage = registry.storage();
        let trust = TrustStore::open(&storage.data_dir, &storage.database)
            .await
            .with_context(|| format!("Failed to open store in {}", storage.data_dir.display()))?;
        debug!(
            config = %config.display(),
            data_dir = %storage.data_dir.display(),
            "Opened store"
        );

        Ok(Self {
            registry,
            issuer: Issuer::new(trust),
        })
    }

    fn trust(&self) -> &TrustStore {
        self.issuer.trust()
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%SZ").to_string()
}

/// Random positive serial for CA certificates created outside a realm log.
fn random_serial() -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&generate_bytes(8));
    (i64::from_be_bytes(bytes) & i64::MAX).max(2)
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn cmd_realm_create(ctx: &Admin, realm: &str) -> Result<()> {
    ctx.trust().create_realm(realm).await?;
    println!("Realm '{}' created", realm);
    Ok(())
}

async fn cmd_realm_list(ctx: &Admin) -> Result<()> {
    let realms = ctx.trust().list_realms().await?;
    if realms.is_empty() {
        println!("No realms found");
    } else {
        println!("Realms:");
        for realm in &realms {
            println!("  {}", realm);
        }
    }
    Ok(())
}

async fn cmd_ca_import(ctx: &Admin, cert: &Path, key: Option<&Path>) -> Result<()> {
    let cert_pem = read(cert)?;
    let key_pem = key.map(read).transpose()?;

    let ca = ctx
        .trust()
        .import_ca(&cert_pem, key_pem.as_deref())
        .await?;

    println!("Imported CA '{}'", ca.subject());
    if let Some(issuer) = ca.issuer_subject() {
        println!("  Issuer: {}", issuer);
    }
    println!("  Private key: {}", ca.private_key().is_some());
    Ok(())
}

async fn cmd_ca_create(
    ctx: &Admin,
    cn: &str,
    issuer: Option<&str>,
    days: u32,
    algorithm: KeyAlgorithm,
) -> Result<()> {
    let dn = DistinguishedName::common_name(cn);
    let key = generate_key_pair(algorithm)?;

    let certificate = match issuer {
        None => self_signed_ca(&dn, &key, days)?,
        Some(subject) => {
            let parent = ctx
                .trust()
                .get_ca(subject)
                .await?
                .with_context(|| format!("Unknown CA '{}'", subject))?;
            let parent_key = parent
                .private_key()
                .with_context(|| format!("CA '{}' has no private key", subject))?;

            let csr = generate_csr(&dn, &key)?;
            let now = Utc::now();
            sign_csr(&SigningRequest {
                csr: &csr,
                ca_certificate: parent.certificate(),
                ca_key: parent_key,
                not_before: now,
                not_after: now + Duration::days(i64::from(days)),
                profile: ExtensionProfile::Ca { path_len: Some(0) },
                serial: random_serial(),
            })?
        }
    };

    let cert_pem = certificate_to_pem(&certificate)?;
    let key_pem = private_key_to_pem(&key)?;
    let ca = ctx
        .trust()
        .import_ca(cert_pem.as_bytes(), Some(&key_pem))
        .await?;

    info!(
        subject = %ca.subject(),
        issuer = issuer.unwrap_or("(self-signed)"),
        algorithm = %algorithm,
        days = days,
        "Created CA"
    );
    println!("Created CA '{}' ({}, {} days)", ca.subject(), algorithm, days);
    Ok(())
}

async fn cmd_ca_list(ctx: &Admin) -> Result<()> {
    let cas = ctx.trust().list_cas().await?;
    if cas.is_empty() {
        println!("No CAs found");
        return Ok(());
    }

    for ca in &cas {
        println!("{}", ca.subject);
        println!("  Issuer:      {}", ca.issuer.as_deref().unwrap_or("(self-signed)"));
        println!("  Private key: {}", ca.has_key);
        println!("  Expires:     {}", format_time(ca.not_after));
        println!("  SHA-256:     {}", ca.fingerprint);
    }
    Ok(())
}

async fn cmd_trust_list(ctx: &Admin, realm: &str) -> Result<()> {
    let subjects = ctx.trust().trusted_ca_subjects(realm).await?;
    if subjects.is_empty() {
        println!("Realm '{}' trusts no CAs", realm);
    } else {
        println!("Trusted CAs for '{}':", realm);
        for subject in &subjects {
            println!("  {}", subject);
        }
    }
    Ok(())
}

async fn cmd_signer_show(ctx: &Admin, realm: &str) -> Result<()> {
    let signer = ctx.trust().get_signer(realm).await?;
    println!("Signer for '{}':", realm);
    println!("  CA:       {}", signer.ca.subject());
    println!("  Validity: {} days", signer.default_validity_days);
    Ok(())
}

async fn cmd_server_list(ctx: &Admin, realm: &str) -> Result<()> {
    let names = ctx.trust().server_names(realm).await?;
    if names.is_empty() {
        println!("No server names for '{}'", realm);
    } else {
        println!("Server names for '{}':", realm);
        for name in &names {
            println!("  {}", name);
        }
    }
    Ok(())
}

async fn cmd_server_issue(ctx: &Admin, realm: &str, name: &str, days: u32, out: &Path) -> Result<()> {
    let expiry = Utc::now() + Duration::days(i64::from(days));
    let server = ctx
        .issuer
        .issue_server_credential(realm, TOOL, name, expiry, &RequestContext::admin(TOOL))
        .await?;

    let mut cert_pem = certificate_to_pem(server.bundle.certificate())?;
    for ca in server.bundle.chain() {
        cert_pem.push_str(&certificate_to_pem(ca)?);
    }
    let key_pem = private_key_to_pem(server.bundle.private_key())?;

    let cert_path = write(out, &format!("{name}.crt"), cert_pem.as_bytes())?;
    let key_path = write(out, &format!("{name}.key"), &key_pem)?;

    println!("Issued server certificate for '{}' (serial {})", name, server.serial);
    println!("  Certificate: {}", cert_path.display());
    println!("  Key:         {}", key_path.display());
    Ok(())
}

async fn cmd_log_list(ctx: &Admin, realm: &str, filter: &LogFilter) -> Result<()> {
    let entries = ctx.issuer.list_signing_log(realm, filter).await?;
    if entries.is_empty() {
        println!("No signing log entries");
        return Ok(());
    }

    for entry in &entries {
        let revoked = entry
            .revoked
            .map(|at| format!(" revoked {}", format_time(at)))
            .unwrap_or_default();
        println!(
            "{:>6}  {:<9} {:<6} {}  {} -> {}  {}{}",
            entry.serial,
            entry.status.as_str(),
            entry.usage.as_str(),
            entry.requester,
            format_time(entry.issued),
            format_time(entry.expires),
            entry.subject,
            revoked
        );
    }
    Ok(())
}

async fn cmd_log_abandon(ctx: &Admin, realm: &str, minutes: i64) -> Result<()> {
    let cutoff = Utc::now() - Duration::minutes(minutes);
    let entries = ctx.issuer.prepared_entries(realm, cutoff).await?;

    let mut marked = 0;
    for entry in &entries {
        if ctx.issuer.mark_failed(entry.serial).await? {
            warn!(realm = %realm, serial = entry.serial, "Abandoned signing attempt marked failed");
            marked += 1;
        }
    }
    println!("Marked {} abandoned entries as failed", marked);
    Ok(())
}

async fn cmd_oauth_rotate(ctx: &Admin, realm: &str, grace_hours: i64) -> Result<()> {
    let key = ctx
        .issuer
        .rotate_oauth_key(realm, Duration::hours(grace_hours))
        .await?;
    println!("Rotated OAuth key for '{}' at {}", realm, format_time(key.issued));
    println!("Previous key remains valid for {} hours", grace_hours);
    Ok(())
}

async fn cmd_oauth_list(ctx: &Admin, realm: &str) -> Result<()> {
    let keys = ctx.issuer.oauth_keys(realm, Utc::now()).await?;
    if keys.is_empty() {
        println!("No OAuth keys for '{}'", realm);
        return Ok(());
    }

    for key in &keys {
        match key.expires {
            None => println!("  issued {}  (current)", format_time(key.issued)),
            Some(expires) => println!(
                "  issued {}  expires {}",
                format_time(key.issued),
                format_time(expires)
            ),
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_profile_issue(
    ctx: &Admin,
    provider: &str,
    user_id: &str,
    affiliations: Vec<String>,
    realm: Option<&str>,
    prefix: Option<String>,
    kind: CredentialKind,
    format: ProfileFormat,
    passphrase: Option<String>,
    out: &Path,
) -> Result<()> {
    let offered = ctx.registry.provider(provider)?;
    if !offered.offers(format) {
        bail!("Provider '{}' does not offer {} profiles", provider, format);
    }

    let realms = ctx.registry.realms_for_affiliations(provider, affiliations.as_slice())?;
    let realm = match realm {
        Some(id) => realms
            .into_iter()
            .find(|r| r.realm_id == id)
            .with_context(|| format!("User may not obtain credentials for '{}'", id))?,
        None => realms
            .into_iter()
            .next()
            .context("No realm matches the user's affiliations")?,
    };

    let user = User {
        user_id: user_id.to_string(),
        affiliations,
        realm_prefix: prefix,
    };
    let credential = ctx
        .issuer
        .issue(kind, &user, &realm.realm_id, provider, &RequestContext::admin(TOOL))
        .await?;

    let signer = ctx
        .registry
        .signing()
        .map(|signing| signing.load_authority())
        .transpose()?;
    let profile_ctx = ProfileContext {
        credential,
        realm: RealmProfile::load(ctx.trust(), realm.clone()).await?,
        signer,
        passphrase,
        generated_at: Utc::now(),
    };

    let profile = render(format, &profile_ctx)?;
    let path = write(out, &profile.filename, &profile.data)?;
    info!(
        realm = %profile_ctx.realm_id(),
        serial = profile_ctx.credential.serial,
        format = %format,
        path = %path.display(),
        "Wrote profile"
    );

    println!(
        "Issued credential {} for '{}' in '{}' (serial {})",
        profile_ctx.credential.common_name().unwrap_or_default(),
        user_id,
        profile_ctx.credential.realm_id,
        profile_ctx.credential.serial
    );
    println!("  Expires: {}", format_time(profile_ctx.credential.expires_at()?));
    println!("  Profile: {} ({})", path.display(), profile.content_type);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let ctx = Admin::open(&cli.config).await?;

    match cli.command {
        Commands::Realm { command } => match command {
            RealmCommands::Create { realm } => cmd_realm_create(&ctx, &realm).await,
            RealmCommands::List => cmd_realm_list(&ctx).await,
        },
        Commands::Ca { command } => match command {
            CaCommands::Import { cert, key } => cmd_ca_import(&ctx, &cert, key.as_deref()).await,
            CaCommands::Create {
                cn,
                issuer,
                days,
                algorithm,
            } => cmd_ca_create(&ctx, &cn, issuer.as_deref(), days, algorithm).await,
            CaCommands::List => cmd_ca_list(&ctx).await,
        },
        Commands::Trust { command } => match command {
            TrustCommands::Add { realm, subject } => {
                ctx.trust().add_trusted_ca(&realm, &subject).await?;
                println!("Realm '{}' now trusts '{}'", realm, subject);
                Ok(())
            },
            TrustCommands::Remove { realm, subject } => {
                ctx.trust().remove_trusted_ca(&realm, &subject).await?;
                println!("Realm '{}' no longer trusts '{}'", realm, subject);
                Ok(())
            },
            TrustCommands::List { realm } => cmd_trust_list(&ctx, &realm).await,
        },
        Commands::Signer { command } => match command {
            SignerCommands::Set {
                realm,
                subject,
                days,
            } => {
                let days = ctx
                    .trust()
                    .set_signer_ca(&realm, &subject, Duration::days(i64::from(days)))
                    .await?;
                println!("Realm '{}' is signed by '{}' ({} days)", realm, subject, days);
                Ok(())
            },
            SignerCommands::Show { realm } => cmd_signer_show(&ctx, &realm).await,
        },
        Commands::Server { command } => match command {
            ServerCommands::Add { realm, name } => {
                if ctx.trust().add_server_name(&realm, &name).await? {
                    println!("Added server name '{}' to '{}'", name, realm);
                } else {
                    println!("Server name '{}' already present in '{}'", name, realm);
                }
                Ok(())
            },
            ServerCommands::Remove { realm, name } => {
                if !ctx.trust().remove_server_name(&realm, &name).await? {
                    bail!("Server name '{}' not found in '{}'", name, realm);
                }
                println!("Removed server name '{}' from '{}'", name, realm);
                Ok(())
            },
            ServerCommands::List { realm } => cmd_server_list(&ctx, &realm).await,
            ServerCommands::Issue {
                realm,
                name,
                days,
                out,
            } => cmd_server_issue(&ctx, &realm, &name, days, &out).await,
        },
        Commands::Vhost { command } => match command {
            VhostCommands::Add { realm, host } => {
                ctx.trust().add_vhost(&realm, &host).await?;
                println!("Host '{}' serves '{}'", host, realm);
                Ok(())
            },
            VhostCommands::Remove { realm, host } => {
                if !ctx.trust().remove_vhost(&realm, &host).await? {
                    bail!("Host '{}' does not serve '{}'", host, realm);
                }
                println!("Host '{}' removed from '{}'", host, realm);
                Ok(())
            },
        },
        Commands::Revoke { command } => match command {
            RevokeCommands::User { realm, user } => {
                let count = ctx.issuer.revoke_user(&realm, &user).await?;
                println!("Revoked {} credentials of '{}'", count, user);
                Ok(())
            },
            RevokeCommands::Subject { realm, subject } => {
                let count = ctx.issuer.revoke_subject(&realm, &subject).await?;
                println!("Revoked {} credentials for '{}'", count, subject);
                Ok(())
            },
        },
        Commands::Log { command } => match command {
            LogCommands::List {
                realm,
                requester,
                usage,
                status,
                active,
            } => {
                let filter = LogFilter {
                    requester,
                    usage,
                    status,
                    active_only: active,
                };
                cmd_log_list(&ctx, &realm, &filter).await
            },
            LogCommands::Abandon { realm, minutes } => cmd_log_abandon(&ctx, &realm, minutes).await,
        },
        Commands::Oauth { command } => match command {
            OauthCommands::Rotate { realm, grace_hours } => {
                cmd_oauth_rotate(&ctx, &realm, grace_hours).await
            },
            OauthCommands::List { realm } => cmd_oauth_list(&ctx, &realm).await,
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Issue {
                provider,
                user,
                affiliations,
                realm,
                prefix,
                kind,
                format,
                passphrase,
                out,
            } => {
                cmd_profile_issue(
                    &ctx,
                    &provider,
                    &user,
                    affiliations,
                    realm.as_deref(),
                    prefix,
                    kind,
                    format,
                    passphrase,
                    &out,
                )
                .await
            },
        },
    }
}

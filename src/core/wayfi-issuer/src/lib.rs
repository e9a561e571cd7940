//! # Wayfi Credential Issuer
//!
//! Issues X.509 credentials with a two-phase signing log.
//!
//! ## Issuance
//!
//! 1. A key pair and CSR are generated.
//! 2. A `prepared` row is inserted into the signing log; its serial becomes
//!    the certificate serial.
//! 3. The CSR is signed by the realm's signer CA.
//! 4. The same row is completed with the certificate. Exactly one row must
//!    match, otherwise issuance aborts.
//!
//! The log write and the signing step are not one transaction: a crash in
//! between leaves a `prepared` row that can be found with
//! [`Issuer::prepared_entries`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credential;
pub mod error;
pub mod log;
pub mod oauth;

pub use credential::{Credential, CredentialKind, RequestContext, User};
pub use error::IssuerError;
pub use log::{LogEntry, LogFilter};
pub use oauth::OAuthKey;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use wayfi_crypto::random::generate_token;
use wayfi_pki::cert::{self, dns_names};
use wayfi_pki::hostname::is_valid_hostname;
use wayfi_pki::keys::generate_key_pair;
use wayfi_pki::name::MAX_COMMON_NAME_LEN;
use wayfi_pki::sign::{csr_to_pem, generate_csr, sign_csr};
use wayfi_pki::{
    DistinguishedName, ExtensionProfile, KeyAlgorithm, PKey, Private, SignedBundle,
    SigningRequest, X509Req, X509,
};
use wayfi_storage::{time, LogStatus, Usage};
use wayfi_storage_sqlite::{query_failed, SqliteBackend};
use wayfi_trust::{Signer, TrustStore};

/// A RADIUS server certificate.
#[derive(Debug, Clone)]
pub struct ServerCredential {
    /// Hostname in the CN and the SAN.
    pub common_name: String,
    /// Signed certificate, key and chain.
    pub bundle: SignedBundle,
    /// Certificate serial, equal to the signing log serial.
    pub serial: i64,
}

/// Issues and revokes credentials for realms in a trust store.
#[derive(Clone)]
pub struct Issuer {
    trust: TrustStore,
    key_algorithm: KeyAlgorithm,
}

/// A signing attempt, from pre-log to post-log.
struct Attempt<'a> {
    realm: &'a str,
    requester: &'a str,
    usage: Usage,
    signer: &'a Signer,
    csr: &'a X509Req,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    profile: ExtensionProfile,
    /// Hostname the signed certificate must carry as its only SAN.
    server_name: Option<&'a str>,
    ctx: &'a RequestContext,
}

// ============================================================================
// Construction
// ============================================================================

impl Issuer {
    /// Creates an issuer over a trust store.
    pub fn new(trust: TrustStore) -> Self {
        Self {
            trust,
            key_algorithm: KeyAlgorithm::default(),
        }
    }

    /// Uses `algorithm` for newly generated credential keys.
    pub fn with_key_algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.key_algorithm = algorithm;
        self
    }

    /// The trust store.
    pub fn trust(&self) -> &TrustStore {
        &self.trust
    }

    pub(crate) fn storage(&self) -> &SqliteBackend {
        self.trust.storage()
    }
}

// ============================================================================
// Issuance
// ============================================================================

/// Builds `token@realm`, truncating the random token so the CN fits.
fn client_common_name(realm: &str) -> Result<String, IssuerError> {
    let available = MAX_COMMON_NAME_LEN.saturating_sub(realm.len() + 1);
    if available == 0 {
        return Err(IssuerError::Validation(format!(
            "realm {realm} is too long for a {MAX_COMMON_NAME_LEN}-octet common name"
        )));
    }

    let mut token = generate_token(MAX_COMMON_NAME_LEN);
    token.truncate(available);
    Ok(format!("{token}@{realm}"))
}

/// A server certificate must name its host as the only SAN entry.
fn check_server_name(
    attempt: &Attempt<'_>,
    certificate: &X509,
    serial: i64,
) -> Result<(), IssuerError> {
    match attempt.server_name {
        Some(name) if dns_names(certificate) != [name] => Err(IssuerError::Validation(format!(
            "signed certificate {serial} does not name {name}"
        ))),
        _ => Ok(()),
    }
}

impl Issuer {
    /// Issues a credential of the given kind.
    pub async fn issue(
        &self,
        kind: CredentialKind,
        user: &User,
        realm: &str,
        provider: &str,
        ctx: &RequestContext,
    ) -> Result<Credential, IssuerError> {
        match kind {
            CredentialKind::Certificate => {
                self.issue_client_credential(user, realm, provider, ctx)
                    .await
            }
        }
    }

    /// Issues an EAP-TLS client certificate for `user`.
    ///
    /// The user's realm prefix, if any, is applied to `realm`. Validity is
    /// the realm signer's default.
    pub async fn issue_client_credential(
        &self,
        user: &User,
        realm: &str,
        provider: &str,
        ctx: &RequestContext,
    ) -> Result<Credential, IssuerError> {
        if user.user_id.is_empty() {
            return Err(IssuerError::Validation("user id may not be empty".to_string()));
        }
        let realm = user.resolve_realm(realm)?;
        let signer = self.trust.get_signer(&realm).await?;

        let common_name = client_common_name(&realm)?;
        let key = generate_key_pair(self.key_algorithm)?;
        let csr = generate_csr(&DistinguishedName::common_name(&common_name), &key)?;

        let now = time::now();
        let attempt = Attempt {
            realm: &realm,
            requester: &user.user_id,
            usage: Usage::Client,
            signer: &signer,
            csr: &csr,
            not_before: now,
            not_after: now + signer.validity(),
            profile: ExtensionProfile::Client,
            server_name: None,
            ctx,
        };
        let (certificate, serial) = self.sign_logged(&attempt).await?;
        let bundle = self.bundle(&signer, certificate, key).await?;

        info!(
            realm = %realm,
            requester = %user.user_id,
            serial = serial,
            provider = %provider,
            "Client credential issued"
        );

        Ok(Credential {
            user_id: user.user_id.clone(),
            realm_id: realm,
            provider: provider.to_string(),
            bundle,
            serial,
        })
    }

    /// Issues a RADIUS server certificate for `common_name`.
    ///
    /// The name must be a valid hostname; it becomes both the CN and the only
    /// SAN DNS entry.
    pub async fn issue_server_credential(
        &self,
        realm: &str,
        requester: &str,
        common_name: &str,
        expiry: DateTime<Utc>,
        ctx: &RequestContext,
    ) -> Result<ServerCredential, IssuerError> {
        if !is_valid_hostname(common_name) {
            return Err(IssuerError::Validation(format!(
                "server name is not a valid hostname: {common_name:?}"
            )));
        }
        let now = time::now();
        if expiry <= now {
            return Err(IssuerError::Validation(format!(
                "expiry {expiry} is not in the future"
            )));
        }

        let signer = self.trust.get_signer(realm).await?;
        let key = generate_key_pair(self.key_algorithm)?;
        let csr = generate_csr(&DistinguishedName::common_name(common_name), &key)?;

        let attempt = Attempt {
            realm,
            requester,
            usage: Usage::Server,
            signer: &signer,
            csr: &csr,
            not_before: now,
            not_after: expiry,
            profile: ExtensionProfile::Server,
            server_name: Some(common_name),
            ctx,
        };
        let (certificate, serial) = self.sign_logged(&attempt).await?;
        let bundle = self.bundle(&signer, certificate, key).await?;

        info!(
            realm = %realm,
            requester = %requester,
            serial = serial,
            common_name = %common_name,
            "Server credential issued"
        );

        Ok(ServerCredential {
            common_name: common_name.to_string(),
            bundle,
            serial,
        })
    }

    async fn bundle(
        &self,
        signer: &Signer,
        certificate: X509,
        key: PKey<Private>,
    ) -> Result<SignedBundle, IssuerError> {
        let chain = signer
            .ca
            .chain_to_root(&self.trust)
            .await?
            .into_iter()
            .map(|ca| ca.certificate().to_owned())
            .collect();
        Ok(SignedBundle::new(certificate, key, chain))
    }

    /// Pre-logs, signs and post-logs. Returns the certificate and serial.
    async fn sign_logged(&self, attempt: &Attempt<'_>) -> Result<(X509, i64), IssuerError> {
        let serial = self.pre_log(attempt).await?;

        let signed = attempt
            .signer
            .private_key()
            .map_err(IssuerError::from)
            .and_then(|ca_key| {
                sign_csr(&SigningRequest {
                    csr: attempt.csr,
                    ca_certificate: attempt.signer.ca.certificate(),
                    ca_key,
                    not_before: attempt.not_before,
                    not_after: attempt.not_after,
                    profile: attempt.profile,
                    serial,
                })
                .map_err(IssuerError::from)
            })
            .and_then(|certificate| {
                check_server_name(attempt, &certificate, serial)?;
                Ok(certificate)
            });

        let certificate = match signed {
            Ok(certificate) => certificate,
            Err(e) => {
                warn!(realm = %attempt.realm, serial = serial, error = %e, "Signing failed");
                if let Err(mark) = self.mark_failed(serial).await {
                    warn!(serial = serial, error = %mark, "Could not mark signing log entry failed");
                }
                return Err(e);
            }
        };

        self.post_log(serial, attempt, &certificate).await?;
        Ok((certificate, serial))
    }

    async fn pre_log(&self, attempt: &Attempt<'_>) -> Result<i64, IssuerError> {
        let subject = wayfi_pki::name::format_dn(attempt.csr.subject_name());
        let csr_pem = csr_to_pem(attempt.csr)?;

        let result = sqlx::query(
            r#"
            INSERT INTO realm_signing_log
                (realm, ca_sub, requester, usage, sub, issued, expires, csr, client, user_agent, ip, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(attempt.realm)
        .bind(attempt.signer.ca.subject())
        .bind(attempt.requester)
        .bind(attempt.usage.as_str())
        .bind(&subject)
        .bind(time::to_unix(attempt.not_before))
        .bind(time::to_unix(attempt.not_after))
        .bind(&csr_pem)
        .bind(attempt.ctx.client_id.as_deref())
        .bind(attempt.ctx.user_agent.as_deref())
        .bind(attempt.ctx.ip.as_deref())
        .bind(LogStatus::Prepared.as_str())
        .execute(self.storage().pool())
        .await
        .map_err(query_failed)?;

        if result.rows_affected() != 1 {
            return Err(IssuerError::AuditInvariantViolation(format!(
                "pre-log inserted {} rows",
                result.rows_affected()
            )));
        }
        let serial = result.last_insert_rowid();
        if serial <= 0 {
            return Err(IssuerError::AuditInvariantViolation(
                "pre-log returned no serial".to_string(),
            ));
        }

        debug!(realm = %attempt.realm, serial = serial, usage = %attempt.usage, "Signing prepared");
        Ok(serial)
    }

    async fn post_log(
        &self,
        serial: i64,
        attempt: &Attempt<'_>,
        certificate: &X509,
    ) -> Result<(), IssuerError> {
        let issued = cert::not_before(certificate)?;
        let expires = cert::not_after(certificate)?;
        let pem = cert::certificate_to_pem(certificate)?;

        let result = sqlx::query(
            r#"
            UPDATE realm_signing_log
            SET issued = ?, expires = ?, x509 = ?, status = ?
            WHERE serial = ? AND realm = ? AND requester = ? AND usage = ? AND ca_sub = ? AND status = ?
            "#,
        )
        .bind(time::to_unix(issued))
        .bind(time::to_unix(expires))
        .bind(&pem)
        .bind(LogStatus::Completed.as_str())
        .bind(serial)
        .bind(attempt.realm)
        .bind(attempt.requester)
        .bind(attempt.usage.as_str())
        .bind(attempt.signer.ca.subject())
        .bind(LogStatus::Prepared.as_str())
        .execute(self.storage().pool())
        .await
        .map_err(query_failed)?;

        if result.rows_affected() != 1 {
            return Err(IssuerError::AuditInvariantViolation(format!(
                "post-log for serial {serial} matched {} rows",
                result.rows_affected()
            )));
        }

        debug!(realm = %attempt.realm, serial = serial, "Signing completed");
        Ok(())
    }
}

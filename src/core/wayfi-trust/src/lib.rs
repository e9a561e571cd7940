//! # Wayfi Trust Store
//!
//! Certificate authorities and the per-realm trust model.
//!
//! ## Features
//!
//! - CA import with chain verification; intermediates require a known issuer
//! - Issuer walking towards the self-signed root
//! - Per-realm trusted CA lists, emitted root-first without duplicates
//! - Per-realm signer CA designation with a default credential validity
//! - Realm administration: RADIUS server names and HTTP virtual hosts

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod ca;
pub mod error;

pub use ca::{validity_days, Ca, CaSummary, Signer, MAX_CHAIN_DEPTH};
pub use error::TrustError;

use std::collections::HashSet;
use std::path::Path;

use chrono::Duration;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use wayfi_pki::{cert, keys, PkiError, X509};
use wayfi_storage_sqlite::{query_failed, SqliteBackend};

/// The trust store.
///
/// Every call re-reads the store; nothing is cached between requests.
#[derive(Clone)]
pub struct TrustStore {
    storage: SqliteBackend,
}

// ============================================================================
// Construction
// ============================================================================

impl TrustStore {
    /// Wraps an opened backend.
    pub fn new(storage: SqliteBackend) -> Self {
        Self { storage }
    }

    /// Opens the backend at `{data_dir}/{database}.db`.
    pub async fn open(data_dir: impl AsRef<Path>, database: &str) -> Result<Self, TrustError> {
        let storage = SqliteBackend::open(data_dir, database).await?;
        info!(database = database, "Trust store initialized");
        Ok(Self::new(storage))
    }

    /// The underlying backend.
    pub fn storage(&self) -> &SqliteBackend {
        &self.storage
    }
}

// ============================================================================
// Certificate authorities
// ============================================================================

type CaRow = (String, String, Option<String>, Option<String>);

fn decode_ca((subject, pub_pem, key_pem, issuer): CaRow) -> Result<Ca, TrustError> {
    let certificate = cert::certificate_from_pem(pub_pem.as_bytes())?;
    let private_key = key_pem
        .map(|pem| keys::private_key_from_pem(pem.as_bytes()))
        .transpose()?;
    Ok(Ca {
        subject,
        certificate,
        private_key,
        issuer,
    })
}

impl TrustStore {
    /// Imports a CA certificate, optionally with its private key.
    ///
    /// The certificate must carry `CA:TRUE`. A certificate that is not
    /// self-signed must be signed by an already imported CA. Re-importing an
    /// identical certificate is a no-op, except that a trust-only entry is
    /// upgraded when a matching key is supplied.
    pub async fn import_ca(
        &self,
        cert_pem: &[u8],
        key_pem: Option<&[u8]>,
    ) -> Result<Ca, TrustError> {
        let certificate = cert::certificate_from_pem(cert_pem)?;
        let subject = cert::subject(&certificate);

        if !cert::is_ca(&certificate)? {
            return Err(TrustError::TrustChain(format!(
                "{subject} is not a CA certificate"
            )));
        }

        let private_key = key_pem.map(keys::private_key_from_pem).transpose()?;
        if let Some(key) = &private_key {
            if !keys::key_matches_certificate(key, &certificate)? {
                return Err(TrustError::Configuration(format!(
                    "private key does not match certificate {subject}"
                )));
            }
        }

        let issuer = if cert::is_self_signed(&certificate)? {
            None
        } else {
            let issuer_subject = cert::issuer(&certificate);
            let issuer_ca = self.get_ca(&issuer_subject).await?.ok_or_else(|| {
                TrustError::TrustChain(format!(
                    "issuer {issuer_subject} of {subject} has not been imported"
                ))
            })?;
            if !cert::is_issued_by(&certificate, issuer_ca.certificate())? {
                return Err(TrustError::TrustChain(format!(
                    "{subject} does not verify under {issuer_subject}"
                )));
            }
            Some(issuer_subject)
        };

        let pub_pem = cert::certificate_to_pem(&certificate)?;
        let key_text = private_key
            .as_ref()
            .map(|key| {
                keys::private_key_to_pem(key).and_then(|pem| {
                    String::from_utf8(pem)
                        .map_err(|e| PkiError::InvalidKey(e.to_string()))
                })
            })
            .transpose()?;

        if let Some(existing) = self.get_ca(&subject).await? {
            if existing.certificate().to_der().map_err(PkiError::from)?
                != certificate.to_der().map_err(PkiError::from)?
            {
                return Err(TrustError::Configuration(format!(
                    "a different certificate is already imported as {subject}"
                )));
            }
            if existing.private_key().is_none() && key_text.is_some() {
                sqlx::query("UPDATE ca SET key = ? WHERE sub = ? AND key IS NULL")
                    .bind(&key_text)
                    .bind(&subject)
                    .execute(self.storage.pool())
                    .await
                    .map_err(query_failed)?;
                info!(subject = %subject, "CA private key added");
            } else {
                debug!(subject = %subject, "CA already imported");
            }
            return self.require_ca(&subject).await;
        }

        sqlx::query("INSERT INTO ca (sub, pub, key, issuer) VALUES (?, ?, ?, ?)")
            .bind(&subject)
            .bind(&pub_pem)
            .bind(&key_text)
            .bind(&issuer)
            .execute(self.storage.pool())
            .await
            .map_err(query_failed)?;

        info!(
            subject = %subject,
            issuer = issuer.as_deref().unwrap_or("self"),
            has_key = key_text.is_some(),
            "CA imported"
        );

        Ok(Ca {
            subject,
            certificate,
            private_key,
            issuer,
        })
    }

    /// Looks up a CA by subject DN.
    pub async fn get_ca(&self, subject: &str) -> Result<Option<Ca>, TrustError> {
        let row: Option<CaRow> =
            sqlx::query_as("SELECT sub, pub, key, issuer FROM ca WHERE sub = ?")
                .bind(subject)
                .fetch_optional(self.storage.pool())
                .await
                .map_err(query_failed)?;

        row.map(decode_ca).transpose()
    }

    pub(crate) async fn require_ca(&self, subject: &str) -> Result<Ca, TrustError> {
        self.get_ca(subject)
            .await?
            .ok_or_else(|| TrustError::TrustChain(format!("unknown CA {subject}")))
    }

    /// Lists every imported CA, ordered by subject.
    pub async fn list_cas(&self) -> Result<Vec<CaSummary>, TrustError> {
        let rows: Vec<CaRow> = sqlx::query_as("SELECT sub, pub, key, issuer FROM ca ORDER BY sub")
            .fetch_all(self.storage.pool())
            .await
            .map_err(query_failed)?;

        rows.into_iter()
            .map(|row| -> Result<CaSummary, TrustError> {
                let ca = decode_ca(row)?;
                let der = ca.certificate.to_der().map_err(PkiError::from)?;
                Ok(CaSummary {
                    not_after: cert::not_after(&ca.certificate)?,
                    fingerprint: hex::encode(Sha256::digest(&der)),
                    has_key: ca.private_key.is_some(),
                    subject: ca.subject,
                    issuer: ca.issuer,
                })
            })
            .collect()
    }
}

// ============================================================================
// Realm trust and signer
// ============================================================================

impl TrustStore {
    /// Adds a CA to the realm's trusted list. Adding it twice is a no-op.
    pub async fn add_trusted_ca(&self, realm: &str, subject: &str) -> Result<(), TrustError> {
        self.require_realm(realm).await?;
        self.require_ca(subject).await?;

        sqlx::query("INSERT OR IGNORE INTO realm_trust (realm, trusted_ca_sub) VALUES (?, ?)")
            .bind(realm)
            .bind(subject)
            .execute(self.storage.pool())
            .await
            .map_err(query_failed)?;

        info!(realm = %realm, subject = %subject, "Trusted CA added");
        Ok(())
    }

    /// Removes a CA from the realm's trusted list.
    pub async fn remove_trusted_ca(&self, realm: &str, subject: &str) -> Result<(), TrustError> {
        let result = sqlx::query("DELETE FROM realm_trust WHERE realm = ? AND trusted_ca_sub = ?")
            .bind(realm)
            .bind(subject)
            .execute(self.storage.pool())
            .await
            .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(TrustError::Configuration(format!(
                "{subject} is not trusted by realm {realm}"
            )));
        }

        info!(realm = %realm, subject = %subject, "Trusted CA removed");
        Ok(())
    }

    /// Subjects of the realm's trusted CAs, in the order they were added.
    pub async fn trusted_ca_subjects(&self, realm: &str) -> Result<Vec<String>, TrustError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT trusted_ca_sub FROM realm_trust WHERE realm = ? ORDER BY rowid",
        )
        .bind(realm)
        .fetch_all(self.storage.pool())
        .await
        .map_err(query_failed)?;

        Ok(rows.into_iter().map(|(subject,)| subject).collect())
    }

    /// Certificates a client needs to validate the realm's servers.
    ///
    /// Each trusted CA is expanded to its chain, which is emitted root-first.
    /// A CA shared by several chains appears once, at its first position.
    pub async fn get_trusted_ca_certificates(&self, realm: &str) -> Result<Vec<X509>, TrustError> {
        self.require_realm(realm).await?;

        let mut seen = HashSet::new();
        let mut certificates = Vec::new();

        for subject in self.trusted_ca_subjects(realm).await? {
            let ca = self.require_ca(&subject).await?;
            let mut chain = ca.chain_to_root(self).await?;
            chain.reverse();

            for ca in chain {
                if seen.insert(ca.subject) {
                    certificates.push(ca.certificate);
                }
            }
        }

        debug!(realm = %realm, count = certificates.len(), "Resolved trusted CA certificates");
        Ok(certificates)
    }

    /// Designates the CA that signs the realm's credentials.
    ///
    /// The CA must hold a private key. `validity` is rounded up to whole
    /// days. Returns the stored number of days.
    pub async fn set_signer_ca(
        &self,
        realm: &str,
        subject: &str,
        validity: Duration,
    ) -> Result<u32, TrustError> {
        self.require_realm(realm).await?;
        let ca = self.require_ca(subject).await?;
        if ca.private_key().is_none() {
            return Err(TrustError::TrustChain(format!(
                "{subject} has no private key and cannot sign"
            )));
        }
        let days = validity_days(validity)?;

        sqlx::query(
            r#"
            INSERT INTO realm_signer (realm, signer_ca_sub, default_validity_days)
            VALUES (?, ?, ?)
            ON CONFLICT(realm) DO UPDATE SET
                signer_ca_sub = excluded.signer_ca_sub,
                default_validity_days = excluded.default_validity_days
            "#,
        )
        .bind(realm)
        .bind(subject)
        .bind(i64::from(days))
        .execute(self.storage.pool())
        .await
        .map_err(query_failed)?;

        info!(realm = %realm, subject = %subject, days = days, "Signer CA set");
        Ok(days)
    }

    /// The realm's signer CA and default validity.
    pub async fn get_signer(&self, realm: &str) -> Result<Signer, TrustError> {
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT signer_ca_sub, default_validity_days FROM realm_signer WHERE realm = ?",
        )
        .bind(realm)
        .fetch_optional(self.storage.pool())
        .await
        .map_err(query_failed)?;

        let (subject, days) = row.ok_or_else(|| {
            TrustError::Configuration(format!("realm {realm} has no signer CA"))
        })?;
        let default_validity_days = u32::try_from(days).map_err(|_| {
            TrustError::Configuration(format!("realm {realm} has invalid validity {days}"))
        })?;

        let signer = Signer {
            ca: self.require_ca(&subject).await?,
            default_validity_days,
        };
        signer.private_key()?;
        Ok(signer)
    }
}

//! Signing log queries and revocation.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use wayfi_storage::{time, LogStatus, StorageError, Usage};
use wayfi_storage_sqlite::query_failed;

use crate::error::IssuerError;
use crate::Issuer;

/// A row of the signing log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Serial, also the certificate serial.
    pub serial: i64,
    /// Realm.
    pub realm: String,
    /// Subject of the signing CA.
    pub ca_subject: String,
    /// User or administrator that requested the certificate.
    pub requester: String,
    /// Client or server certificate.
    pub usage: Usage,
    /// Certificate subject DN.
    pub subject: String,
    /// Start of validity.
    pub issued: DateTime<Utc>,
    /// End of validity.
    pub expires: DateTime<Utc>,
    /// CSR in PEM.
    pub csr: String,
    /// Certificate in PEM, once completed.
    pub certificate: Option<String>,
    /// OAuth client id.
    pub client: Option<String>,
    /// HTTP user agent.
    pub user_agent: Option<String>,
    /// Remote address.
    pub ip: Option<String>,
    /// Revocation time.
    pub revoked: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub status: LogStatus,
}

/// Optional restrictions for [`Issuer::list_signing_log`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Only this requester.
    pub requester: Option<String>,
    /// Only this usage.
    pub usage: Option<Usage>,
    /// Only this status.
    pub status: Option<LogStatus>,
    /// Only rows that are not revoked.
    pub active_only: bool,
}

type LogRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    String,
);

const LOG_COLUMNS: &str = "serial, realm, ca_sub, requester, usage, sub, issued, expires, csr, x509, client, user_agent, ip, revoked, status";

fn decode_entry(row: LogRow) -> Result<LogEntry, StorageError> {
    let (
        serial,
        realm,
        ca_subject,
        requester,
        usage,
        subject,
        issued,
        expires,
        csr,
        certificate,
        client,
        user_agent,
        ip,
        revoked,
        status,
    ) = row;

    Ok(LogEntry {
        serial,
        realm,
        ca_subject,
        requester,
        usage: usage.parse()?,
        subject,
        issued: time::from_unix(issued)?,
        expires: time::from_unix(expires)?,
        csr,
        certificate,
        client,
        user_agent,
        ip,
        revoked: revoked.map(time::from_unix).transpose()?,
        status: status.parse()?,
    })
}

/// A bare common name is matched as `CN=<name>`.
fn normalize_subject(subject: &str) -> String {
    if subject.contains('=') {
        subject.to_string()
    } else {
        format!("CN={subject}")
    }
}

impl Issuer {
    /// Lists the realm's signing log, newest first.
    pub async fn list_signing_log(
        &self,
        realm: &str,
        filter: &LogFilter,
    ) -> Result<Vec<LogEntry>, IssuerError> {
        let sql = format!(
            r#"
            SELECT {LOG_COLUMNS} FROM realm_signing_log
            WHERE realm = ?
              AND (? IS NULL OR requester = ?)
              AND (? IS NULL OR usage = ?)
              AND (? IS NULL OR status = ?)
              AND (? = 0 OR revoked IS NULL)
            ORDER BY serial DESC
            "#
        );
        let usage = filter.usage.map(|u| u.as_str());
        let status = filter.status.map(|s| s.as_str());

        let rows: Vec<LogRow> = sqlx::query_as(&sql)
            .bind(realm)
            .bind(filter.requester.as_deref())
            .bind(filter.requester.as_deref())
            .bind(usage)
            .bind(usage)
            .bind(status)
            .bind(status)
            .bind(filter.active_only)
            .fetch_all(self.storage().pool())
            .await
            .map_err(query_failed)?;

        Ok(rows
            .into_iter()
            .map(decode_entry)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Looks up a single entry by serial.
    pub async fn signing_log_entry(&self, serial: i64) -> Result<Option<LogEntry>, IssuerError> {
        let sql = format!("SELECT {LOG_COLUMNS} FROM realm_signing_log WHERE serial = ?");
        let row: Option<LogRow> = sqlx::query_as(&sql)
            .bind(serial)
            .fetch_optional(self.storage().pool())
            .await
            .map_err(query_failed)?;

        Ok(row.map(decode_entry).transpose()?)
    }

    /// Entries of the realm still `prepared` that were started before
    /// `older_than`: issuance attempts that never completed.
    pub async fn prepared_entries(
        &self,
        realm: &str,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, IssuerError> {
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM realm_signing_log WHERE realm = ? AND status = ? AND issued < ? ORDER BY serial"
        );
        let rows: Vec<LogRow> = sqlx::query_as(&sql)
            .bind(realm)
            .bind(LogStatus::Prepared.as_str())
            .bind(time::to_unix(older_than))
            .fetch_all(self.storage().pool())
            .await
            .map_err(query_failed)?;

        Ok(rows
            .into_iter()
            .map(decode_entry)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Marks a `prepared` entry as failed. Returns false if the entry was not
    /// in the `prepared` state.
    pub async fn mark_failed(&self, serial: i64) -> Result<bool, IssuerError> {
        let result =
            sqlx::query("UPDATE realm_signing_log SET status = ? WHERE serial = ? AND status = ?")
                .bind(LogStatus::Failed.as_str())
                .bind(serial)
                .bind(LogStatus::Prepared.as_str())
                .execute(self.storage().pool())
                .await
                .map_err(query_failed)?;

        let marked = result.rows_affected() == 1;
        if marked {
            warn!(serial = serial, "Signing log entry marked failed");
        }
        Ok(marked)
    }

    /// Revokes every active client certificate issued to `user_id`.
    ///
    /// Only completed, unrevoked, unexpired entries are touched. Returns the
    /// number revoked; revoking nothing is an error.
    pub async fn revoke_user(&self, realm: &str, user_id: &str) -> Result<u64, IssuerError> {
        let revoked = self.revoke_where(realm, "requester", user_id).await?;
        if revoked == 0 {
            return Err(IssuerError::RevocationNotFound(format!(
                "no active credentials for {user_id} in {realm}"
            )));
        }
        info!(realm = %realm, requester = %user_id, count = revoked, "User revoked");
        Ok(revoked)
    }

    /// Revokes active client certificates by subject DN or bare common name.
    pub async fn revoke_subject(&self, realm: &str, subject: &str) -> Result<u64, IssuerError> {
        let subject = normalize_subject(subject);
        let revoked = self.revoke_where(realm, "sub", &subject).await?;
        if revoked == 0 {
            return Err(IssuerError::RevocationNotFound(format!(
                "no active credential {subject} in {realm}"
            )));
        }
        info!(realm = %realm, subject = %subject, count = revoked, "Subject revoked");
        Ok(revoked)
    }

    async fn revoke_where(
        &self,
        realm: &str,
        column: &'static str,
        value: &str,
    ) -> Result<u64, IssuerError> {
        let now = time::to_unix(time::now());
        let sql = format!(
            r#"
            UPDATE realm_signing_log SET revoked = ?
            WHERE realm = ? AND {column} = ? AND usage = ? AND status = ?
              AND revoked IS NULL AND expires > ?
            "#
        );

        let result = sqlx::query(&sql)
            .bind(now)
            .bind(realm)
            .bind(value)
            .bind(Usage::Client.as_str())
            .bind(LogStatus::Completed.as_str())
            .bind(now)
            .execute(self.storage().pool())
            .await
            .map_err(query_failed)?;

        Ok(result.rows_affected())
    }
}

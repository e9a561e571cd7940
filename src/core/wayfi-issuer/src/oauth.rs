//! Per-realm OAuth signing keys.
//!
//! Each realm has exactly one current key (no expiry). Rotation gives the
//! current key an expiry so tokens signed with it stay valid for a grace
//! period, and inserts a fresh current key.

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use zeroize::Zeroizing;

use wayfi_crypto::random::generate_key;
use wayfi_storage::{time, StorageError};
use wayfi_storage_sqlite::query_failed;

use crate::error::IssuerError;
use crate::Issuer;

/// An OAuth key of a realm.
#[derive(Clone)]
pub struct OAuthKey {
    /// Realm.
    pub realm: String,
    /// Key bytes.
    pub key: Zeroizing<Vec<u8>>,
    /// When the key was created.
    pub issued: DateTime<Utc>,
    /// When the key stops being accepted; `None` for the current key.
    pub expires: Option<DateTime<Utc>>,
}

impl OAuthKey {
    /// Returns true for the realm's current signing key.
    pub fn is_current(&self) -> bool {
        self.expires.is_none()
    }
}

impl std::fmt::Debug for OAuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthKey")
            .field("realm", &self.realm)
            .field("key", &"[REDACTED]")
            .field("issued", &self.issued)
            .field("expires", &self.expires)
            .finish()
    }
}

type KeyRow = (String, Vec<u8>, i64, Option<i64>);

fn decode_key((realm, key, issued, expires): KeyRow) -> Result<OAuthKey, StorageError> {
    Ok(OAuthKey {
        realm,
        key: Zeroizing::new(key),
        issued: time::from_unix(issued)?,
        expires: expires.map(time::from_unix).transpose()?,
    })
}

impl Issuer {
    /// Replaces the realm's current OAuth key.
    ///
    /// In one transaction the current key, if any, expires at
    /// `now + grace` and a new current key is inserted.
    pub async fn rotate_oauth_key(
        &self,
        realm: &str,
        grace: Duration,
    ) -> Result<OAuthKey, IssuerError> {
        if grace < Duration::zero() {
            return Err(IssuerError::Validation(format!(
                "grace period may not be negative: {grace}"
            )));
        }
        if !self.trust().realm_exists(realm).await? {
            return Err(IssuerError::Configuration(format!("unknown realm {realm}")));
        }

        let now = time::now();
        let key = generate_key();

        let mut tx = self.storage().begin().await?;

        let expired = sqlx::query(
            "UPDATE realm_key SET expires = ? WHERE realm = ? AND expires IS NULL",
        )
        .bind(time::to_unix(now + grace))
        .bind(realm)
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?
        .rows_affected();

        sqlx::query("INSERT INTO realm_key (realm, key, issued, expires) VALUES (?, ?, ?, NULL)")
            .bind(realm)
            .bind(&key[..])
            .bind(time::to_unix(now))
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        info!(realm = %realm, expired = expired, grace_secs = grace.num_seconds(), "OAuth key rotated");

        Ok(OAuthKey {
            realm: realm.to_string(),
            key: Zeroizing::new(key.to_vec()),
            issued: now,
            expires: None,
        })
    }

    /// Keys still accepted at `now`, current key first, then newest first.
    pub async fn oauth_keys(
        &self,
        realm: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OAuthKey>, IssuerError> {
        let rows: Vec<KeyRow> = sqlx::query_as(
            r#"
            SELECT realm, key, issued, expires FROM realm_key
            WHERE realm = ? AND (expires IS NULL OR expires > ?)
            ORDER BY expires IS NOT NULL, issued DESC, id DESC
            "#,
        )
        .bind(realm)
        .bind(time::to_unix(now))
        .fetch_all(self.storage().pool())
        .await
        .map_err(query_failed)?;

        Ok(rows
            .into_iter()
            .map(decode_key)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// The realm's current key.
    pub async fn current_oauth_key(&self, realm: &str) -> Result<OAuthKey, IssuerError> {
        let row: Option<KeyRow> = sqlx::query_as(
            "SELECT realm, key, issued, expires FROM realm_key WHERE realm = ? AND expires IS NULL",
        )
        .bind(realm)
        .fetch_optional(self.storage().pool())
        .await
        .map_err(query_failed)?;

        let row = row.ok_or_else(|| {
            IssuerError::Configuration(format!("realm {realm} has no OAuth key"))
        })?;
        Ok(decode_key(row)?)
    }
}

//! Realm administration: realms, RADIUS server names and virtual hosts.

use tracing::info;

use wayfi_pki::hostname::is_valid_hostname;
use wayfi_registry::validate_realm_id;
use wayfi_storage::{time, StorageError};
use wayfi_storage_sqlite::query_failed;

use crate::error::TrustError;
use crate::TrustStore;

fn validate_host(kind: &str, host: &str) -> Result<(), TrustError> {
    if is_valid_hostname(host) {
        Ok(())
    } else {
        Err(TrustError::Validation(format!("invalid {kind}: {host:?}")))
    }
}

impl TrustStore {
    /// Creates a realm.
    pub async fn create_realm(&self, realm: &str) -> Result<(), TrustError> {
        validate_realm_id(realm)?;

        sqlx::query("INSERT INTO realm (realm, created) VALUES (?, ?)")
            .bind(realm)
            .bind(time::to_unix(time::now()))
            .execute(self.storage().pool())
            .await
            .map_err(|e| match query_failed(e) {
                StorageError::AlreadyExists(_) => {
                    TrustError::Configuration(format!("realm {realm} already exists"))
                }
                other => TrustError::Storage(other),
            })?;

        info!(realm = %realm, "Realm created");
        Ok(())
    }

    /// Returns true if the realm exists.
    pub async fn realm_exists(&self, realm: &str) -> Result<bool, TrustError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT realm FROM realm WHERE realm = ?")
            .bind(realm)
            .fetch_optional(self.storage().pool())
            .await
            .map_err(query_failed)?;
        Ok(row.is_some())
    }

    pub(crate) async fn require_realm(&self, realm: &str) -> Result<(), TrustError> {
        if self.realm_exists(realm).await? {
            Ok(())
        } else {
            Err(TrustError::Configuration(format!("unknown realm {realm}")))
        }
    }

    /// All realm ids, sorted.
    pub async fn list_realms(&self) -> Result<Vec<String>, TrustError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT realm FROM realm ORDER BY realm")
            .fetch_all(self.storage().pool())
            .await
            .map_err(query_failed)?;
        Ok(rows.into_iter().map(|(realm,)| realm).collect())
    }

    /// Adds a RADIUS server name clients should accept for the realm.
    ///
    /// Returns false if the name was already present.
    pub async fn add_server_name(&self, realm: &str, server_name: &str) -> Result<bool, TrustError> {
        validate_host("server name", server_name)?;
        self.require_realm(realm).await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO realm_server_name (realm, server_name) VALUES (?, ?)",
        )
        .bind(realm)
        .bind(server_name)
        .execute(self.storage().pool())
        .await
        .map_err(query_failed)?;

        let added = result.rows_affected() == 1;
        if added {
            info!(realm = %realm, server_name = %server_name, "Server name added");
        }
        Ok(added)
    }

    /// Removes a server name. Returns false if it was not present.
    pub async fn remove_server_name(
        &self,
        realm: &str,
        server_name: &str,
    ) -> Result<bool, TrustError> {
        let result =
            sqlx::query("DELETE FROM realm_server_name WHERE realm = ? AND server_name = ?")
                .bind(realm)
                .bind(server_name)
                .execute(self.storage().pool())
                .await
                .map_err(query_failed)?;

        let removed = result.rows_affected() == 1;
        if removed {
            info!(realm = %realm, server_name = %server_name, "Server name removed");
        }
        Ok(removed)
    }

    /// Server names of the realm, sorted.
    pub async fn server_names(&self, realm: &str) -> Result<Vec<String>, TrustError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT server_name FROM realm_server_name WHERE realm = ? ORDER BY server_name",
        )
        .bind(realm)
        .fetch_all(self.storage().pool())
        .await
        .map_err(query_failed)?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Serves the realm under an HTTP host. A host belongs to one realm.
    pub async fn add_vhost(&self, realm: &str, http_host: &str) -> Result<(), TrustError> {
        validate_host("HTTP host", http_host)?;
        self.require_realm(realm).await?;

        if let Some(existing) = self.realm_for_vhost(http_host).await? {
            if existing == realm {
                return Ok(());
            }
            return Err(TrustError::Configuration(format!(
                "{http_host} is already bound to realm {existing}"
            )));
        }

        sqlx::query("INSERT INTO realm_vhost (http_host, realm) VALUES (?, ?)")
            .bind(http_host)
            .bind(realm)
            .execute(self.storage().pool())
            .await
            .map_err(query_failed)?;

        info!(realm = %realm, http_host = %http_host, "Virtual host added");
        Ok(())
    }

    /// Unbinds an HTTP host from the realm. Returns false if it was not bound.
    pub async fn remove_vhost(&self, realm: &str, http_host: &str) -> Result<bool, TrustError> {
        let result = sqlx::query("DELETE FROM realm_vhost WHERE realm = ? AND http_host = ?")
            .bind(realm)
            .bind(http_host)
            .execute(self.storage().pool())
            .await
            .map_err(query_failed)?;

        let removed = result.rows_affected() == 1;
        if removed {
            info!(realm = %realm, http_host = %http_host, "Virtual host removed");
        }
        Ok(removed)
    }

    /// The realm served under an HTTP host.
    pub async fn realm_for_vhost(&self, http_host: &str) -> Result<Option<String>, TrustError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT realm FROM realm_vhost WHERE http_host = ?")
                .bind(http_host)
                .fetch_optional(self.storage().pool())
                .await
                .map_err(query_failed)?;
        Ok(row.map(|(realm,)| realm))
    }
}

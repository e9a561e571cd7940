//! Enumerations stored as text columns.

use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

/// What a signing log entry was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Usage {
    /// End-user credential.
    Client,
    /// RADIUS server certificate.
    Server,
}

impl Usage {
    /// Column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Usage {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            other => Err(StorageError::Corrupt(format!("unknown usage: {other}"))),
        }
    }
}

/// Lifecycle of a signing log entry.
///
/// A row is inserted as `Prepared` before signing and moves to `Completed`
/// once the certificate is recorded. A row left `Prepared` belongs to an
/// issuance that never finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStatus {
    /// Pre-logged, certificate not yet recorded.
    Prepared,
    /// Certificate signed and recorded.
    Completed,
    /// Signing failed or the attempt was abandoned.
    Failed,
}

impl LogStatus {
    /// Column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepared" => Ok(Self::Prepared),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(StorageError::Corrupt(format!("unknown log status: {other}"))),
        }
    }
}

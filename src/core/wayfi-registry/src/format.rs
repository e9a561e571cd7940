//! Profile format identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// A downloadable profile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProfileFormat {
    /// EAP-config XML (geteduroam apps).
    EapConfig,
    /// Apple configuration profile.
    Mobileconfig,
    /// ChromeOS Open Network Configuration.
    Onc,
    /// Bare PKCS#12 bundle.
    Pkcs12,
}

impl ProfileFormat {
    /// Every known format, in presentation order.
    pub const ALL: [ProfileFormat; 4] = [
        Self::EapConfig,
        Self::Mobileconfig,
        Self::Onc,
        Self::Pkcs12,
    ];

    /// The configuration identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EapConfig => "eap-config",
            Self::Mobileconfig => "mobileconfig",
            Self::Onc => "onc",
            Self::Pkcs12 => "pkcs12",
        }
    }
}

impl fmt::Display for ProfileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileFormat {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| RegistryError::Validation(format!("unknown profile format: {s}")))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        for format in ProfileFormat::ALL {
            assert_eq!(format.as_str().parse::<ProfileFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_unknown_identifier() {
        let err = "apple".parse::<ProfileFormat>().unwrap_err();
        assert!(err.is_client_error());
    }
}

//! Bare PKCS#12 download.

use tracing::debug;
use wayfi_pki::{ChainMode, Pkcs12Cipher};
use wayfi_registry::ProfileFormat;

use crate::context::ProfileContext;
use crate::error::ProfileError;
use crate::ProfileGenerator;

/// PKCS#12 encoder: leaf, key and issuing chain under the user's passphrase,
/// or `pkcs12` when none was given.
pub struct Pkcs12<'a> {
    ctx: &'a ProfileContext,
}

impl<'a> Pkcs12<'a> {
    /// Creates the encoder.
    pub fn new(ctx: &'a ProfileContext) -> Self {
        Self { ctx }
    }
}

impl ProfileGenerator for Pkcs12<'_> {
    fn format(&self) -> ProfileFormat {
        ProfileFormat::Pkcs12
    }

    fn context(&self) -> &ProfileContext {
        self.ctx
    }

    fn content_type(&self) -> &'static str {
        "application/x-pkcs12"
    }

    fn file_extension(&self) -> &'static str {
        "p12"
    }

    fn generate(&self) -> Result<Vec<u8>, ProfileError> {
        let data = self.ctx.credential.pkcs12(
            self.ctx.passphrase_or_default(),
            ChainMode::Include,
            Pkcs12Cipher::Modern,
        )?;
        debug!(serial = self.ctx.credential.serial, "Encoded PKCS#12");
        Ok(data)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::testing::{context, ssid, CLIENT_CN};
    use wayfi_pki::cert::common_name;
    use wayfi_pki::pkcs12::parse_pkcs12;

    #[test]
    fn test_default_passphrase_and_chain() {
        let ctx = context(vec![ssid("eduroam")], None);
        let der = Pkcs12::new(&ctx).generate().unwrap();

        let parsed = parse_pkcs12(&der, "pkcs12").unwrap();
        assert_eq!(common_name(&parsed.certificate).as_deref(), Some(CLIENT_CN));
        assert_eq!(parsed.chain.len(), 1);
        assert!(parsed
            .private_key
            .public_eq(ctx.credential.bundle.private_key()));
    }

    #[test]
    fn test_user_passphrase() {
        let ctx = context(vec![ssid("eduroam")], Some("s3cret"));
        let der = Pkcs12::new(&ctx).generate().unwrap();
        assert!(parse_pkcs12(&der, "s3cret").is_ok());
        assert!(parse_pkcs12(&der, "pkcs12").is_err());
    }
}

//! HMAC-SHA1 message authentication.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::CryptoError;

type HmacSha1 = Hmac<Sha1>;

/// Size of an HMAC-SHA1 tag in bytes.
pub const TAG_SIZE: usize = 20;

/// Computes HMAC-SHA1 of `data` under `key`.
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<[u8; TAG_SIZE], CryptoError> {
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(data);

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Verifies an HMAC-SHA1 tag in constant time.
///
/// # Errors
///
/// Returns `CryptoError::AuthenticationFailed` on mismatch.
pub fn verify_hmac_sha1(key: &[u8], data: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(data);
    mac.verify_slice(tag)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

//! Key derivation functions.
//!
//! Provides PBKDF2-HMAC-SHA1 as specified in RFC 8018. This is the stretch
//! function ChromeOS expects inside encrypted ONC documents, so the digest
//! and iteration count are dictated by the consumer, not chosen here.

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{DerivedKey, KEY_SIZE};

/// Size of a PBKDF2 salt in bytes.
pub const SALT_SIZE: usize = 12;

/// Iteration count used for encrypted ONC documents.
pub const ONC_ITERATIONS: u32 = 20_000;

/// Derives key material from a passphrase using PBKDF2-HMAC-SHA1.
///
/// # Arguments
///
/// * `passphrase` - The secret to stretch
/// * `salt` - Random salt (stored alongside the ciphertext)
/// * `iterations` - Number of PBKDF2 rounds
/// * `length` - Desired output length in bytes
///
/// # Returns
///
/// Derived key material wrapped in `Zeroizing` for automatic memory cleanup.
pub fn pbkdf2_sha1(
    passphrase: &[u8],
    salt: &[u8],
    iterations: u32,
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::InvalidInput(
            "iteration count must be > 0".to_string(),
        ));
    }

    if length == 0 {
        return Err(CryptoError::InvalidInput(
            "output length must be > 0".to_string(),
        ));
    }

    let mut okm = Zeroizing::new(vec![0u8; length]);
    pbkdf2_hmac::<Sha1>(passphrase, salt, iterations, &mut okm);

    Ok(okm)
}

/// Derives an AES-256 key from a passphrase.
///
/// Convenience wrapper around `pbkdf2_sha1` that returns exactly 32 bytes.
pub fn derive_passphrase_key(
    passphrase: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<DerivedKey, CryptoError> {
    let derived = pbkdf2_sha1(passphrase.as_bytes(), salt, iterations, KEY_SIZE)?;
    DerivedKey::from_bytes(&derived)
}

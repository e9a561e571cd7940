//! AES-256-CBC encryption.
//!
//! CBC is not authenticated on its own. Callers pair it with an HMAC over
//! the ciphertext (encrypt-then-MAC) and verify the tag before decrypting.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::KEY_SIZE;

/// Size of an AES-CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

fn check_lengths(key: &[u8], iv: &[u8]) -> Result<(), CryptoError> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKey(format!(
            "expected {} bytes, got {}",
            KEY_SIZE,
            key.len()
        )));
    }

    if iv.len() != IV_SIZE {
        return Err(CryptoError::InvalidInput(format!(
            "IV must be {} bytes, got {}",
            IV_SIZE,
            iv.len()
        )));
    }

    Ok(())
}

/// Encrypts plaintext using AES-256-CBC with PKCS#7 padding.
///
/// # Arguments
///
/// * `key` - 32-byte encryption key
/// * `iv` - 16-byte initialization vector (must be random per message)
/// * `plaintext` - Data to encrypt
pub fn encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_lengths(key, iv)?;

    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypts AES-256-CBC ciphertext and strips PKCS#7 padding.
///
/// # Returns
///
/// Decrypted plaintext wrapped in `Zeroizing` for automatic memory cleanup.
pub fn decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    check_lengths(key, iv)?;

    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidInput(
            "ciphertext is not a whole number of blocks".to_string(),
        ));
    }

    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed("invalid padding".to_string()))?;

    Ok(Zeroizing::new(plaintext))
}

//! Cryptographically secure random generation.
//!
//! Uses the operating system's CSPRNG for all random number generation.

use rand::{rngs::OsRng, Rng, RngCore};
use zeroize::Zeroizing;

use crate::aes_cbc::IV_SIZE;
use crate::kdf::SALT_SIZE;
use crate::keys::KEY_SIZE;

/// Alphabet used for random tokens.
///
/// Lowercase letters and digits only, so tokens are safe inside DNS-like
/// identifiers and X.509 common names.
const TOKEN_ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a cryptographically secure random 256-bit key.
///
/// The key is wrapped in `Zeroizing` to ensure it is cleared from memory when dropped.
pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(&mut *key);
    key
}

/// Generates a random salt for PBKDF2.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Generates a random initialization vector for AES-CBC.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Generates cryptographically secure random bytes.
///
/// # Arguments
///
/// * `len` - Number of random bytes to generate
pub fn generate_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generates a random token of exactly `len` lowercase alphanumeric characters.
pub fn generate_token(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

//! Encryption/decryption using PBKDF2 + AES-256-GCM
//!
//! This module implements passphrase-based encryption using:
//! - PBKDF2-HMAC-SHA256 for key derivation from passphrase
//! - AES-256-GCM for authenticated encryption
//!
//! The binary format is:
//! - salt: 16 bytes
//! - nonce: 12 bytes
//! - ciphertext: variable length (includes the 16-byte GCM tag)

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, SealtreeError};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of derived key in bytes
const KEY_LEN: usize = 32;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// PBKDF2 iteration count (CPU cost)
const PBKDF2_ROUNDS: u32 = 100_000;

/// Derive a 32-byte key from a passphrase and salt using PBKDF2-HMAC-SHA256
///
/// Pure function of (passphrase, salt): decryption re-derives the same key
/// from the salt stored in the sealed data. The key lives only for the
/// duration of one seal/open call and is wiped on drop. Each call runs the
/// full KDF; keys are never cached across calls.
fn derive_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase, salt, PBKDF2_ROUNDS, key.as_mut_slice());
    key
}

/// Encrypt plaintext with a passphrase using random salt and nonce
///
/// Returns the binary format: salt(16) + nonce(12) + ciphertext(variable)
pub fn encrypt(passphrase: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    encrypt_deterministic(passphrase, plaintext, &salt, &nonce)
}

/// Encrypt plaintext with a passphrase using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random
/// salt/nonce. Reusing a nonce under the same derived key breaks both
/// confidentiality and integrity of AES-GCM.
pub fn encrypt_deterministic(
    passphrase: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let key = derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));

    let sealed = cipher.encrypt(Nonce::from_slice(nonce), plaintext).map_err(|e| {
        SealtreeError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::AeadFailure,
            format!("encryption failed: {}", e),
        )
    })?;

    let mut output = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed);

    Ok(output)
}

/// Decrypt sealed data with a passphrase
///
/// Fails closed: a wrong passphrase, tampering, or corruption anywhere in
/// the input yields an `AuthenticationFailed` error and no plaintext bytes.
pub fn decrypt(passphrase: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;

    if sealed.len() < pos + SALT_LEN {
        return Err(truncated("salt"));
    }
    let salt: [u8; SALT_LEN] = sealed[pos..pos + SALT_LEN]
        .try_into()
        .map_err(|_| truncated("salt"))?;
    pos += SALT_LEN;

    if sealed.len() < pos + NONCE_LEN {
        return Err(truncated("nonce"));
    }
    let nonce: [u8; NONCE_LEN] = sealed[pos..pos + NONCE_LEN]
        .try_into()
        .map_err(|_| truncated("nonce"))?;
    pos += NONCE_LEN;

    // Everything after the header is AEAD output, which is never shorter
    // than the tag.
    let body = &sealed[pos..];
    if body.len() < TAG_LEN {
        return Err(truncated("ciphertext"));
    }

    let key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
    let plaintext = cipher.decrypt(Nonce::from_slice(&nonce), body).map_err(|_| {
        SealtreeError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "corrupt input, tampered-with data, or bad passphrase",
        )
    })?;

    Ok(plaintext)
}

fn truncated(what: &str) -> SealtreeError {
    SealtreeError::with_kind(
        ErrorCategory::User,
        ErrorKind::TruncatedInput,
        format!("input likely truncated while reading {}", what),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plaintext() {
        let passphrase = b"test";
        let plaintext = b"";

        let sealed = encrypt(passphrase, plaintext).unwrap();
        assert_eq!(sealed.len(), SALT_LEN + NONCE_LEN + TAG_LEN);

        let decrypted = decrypt(passphrase, &sealed).unwrap();
        assert_eq!(plaintext, &decrypted[..]);
    }

    #[test]
    fn test_small_plaintext() {
        let passphrase = b"test";
        let plaintext = b"hello";

        let sealed = encrypt(passphrase, plaintext).unwrap();
        let decrypted = decrypt(passphrase, &sealed).unwrap();

        assert_eq!(plaintext, &decrypted[..]);
    }

    #[test]
    fn test_sealed_length_overhead() {
        let plaintext = b"some plaintext of known length";
        let sealed = encrypt(b"test", plaintext).unwrap();

        assert_eq!(sealed.len(), SALT_LEN + NONCE_LEN + plaintext.len() + TAG_LEN);
    }

    #[test]
    fn test_deterministic_encryption() {
        let passphrase = b"test";
        let plaintext = b"hello world";
        let salt = [1u8; SALT_LEN];
        let nonce = [2u8; NONCE_LEN];

        let ct1 = encrypt_deterministic(passphrase, plaintext, &salt, &nonce).unwrap();
        let ct2 = encrypt_deterministic(passphrase, plaintext, &salt, &nonce).unwrap();

        // Same salt/nonce produces identical sealed bytes
        assert_eq!(ct1, ct2);

        let pt1 = decrypt(passphrase, &ct1).unwrap();
        assert_eq!(plaintext, &pt1[..]);
    }

    #[test]
    fn test_different_nonce_different_ciphertext() {
        let passphrase = b"test";
        let plaintext = b"hello world";
        let salt = [1u8; SALT_LEN];
        let nonce1 = [2u8; NONCE_LEN];
        let nonce2 = [3u8; NONCE_LEN];

        let ct1 = encrypt_deterministic(passphrase, plaintext, &salt, &nonce1).unwrap();
        let ct2 = encrypt_deterministic(passphrase, plaintext, &salt, &nonce2).unwrap();

        assert_ne!(ct1, ct2);

        assert_eq!(decrypt(passphrase, &ct1).unwrap(), plaintext);
        assert_eq!(decrypt(passphrase, &ct2).unwrap(), plaintext);
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_call() {
        let passphrase = b"test";
        let plaintext = b"same input";

        let ct1 = encrypt(passphrase, plaintext).unwrap();
        let ct2 = encrypt(passphrase, plaintext).unwrap();

        // Random salt and nonce make repeated seals of identical input
        // diverge in every region.
        assert_ne!(ct1[..SALT_LEN], ct2[..SALT_LEN]);
        assert_ne!(
            ct1[SALT_LEN..SALT_LEN + NONCE_LEN],
            ct2[SALT_LEN..SALT_LEN + NONCE_LEN]
        );
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_passphrase() {
        let plaintext = b"secret data";

        let sealed = encrypt(b"correct", plaintext).unwrap();
        let err = decrypt(b"wrong", &sealed).expect_err("expected authentication failure");

        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert!(
            err.to_string()
                .contains("corrupt input, tampered-with data, or bad passphrase")
        );
    }

    #[test]
    fn test_truncated_salt() {
        let sealed = vec![1, 2, 3]; // Less than SALT_LEN
        let err = decrypt(b"test", &sealed).expect_err("expected truncated input error");

        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.to_string().contains("salt"));
    }

    #[test]
    fn test_truncated_nonce() {
        let sealed = vec![0u8; SALT_LEN + 3]; // Incomplete nonce
        let err = decrypt(b"test", &sealed).expect_err("expected truncated input error");

        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.to_string().contains("nonce"));
    }

    #[test]
    fn test_truncated_ciphertext() {
        // Header present but body shorter than the tag
        let sealed = vec![0u8; SALT_LEN + NONCE_LEN + TAG_LEN - 1];
        let err = decrypt(b"test", &sealed).expect_err("expected truncated input error");

        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.to_string().contains("ciphertext"));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let passphrase = b"test";
        let plaintext = b"tamper target plaintext";

        let mut sealed = encrypt(passphrase, plaintext).unwrap();
        // Flip one bit in the first ciphertext byte
        sealed[SALT_LEN + NONCE_LEN] ^= 0x01;

        let err = decrypt(passphrase, &sealed).expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let passphrase = b"test";
        let plaintext = b"tamper target plaintext";

        let mut sealed = encrypt(passphrase, plaintext).unwrap();
        // Flip one bit in the final tag byte
        let last = sealed.len() - 1;
        sealed[last] ^= 0x80;

        let err = decrypt(passphrase, &sealed).expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_tampered_salt_rejected() {
        let passphrase = b"test";
        let plaintext = b"tamper target plaintext";

        let mut sealed = encrypt(passphrase, plaintext).unwrap();
        // A corrupted salt derives a different key, so the tag cannot verify
        sealed[0] ^= 0x01;

        let err = decrypt(passphrase, &sealed).expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_all_byte_values() {
        let passphrase = b"test";
        let plaintext: Vec<u8> = (0..=255).collect();

        let sealed = encrypt(passphrase, &plaintext).unwrap();
        let decrypted = decrypt(passphrase, &sealed).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_non_utf8_passphrase() {
        let passphrase: &[u8] = &[0xff, 0xfe, 0x00, 0x01];
        let plaintext = b"binary passphrases are fine";

        let sealed = encrypt(passphrase, plaintext).unwrap();
        let decrypted = decrypt(passphrase, &sealed).unwrap();

        assert_eq!(plaintext, &decrypted[..]);
    }

    #[test]
    fn test_large_plaintext() {
        let passphrase = b"test";
        let plaintext = vec![0x42u8; 128 * 1024]; // 128KB

        let sealed = encrypt(passphrase, &plaintext).unwrap();
        let decrypted = decrypt(passphrase, &sealed).unwrap();

        assert_eq!(plaintext, decrypted);
    }
}

// VaultSync Symmetric Primitives
// AES-256-CTR, HMAC-SHA256 and SHA-256 helpers

use aes::cipher::{KeyIvInit, StreamCipher};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::hmac;
use sha2::{Digest, Sha256};

use crate::crypto::{random, CryptoError, CryptoResult, EncryptionMethod};

/// AES-256 key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;
/// Random counter-prefix (initial value) size in bytes (64 bits).
pub const IV_SIZE: usize = 8;

/// AES-256 CTR with a 64-bit big-endian counter in the low half of the block.
type Aes256Ctr64 = ctr::Ctr64BE<aes::Aes256>;

fn ctr_cipher(key: &[u8], iv: &[u8]) -> CryptoResult<Aes256Ctr64> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::WrongKeySize(key.len()));
    }
    // Full 16-byte counter block: 8 random prefix bytes, then a 64-bit
    // counter starting at zero.
    let mut block = [0u8; 16];
    block[..IV_SIZE].copy_from_slice(iv);
    Aes256Ctr64::new_from_slices(key, &block)
        .map_err(|_| CryptoError::WrongKeySize(key.len()))
}

/// Encrypt `plaintext` with AES-256-CTR under a 32-byte key.
///
/// Returns the base64 of the freshly drawn 8-byte initial value together
/// with the ciphertext. CTR provides no integrity; callers authenticate
/// above this layer with [`hmac_sha256`].
pub fn encrypt_sym(plaintext: &[u8], key: &[u8]) -> CryptoResult<(String, Vec<u8>)> {
    encrypt_sym_with(plaintext, key, EncryptionMethod::Aes256Ctr)
}

/// Encrypt with an explicit method tag.
pub fn encrypt_sym_with(
    plaintext: &[u8],
    key: &[u8],
    method: EncryptionMethod,
) -> CryptoResult<(String, Vec<u8>)> {
    match method {
        EncryptionMethod::Aes256Ctr => {
            let iv = random::random_bytes(IV_SIZE);
            let mut cipher = ctr_cipher(key, &iv)?;
            let mut ciphertext = plaintext.to_vec();
            cipher.apply_keystream(&mut ciphertext);
            Ok((BASE64.encode(&iv), ciphertext))
        }
    }
}

/// Decrypt AES-256-CTR ciphertext produced by [`encrypt_sym`].
pub fn decrypt_sym(ciphertext: &[u8], key: &[u8], iv_b64: &str) -> CryptoResult<Vec<u8>> {
    decrypt_sym_with(ciphertext, key, iv_b64, EncryptionMethod::Aes256Ctr)
}

/// Decrypt with an explicit method tag.
pub fn decrypt_sym_with(
    ciphertext: &[u8],
    key: &[u8],
    iv_b64: &str,
    method: EncryptionMethod,
) -> CryptoResult<Vec<u8>> {
    match method {
        EncryptionMethod::Aes256Ctr => {
            let iv = decode_iv(iv_b64)?;
            let mut cipher = ctr_cipher(key, &iv)?;
            let mut plaintext = ciphertext.to_vec();
            cipher.apply_keystream(&mut plaintext);
            Ok(plaintext)
        }
    }
}

fn decode_iv(iv_b64: &str) -> CryptoResult<Vec<u8>> {
    let trimmed = iv_b64.trim();
    if trimmed.is_empty() {
        return Err(CryptoError::MissingIv("initial value is empty".to_string()));
    }
    let iv = BASE64
        .decode(trimmed)
        .map_err(|e| CryptoError::MissingIv(format!("initial value is not base64: {}", e)))?;
    if iv.len() != IV_SIZE {
        return Err(CryptoError::MissingIv(format!(
            "initial value must be {} bytes, got {}",
            IV_SIZE,
            iv.len()
        )));
    }
    Ok(iv)
}

/// HMAC-SHA256 of `message` under `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, message);
    let mut out = [0u8; 32];
    out.copy_from_slice(tag.as_ref());
    out
}

/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = random::random_bytes(KEY_SIZE);
        let plaintext = b"synchronize locally encrypted data";

        let (iv, ciphertext) = encrypt_sym(plaintext, &key).unwrap();
        assert_ne!(ciphertext, plaintext.to_vec());
        let decrypted = decrypt_sym(&ciphertext, &key, &iv).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext() {
        let key = random::random_bytes(KEY_SIZE);
        let (iv, ciphertext) = encrypt_sym(b"", &key).unwrap();
        assert!(ciphertext.is_empty());
        assert_eq!(decrypt_sym(&ciphertext, &key, &iv).unwrap(), b"");
    }

    #[test]
    fn test_wrong_key_size() {
        let err = encrypt_sym(b"data", &[0u8; 16]).unwrap_err();
        assert_eq!(err, CryptoError::WrongKeySize(16));

        let err = decrypt_sym(b"data", &[0u8; 64], "AAAAAAAAAAA=").unwrap_err();
        assert_eq!(err, CryptoError::WrongKeySize(64));
    }

    #[test]
    fn test_missing_iv() {
        let key = random::random_bytes(KEY_SIZE);
        assert!(matches!(
            decrypt_sym(b"data", &key, "").unwrap_err(),
            CryptoError::MissingIv(_)
        ));
        assert!(matches!(
            decrypt_sym(b"data", &key, "not/base64!!").unwrap_err(),
            CryptoError::MissingIv(_)
        ));
        // decodes, but to the wrong length
        assert!(matches!(
            decrypt_sym(b"data", &key, "AAAA").unwrap_err(),
            CryptoError::MissingIv(_)
        ));
    }

    #[test]
    fn test_keystream_is_deterministic_per_iv() {
        let key = random::random_bytes(KEY_SIZE);
        let (iv, ct1) = encrypt_sym(b"same input", &key).unwrap();
        // re-encrypting decrypts: CTR is an XOR stream
        let ct2 = decrypt_sym(b"same input", &key, &iv).unwrap();
        assert_eq!(ct1, ct2);
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let key = random::random_bytes(KEY_SIZE);
        let (iv1, _) = encrypt_sym(b"data", &key).unwrap();
        let (iv2, _) = encrypt_sym(b"data", &key).unwrap();
        assert_ne!(iv1, iv2);
    }

    #[test]
    fn test_hmac_sha256_rfc4231_case1() {
        // RFC 4231 test case 1
        let key = [0x0bu8; 20];
        let tag = hmac_sha256(&key, b"Hi There");
        assert_eq!(
            hex::encode(tag),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }

    #[test]
    fn test_sha256_hex_known_vectors() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

// VaultSync Cryptographic Core Module

pub mod kdf;
pub mod random;
pub mod sym;

use std::error::Error;
use std::fmt;

/// VaultSync Cryptographic Error Types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A symmetric key had the wrong length (expected 32 bytes).
    WrongKeySize(usize),
    /// The initial value for CTR decryption was absent or undecodable.
    MissingIv(String),
    /// The encryption-method tag was not recognized.
    UnknownEncryptionMethod(String),
    /// The key derivation function rejected its parameters or inputs.
    KdfFailed(String),
    /// Invalid input
    InvalidInput(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::WrongKeySize(len) => {
                write!(f, "Wrong key size: {} bits (must be 256 bits long)", len * 8)
            }
            CryptoError::MissingIv(msg) => write!(f, "Missing initial value: {}", msg),
            CryptoError::UnknownEncryptionMethod(tag) => {
                write!(f, "Unknown encryption method: {}", tag)
            }
            CryptoError::KdfFailed(msg) => write!(f, "Key derivation failed: {}", msg),
            CryptoError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl Error for CryptoError {}

/// VaultSync Cryptographic Result Type
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Symmetric encryption methods carried in the wire format.
///
/// Only AES-256 in CTR mode is produced today; the tag exists so stored
/// material can announce a different method in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    /// AES-256 in CTR mode with a 64-bit random counter prefix.
    Aes256Ctr,
}

impl EncryptionMethod {
    /// The wire tag for this method.
    pub fn as_tag(&self) -> &'static str {
        match self {
            EncryptionMethod::Aes256Ctr => "aes-256-ctr",
        }
    }

    /// Parse a wire tag. Unrecognized tags are an error, never a fallback.
    pub fn from_tag(tag: &str) -> CryptoResult<Self> {
        match tag {
            "aes-256-ctr" => Ok(EncryptionMethod::Aes256Ctr),
            other => Err(CryptoError::UnknownEncryptionMethod(other.to_string())),
        }
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_tag_roundtrip() {
        let method = EncryptionMethod::from_tag("aes-256-ctr").unwrap();
        assert_eq!(method, EncryptionMethod::Aes256Ctr);
        assert_eq!(method.as_tag(), "aes-256-ctr");
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = EncryptionMethod::from_tag("aes-256-gcm").unwrap_err();
        assert!(matches!(err, CryptoError::UnknownEncryptionMethod(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CryptoError::WrongKeySize(16);
        assert_eq!(err.to_string(), "Wrong key size: 128 bits (must be 256 bits long)");
    }
}

// VaultSync Error Types

use std::error::Error;
use std::fmt;

/// VaultSync Error Type
#[derive(Debug, Clone)]
pub enum VaultSyncError {
    /// Cryptographic operation failed
    Crypto(crate::crypto::CryptoError),

    /// Key material was requested before bootstrap reached a usable secret
    NoSymmetricSecret,

    /// Secrets file absent; control-flow signal during bootstrap
    NotFound(String),

    /// A wrapped secret failed its integrity check
    Integrity(String),

    /// Configuration error
    Config(String),

    /// The shared recovery database could not be reached
    RemoteUnavailable(String),

    /// The local database collaborator failed
    LocalDb(String),

    /// Filesystem error
    Io(String),

    /// JSON (de)serialization error
    Serialization(String),
}

impl fmt::Display for VaultSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultSyncError::Crypto(err) => write!(f, "Cryptographic error: {}", err),
            VaultSyncError::NoSymmetricSecret => {
                write!(f, "No symmetric secret available for key derivation")
            }
            VaultSyncError::NotFound(path) => write!(f, "File does not exist: {}", path),
            VaultSyncError::Integrity(msg) => write!(f, "Integrity error: {}", msg),
            VaultSyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            VaultSyncError::RemoteUnavailable(msg) => {
                write!(f, "Shared database unavailable: {}", msg)
            }
            VaultSyncError::LocalDb(msg) => write!(f, "Local database error: {}", msg),
            VaultSyncError::Io(msg) => write!(f, "I/O error: {}", msg),
            VaultSyncError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl Error for VaultSyncError {}

/// Convert CryptoError to VaultSyncError
impl From<crate::crypto::CryptoError> for VaultSyncError {
    fn from(err: crate::crypto::CryptoError) -> Self {
        VaultSyncError::Crypto(err)
    }
}

impl From<std::io::Error> for VaultSyncError {
    fn from(err: std::io::Error) -> Self {
        VaultSyncError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultSyncError {
    fn from(err: serde_json::Error) -> Self {
        VaultSyncError::Serialization(err.to_string())
    }
}

/// VaultSync Result Type
pub type VaultSyncResult<T> = Result<T, VaultSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultSyncError::Integrity("secret id mismatch".to_string());
        assert_eq!(err.to_string(), "Integrity error: secret id mismatch");
    }

    #[test]
    fn test_error_conversion() {
        let crypto_err = crate::crypto::CryptoError::WrongKeySize(16);
        let err: VaultSyncError = crypto_err.into();

        match err {
            VaultSyncError::Crypto(crate::crypto::CryptoError::WrongKeySize(16)) => (),
            _ => panic!("Wrong error type"),
        }
    }
}

//! VaultSync Key Derivation
//!
//! Deterministic partition of the 1024-byte master secret into
//! subordinate key material:
//!
//! ```text
//! Master secret (1024 bytes)
//! ├── [0, 512)     remote-storage secret
//! │   ├── [0, 64)    per-document MAC key (HMAC-SHA256 key)
//! │   └── [64, 512)  per-document passphrase key (HMAC-SHA256 key)
//! ├── [512, 576)   local-db KDF salt
//! └── [576, 1024)  local-db KDF password material
//! ```
//!
//! The offsets are load-bearing for interoperability with persisted
//! data and must not be reordered.

use scrypt::{scrypt, Params};
use zeroize::Zeroize;

use crate::crypto::{random, sym, CryptoError, CryptoResult};

/// Length of the generated master secret in bytes.
pub const MASTER_SECRET_LEN: usize = 1024;
/// Length of the remote-storage secret slice.
pub const REMOTE_SECRET_LEN: usize = 512;
/// Length of the local-db KDF salt slice.
pub const LOCAL_KDF_SALT_LEN: usize = 64;
/// Length of the per-document MAC key slice.
pub const MAC_KEY_LEN: usize = 64;
/// Length of the salt wrapping the master secret under the passphrase.
pub const WRAP_SALT_LEN: usize = 64;
/// Length of every derived symmetric key.
pub const DERIVED_KEY_LEN: usize = 32;

// scrypt cost parameters (N = 2^14, r = 8, p = 1). These match the
// parameters the persisted secrets were produced with.
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

fn scrypt_params() -> CryptoResult<Params> {
    Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, DERIVED_KEY_LEN)
        .map_err(|e| CryptoError::KdfFailed(e.to_string()))
}

fn scrypt_hash(password: &[u8], salt: &[u8]) -> CryptoResult<[u8; DERIVED_KEY_LEN]> {
    let mut out = [0u8; DERIVED_KEY_LEN];
    scrypt(password, salt, &scrypt_params()?, &mut out)
        .map_err(|e| CryptoError::KdfFailed(e.to_string()))?;
    Ok(out)
}

/// Derive the 32-byte key that wraps a master secret under a passphrase.
pub fn wrap_key(passphrase: &str, salt: &[u8]) -> CryptoResult<[u8; DERIVED_KEY_LEN]> {
    scrypt_hash(passphrase.as_bytes(), salt)
}

/// The 1024-byte root key material. Never persisted in the clear.
#[derive(Clone)]
pub struct MasterSecret {
    bytes: Vec<u8>,
}

impl MasterSecret {
    /// Draw a fresh master secret from cryptographically secure random.
    pub fn generate() -> Self {
        MasterSecret {
            bytes: random::random_bytes(MASTER_SECRET_LEN),
        }
    }

    /// Reconstruct a master secret from unwrapped bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> CryptoResult<Self> {
        if bytes.len() != MASTER_SECRET_LEN {
            return Err(CryptoError::InvalidInput(format!(
                "master secret must be {} bytes, got {}",
                MASTER_SECRET_LEN,
                bytes.len()
            )));
        }
        Ok(MasterSecret { bytes })
    }

    /// The raw secret bytes. Caller must not persist them in the clear.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex SHA-256 of the secret, used as map key and integrity tag.
    pub fn id(&self) -> String {
        sym::sha256_hex(&self.bytes)
    }

    fn doc_mac_key_material(&self) -> &[u8] {
        &self.bytes[..MAC_KEY_LEN]
    }

    fn doc_passphrase_material(&self) -> &[u8] {
        &self.bytes[MAC_KEY_LEN..REMOTE_SECRET_LEN]
    }

    fn local_kdf_salt(&self) -> &[u8] {
        &self.bytes[REMOTE_SECRET_LEN..REMOTE_SECRET_LEN + LOCAL_KDF_SALT_LEN]
    }

    fn local_kdf_password(&self) -> &[u8] {
        &self.bytes[REMOTE_SECRET_LEN + LOCAL_KDF_SALT_LEN..MASTER_SECRET_LEN]
    }
}

impl Drop for MasterSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterSecret([REDACTED])")
    }
}

/// Derive the 32-byte local-database key from the master secret.
///
/// scrypt over the salt and password slices of the partition. The caller
/// hex-encodes the result before handing it to the local database, which
/// expects a raw key in hex form.
pub fn local_db_key(master: &MasterSecret) -> CryptoResult<[u8; DERIVED_KEY_LEN]> {
    scrypt_hash(master.local_kdf_password(), master.local_kdf_salt())
}

/// Per-document encryption passphrase: HMAC-SHA256 over the document id.
pub fn doc_passphrase(master: &MasterSecret, doc_id: &str) -> [u8; DERIVED_KEY_LEN] {
    sym::hmac_sha256(master.doc_passphrase_material(), doc_id.as_bytes())
}

/// Per-document MAC key: HMAC-SHA256 over the document id.
pub fn doc_mac_key(master: &MasterSecret, doc_id: &str) -> [u8; DERIVED_KEY_LEN] {
    sym::hmac_sha256(master.doc_mac_key_material(), doc_id.as_bytes())
}

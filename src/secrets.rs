//! VaultSync Secret Store
//!
//! Owns the wrapped master secrets and their on-disk form. A master
//! secret is wrapped with AES-256-CTR under a scrypt-derived key and
//! stored as JSON; the plaintext never touches the disk.
//!
//! On-disk layout (bit-exact, shared with the recovery document):
//!
//! ```json
//! {
//!     "storage_secrets": {
//!         "<secret_id>": {
//!             "kdf": "scrypt",
//!             "kdf_salt": "<b64 of 64 bytes>",
//!             "kdf_length": 32,
//!             "cipher": "aes256",
//!             "length": 1024,
//!             "secret": "<b64(iv)>:<b64(ciphertext)>"
//!         }
//!     }
//! }
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::crypto::kdf::{self, MasterSecret};
use crate::crypto::{random, sym, CryptoError};
use crate::error::{VaultSyncError, VaultSyncResult};
use crate::recovery::RecoveryDocument;

/// KDF tag every wrapped secret carries.
pub const KDF_SCRYPT: &str = "scrypt";
/// Cipher tag every wrapped secret carries.
pub const CIPHER_AES256: &str = "aes256";
/// Separator between the base64 IV and the base64 ciphertext.
pub const IV_SEPARATOR: char = ':';

/// A master secret in its wrapped (passphrase-encrypted) form.
///
/// The secret id is the map key, not a field, so the struct serializes
/// to exactly the persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedSecret {
    /// KDF used to derive the wrapping key ("scrypt").
    pub kdf: String,
    /// Base64 of the 64-byte salt for the wrapping KDF.
    pub kdf_salt: String,
    /// Derived wrapping-key length in bytes (32).
    pub kdf_length: usize,
    /// Cipher the secret is wrapped with ("aes256").
    pub cipher: String,
    /// Plaintext secret length in bytes (1024).
    pub length: usize,
    /// `base64(iv) ":" base64(ciphertext)`.
    pub secret: String,
}

/// Split a wrapped `secret` field on the first separator only; base64
/// never emits `':'`, but nothing downstream may rely on that.
pub(crate) fn split_iv(secret: &str) -> VaultSyncResult<(&str, &str)> {
    secret.split_once(IV_SEPARATOR).ok_or_else(|| {
        VaultSyncError::Crypto(CryptoError::MissingIv(
            "wrapped secret has no IV separator".to_string(),
        ))
    })
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretsFile {
    storage_secrets: IndexMap<String, WrappedSecret>,
}

/// Store of wrapped master secrets, persisted in a local JSON file.
///
/// Single-threaded by design; concurrent mutation is a caller error.
pub struct SecretStore {
    path: PathBuf,
    passphrase: String,
    secrets: IndexMap<String, WrappedSecret>,
    active_secret_id: Option<String>,
}

impl SecretStore {
    /// Create a store over `path`. Nothing is read until [`load`] or
    /// [`has_usable_secret`] runs.
    ///
    /// [`load`]: SecretStore::load
    /// [`has_usable_secret`]: SecretStore::has_usable_secret
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        SecretStore {
            path: path.into(),
            passphrase: passphrase.into(),
            secrets: IndexMap::new(),
            active_secret_id: None,
        }
    }

    /// The on-disk path of the secrets file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Currently selected secret id, if any.
    pub fn active_secret_id(&self) -> Option<&str> {
        self.active_secret_id.as_deref()
    }

    /// All known secret ids, in file order.
    pub fn secret_ids(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    /// Whether the store holds no wrapped secrets.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Number of wrapped secrets known to the store.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Read the secrets file and union-merge it into the in-memory map.
    ///
    /// Fails with [`VaultSyncError::NotFound`] when the file does not
    /// exist; bootstrap treats that as a control-flow signal, not a
    /// failure. If no secret is selected afterwards, the first entry in
    /// file order becomes active.
    pub fn load(&mut self) -> VaultSyncResult<()> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultSyncError::NotFound(self.path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let file: SecretsFile = serde_json::from_str(&content)?;
        for (secret_id, wrapped) in file.storage_secrets {
            self.secrets.entry(secret_id).or_insert(wrapped);
        }
        if self.active_secret_id.is_none() {
            self.active_secret_id = self.secrets.keys().next().cloned();
        }
        Ok(())
    }

    /// Whether a secret is selected and unwraps with the current
    /// passphrase. Attempts a disk load on the first miss.
    pub fn has_usable_secret(&mut self) -> bool {
        let selected = self
            .active_secret_id
            .as_ref()
            .map(|id| self.secrets.contains_key(id))
            .unwrap_or(false);
        if !selected {
            match self.load() {
                Ok(()) => {}
                Err(VaultSyncError::NotFound(path)) => {
                    info!("No secrets file at {}", path);
                }
                Err(err) => warn!("Failed to load secrets file: {}", err),
            }
        }
        self.get_master().is_ok()
    }

    /// Unwrap the active secret and return the plaintext master secret.
    pub fn get_master(&self) -> VaultSyncResult<MasterSecret> {
        let secret_id = self
            .active_secret_id
            .as_deref()
            .ok_or(VaultSyncError::NoSymmetricSecret)?;
        self.unwrap_secret(secret_id)
    }

    fn unwrap_secret(&self, secret_id: &str) -> VaultSyncResult<MasterSecret> {
        let wrapped = self
            .secrets
            .get(secret_id)
            .ok_or(VaultSyncError::NoSymmetricSecret)?;
        if wrapped.kdf != KDF_SCRYPT {
            return Err(VaultSyncError::Integrity(format!(
                "unsupported kdf: {}",
                wrapped.kdf
            )));
        }
        if wrapped.cipher != CIPHER_AES256 {
            return Err(VaultSyncError::Integrity(format!(
                "unsupported cipher: {}",
                wrapped.cipher
            )));
        }
        let salt = BASE64
            .decode(wrapped.kdf_salt.trim())
            .map_err(|e| VaultSyncError::Integrity(format!("kdf salt is not base64: {}", e)))?;
        let mut key = kdf::wrap_key(&self.passphrase, &salt)?;

        let (iv_b64, ciphertext_b64) = split_iv(&wrapped.secret)?;
        let ciphertext = BASE64
            .decode(ciphertext_b64.trim())
            .map_err(|e| VaultSyncError::Integrity(format!("ciphertext is not base64: {}", e)))?;
        let plaintext = sym::decrypt_sym(&ciphertext, &key, iv_b64);
        key.zeroize();
        let plaintext = plaintext?;

        if plaintext.len() != wrapped.length {
            return Err(VaultSyncError::Integrity(format!(
                "unwrapped secret is {} bytes, record says {}",
                plaintext.len(),
                wrapped.length
            )));
        }
        let master = MasterSecret::from_bytes(plaintext)?;
        // wrong passphrase decrypts to garbage; the id is the integrity tag
        if master.id().as_bytes().ct_eq(secret_id.as_bytes()).unwrap_u8() != 1 {
            return Err(VaultSyncError::Integrity(
                "secret id does not match unwrapped secret".to_string(),
            ));
        }
        Ok(master)
    }

    /// Generate a fresh master secret, wrap it under the passphrase,
    /// select it and persist. Returns the new secret id.
    pub fn generate(&mut self) -> VaultSyncResult<String> {
        let master = MasterSecret::generate();
        let secret_id = master.id();
        let salt = random::random_bytes(kdf::WRAP_SALT_LEN);
        let mut key = kdf::wrap_key(&self.passphrase, &salt)?;
        let encrypted = sym::encrypt_sym(master.as_bytes(), &key);
        key.zeroize();
        let (iv_b64, ciphertext) = encrypted?;

        self.secrets.insert(
            secret_id.clone(),
            WrappedSecret {
                kdf: KDF_SCRYPT.to_string(),
                kdf_salt: BASE64.encode(&salt),
                kdf_length: kdf::DERIVED_KEY_LEN,
                cipher: CIPHER_AES256.to_string(),
                length: kdf::MASTER_SECRET_LEN,
                secret: format!("{}{}{}", iv_b64, IV_SEPARATOR, BASE64.encode(&ciphertext)),
            },
        );
        self.active_secret_id = Some(secret_id.clone());
        self.save()?;
        info!("Generated new storage secret {}", secret_id);
        Ok(secret_id)
    }

    /// Write the current map to disk.
    ///
    /// Writes to a temporary sibling and renames over the target, so a
    /// crash mid-write leaves the previous file intact. The local copy
    /// must be durable before any id is published to a remote endpoint.
    pub fn save(&self) -> VaultSyncResult<()> {
        let file = SecretsFile {
            storage_secrets: self.secrets.clone(),
        };
        let json = serde_json::to_string(&file)?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| VaultSyncError::Config("secrets path has no file name".to_string()))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(json.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Export the wrapped secrets as a recovery document.
    pub fn export_recovery(&self, uuid: Option<&str>) -> RecoveryDocument {
        RecoveryDocument {
            storage_secrets: self.secrets.clone(),
            uuid: uuid.map(str::to_string),
        }
    }

    /// Union-merge a recovery document into the store and persist.
    ///
    /// Never removes or replaces a locally known secret. If no secret is
    /// selected, the first imported id becomes active. Returns the
    /// document's uuid so the caller can adopt the identity.
    pub fn import_recovery(&mut self, doc: &RecoveryDocument) -> VaultSyncResult<Option<String>> {
        for (secret_id, wrapped) in &doc.storage_secrets {
            self.secrets
                .entry(secret_id.clone())
                .or_insert_with(|| wrapped.clone());
        }
        if self.active_secret_id.is_none() {
            self.active_secret_id = doc.storage_secrets.keys().next().cloned();
        }
        self.save()?;
        Ok(doc.uuid.clone())
    }
}

impl Drop for SecretStore {
    fn drop(&mut self) {
        self.passphrase.zeroize();
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("path", &self.path)
            .field("passphrase", &"[REDACTED]")
            .field("secrets", &self.secrets.len())
            .field("active_secret_id", &self.active_secret_id)
            .finish()
    }
}

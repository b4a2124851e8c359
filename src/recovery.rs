//! Cross-device recovery document.
//!
//! The wrapped master secrets travel to the shared recovery database in
//! this envelope, so a user can bootstrap a new device from passphrase
//! and uuid alone.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::crypto::sym;
use crate::error::VaultSyncResult;
use crate::secrets::WrappedSecret;

/// Prefix hashed together with the user uuid to form the shared-db doc id.
pub const SECRETS_DOC_ID_PREFIX: &str = "uuid-";

/// Recovery document payload.
///
/// `uuid` is optional on export; when present on import it overrides the
/// local user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryDocument {
    /// Wrapped secrets keyed by secret id, in file order.
    pub storage_secrets: IndexMap<String, WrappedSecret>,
    /// User identity, included only when exporting for manual recovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl RecoveryDocument {
    /// Serialize to the shared-db JSON payload.
    pub fn to_json(&self) -> VaultSyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a shared-db JSON payload.
    pub fn from_json(json: &str) -> VaultSyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Shared-db document id for a user's wrapped secrets.
pub fn secrets_doc_id(uuid: &str) -> String {
    sym::sha256_hex(format!("{}{}", SECRETS_DOC_ID_PREFIX, uuid).as_bytes())
}

//! Shared recovery database interface.
//!
//! The remote store is untrusted: it only ever sees wrapped secrets. The
//! core talks to it through [`SharedDatabase`]; network transports live
//! with the embedder. An in-memory implementation backs the tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{VaultSyncError, VaultSyncResult};

/// Token-based credentials for remote database access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User identity.
    pub uuid: String,
    /// Authorization token.
    pub token: String,
}

impl Credentials {
    /// The wire form remote calls carry: `{"token": {"uuid", "token"}}`.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({
            "token": {
                "uuid": self.uuid,
                "token": self.token,
            }
        })
    }
}

/// TLS settings threaded explicitly to remote collaborator constructors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path of the CA certificate that pins the server connection.
    pub ca_cert_path: Option<PathBuf>,
}

/// A document in the shared key-value store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    /// Document id.
    pub doc_id: String,
    /// Server-side revision; `None` before the first put.
    pub rev: Option<String>,
    /// Opaque JSON content.
    pub content: serde_json::Value,
}

/// Shared recovery database contract.
pub trait SharedDatabase: Send {
    /// Fetch a document, or `None` when it does not exist.
    fn get_doc(&self, doc_id: &str) -> VaultSyncResult<Option<RemoteDocument>>;
    /// Create or overwrite a document; returns it with its new revision.
    fn put_doc(&mut self, doc: &RemoteDocument) -> VaultSyncResult<RemoteDocument>;
}

/// In-memory shared database (for testing or embedding without a server).
///
/// Cloning shares the underlying state, so a test can keep a handle to
/// the store it hands to a client.
#[derive(Debug, Clone, Default)]
pub struct MemorySharedDatabase {
    state: Arc<Mutex<MemorySharedState>>,
    auth: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct MemorySharedState {
    docs: HashMap<String, RemoteDocument>,
    rev_counter: u64,
    put_count: u64,
}

impl MemorySharedDatabase {
    /// Create an empty in-memory shared database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror of the network constructor: url and TLS settings are
    /// accepted for signature parity and ignored by the memory backend.
    /// The credentials are folded into the auth payload a transport
    /// would attach to every request.
    pub fn open(_server_url: &str, creds: Credentials, _tls: &TlsConfig) -> Self {
        MemorySharedDatabase {
            state: Arc::new(Mutex::new(MemorySharedState::default())),
            auth: Some(creds.to_wire()),
        }
    }

    /// The `{"token": {"uuid", "token"}}` payload carried by every
    /// request when the database was opened with credentials.
    pub fn auth_payload(&self) -> Option<&serde_json::Value> {
        self.auth.as_ref()
    }

    /// Number of put operations served (testing).
    pub fn put_count(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).put_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySharedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SharedDatabase for MemorySharedDatabase {
    fn get_doc(&self, doc_id: &str) -> VaultSyncResult<Option<RemoteDocument>> {
        Ok(self.lock().docs.get(doc_id).cloned())
    }

    fn put_doc(&mut self, doc: &RemoteDocument) -> VaultSyncResult<RemoteDocument> {
        let mut state = self.lock();
        state.rev_counter += 1;
        state.put_count += 1;
        let stored = RemoteDocument {
            doc_id: doc.doc_id.clone(),
            rev: Some(state.rev_counter.to_string()),
            content: doc.content.clone(),
        };
        state.docs.insert(doc.doc_id.clone(), stored.clone());
        Ok(stored)
    }
}

/// Shared database that refuses every call (testing unavailability).
#[derive(Debug, Default)]
pub struct UnavailableSharedDatabase;

impl SharedDatabase for UnavailableSharedDatabase {
    fn get_doc(&self, _doc_id: &str) -> VaultSyncResult<Option<RemoteDocument>> {
        Err(VaultSyncError::RemoteUnavailable(
            "connection refused".to_string(),
        ))
    }

    fn put_doc(&mut self, _doc: &RemoteDocument) -> VaultSyncResult<RemoteDocument> {
        Err(VaultSyncError::RemoteUnavailable(
            "connection refused".to_string(),
        ))
    }
}

//! Local encrypted database interface.
//!
//! The local store is a black box to the core: it takes a file path and
//! a raw hex key and exposes document CRUD, indexing, conflict
//! resolution and replica sync. The in-memory implementation exists for
//! tests and records the keys it was opened with.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::sym;
use crate::error::{VaultSyncError, VaultSyncResult};
use crate::remote::Credentials;

/// A document held in the local database.
///
/// `content == None` marks a deleted document that still participates in
/// sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier.
    pub doc_id: String,
    /// Revision identifier, assigned by the database.
    pub rev: Option<String>,
    /// JSON content; `None` once deleted.
    pub content: Option<serde_json::Value>,
}

/// Parameters for opening the local database.
pub struct OpenParams {
    /// Database file path.
    pub path: PathBuf,
    /// Hex encoding of the 32-byte database key.
    pub key_hex: String,
    /// Create the database file if it does not exist.
    pub create: bool,
    /// Treat `key_hex` as a raw key rather than a passphrase to derive from.
    pub raw_key: bool,
}

impl Drop for OpenParams {
    fn drop(&mut self) {
        self.key_hex.zeroize();
    }
}

impl std::fmt::Debug for OpenParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenParams")
            .field("path", &self.path)
            .field("key_hex", &"[REDACTED]")
            .field("create", &self.create)
            .field("raw_key", &self.raw_key)
            .finish()
    }
}

/// Replica synchronization state, as reported by the sync target.
///
/// The final field is the target's last known generation of this
/// replica; a local generation beyond it means there is data to push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInfo {
    /// Uid of the target replica.
    pub target_replica_uid: String,
    /// Target's current generation.
    pub target_generation: u64,
    /// Target's current transaction id.
    pub target_transaction_id: String,
    /// Last transaction id of ours the target has seen.
    pub source_transaction_id: String,
    /// Last generation of ours the target has seen.
    pub source_generation: u64,
}

/// Local encrypted database contract.
pub trait LocalDatabase {
    /// Create a new document, optionally with a caller-chosen id.
    fn create_doc(
        &mut self,
        content: serde_json::Value,
        doc_id: Option<&str>,
    ) -> VaultSyncResult<Document>;
    /// Update a document; returns the new revision.
    fn put_doc(&mut self, doc: &Document) -> VaultSyncResult<String>;
    /// Fetch a document by id.
    fn get_doc(&self, doc_id: &str, include_deleted: bool) -> VaultSyncResult<Option<Document>>;
    /// All documents plus the current generation.
    fn get_all_docs(&self, include_deleted: bool) -> VaultSyncResult<(u64, Vec<Document>)>;
    /// Delete a document; returns the new revision.
    fn delete_doc(&mut self, doc: &Document) -> VaultSyncResult<String>;
    /// Create a named index over content field expressions.
    fn create_index(&mut self, name: &str, expressions: &[&str]) -> VaultSyncResult<()>;
    /// Remove a named index.
    fn delete_index(&mut self, name: &str) -> VaultSyncResult<()>;
    /// Documents matching the key values under a named index.
    fn get_from_index(&self, name: &str, key_values: &[&str]) -> VaultSyncResult<Vec<Document>>;
    /// Conflicted revisions of a document.
    fn get_doc_conflicts(&self, doc_id: &str) -> VaultSyncResult<Vec<Document>>;
    /// Resolve conflicts by superseding the listed revisions.
    fn resolve_doc(&mut self, doc: &Document, conflicted_revs: &[&str]) -> VaultSyncResult<()>;
    /// This replica's uid.
    fn replica_uid(&self) -> String;
    /// Current local generation.
    fn generation(&self) -> u64;
    /// Synchronize with the replica at `url`; returns the local
    /// generation before the sync ran.
    fn sync(&mut self, url: &str, creds: &Credentials, autocreate: bool) -> VaultSyncResult<u64>;
    /// Sync state for this replica as known by the target.
    fn get_sync_info(&self, source_replica_uid: &str) -> VaultSyncResult<SyncInfo>;
    /// Close the database. Idempotent.
    fn close(&mut self) -> VaultSyncResult<()>;
}

impl std::fmt::Debug for dyn LocalDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn LocalDatabase")
    }
}

/// Opens a [`LocalDatabase`] from path and key material.
pub trait LocalDatabaseOpener {
    /// Open (or create) the database described by `params`.
    fn open(&self, params: OpenParams) -> VaultSyncResult<Box<dyn LocalDatabase>>;
}

/// In-memory local database (for testing).
#[derive(Debug, Default)]
pub struct MemoryLocalDatabase {
    replica_uid: String,
    docs: HashMap<String, Document>,
    indexes: HashMap<String, Vec<String>>,
    generation: u64,
    last_synced_generation: u64,
    rev_counter: u64,
    closed: bool,
}

impl MemoryLocalDatabase {
    /// Create an empty database with a random replica uid.
    pub fn new() -> Self {
        MemoryLocalDatabase {
            replica_uid: hex::encode(crate::crypto::random::random_bytes(16)),
            ..Default::default()
        }
    }

    fn check_open(&self) -> VaultSyncResult<()> {
        if self.closed {
            return Err(VaultSyncError::LocalDb("database is closed".to_string()));
        }
        Ok(())
    }

    fn next_rev(&mut self) -> String {
        self.rev_counter += 1;
        self.generation += 1;
        format!("{}:{}", self.rev_counter, self.generation)
    }
}

impl LocalDatabase for MemoryLocalDatabase {
    fn create_doc(
        &mut self,
        content: serde_json::Value,
        doc_id: Option<&str>,
    ) -> VaultSyncResult<Document> {
        self.check_open()?;
        let doc_id = match doc_id {
            Some(id) => id.to_string(),
            None => format!("D-{}", hex::encode(crate::crypto::random::random_bytes(16))),
        };
        if self.docs.contains_key(&doc_id) {
            return Err(VaultSyncError::LocalDb(format!(
                "document already exists: {}",
                doc_id
            )));
        }
        let doc = Document {
            doc_id: doc_id.clone(),
            rev: Some(self.next_rev()),
            content: Some(content),
        };
        self.docs.insert(doc_id, doc.clone());
        Ok(doc)
    }

    fn put_doc(&mut self, doc: &Document) -> VaultSyncResult<String> {
        self.check_open()?;
        let rev = self.next_rev();
        let mut updated = doc.clone();
        updated.rev = Some(rev.clone());
        self.docs.insert(doc.doc_id.clone(), updated);
        Ok(rev)
    }

    fn get_doc(&self, doc_id: &str, include_deleted: bool) -> VaultSyncResult<Option<Document>> {
        self.check_open()?;
        Ok(self.docs.get(doc_id).cloned().filter(|doc| {
            include_deleted || doc.content.is_some()
        }))
    }

    fn get_all_docs(&self, include_deleted: bool) -> VaultSyncResult<(u64, Vec<Document>)> {
        self.check_open()?;
        let docs = self
            .docs
            .values()
            .filter(|doc| include_deleted || doc.content.is_some())
            .cloned()
            .collect();
        Ok((self.generation, docs))
    }

    fn delete_doc(&mut self, doc: &Document) -> VaultSyncResult<String> {
        self.check_open()?;
        let rev = self.next_rev();
        match self.docs.get_mut(&doc.doc_id) {
            Some(stored) => {
                stored.content = None;
                stored.rev = Some(rev.clone());
                Ok(rev)
            }
            None => Err(VaultSyncError::LocalDb(format!(
                "document not found: {}",
                doc.doc_id
            ))),
        }
    }

    fn create_index(&mut self, name: &str, expressions: &[&str]) -> VaultSyncResult<()> {
        self.check_open()?;
        self.indexes.insert(
            name.to_string(),
            expressions.iter().map(|e| e.to_string()).collect(),
        );
        Ok(())
    }

    fn delete_index(&mut self, name: &str) -> VaultSyncResult<()> {
        self.check_open()?;
        self.indexes.remove(name);
        Ok(())
    }

    fn get_from_index(&self, name: &str, key_values: &[&str]) -> VaultSyncResult<Vec<Document>> {
        self.check_open()?;
        let expressions = self
            .indexes
            .get(name)
            .ok_or_else(|| VaultSyncError::LocalDb(format!("no such index: {}", name)))?;
        if expressions.len() != key_values.len() {
            return Err(VaultSyncError::LocalDb(format!(
                "index {} takes {} values, got {}",
                name,
                expressions.len(),
                key_values.len()
            )));
        }
        let matches = self
            .docs
            .values()
            .filter(|doc| {
                doc.content.as_ref().is_some_and(|content| {
                    expressions.iter().zip(key_values).all(|(field, value)| {
                        content.get(field).and_then(|v| v.as_str()) == Some(*value)
                    })
                })
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    fn get_doc_conflicts(&self, _doc_id: &str) -> VaultSyncResult<Vec<Document>> {
        self.check_open()?;
        // single-replica memory store never observes concurrent edits
        Ok(Vec::new())
    }

    fn resolve_doc(&mut self, doc: &Document, _conflicted_revs: &[&str]) -> VaultSyncResult<()> {
        self.check_open()?;
        self.put_doc(doc)?;
        Ok(())
    }

    fn replica_uid(&self) -> String {
        self.replica_uid.clone()
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn sync(&mut self, _url: &str, _creds: &Credentials, _autocreate: bool) -> VaultSyncResult<u64> {
        self.check_open()?;
        let local_generation = self.generation;
        self.last_synced_generation = local_generation;
        Ok(local_generation)
    }

    fn get_sync_info(&self, source_replica_uid: &str) -> VaultSyncResult<SyncInfo> {
        self.check_open()?;
        Ok(SyncInfo {
            target_replica_uid: sym::sha256_hex(self.replica_uid.as_bytes()),
            target_generation: self.last_synced_generation,
            target_transaction_id: String::new(),
            source_transaction_id: source_replica_uid.to_string(),
            source_generation: self.last_synced_generation,
        })
    }

    fn close(&mut self) -> VaultSyncResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Opener for [`MemoryLocalDatabase`] that records every key it sees.
///
/// Cloning shares the record, so a test can keep a handle after moving
/// the opener into a client.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalDatabaseOpener {
    opened: Arc<Mutex<Vec<String>>>,
}

impl MemoryLocalDatabaseOpener {
    /// Create a new opener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hex keys from every open call, in order (testing).
    pub fn opened_keys(&self) -> Vec<String> {
        self.opened.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl LocalDatabaseOpener for MemoryLocalDatabaseOpener {
    fn open(&self, params: OpenParams) -> VaultSyncResult<Box<dyn LocalDatabase>> {
        if params.raw_key {
            let key = hex::decode(&params.key_hex)
                .map_err(|e| VaultSyncError::LocalDb(format!("raw key is not hex: {}", e)))?;
            if key.len() != 32 {
                return Err(VaultSyncError::LocalDb(format!(
                    "raw key must be 32 bytes, got {}",
                    key.len()
                )));
            }
        }
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(params.key_hex.clone());
        Ok(Box::new(MemoryLocalDatabase::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud_roundtrip() {
        let mut db = MemoryLocalDatabase::new();
        let doc = db
            .create_doc(serde_json::json!({"kind": "note"}), Some("d1"))
            .unwrap();
        assert_eq!(db.generation(), 1);

        let fetched = db.get_doc("d1", false).unwrap().unwrap();
        assert_eq!(fetched, doc);

        db.delete_doc(&fetched).unwrap();
        assert!(db.get_doc("d1", false).unwrap().is_none());
        assert!(db.get_doc("d1", true).unwrap().is_some());
    }

    #[test]
    fn test_index_lookup() {
        let mut db = MemoryLocalDatabase::new();
        db.create_doc(serde_json::json!({"kind": "note", "title": "a"}), Some("d1"))
            .unwrap();
        db.create_doc(serde_json::json!({"kind": "todo", "title": "b"}), Some("d2"))
            .unwrap();
        db.create_index("by-kind", &["kind"]).unwrap();

        let notes = db.get_from_index("by-kind", &["note"]).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].doc_id, "d1");
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_use() {
        let mut db = MemoryLocalDatabase::new();
        db.close().unwrap();
        db.close().unwrap();
        assert!(db.get_doc("d1", false).is_err());
    }

    #[test]
    fn test_opener_rejects_bad_raw_key() {
        let opener = MemoryLocalDatabaseOpener::new();
        let err = opener
            .open(OpenParams {
                path: PathBuf::from("/tmp/db"),
                key_hex: "not-hex".to_string(),
                create: true,
                raw_key: true,
            })
            .unwrap_err();
        assert!(matches!(err, VaultSyncError::LocalDb(_)));
    }

    #[test]
    fn test_opener_records_keys() {
        let opener = MemoryLocalDatabaseOpener::new();
        let key_hex = hex::encode([7u8; 32]);
        opener
            .open(OpenParams {
                path: PathBuf::from("/tmp/db"),
                key_hex: key_hex.clone(),
                create: true,
                raw_key: true,
            })
            .unwrap();
        assert_eq!(opener.opened_keys(), vec![key_hex]);
    }
}

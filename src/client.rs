// VaultSync High-Level Client API
// Bootstraps the key material and fronts the local encrypted database

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use zeroize::Zeroize;

use crate::crypto::kdf::{self, MasterSecret};
use crate::error::{VaultSyncError, VaultSyncResult};
use crate::events::{Event, EventSink, NoOpEventSink};
use crate::local_db::{Document, LocalDatabase, LocalDatabaseOpener, OpenParams};
use crate::recovery::{secrets_doc_id, RecoveryDocument};
use crate::remote::{Credentials, RemoteDocument, SharedDatabase, TlsConfig};
use crate::secrets::SecretStore;

/// VaultSync Client Configuration
#[derive(Clone)]
pub struct VaultSyncConfig {
    /// User uuid
    pub uuid: String,
    /// Passphrase locking the storage secrets
    pub passphrase: String,
    /// Path of the local secrets file
    pub secrets_path: PathBuf,
    /// Path of the local encrypted database
    pub local_db_path: PathBuf,
    /// Server URL, used both for the shared recovery database and replica sync
    pub server_url: String,
    /// Authorization token for remote database access
    pub auth_token: String,
    /// TLS settings for remote collaborators
    pub tls: TlsConfig,
    /// Optional sink for bootstrap and sync events
    pub event_sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for VaultSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSyncConfig")
            .field("uuid", &self.uuid)
            .field("passphrase", &"[REDACTED]")
            .field("secrets_path", &self.secrets_path)
            .field("local_db_path", &self.local_db_path)
            .field("server_url", &self.server_url)
            .field("auth_token", &"[REDACTED]")
            .field("tls", &self.tls)
            .field("event_sink", &self.event_sink.as_ref().map(|_| "Some(..)"))
            .finish()
    }
}

impl VaultSyncConfig {
    fn validate(&self) -> VaultSyncResult<()> {
        if self.server_url.is_empty() {
            return Err(VaultSyncError::Config(
                "Missing URL for VaultSync server".to_string(),
            ));
        }
        if self.uuid.is_empty() {
            return Err(VaultSyncError::Config("Missing user uuid".to_string()));
        }
        Ok(())
    }
}

/// VaultSync Client
///
/// Owns the secret store and the collaborator handles, drives the
/// bootstrap sequence once per process, and afterwards exposes document
/// storage and the per-document key material.
pub struct VaultSyncClient {
    uuid: String,
    server_url: String,
    creds: Credentials,
    tls: TlsConfig,
    secrets_path: PathBuf,
    local_db_path: PathBuf,
    secrets: SecretStore,
    shared_db: Box<dyn SharedDatabase>,
    opener: Box<dyn LocalDatabaseOpener>,
    local_db: Option<Box<dyn LocalDatabase>>,
    master: Option<MasterSecret>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for VaultSyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSyncClient")
            .field("uuid", &self.uuid)
            .field("server_url", &self.server_url)
            .finish_non_exhaustive()
    }
}

impl VaultSyncClient {
    /// Create a client from configuration and collaborator handles.
    ///
    /// Nothing touches the disk or the network until [`bootstrap`] runs.
    ///
    /// [`bootstrap`]: VaultSyncClient::bootstrap
    pub fn new(
        config: VaultSyncConfig,
        shared_db: Box<dyn SharedDatabase>,
        opener: Box<dyn LocalDatabaseOpener>,
    ) -> VaultSyncResult<Self> {
        config.validate()?;
        let creds = Credentials {
            uuid: config.uuid.clone(),
            token: config.auth_token.clone(),
        };
        let events = config
            .event_sink
            .clone()
            .unwrap_or_else(|| Arc::new(NoOpEventSink));
        Ok(VaultSyncClient {
            uuid: config.uuid.clone(),
            server_url: config.server_url.clone(),
            creds,
            tls: config.tls.clone(),
            secrets_path: config.secrets_path.clone(),
            local_db_path: config.local_db_path.clone(),
            secrets: SecretStore::new(config.secrets_path.clone(), config.passphrase.clone()),
            shared_db,
            opener,
            local_db: None,
            master: None,
            events,
        })
    }

    /// Bootstrap sequence:
    ///
    /// * stage 0 - directory initialization.
    /// * stage 1 - secret loading/recovery/generation:
    ///     - if secrets exist locally, load them.
    ///     - else, if secrets exist in the shared db, import them.
    ///     - else, generate a new secret.
    /// * stage 2 - store the wrapped secrets in the shared db
    ///   (skipped when the local copy was already usable).
    /// * stage 3 - local database initialization.
    ///
    /// Cryptographic integrity failures are fatal. A locally present
    /// secrets file that cannot be unwrapped with the supplied
    /// passphrase aborts the sequence; a fresh secret is never generated
    /// over an existing one.
    pub fn bootstrap(&mut self) -> VaultSyncResult<()> {
        self.init_dirs()?;

        let had_local = self.secrets.has_usable_secret();
        if !had_local {
            if !self.secrets.is_empty() {
                return Err(VaultSyncError::Integrity(
                    "stored secrets cannot be unwrapped with the supplied passphrase".to_string(),
                ));
            }
            info!("Trying to fetch storage secrets from shared recovery database");
            match self.fetch_recovery_document()? {
                Some(doc) => {
                    info!("Found storage secrets in shared recovery database");
                    if let Some(uuid) = self.secrets.import_recovery(&doc)? {
                        self.set_uuid(uuid);
                    }
                }
                None => {
                    info!("No storage secrets found, creating new secrets");
                    self.emit(Event::CreatingKeys {
                        uuid: self.uuid.clone(),
                    });
                    self.secrets.generate()?;
                    self.emit(Event::DoneCreatingKeys {
                        uuid: self.uuid.clone(),
                    });
                }
            }
        }

        // unwrap once; this also validates an imported secret before the
        // id is published anywhere
        self.master = Some(self.secrets.get_master()?);

        if !had_local {
            self.push_recovery_document()?;
        }

        self.open_local_db()?;
        Ok(())
    }

    /// Whether bootstrap completed and the local database is open.
    pub fn is_ready(&self) -> bool {
        self.master.is_some() && self.local_db.is_some()
    }

    fn emit(&self, event: Event) {
        self.events.emit(event);
    }

    fn set_uuid(&mut self, uuid: String) {
        info!("Adopting user identity from recovery document");
        self.creds.uuid = uuid.clone();
        self.uuid = uuid;
    }

    fn init_dirs(&self) -> VaultSyncResult<()> {
        for path in [&self.secrets_path, &self.local_db_path] {
            let Some(parent) = path.parent() else { continue };
            if parent.as_os_str().is_empty() {
                continue;
            }
            if parent.exists() && !parent.is_dir() {
                return Err(VaultSyncError::Config(format!(
                    "not a directory: {}",
                    parent.display()
                )));
            }
            info!("Creating directory: {}", parent.display());
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Probe the shared db for this user's wrapped secrets. Network
    /// failure here is tolerated and reported as "missing"; generation
    /// will still leave a durable local copy before anything is pushed.
    /// A document that exists but does not parse is an integrity
    /// failure, never silently replaced.
    fn fetch_recovery_document(&self) -> VaultSyncResult<Option<RecoveryDocument>> {
        self.emit(Event::DownloadingKeys {
            uuid: self.uuid.clone(),
        });
        let doc_id = secrets_doc_id(&self.uuid);
        let result = self.shared_db.get_doc(&doc_id);
        self.emit(Event::DoneDownloadingKeys {
            uuid: self.uuid.clone(),
        });
        match result {
            Ok(Some(doc)) => {
                let recovery = serde_json::from_value(doc.content).map_err(|err| {
                    VaultSyncError::Integrity(format!("malformed recovery document: {}", err))
                })?;
                Ok(Some(recovery))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                warn!("Shared recovery database unreachable: {}", err);
                Ok(None)
            }
        }
    }

    /// Upload the wrapped secrets. Failure is fatal: the secret must
    /// exist in both places before the local db opens, or a device loss
    /// after generation would orphan the user's data.
    fn push_recovery_document(&mut self) -> VaultSyncResult<()> {
        self.emit(Event::UploadingKeys {
            uuid: self.uuid.clone(),
        });
        let doc_id = secrets_doc_id(&self.uuid);
        let rev = self
            .shared_db
            .get_doc(&doc_id)?
            .and_then(|existing| existing.rev);
        let content = serde_json::to_value(self.secrets.export_recovery(None))?;
        self.shared_db.put_doc(&RemoteDocument {
            doc_id,
            rev,
            content,
        })?;
        self.emit(Event::DoneUploadingKeys {
            uuid: self.uuid.clone(),
        });
        Ok(())
    }

    fn open_local_db(&mut self) -> VaultSyncResult<()> {
        let master = self.master.as_ref().ok_or(VaultSyncError::NoSymmetricSecret)?;
        let mut key = kdf::local_db_key(master)?;
        let key_hex = hex::encode(key);
        key.zeroize();
        let db = self.opener.open(OpenParams {
            path: self.local_db_path.clone(),
            key_hex,
            create: true,
            raw_key: true,
        })?;
        self.local_db = Some(db);
        Ok(())
    }

    //
    // Key material for the per-document encryption layer.
    //

    /// Per-document encryption passphrase.
    pub fn doc_passphrase(&self, doc_id: &str) -> VaultSyncResult<[u8; 32]> {
        let master = self.master.as_ref().ok_or(VaultSyncError::NoSymmetricSecret)?;
        Ok(kdf::doc_passphrase(master, doc_id))
    }

    /// Per-document MAC key.
    pub fn doc_mac_key(&self, doc_id: &str) -> VaultSyncResult<[u8; 32]> {
        let master = self.master.as_ref().ok_or(VaultSyncError::NoSymmetricSecret)?;
        Ok(kdf::doc_mac_key(master, doc_id))
    }

    //
    // Recovery document export and import.
    //

    /// Export the storage secrets and (optionally) the uuid.
    pub fn export_recovery_document(&self, include_uuid: bool) -> RecoveryDocument {
        let uuid = include_uuid.then_some(self.uuid.as_str());
        self.secrets.export_recovery(uuid)
    }

    /// Import storage secrets (and uuid, if present) from a recovery
    /// document.
    pub fn import_recovery_document(&mut self, doc: &RecoveryDocument) -> VaultSyncResult<()> {
        if let Some(uuid) = self.secrets.import_recovery(doc)? {
            self.set_uuid(uuid);
        }
        Ok(())
    }

    //
    // Document storage, retrieval and sync.
    //

    fn db(&self) -> VaultSyncResult<&dyn LocalDatabase> {
        self.local_db
            .as_deref()
            .ok_or_else(|| VaultSyncError::LocalDb("database is not open".to_string()))
    }

    fn db_mut(&mut self) -> VaultSyncResult<&mut Box<dyn LocalDatabase>> {
        self.local_db
            .as_mut()
            .ok_or_else(|| VaultSyncError::LocalDb("database is not open".to_string()))
    }

    /// Create a document in the local encrypted database.
    pub fn create_doc(
        &mut self,
        content: serde_json::Value,
        doc_id: Option<&str>,
    ) -> VaultSyncResult<Document> {
        self.db_mut()?.create_doc(content, doc_id)
    }

    /// Update a document; returns the new revision.
    pub fn put_doc(&mut self, doc: &Document) -> VaultSyncResult<String> {
        self.db_mut()?.put_doc(doc)
    }

    /// Fetch a document by id.
    pub fn get_doc(
        &self,
        doc_id: &str,
        include_deleted: bool,
    ) -> VaultSyncResult<Option<Document>> {
        self.db()?.get_doc(doc_id, include_deleted)
    }

    /// All documents plus the current generation.
    pub fn get_all_docs(&self, include_deleted: bool) -> VaultSyncResult<(u64, Vec<Document>)> {
        self.db()?.get_all_docs(include_deleted)
    }

    /// Delete a document; returns the new revision.
    pub fn delete_doc(&mut self, doc: &Document) -> VaultSyncResult<String> {
        self.db_mut()?.delete_doc(doc)
    }

    /// Create a named index over content field expressions.
    pub fn create_index(&mut self, name: &str, expressions: &[&str]) -> VaultSyncResult<()> {
        self.db_mut()?.create_index(name, expressions)
    }

    /// Remove a named index.
    pub fn delete_index(&mut self, name: &str) -> VaultSyncResult<()> {
        self.db_mut()?.delete_index(name)
    }

    /// Documents matching the key values under a named index.
    pub fn get_from_index(
        &self,
        name: &str,
        key_values: &[&str],
    ) -> VaultSyncResult<Vec<Document>> {
        self.db()?.get_from_index(name, key_values)
    }

    /// Conflicted revisions of a document.
    pub fn get_doc_conflicts(&self, doc_id: &str) -> VaultSyncResult<Vec<Document>> {
        self.db()?.get_doc_conflicts(doc_id)
    }

    /// Resolve conflicts by superseding the listed revisions.
    pub fn resolve_doc(&mut self, doc: &Document, conflicted_revs: &[&str]) -> VaultSyncResult<()> {
        self.db_mut()?.resolve_doc(doc, conflicted_revs)
    }

    /// Synchronize the local replica with the user's remote replica.
    /// Returns the local generation before the synchronization ran.
    pub fn sync(&mut self) -> VaultSyncResult<u64> {
        let url = format!(
            "{}/user-{}",
            self.server_url.trim_end_matches('/'),
            self.uuid
        );
        let creds = self.creds.clone();
        let local_generation = self.db_mut()?.sync(&url, &creds, true)?;
        self.emit(Event::DoneDataSync {
            uuid: self.uuid.clone(),
        });
        Ok(local_generation)
    }

    /// Whether the local replica differs from the remote replica.
    pub fn need_sync(&self) -> VaultSyncResult<bool> {
        let db = self.db()?;
        let info = db.get_sync_info(&db.replica_uid())?;
        if db.generation() != info.source_generation {
            self.emit(Event::NewDataToSync {
                uuid: self.uuid.clone(),
            });
            return Ok(true);
        }
        Ok(false)
    }

    /// Close the local database. Idempotent.
    pub fn close(&mut self) -> VaultSyncResult<()> {
        if let Some(db) = self.local_db.as_mut() {
            db.close()?;
        }
        Ok(())
    }

    //
    // Accessors.
    //

    /// The user uuid (possibly adopted from a recovery document).
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// TLS settings for remote collaborators.
    pub fn tls(&self) -> &TlsConfig {
        &self.tls
    }

    /// The active secret id, once a secret exists.
    pub fn secret_id(&self) -> Option<&str> {
        self.secrets.active_secret_id()
    }

    /// Path of the secrets file.
    pub fn secrets_path(&self) -> &Path {
        &self.secrets_path
    }

    /// Path of the local database.
    pub fn local_db_path(&self) -> &Path {
        &self.local_db_path
    }
}

impl Drop for VaultSyncClient {
    fn drop(&mut self) {
        // the database handle must not outlive the secret store
        let _ = self.close();
    }
}

// VaultSync Prelude Module
// Convenient re-exports for common usage

pub use crate::client::{VaultSyncClient, VaultSyncConfig};
pub use crate::crypto::{CryptoError, CryptoResult, EncryptionMethod};
pub use crate::error::{VaultSyncError, VaultSyncResult};
pub use crate::events::{Event, EventSink, MemoryEventSink, NoOpEventSink};
pub use crate::local_db::{Document, LocalDatabase, LocalDatabaseOpener, OpenParams};
pub use crate::recovery::{secrets_doc_id, RecoveryDocument};
pub use crate::remote::{Credentials, RemoteDocument, SharedDatabase, TlsConfig};
pub use crate::secrets::{SecretStore, WrappedSecret};

// Crate constants
pub use crate::VERSION;

// VaultSync - Client-Side Encrypted Storage and Synchronization Core

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod client;
pub mod crypto;
pub mod error;
pub mod events;
pub mod local_db;
pub mod prelude;
pub mod recovery;
pub mod remote;
pub mod secrets;

// Re-export commonly used types
pub use client::{VaultSyncClient, VaultSyncConfig};
pub use error::{VaultSyncError, VaultSyncResult};
pub use secrets::SecretStore;

/// VaultSync Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

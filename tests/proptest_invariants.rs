//! Property-based invariants for the key-management core.
//!
//! Wrap/unwrap and encrypt/decrypt round-trips, partition determinism,
//! merge monotonicity and file-format idempotence.

use indexmap::IndexMap;
use proptest::prelude::*;
use tempfile::tempdir;

use vaultsync::crypto::kdf::{self, MasterSecret};
use vaultsync::crypto::random::random_bytes;
use vaultsync::crypto::sym::{decrypt_sym, encrypt_sym, sha256_hex};
use vaultsync::recovery::RecoveryDocument;
use vaultsync::secrets::{SecretStore, WrappedSecret};

fn dummy_wrapped(tag: &str) -> WrappedSecret {
    WrappedSecret {
        kdf: "scrypt".to_string(),
        kdf_salt: "c2FsdA==".to_string(),
        kdf_length: 32,
        cipher: "aes256".to_string(),
        length: 1024,
        secret: format!("aXY=:{}", tag),
    }
}

fn secret_map(ids: &[String]) -> IndexMap<String, WrappedSecret> {
    ids.iter()
        .map(|id| (id.clone(), dummy_wrapped(id)))
        .collect()
}

/// Secret-id integrity: everything generate() produces unwraps to a
/// master whose hash is the stored id
#[test]
fn secret_id_integrity_for_generated_secrets() {
    let dir = tempdir().unwrap();
    let mut store = SecretStore::new(dir.path().join("secrets.json"), "hunter2");
    let secret_id = store.generate().unwrap();
    let master = store.get_master().unwrap();
    assert_eq!(sha256_hex(master.as_bytes()), secret_id);
}

proptest! {
    /// Encrypt/decrypt roundtrip: decrypt(encrypt(x, k), k, iv) == x
    #[test]
    fn prop_encryption_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..2048)) {
        let key = random_bytes(32);
        let (iv, ciphertext) = encrypt_sym(&plaintext, &key).unwrap();
        let decrypted = decrypt_sym(&ciphertext, &key, &iv).unwrap();
        prop_assert_eq!(decrypted, plaintext);
    }

    /// Merge monotonicity: importing a recovery document never removes a
    /// locally known secret
    #[test]
    fn prop_merge_monotonicity(
        local_ids in prop::collection::vec("[a-f0-9]{64}", 1..6),
        imported_ids in prop::collection::vec("[a-f0-9]{64}", 0..6),
    ) {
        let dir = tempdir().unwrap();
        let mut store = SecretStore::new(dir.path().join("secrets.json"), "hunter2");
        store
            .import_recovery(&RecoveryDocument {
                storage_secrets: secret_map(&local_ids),
                uuid: None,
            })
            .unwrap();
        let before: Vec<String> = store.secret_ids().map(str::to_string).collect();

        store
            .import_recovery(&RecoveryDocument {
                storage_secrets: secret_map(&imported_ids),
                uuid: None,
            })
            .unwrap();

        for id in &before {
            prop_assert!(store.secret_ids().any(|known| known == id));
        }
        prop_assert!(store.len() >= before.len());
    }

    /// File parse/serialize idempotence: parse(serialize(s)) == s
    #[test]
    fn prop_parse_serialize_idempotence(
        ids in prop::collection::vec("[a-f0-9]{64}", 0..6),
        uuid in prop::option::of("[a-z0-9-]{1,32}"),
    ) {
        let doc = RecoveryDocument {
            storage_secrets: secret_map(&ids),
            uuid,
        };
        let parsed = RecoveryDocument::from_json(&doc.to_json().unwrap()).unwrap();
        prop_assert_eq!(parsed, doc);
    }
}

// scrypt-backed properties run with few cases; each case costs two to
// three KDF invocations
proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    /// Wrap/unwrap roundtrip: unwrap(wrap(m, p), p) == m for all
    /// 1024-byte masters and non-empty passphrases
    #[test]
    fn prop_wrap_unwrap_roundtrip(
        master in prop::collection::vec(any::<u8>(), 1024),
        passphrase in "[ -~]{1,24}",
    ) {
        let salt = random_bytes(64);
        let key = kdf::wrap_key(&passphrase, &salt).unwrap();
        let (iv, ciphertext) = encrypt_sym(&master, &key).unwrap();

        let key_again = kdf::wrap_key(&passphrase, &salt).unwrap();
        let unwrapped = decrypt_sym(&ciphertext, &key_again, &iv).unwrap();
        prop_assert_eq!(unwrapped, master);
    }

    /// Partition determinism: equal masters yield equal derived keys
    #[test]
    fn prop_partition_determinism(
        bytes in prop::collection::vec(any::<u8>(), 1024),
        doc_id in "[a-zA-Z0-9-]{1,32}",
    ) {
        let a = MasterSecret::from_bytes(bytes.clone()).unwrap();
        let b = MasterSecret::from_bytes(bytes).unwrap();
        prop_assert_eq!(kdf::local_db_key(&a).unwrap(), kdf::local_db_key(&b).unwrap());
        prop_assert_eq!(kdf::doc_passphrase(&a, &doc_id), kdf::doc_passphrase(&b, &doc_id));
        prop_assert_eq!(kdf::doc_mac_key(&a, &doc_id), kdf::doc_mac_key(&b, &doc_id));
    }
}

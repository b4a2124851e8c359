// VaultSync Random Material
// Every random draw in the crate goes through the OS CSPRNG

use rand::rngs::OsRng;
use rand::RngCore;

/// Draw `length` cryptographically secure random bytes.
///
/// Used for master secrets, wrapping salts and CTR initial values; the
/// caller picks the length, this module picks the source.
pub fn random_bytes(length: usize) -> Vec<u8> {
    let mut buf = vec![0u8; length];
    OsRng.fill_bytes(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_length() {
        for len in [0, 1, 8, 64, 1024] {
            assert_eq!(random_bytes(len).len(), len);
        }
    }

    #[test]
    fn test_draws_are_independent() {
        assert_ne!(random_bytes(32), random_bytes(32));
    }
}

//! Key derivation: the `derive_k` one-block key tree, PBKDF2 knowledge-key
//! derivation, and folding arbitrary entropy into a 16-byte unlock key.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::aes_cbc::encrypt_block_zero_iv;
use crate::Key16;

pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// `derive_k(master, index)` — AES-CBC-encrypt(master, 16-byte big-endian
/// index, zero IV). One-block key tree used throughout §4.C/§4.E to derive
/// the signature factor keys, the transport key, and keys derived from the
/// vault key.
pub fn derive_k(master: &[u8; 16], index: u64) -> Key16 {
    let mut block = [0u8; 16];
    block[8..].copy_from_slice(&index.to_be_bytes());
    Key16(encrypt_block_zero_iv(master, &block))
}

/// `pbkdf2_sha256(password, salt=activation_id_short, iter=10000, 16 bytes)`
/// — produces the knowledge unlock key from a user password.
pub fn knowledge_unlock_key(password: &[u8], activation_id_short: &[u8]) -> Key16 {
    let mut out = [0u8; 16];
    pbkdf2_hmac::<Sha256>(password, activation_id_short, PBKDF2_ITERATIONS, &mut out);
    Key16(out)
}

/// `signature_unlock_key_from_data(x)` = SHA-256 truncated to 16 bytes.
/// Folds arbitrary device-related entropy into a 16-byte unlock key, used
/// for the possession factor.
pub fn signature_unlock_key_from_data(data: &[u8]) -> Key16 {
    Key16(crate::hash::sha256_trunc16(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_k_is_deterministic_and_index_dependent() {
        let master = [5u8; 16];
        let k1 = derive_k(&master, 1);
        let k1_again = derive_k(&master, 1);
        let k2 = derive_k(&master, 2);
        assert_eq!(k1.0, k1_again.0);
        assert_ne!(k1.0, k2.0);
    }

    #[test]
    fn knowledge_key_depends_on_salt() {
        let k1 = knowledge_unlock_key(b"1234", b"AAAAA-AAAAA");
        let k2 = knowledge_unlock_key(b"1234", b"BBBBB-BBBBB");
        assert_ne!(k1.0, k2.0);
    }

    #[test]
    fn changed_password_yields_different_key() {
        let salt = b"AAAAA-AAAAA";
        let old = knowledge_unlock_key(b"1234", salt);
        let new = knowledge_unlock_key(b"5678", salt);
        assert_ne!(old.0, new.0);
    }
}
